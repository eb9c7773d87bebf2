// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{ItemStatus, ItemType};
use proptest::prelude::*;

impl Arbitrary for ItemStatus {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            Just(ItemStatus::Passed),
            Just(ItemStatus::Failed),
            Just(ItemStatus::Skipped),
        ]
        .boxed()
    }
}

impl Arbitrary for ItemType {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            Just(ItemType::Suite),
            Just(ItemType::Test),
            Just(ItemType::Step),
            Just(ItemType::BeforeSuite),
            Just(ItemType::AfterSuite),
            Just(ItemType::BeforeTest),
            Just(ItemType::AfterTest),
            Just(ItemType::BeforeGroups),
            Just(ItemType::AfterGroups),
            Just(ItemType::BeforeClass),
            Just(ItemType::AfterClass),
            Just(ItemType::BeforeMethod),
            Just(ItemType::AfterMethod),
        ]
        .boxed()
    }
}
