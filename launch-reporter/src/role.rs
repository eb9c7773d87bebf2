// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classifies runner methods into lifecycle roles.

use bitflags::bitflags;
use launch_metadata::ItemType;

/// The lifecycle role a method plays.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MethodRole {
    /// A test method.
    Step,
    /// Runs once before the suite.
    BeforeSuite,
    /// Runs before each grouped test.
    BeforeTest,
    /// Runs before the first method of a group.
    BeforeGroups,
    /// Runs before the first method of a class.
    BeforeClass,
    /// Runs before each test method.
    BeforeMethod,
    /// Runs after each test method.
    AfterMethod,
    /// Runs after the last method of a class.
    AfterClass,
    /// Runs after the last method of a group.
    AfterGroups,
    /// Runs after each grouped test.
    AfterTest,
    /// Runs once after the suite.
    AfterSuite,
}

impl MethodRole {
    /// Returns the item type this role is reported as.
    pub fn item_type(self) -> ItemType {
        match self {
            MethodRole::Step => ItemType::Step,
            MethodRole::BeforeSuite => ItemType::BeforeSuite,
            MethodRole::BeforeTest => ItemType::BeforeTest,
            MethodRole::BeforeGroups => ItemType::BeforeGroups,
            MethodRole::BeforeClass => ItemType::BeforeClass,
            MethodRole::BeforeMethod => ItemType::BeforeMethod,
            MethodRole::AfterMethod => ItemType::AfterMethod,
            MethodRole::AfterClass => ItemType::AfterClass,
            MethodRole::AfterGroups => ItemType::AfterGroups,
            MethodRole::AfterTest => ItemType::AfterTest,
            MethodRole::AfterSuite => ItemType::AfterSuite,
        }
    }

    /// Returns true for configuration roles scoped to the whole suite or grouped test.
    ///
    /// Items for these attach to the suite or grouped-test item rather than a class.
    pub fn is_suite_or_test_level(self) -> bool {
        matches!(
            self,
            MethodRole::BeforeSuite
                | MethodRole::AfterSuite
                | MethodRole::BeforeTest
                | MethodRole::AfterTest
        )
    }
}

bitflags! {
    /// The lifecycle annotations declared on a method.
    ///
    /// A method can carry several; [`classify`] picks one.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct LifecycleFlags: u16 {
        /// A test method.
        const TEST = 1 << 0;
        /// Before-suite configuration.
        const BEFORE_SUITE = 1 << 1;
        /// Before-test configuration.
        const BEFORE_TEST = 1 << 2;
        /// Before-groups configuration.
        const BEFORE_GROUPS = 1 << 3;
        /// Before-class configuration.
        const BEFORE_CLASS = 1 << 4;
        /// Before-method configuration.
        const BEFORE_METHOD = 1 << 5;
        /// After-method configuration.
        const AFTER_METHOD = 1 << 6;
        /// After-class configuration.
        const AFTER_CLASS = 1 << 7;
        /// After-groups configuration.
        const AFTER_GROUPS = 1 << 8;
        /// After-test configuration.
        const AFTER_TEST = 1 << 9;
        /// After-suite configuration.
        const AFTER_SUITE = 1 << 10;
    }
}

/// The predicates a runner exposes about a method's declaration.
///
/// Every predicate defaults to false, so implementors only override what they know.
pub trait MethodDescriptor {
    /// True for test methods.
    fn is_test(&self) -> bool {
        false
    }
    /// True for before-suite configuration methods.
    fn is_before_suite(&self) -> bool {
        false
    }
    /// True for before-test configuration methods.
    fn is_before_test(&self) -> bool {
        false
    }
    /// True for before-groups configuration methods.
    fn is_before_groups(&self) -> bool {
        false
    }
    /// True for before-class configuration methods.
    fn is_before_class(&self) -> bool {
        false
    }
    /// True for before-method configuration methods.
    fn is_before_method(&self) -> bool {
        false
    }
    /// True for after-method configuration methods.
    fn is_after_method(&self) -> bool {
        false
    }
    /// True for after-class configuration methods.
    fn is_after_class(&self) -> bool {
        false
    }
    /// True for after-groups configuration methods.
    fn is_after_groups(&self) -> bool {
        false
    }
    /// True for after-test configuration methods.
    fn is_after_test(&self) -> bool {
        false
    }
    /// True for after-suite configuration methods.
    fn is_after_suite(&self) -> bool {
        false
    }
}

impl MethodDescriptor for LifecycleFlags {
    fn is_test(&self) -> bool {
        self.contains(Self::TEST)
    }
    fn is_before_suite(&self) -> bool {
        self.contains(Self::BEFORE_SUITE)
    }
    fn is_before_test(&self) -> bool {
        self.contains(Self::BEFORE_TEST)
    }
    fn is_before_groups(&self) -> bool {
        self.contains(Self::BEFORE_GROUPS)
    }
    fn is_before_class(&self) -> bool {
        self.contains(Self::BEFORE_CLASS)
    }
    fn is_before_method(&self) -> bool {
        self.contains(Self::BEFORE_METHOD)
    }
    fn is_after_method(&self) -> bool {
        self.contains(Self::AFTER_METHOD)
    }
    fn is_after_class(&self) -> bool {
        self.contains(Self::AFTER_CLASS)
    }
    fn is_after_groups(&self) -> bool {
        self.contains(Self::AFTER_GROUPS)
    }
    fn is_after_test(&self) -> bool {
        self.contains(Self::AFTER_TEST)
    }
    fn is_after_suite(&self) -> bool {
        self.contains(Self::AFTER_SUITE)
    }
}

/// Returns the lifecycle role of a method, or `None` if it matches no known role.
///
/// When several predicates match, test methods win, then after-roles (class, groups, method,
/// suite, test), then before-roles in the same order.
pub fn classify(method: &(impl MethodDescriptor + ?Sized)) -> Option<MethodRole> {
    let role = if method.is_test() {
        MethodRole::Step
    } else if method.is_after_class() {
        MethodRole::AfterClass
    } else if method.is_after_groups() {
        MethodRole::AfterGroups
    } else if method.is_after_method() {
        MethodRole::AfterMethod
    } else if method.is_after_suite() {
        MethodRole::AfterSuite
    } else if method.is_after_test() {
        MethodRole::AfterTest
    } else if method.is_before_class() {
        MethodRole::BeforeClass
    } else if method.is_before_groups() {
        MethodRole::BeforeGroups
    } else if method.is_before_method() {
        MethodRole::BeforeMethod
    } else if method.is_before_suite() {
        MethodRole::BeforeSuite
    } else if method.is_before_test() {
        MethodRole::BeforeTest
    } else {
        return None;
    };
    Some(role)
}
