// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod channel;
mod fixtures;
mod grouping;
mod layout;
mod retries;
mod steps;
