// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{ItemStatusParseError, LogLevelParseError};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{fmt, str::FromStr};

/// The identifier a remote collector assigns to a launch or an item.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(SmolStr);

impl ItemId {
    /// Creates a new item ID.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().into())
    }

    /// Returns the ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The type of a reported item.
///
/// Configuration methods are reported with the type corresponding to their lifecycle phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    /// A suite, or a class item created under a suite.
    Suite,
    /// A grouped test (a `<test>` block of a suite).
    Test,
    /// A test method or a nested step.
    Step,
    /// A method that runs once before the suite.
    BeforeSuite,
    /// A method that runs once after the suite.
    AfterSuite,
    /// A method that runs before each grouped test.
    BeforeTest,
    /// A method that runs after each grouped test.
    AfterTest,
    /// A method that runs before the first method of a group.
    BeforeGroups,
    /// A method that runs after the last method of a group.
    AfterGroups,
    /// A method that runs before the first method of a class.
    BeforeClass,
    /// A method that runs after the last method of a class.
    AfterClass,
    /// A method that runs before each test method.
    BeforeMethod,
    /// A method that runs after each test method.
    AfterMethod,
}

/// The final status of an item.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// The item passed.
    Passed,
    /// The item failed.
    Failed,
    /// The item was skipped.
    Skipped,
}

impl ItemStatus {
    /// Returns the string representations of all known variants.
    pub fn variants() -> &'static [&'static str] {
        &["passed", "failed", "skipped"]
    }

    /// Returns the upper-case name used on the wire.
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

impl FromStr for ItemStatus {
    type Err = ItemStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(ItemStatusParseError::new(s)),
        }
    }
}

/// An issue (defect classification) attached to a finished item.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// The issue type locator, for example `"ti001"` or [`Issue::NOT_ISSUE_TYPE`].
    pub issue_type: SmolStr,

    /// A free-form comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Whether the issue was assigned by an automatic analyzer.
    #[serde(default)]
    pub auto_analyzed: bool,

    /// Whether the collector's analyzer should ignore this item.
    #[serde(default)]
    pub ignore_analyzer: bool,
}

impl Issue {
    /// The issue type that marks an item as "not an issue".
    pub const NOT_ISSUE_TYPE: &'static str = "NOT_ISSUE";

    /// Creates a new issue with the given type.
    pub fn new(issue_type: impl AsRef<str>) -> Self {
        Self {
            issue_type: issue_type.as_ref().into(),
            comment: None,
            auto_analyzed: false,
            ignore_analyzer: false,
        }
    }

    /// Returns the sentinel "not an issue" annotation.
    ///
    /// Attaching this to a failed or skipped item stops the collector from treating it as a
    /// defect.
    pub fn not_issue() -> Self {
        Self::new(Self::NOT_ISSUE_TYPE)
    }

    /// Returns true if this is the "not an issue" sentinel.
    pub fn is_not_issue(&self) -> bool {
        self.issue_type == Self::NOT_ISSUE_TYPE
    }
}

/// A key-value attribute attached to a launch or an item.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAttribute {
    /// The attribute key. Attributes without keys are displayed as tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// The attribute value.
    pub value: String,
}

impl ItemAttribute {
    /// Creates a new keyed attribute.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: value.into(),
        }
    }

    /// Creates a new attribute without a key.
    pub fn tag(value: impl Into<String>) -> Self {
        Self {
            key: None,
            value: value.into(),
        }
    }
}

/// A parameter of a parameterized test invocation.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemParameter {
    /// The parameter name, or its type name if the name isn't known.
    pub key: String,

    /// The parameter value, or `None` for a null value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ItemParameter {
    /// Creates a new parameter.
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// The level of a log entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level messages.
    Trace,
    /// Debug-level messages.
    Debug,
    /// Informational messages.
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
}

impl FromStr for LogLevel {
    type Err = LogLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(LogLevelParseError::new(s)),
        }
    }
}
