// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{Issue, ItemAttribute, ItemParameter, ItemStatus, ItemType, LogLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A request to start a launch.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartLaunchRequest {
    /// The name of the launch.
    pub name: String,

    /// The time at which the launch started.
    pub start_time: DateTime<Utc>,

    /// A description of the launch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Attributes attached to the launch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<ItemAttribute>,

    /// True if this launch reruns a previous launch with the same name.
    #[serde(default)]
    pub rerun: bool,
}

/// A request to finish a launch.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishLaunchRequest {
    /// The time at which the launch finished.
    pub end_time: DateTime<Utc>,

    /// The overall status, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

/// A request to start an item.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartItemRequest {
    /// The display name of the item.
    pub name: String,

    /// The type of the item.
    #[serde(rename = "type")]
    pub item_type: ItemType,

    /// The time at which the item started.
    pub start_time: DateTime<Utc>,

    /// A description of the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// A reference to the code that produced this item, usually `<class>.<method>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_ref: Option<String>,

    /// A stable identifier of the test case across launches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case_id: Option<String>,

    /// Parameters of the invocation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ItemParameter>,

    /// Attributes attached to the item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<ItemAttribute>,

    /// Whether this item is a retry of a previous attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,

    /// Whether this item counts towards launch statistics. Nested steps don't.
    #[serde(default = "default_has_stats")]
    pub has_stats: bool,
}

fn default_has_stats() -> bool {
    true
}

impl StartItemRequest {
    /// Creates a new request with the required fields set.
    pub fn new(name: impl Into<String>, item_type: ItemType, start_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            item_type,
            start_time,
            description: None,
            code_ref: None,
            test_case_id: None,
            parameters: Vec::new(),
            attributes: Vec::new(),
            retry: None,
            has_stats: true,
        }
    }

    /// Returns true if the retry flag is set to true.
    pub fn is_retry(&self) -> bool {
        self.retry == Some(true)
    }
}

/// A request to finish an item.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishItemRequest {
    /// The time at which the item finished.
    pub end_time: DateTime<Utc>,

    /// The final status of the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,

    /// Whether this item is a retry of a previous attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,

    /// An issue annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<Issue>,

    /// A description that replaces the one sent at start, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FinishItemRequest {
    /// Creates a new request with the given end time and status.
    pub fn new(end_time: DateTime<Utc>, status: Option<ItemStatus>) -> Self {
        Self {
            end_time,
            status,
            retry: None,
            issue: None,
            description: None,
        }
    }

    /// Returns true if the retry flag is set to true.
    pub fn is_retry(&self) -> bool {
        self.retry == Some(true)
    }

    /// Returns true if this request carries the "not an issue" annotation.
    pub fn is_not_issue(&self) -> bool {
        self.issue.as_ref().is_some_and(Issue::is_not_issue)
    }
}

/// A file attached to a log entry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// The file name shown in the report.
    pub name: String,

    /// The MIME type of the content.
    pub content_type: String,

    /// The raw content. Sent out-of-band by transports, so it's not part of the JSON body.
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// A log entry attached to an item.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRequest {
    /// The time of the log entry.
    pub time: DateTime<Utc>,

    /// The level of the log entry.
    pub level: LogLevel,

    /// The message.
    pub message: String,

    /// An optional file attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<Attachment>,
}
