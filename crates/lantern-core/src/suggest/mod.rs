//! Suggestion records for Lantern
//!
//! One record per AI answer (or per user follow-up message) tied to a code
//! issue. Records are created by the caller, which also assigns ids.

mod ingest;

pub use ingest::{decode_candidate, parse_timestamp};

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle tag of a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    /// The backend answered
    #[default]
    Success,
    /// The request failed; the body carries the error text
    Error,
    /// Waiting on the backend
    Pending,
    /// A follow-up message written by the user
    User,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Success => "success",
            SuggestionStatus::Error => "error",
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::User => "user",
        }
    }

    pub fn all() -> [SuggestionStatus; 4] {
        [
            SuggestionStatus::Success,
            SuggestionStatus::Error,
            SuggestionStatus::Pending,
            SuggestionStatus::User,
        ]
    }
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuggestionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::all()
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownStatus(s.to_string()))
    }
}

/// User feedback score, always within 1-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::RatingOutOfRange(i64::from(value)))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored suggestion
///
/// Optional fields are skipped when absent so a record written by
/// [`serde_json`] reads back exactly as it went out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// What is wrong
    pub issue: String,
    /// Proposed fix; empty only for user messages
    pub suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    /// File path as the editor reported it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finding_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub status: SuggestionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    /// Backend latency in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Suggestion {
    pub fn new(
        id: impl Into<String>,
        issue: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now(),
            issue: issue.into(),
            suggestion: suggestion.into(),
            feature: None,
            file: None,
            finding_id: None,
            conversation_id: None,
            parent_id: None,
            status: SuggestionStatus::Success,
            tokens_used: None,
            response_time: None,
            rating: None,
            tags: None,
        }
    }

    /// Build the user-authored follow-up to `parent`.
    ///
    /// The message is the record's issue text and the body is left empty.
    /// The thread id is inherited from the parent, or is the parent's own id
    /// when the parent opened the conversation.
    pub fn follow_up(id: impl Into<String>, parent: &Suggestion, message: impl Into<String>) -> Self {
        let conversation_id = parent
            .conversation_id
            .clone()
            .unwrap_or_else(|| parent.id.clone());
        Self {
            feature: parent.feature.clone(),
            file: parent.file.clone(),
            finding_id: parent.finding_id.clone(),
            conversation_id: Some(conversation_id),
            parent_id: Some(parent.id.clone()),
            status: SuggestionStatus::User,
            ..Self::new(id, message, String::new())
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_status(mut self, status: SuggestionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_finding_id(mut self, finding_id: impl Into<String>) -> Self {
        self.finding_id = Some(finding_id.into());
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_tokens_used(mut self, tokens: u64) -> Self {
        self.tokens_used = Some(tokens);
        self
    }

    pub fn with_response_time(mut self, millis: u64) -> Self {
        self.response_time = Some(millis);
        self
    }

    pub fn with_rating(mut self, rating: Rating) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Check the required-field rules shared by ingestion and `append`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingId);
        }
        if self.issue.is_empty() {
            return Err(ValidationError::MissingIssue(self.id.clone()));
        }
        if self.suggestion.is_empty() && !self.is_user_message() {
            return Err(ValidationError::EmptySuggestion(self.id.clone()));
        }
        Ok(())
    }

    pub fn is_user_message(&self) -> bool {
        self.status == SuggestionStatus::User
    }

    /// Tags as a slice, empty when none were set.
    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or_default()
    }
}
