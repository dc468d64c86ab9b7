//! Request and token accounting.
//!
//! A [`UsageTracker`] is owned by whoever talks to the AI backend and passed
//! where it is needed; there is no process-wide instance, so every test and
//! every panel can keep its own counters.

use crate::suggest::{Suggestion, SuggestionStatus};
use serde::Serialize;

/// Aggregated usage numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageStats {
    pub requests: usize,
    pub failures: usize,
    pub pending: usize,
    pub user_messages: usize,
    pub total_tokens: u64,
    /// Mean over responses that reported a latency
    pub average_response_ms: Option<f64>,
    /// Mean over rated records
    pub average_rating: Option<f64>,
}

impl UsageStats {
    /// Derive the same numbers from stored records.
    ///
    /// Success and error records count as requests; user messages do not.
    pub fn from_suggestions(records: &[Suggestion]) -> Self {
        let mut stats = Self::default();
        let mut latency = Mean::default();
        let mut ratings = Mean::default();

        for record in records {
            match record.status {
                SuggestionStatus::Success => stats.requests += 1,
                SuggestionStatus::Error => {
                    stats.requests += 1;
                    stats.failures += 1;
                }
                SuggestionStatus::Pending => stats.pending += 1,
                SuggestionStatus::User => stats.user_messages += 1,
            }
            stats.total_tokens += record.tokens_used.unwrap_or(0);
            if let Some(ms) = record.response_time {
                latency.add(ms as f64);
            }
            if let Some(rating) = record.rating {
                ratings.add(f64::from(rating.value()));
            }
        }

        stats.average_response_ms = latency.value();
        stats.average_rating = ratings.value();
        stats
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Live counters for outgoing AI requests.
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    requests: usize,
    failures: usize,
    total_tokens: u64,
    latency: Mean,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_response(&mut self, tokens: Option<u64>, response_ms: Option<u64>) {
        self.requests += 1;
        self.total_tokens += tokens.unwrap_or(0);
        if let Some(ms) = response_ms {
            self.latency.add(ms as f64);
        }
    }

    pub fn record_failure(&mut self) {
        self.requests += 1;
        self.failures += 1;
    }

    /// Account for a record as it is appended to the store.
    pub fn observe(&mut self, record: &Suggestion) {
        match record.status {
            SuggestionStatus::Success => {
                self.record_response(record.tokens_used, record.response_time)
            }
            SuggestionStatus::Error => self.record_failure(),
            SuggestionStatus::Pending | SuggestionStatus::User => {}
        }
    }

    pub fn snapshot(&self) -> UsageStats {
        UsageStats {
            requests: self.requests,
            failures: self.failures,
            total_tokens: self.total_tokens,
            average_response_ms: self.latency.value(),
            ..UsageStats::default()
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
