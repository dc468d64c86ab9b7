//! Suggestion store
//!
//! [`SuggestionState`] is a snapshot: the ordered records, their cached
//! search entries, the active query and the visible positions. Operations
//! return a new snapshot and leave the receiver untouched, so a failed
//! mutation never leaves a half-applied state behind.

use crate::error::{StoreError, ValidationError};
use crate::search::{matching_entry_indices, SearchEntry, SearchQuery};
use crate::suggest::{decode_candidate, Rating, Suggestion};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionState {
    all: Vec<Suggestion>,
    /// Parallel to `all`
    entries: Vec<SearchEntry>,
    query: SearchQuery,
    /// Positions into `all`, ascending
    visible: Vec<usize>,
}

impl SuggestionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the initial state from persisted, possibly corrupt candidates.
    ///
    /// Candidates that fail decoding, and later repeats of an accepted id,
    /// are dropped with a warning. No query is active afterwards.
    pub fn initialize(candidates: Vec<Value>) -> Self {
        Self::accept(candidates.into_iter().map(decode_candidate))
    }

    /// Same dropping rules as [`SuggestionState::initialize`] for typed records.
    pub fn from_records(records: Vec<Suggestion>) -> Self {
        Self::accept(records.into_iter().map(|record| {
            record.validate()?;
            Ok(record)
        }))
    }

    fn accept<I>(candidates: I) -> Self
    where
        I: Iterator<Item = Result<Suggestion, ValidationError>>,
    {
        let mut all = Vec::new();
        let mut seen = HashSet::new();
        for (position, candidate) in candidates.enumerate() {
            let checked = candidate.and_then(|record| {
                if seen.insert(record.id.clone()) {
                    Ok(record)
                } else {
                    Err(ValidationError::DuplicateId(record.id))
                }
            });
            match checked {
                Ok(record) => all.push(record),
                Err(err) => warn!(position, error = %err, "dropping stored suggestion"),
            }
        }
        debug!(count = all.len(), "suggestion store initialized");
        Self::with_records(all, SearchQuery::default())
    }

    fn with_records(all: Vec<Suggestion>, query: SearchQuery) -> Self {
        let entries = all.iter().map(SearchEntry::new).collect();
        let mut state = Self {
            all,
            entries,
            query,
            visible: Vec::new(),
        };
        state.refilter();
        state
    }

    fn refilter(&mut self) {
        self.visible = matching_entry_indices(&self.entries, &self.query);
    }

    /// Add a record at the end.
    ///
    /// The record must pass [`Suggestion::validate`] and its id must be new.
    pub fn append(&self, record: Suggestion) -> Result<Self, StoreError> {
        record.validate()?;
        if self.position(&record.id).is_some() {
            return Err(StoreError::DuplicateId(record.id));
        }
        let mut next = self.clone();
        next.entries.push(SearchEntry::new(&record));
        debug!(id = %record.id, status = %record.status, "appending suggestion");
        next.all.push(record);
        next.refilter();
        Ok(next)
    }

    /// Remove a record; an unknown id leaves the state as it was.
    pub fn remove_by_id(&self, id: &str) -> Self {
        let Some(position) = self.position(id) else {
            debug!(id, "remove skipped, no such suggestion");
            return self.clone();
        };
        let mut next = self.clone();
        next.all.remove(position);
        next.entries.remove(position);
        next.refilter();
        debug!(id, remaining = next.all.len(), "removed suggestion");
        next
    }

    /// Drop every record and the active query.
    pub fn clear(&self) -> Self {
        if !self.all.is_empty() {
            debug!(count = self.all.len(), "clearing suggestions");
        }
        Self::default()
    }

    pub fn update_rating(&self, id: &str, rating: u8) -> Result<Self, StoreError> {
        let rating = Rating::new(rating)?;
        let position = self
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut next = self.clone();
        next.all[position].rating = Some(rating);
        next.entries[position] = SearchEntry::new(&next.all[position]);
        next.refilter();
        debug!(id, %rating, "rated suggestion");
        Ok(next)
    }

    /// Re-filter with a new raw query.
    pub fn with_query(&self, raw: &str) -> Self {
        self.with_search(SearchQuery::parse(raw))
    }

    /// Re-filter with untyped query input; non-strings clear the filter.
    pub fn with_query_value(&self, raw: &Value) -> Self {
        self.with_search(SearchQuery::from_value(raw))
    }

    pub fn with_search(&self, query: SearchQuery) -> Self {
        let mut next = self.clone();
        next.query = query;
        next.refilter();
        next
    }

    pub fn all(&self) -> &[Suggestion] {
        &self.all
    }

    pub fn visible(&self) -> Vec<&Suggestion> {
        self.visible.iter().map(|&idx| &self.all[idx]).collect()
    }

    pub fn visible_indices(&self) -> &[usize] {
        &self.visible
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub fn get(&self, id: &str) -> Option<&Suggestion> {
        self.position(id).map(|idx| &self.all[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.all.iter().position(|record| record.id == id)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Records of one follow-up conversation, opener first, in insertion order.
    pub fn thread(&self, conversation_id: &str) -> Vec<&Suggestion> {
        self.all
            .iter()
            .filter(|record| {
                record.id == conversation_id
                    || record.conversation_id.as_deref() == Some(conversation_id)
            })
            .collect()
    }
}
