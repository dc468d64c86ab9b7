//! Core domain model and contracts for Lantern.
//!
//! Everything in this crate is a pure in-memory transformation: the store
//! hands back new snapshots, the filter is a plain function, and persistence
//! lives behind [`protocol::SuggestionRepository`] in the adapters crate.

pub mod error;
pub mod protocol;
pub mod search;
pub mod store;
pub mod suggest;
pub mod usage;

pub use error::{StoreError, ValidationError};
pub use protocol::*;
pub use search::{filter_suggestions, SearchQuery};
pub use store::SuggestionState;
pub use suggest::{Rating, Suggestion, SuggestionStatus};
pub use usage::{UsageStats, UsageTracker};
