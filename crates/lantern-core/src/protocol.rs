use crate::error::StoreError;
use crate::store::SuggestionState;
use crate::suggest::Suggestion;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Actions a presentation layer can dispatch against the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// `query` is taken as-is from the UI; anything but a string clears the filter.
    Search {
        #[serde(default)]
        query: Value,
    },
    Append {
        record: Suggestion,
    },
    Remove {
        id: String,
    },
    Rate {
        id: String,
        rating: u8,
    },
    Clear,
}

impl Command {
    /// Whether a successful run changes the stored records.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Command::Search { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NotFound,
    Conflict,
}

impl From<&StoreError> for ErrorCode {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ErrorCode::NotFound,
            StoreError::DuplicateId(_) => ErrorCode::Conflict,
            StoreError::Invalid(_) => ErrorCode::Validation,
        }
    }
}

/// What the panel needs to draw itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelView {
    /// Query exactly as typed
    pub query: String,
    pub normalized_query: String,
    pub suggestions: Vec<Suggestion>,
    pub total: usize,
}

impl PanelView {
    pub fn from_state(state: &SuggestionState) -> Self {
        Self {
            query: state.query().raw().to_string(),
            normalized_query: state.query().normalized().to_string(),
            suggestions: state.visible().into_iter().cloned().collect(),
            total: state.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    StateUpdated { view: PanelView },
    Error { code: ErrorCode, message: String },
}

/// Apply one command.
///
/// On failure the returned state is the one passed in and the event carries
/// the error for the UI to show or ignore.
pub fn handle_command(state: &SuggestionState, command: Command) -> (SuggestionState, Event) {
    let outcome = match command {
        Command::Search { query } => Ok(state.with_query_value(&query)),
        Command::Append { record } => state.append(record),
        Command::Remove { id } => Ok(state.remove_by_id(&id)),
        Command::Rate { id, rating } => state.update_rating(&id, rating),
        Command::Clear => Ok(state.clear()),
    };

    match outcome {
        Ok(next) => {
            let view = PanelView::from_state(&next);
            (next, Event::StateUpdated { view })
        }
        Err(err) => {
            tracing::warn!(error = %err, "command rejected");
            let event = Event::Error {
                code: ErrorCode::from(&err),
                message: err.to_string(),
            };
            (state.clone(), event)
        }
    }
}

/// Storage seam for the records; implemented by the adapters crate.
pub trait SuggestionRepository {
    /// Raw persisted candidates, not yet validated.
    fn load_candidates(&self) -> Result<Vec<Value>>;

    fn save(&self, records: &[Suggestion]) -> Result<()>;

    fn load_state(&self) -> Result<SuggestionState> {
        Ok(SuggestionState::initialize(self.load_candidates()?))
    }
}
