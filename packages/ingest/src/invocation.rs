//! Parsing of structured run invocations.
//!
//! An invocation arrives wrapped in an event whose `body` is itself a JSON
//! document encoded as a string:
//!
//! ```json
//! {"body": "{\"app\": \"recipes\", \"sourceApiName\": \"the-cocktail-db\"}"}
//! ```

use serde::{Deserialize, Serialize};

/// Errors raised while reading an invocation event.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    /// The event is not a JSON object with a string `body`.
    #[error("invalid invocation event: {0}")]
    Event(#[source] serde_json::Error),

    /// The event body does not carry `app` and `sourceApiName`.
    #[error("invalid invocation body: {0}")]
    Body(#[source] serde_json::Error),
}

/// Which app and source a run scrapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    /// Application namespace for config lookup.
    pub app: String,
    /// Registered source API name.
    pub source_api_name: String,
}

#[derive(Deserialize)]
struct Event {
    body: String,
}

impl Invocation {
    #[must_use]
    pub fn new(app: impl Into<String>, source_api_name: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            source_api_name: source_api_name.into(),
        }
    }

    /// Parses an event document and the invocation encoded in its body.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError`] if either layer fails to parse.
    pub fn from_event_str(event: &str) -> Result<Self, InvocationError> {
        let event: Event = serde_json::from_str(event).map_err(InvocationError::Event)?;
        serde_json::from_str(&event.body).map_err(InvocationError::Body)
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.app, self.source_api_name)
    }
}
