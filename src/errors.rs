//! Error kinds raised while building plans, building engines and dispatching

use thiserror::Error;

use crate::types::DispatchKey;

/// Foreign failure carried as the cause of a dispatch error
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A data type whose slot declarations break the position invariant.
///
/// Positions must be consecutive numbers starting from 0, each used once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedDataType {
    #[error("slots `{first}` and `{second}` of {subject} both declare position {position}")]
    DuplicatePosition {
        subject: &'static str,
        position: usize,
        first: &'static str,
        second: &'static str,
    },

    #[error(
        "slot positions of {subject} must be consecutive numbers starting from 0: \
         expected position {expected}, but the next slot `{slot}` declares {found}"
    )]
    NonContiguousPosition {
        subject: &'static str,
        expected: usize,
        found: usize,
        slot: &'static str,
    },
}

impl MalformedDataType {
    /// Name of the data type that failed validation
    pub fn subject(&self) -> &'static str {
        match self {
            Self::DuplicatePosition { subject, .. } | Self::NonContiguousPosition { subject, .. } => {
                subject
            }
        }
    }
}

/// Failure to construct a [`VisitEngine`](crate::VisitEngine)
#[derive(Debug, Error)]
pub enum EngineInitError {
    #[error("{handler} has no visiting method for visit '{visit}'")]
    NoHandlersFound { handler: &'static str, visit: String },

    #[error("visiting method `{method}` of {handler} for visit '{visit}' returns {found}, expected {expected}")]
    OutputTypeMismatch {
        handler: &'static str,
        visit: String,
        method: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("visiting methods `{first}` and `{second}` of {handler} for visit '{visit}' both take {key}")]
    AmbiguousHandler {
        handler: &'static str,
        visit: String,
        key: DispatchKey,
        first: &'static str,
        second: &'static str,
    },

    #[error("prepared subject is malformed")]
    MalformedSubject(#[from] MalformedDataType),
}

/// Failure of a single dispatch call
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    MalformedDataType(#[from] MalformedDataType),

    #[error("failed to extract slot `{slot}` of {subject}")]
    ExtractionFailure {
        subject: &'static str,
        slot: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("no visiting method for visit '{visit}' taking {key}")]
    NoMatchingHandler { visit: String, key: DispatchKey },

    #[error("visiting method `{method}` for visit '{visit}' failed")]
    HandlerInvocation {
        visit: String,
        method: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("argument {position} of visiting method `{method}` is not a {expected}")]
    ArgumentMismatch {
        method: &'static str,
        position: usize,
        expected: &'static str,
    },

    #[error("deferred visit was dropped before producing a result")]
    Abandoned,
}

impl DispatchError {
    /// Whether the call failed because no operation takes the extracted key
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatchingHandler { .. })
    }
}
