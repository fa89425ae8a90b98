use serde::Serialize;
use thiserror::Error;

use crate::record::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// Network error, timeout, 408/429 or 5xx. Worth another attempt.
    Retryable,
    /// 4xx or a body that does not have the expected structure.
    Terminal,
    /// Retryable failures until the attempt budget ran out.
    Exhausted,
    /// The adapter answered but yielded no usable records.
    Empty,
    /// The aggregate deadline passed before the source finished.
    TimedOut,
    Cancelled,
}

impl FetchErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorKind::Retryable => "retryable",
            FetchErrorKind::Terminal => "terminal",
            FetchErrorKind::Exhausted => "exhausted",
            FetchErrorKind::Empty => "empty",
            FetchErrorKind::TimedOut => "timed_out",
            FetchErrorKind::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{source_name} [{}]: {message}", .kind.as_str())]
pub struct FetchError {
    #[serde(rename = "source")]
    pub source_name: String,
    pub kind: FetchErrorKind,
    pub message: String,
    pub attempts: u32,
}

impl FetchError {
    pub fn new(source_name: &str, kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.to_string(),
            kind,
            message: message.into(),
            attempts: 1,
        }
    }

    pub fn retryable(source_name: &str, message: impl Into<String>) -> Self {
        Self::new(source_name, FetchErrorKind::Retryable, message)
    }

    pub fn terminal(source_name: &str, message: impl Into<String>) -> Self {
        Self::new(source_name, FetchErrorKind::Terminal, message)
    }

    pub fn empty(source_name: &str) -> Self {
        Self::new(source_name, FetchErrorKind::Empty, "no usable records")
    }

    pub fn timed_out(source_name: &str, message: impl Into<String>) -> Self {
        Self::new(source_name, FetchErrorKind::TimedOut, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == FetchErrorKind::Retryable
    }

    pub fn exhausted(mut self, attempts: u32) -> Self {
        self.kind = FetchErrorKind::Exhausted;
        self.attempts = attempts;
        self
    }

    pub fn cancelled(mut self, attempts: u32) -> Self {
        self.kind = FetchErrorKind::Cancelled;
        self.attempts = attempts;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Every dataset came back empty. Carries the full diagnostic trail.
#[derive(Debug, Clone, Error)]
#[error("all {attempted} datasets failed ({} errors)", .errors.len())]
pub struct AggregateError {
    pub attempted: usize,
    pub failed: Vec<Dataset>,
    pub errors: Vec<FetchError>,
}

#[cfg(test)]
mod tests {
    use super::{FetchError, FetchErrorKind};

    #[test]
    fn display_includes_source_and_kind() {
        let err = FetchError::retryable("espn_roster", "http 503").exhausted(3);
        assert_eq!(err.kind, FetchErrorKind::Exhausted);
        assert_eq!(err.attempts, 3);
        assert_eq!(err.to_string(), "espn_roster [exhausted]: http 503");
    }
}
