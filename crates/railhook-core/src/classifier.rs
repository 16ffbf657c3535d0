//! Keyword-based classification of downstream failures.
//!
//! Collaborators report failures as human-readable messages. The classifier
//! decides from the message alone whether a failure is worth retrying. The
//! keyword lists below are the contract: changing them changes retry
//! behaviour, and the unit tests pin them.
//!
//! Rules, in order:
//!
//! 1. A message containing a terminal keyword is terminal. If it also
//!    contains an idempotent marker it is an [`ErrorClass::AlreadyProcessed`]
//!    no-op.
//! 2. A message containing a retryable keyword is retryable.
//! 3. Anything else is retryable.
//!
//! Matching is a case-insensitive substring search.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Keywords marking a failure that will not succeed on retry.
pub const DEFAULT_TERMINAL_KEYWORDS: &[&str] = &[
    "invalid",
    "malformed",
    "already processed",
    "already exists",
    "duplicate",
    "not found",
    "unauthorized",
];

/// Keywords marking a temporary failure.
pub const DEFAULT_RETRYABLE_KEYWORDS: &[&str] = &[
    "timeout",
    "connection",
    "temporary",
    "unavailable",
    "deadline exceeded",
    "network",
];

/// Terminal keywords that mean the effect was already applied.
pub const DEFAULT_IDEMPOTENT_KEYWORDS: &[&str] = &["already processed", "duplicate"];

/// How the executor should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Temporary; worth another attempt.
    Retryable,
    /// Permanent business failure.
    Terminal,
    /// The downstream operation already applied this effect.
    AlreadyProcessed,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retryable => "retryable",
            Self::Terminal => "terminal",
            Self::AlreadyProcessed => "already_processed",
        }
    }
}

/// Classifies failure messages against extendable keyword sets.
///
/// # Examples
///
/// ```rust
/// use railhook_core::{ErrorClass, ErrorClassifier};
///
/// let classifier = ErrorClassifier::default();
/// assert_eq!(classifier.classify("connection refused"), ErrorClass::Retryable);
/// assert_eq!(classifier.classify("invalid amount"), ErrorClass::Terminal);
/// assert_eq!(classifier.classify("deposit already processed"), ErrorClass::AlreadyProcessed);
///
/// let classifier = ErrorClassifier::default().with_terminal_keyword("insufficient funds");
/// assert_eq!(classifier.classify("Insufficient funds"), ErrorClass::Terminal);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassifier {
    terminal: Vec<String>,
    retryable: Vec<String>,
    idempotent: Vec<String>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            terminal: to_owned_lowercase(DEFAULT_TERMINAL_KEYWORDS),
            retryable: to_owned_lowercase(DEFAULT_RETRYABLE_KEYWORDS),
            idempotent: to_owned_lowercase(DEFAULT_IDEMPOTENT_KEYWORDS),
        }
    }
}

impl ErrorClassifier {
    /// Add a keyword that marks failures as terminal.
    pub fn with_terminal_keyword(mut self, keyword: impl AsRef<str>) -> Self {
        push_unique(&mut self.terminal, keyword.as_ref());
        self
    }

    /// Add a keyword that marks failures as retryable.
    pub fn with_retryable_keyword(mut self, keyword: impl AsRef<str>) -> Self {
        push_unique(&mut self.retryable, keyword.as_ref());
        self
    }

    /// Add a marker meaning "effect already applied". The marker is also
    /// terminal.
    pub fn with_idempotent_keyword(mut self, keyword: impl AsRef<str>) -> Self {
        push_unique(&mut self.idempotent, keyword.as_ref());
        push_unique(&mut self.terminal, keyword.as_ref());
        self
    }

    pub fn terminal_keywords(&self) -> &[String] {
        &self.terminal
    }

    pub fn retryable_keywords(&self) -> &[String] {
        &self.retryable
    }

    pub fn idempotent_keywords(&self) -> &[String] {
        &self.idempotent
    }

    /// Classify a failure message.
    pub fn classify(&self, message: &str) -> ErrorClass {
        let message = message.to_lowercase();

        if contains_any(&message, &self.terminal) {
            if contains_any(&message, &self.idempotent) {
                return ErrorClass::AlreadyProcessed;
            }
            return ErrorClass::Terminal;
        }

        if !contains_any(&message, &self.retryable) {
            debug!(error = %message, "Unrecognised failure, defaulting to retryable");
        }
        ErrorClass::Retryable
    }

    pub fn is_retryable(&self, message: &str) -> bool {
        self.classify(message).is_retryable()
    }
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|keyword| haystack.contains(keyword.as_str()))
}

fn push_unique(list: &mut Vec<String>, keyword: &str) {
    let keyword = keyword.trim().to_lowercase();
    if !keyword.is_empty() && !list.contains(&keyword) {
        list.push(keyword);
    }
}

fn to_owned_lowercase(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|k| k.to_lowercase()).collect()
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
