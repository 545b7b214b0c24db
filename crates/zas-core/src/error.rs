//! Error types for the auto-snapshot control plane

use thiserror::Error;

/// Main error type for control-plane operations
#[derive(Error, Debug)]
pub enum Error {
    /// Field-level problems collected over a whole submission
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The activation delegate exited non-zero after a successful save
    #[error("Activation error: {0}")]
    Activation(String),

    #[error("Snapshot script is missing or not executable: {0}")]
    NotExecutable(String),

    #[error("A snapshot run is already in progress.")]
    RunConflict,

    #[error("Failed to start manual run: {0}")]
    RunLaunch(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Error::Discovery(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Error::Persistence(msg.into())
    }

    /// Create an activation error
    pub fn activation(msg: impl Into<String>) -> Self {
        Error::Activation(msg.into())
    }

    /// Create a run launch error
    pub fn run_launch(msg: impl Into<String>) -> Self {
        Error::RunLaunch(msg.into())
    }
}

/// Accumulator for field-level validation messages.
///
/// Validation never stops at the first problem; every check pushes here and
/// the caller decides what to do once the whole pass is over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    messages: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message; a message already recorded is kept once
    pub fn push(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        if !self.messages.contains(&msg) {
            self.messages.push(msg);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }

    /// Convert into `Err(Error::Validation)` when anything was recorded
    pub fn into_result(self) -> Result<()> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self.messages))
        }
    }
}
