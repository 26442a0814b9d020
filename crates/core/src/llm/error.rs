use crate::llm::Provider;
use std::fmt;

/// Why a single candidate model did not produce text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    Http { status: u16, body: String },
    Transport(String),
    MalformedBody(String),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Http { status, body } => {
                write!(f, "HTTP {status}")?;
                let body = body.trim();
                if !body.is_empty() {
                    write!(f, ": {}", truncate(body, 300))?;
                }
                Ok(())
            }
            AttemptFailure::Transport(msg) => write!(f, "transport error: {msg}"),
            AttemptFailure::MalformedBody(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FailedAttempt {
    pub model: String,
    pub failure: AttemptFailure,
}

/// Every candidate was tried once and none succeeded.
#[derive(Debug, Clone)]
pub struct GenerationError {
    pub provider: Provider,
    pub attempts: Vec<FailedAttempt>,
}

impl GenerationError {
    pub fn last(&self) -> Option<&FailedAttempt> {
        self.attempts.last()
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last() {
            Some(last) => write!(
                f,
                "all {} model candidates failed (provider={:?}); last: {} -> {}",
                self.attempts.len(),
                self.provider,
                last.model,
                last.failure
            ),
            None => write!(f, "no model candidates to try (provider={:?})", self.provider),
        }
    }
}

impl std::error::Error for GenerationError {}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
