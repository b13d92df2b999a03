//! Skip records collected while parsing tolerant inputs

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Default number of skip records kept per parse
pub const DEFAULT_LIMIT: usize = 50;

/// Why an entry, node or document was skipped
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum Skip {
    #[error("line {line}: EXTINF without a stream URL")]
    MalformedEntry { line: usize },

    #[error("document could not be parsed: {reason}")]
    UnparsableDocument { reason: String },

    #[error("XML error at byte {position}, remaining input ignored: {reason}")]
    TruncatedDocument { position: u64, reason: String },

    #[error("programme at byte {position} skipped: {reason}")]
    MalformedProgrammeNode { position: u64, reason: String },

    #[error("item {index} skipped: {reason}")]
    InvalidJsonItem { index: usize, reason: String },
}

/// Bounded list of skip records plus a total count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    skipped: Vec<Skip>,
    total: usize,
    #[serde(skip)]
    limit: usize,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::with_limit(DEFAULT_LIMIT)
    }
}

impl Diagnostics {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            skipped: Vec::new(),
            total: 0,
            limit,
        }
    }

    pub fn record(&mut self, skip: Skip) {
        debug!(%skip, "skipped input");
        self.total += 1;
        if self.skipped.len() < self.limit {
            self.skipped.push(skip);
        }
    }

    /// Stored records, at most the configured limit
    pub fn skipped(&self) -> &[Skip] {
        &self.skipped
    }

    /// Every skip seen, including those past the limit
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_clean(&self) -> bool {
        self.total == 0
    }
}
