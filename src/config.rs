//! Search configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};

/// What to do when one segment cannot be searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Leave the segment out, report it to the observer, answer from the rest.
    #[default]
    ExcludeAndWarn,
    /// Fail the whole query.
    FailQuery,
}

/// How read sessions reach segment data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionConfig {
    /// Memory-map the segment files of the index directory.
    #[default]
    Local,
    /// Query a session server.
    Remote {
        /// `host:port` of the server.
        address: String,
        /// Read/write timeout for each round trip, in milliseconds.
        #[serde(default = "default_remote_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_remote_timeout_ms() -> u64 {
    5_000
}

/// Edit budget policy for fuzzy terms without an explicit budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzyConfig {
    /// Required similarity between query token and dictionary token, 0.0-1.0.
    pub similarity: f32,
    /// Upper bound on edits regardless of token length.
    pub max_edits: u32,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        FuzzyConfig {
            similarity: 0.75,
            max_edits: 2,
        }
    }
}

impl FuzzyConfig {
    /// Edits tolerated for `token`: longer tokens tolerate more.
    pub fn edits_for(&self, token: &str) -> u32 {
        let chars = token.chars().count();
        if chars == 0 {
            return 0;
        }
        let tolerance = (1.0 - self.similarity.clamp(0.0, 1.0)) as f64;
        let edits = (chars as f64 * tolerance).ceil() as u32;
        edits.clamp(1, self.max_edits.max(1))
    }
}

/// Configuration of a [`crate::Searcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Segment failure handling.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Abandon searches running longer than this many milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Evaluate segments on the rayon pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Fuzzy edit policy.
    #[serde(default)]
    pub fuzzy: FuzzyConfig,

    /// Session backend.
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_parallel() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            failure_policy: FailurePolicy::default(),
            timeout_ms: None,
            parallel: default_parallel(),
            fuzzy: FuzzyConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Load a configuration from a JSON file. Missing keys take defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let config: SearchConfig = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fuzzy.similarity) {
            return Err(TesseraError::invalid_argument(format!(
                "fuzzy.similarity must lie in [0, 1], got {}",
                self.fuzzy.similarity
            )));
        }
        if let SessionConfig::Remote { address, .. } = &self.session
            && address.is_empty()
        {
            return Err(TesseraError::invalid_argument("remote session address is empty"));
        }
        Ok(())
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the search timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Enable or disable parallel segment evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the session backend.
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}
