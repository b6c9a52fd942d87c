use serde::{Deserialize, Serialize};

use crate::driver::CursorOptions;
use crate::error::SqlRunnerError;

/// Options shared by every runner, whatever the dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerOptions {
    /// Rows a driver may buffer ahead of a slow stream sink.
    pub stream_fetch_size: usize,
    /// Fail unrecognised methods with `UnsupportedMethod` instead of passing the raw response
    /// through.
    pub strict_methods: bool,
    /// Include binding values in the `debug` statement log.
    pub log_bindings: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            stream_fetch_size: 100,
            strict_methods: false,
            log_bindings: false,
        }
    }
}

impl RunnerOptions {
    #[must_use]
    pub fn builder() -> RunnerOptionsBuilder {
        RunnerOptionsBuilder::new()
    }

    /// Parse options from JSON; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::ConfigError` if the JSON is invalid or the options are unusable.
    pub fn from_json_str(json: &str) -> Result<Self, SqlRunnerError> {
        let opts: RunnerOptions = serde_json::from_str(json)?;
        opts.validate()?;
        Ok(opts)
    }

    /// # Errors
    /// Returns `SqlRunnerError::ConfigError` when `stream_fetch_size` is zero.
    pub fn validate(&self) -> Result<(), SqlRunnerError> {
        if self.stream_fetch_size == 0 {
            return Err(SqlRunnerError::ConfigError(
                "stream_fetch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn cursor_options(&self) -> CursorOptions {
        CursorOptions {
            fetch_size: self.stream_fetch_size.max(1),
        }
    }
}

/// Fluent builder for [`RunnerOptions`].
#[derive(Debug, Clone, Default)]
pub struct RunnerOptionsBuilder {
    opts: RunnerOptions,
}

impl RunnerOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stream_fetch_size(mut self, fetch_size: usize) -> Self {
        self.opts.stream_fetch_size = fetch_size;
        self
    }

    #[must_use]
    pub fn strict_methods(mut self, strict: bool) -> Self {
        self.opts.strict_methods = strict;
        self
    }

    #[must_use]
    pub fn log_bindings(mut self, log_bindings: bool) -> Self {
        self.opts.log_bindings = log_bindings;
        self
    }

    /// # Errors
    /// Returns `SqlRunnerError::ConfigError` if the options fail validation.
    pub fn build(self) -> Result<RunnerOptions, SqlRunnerError> {
        self.opts.validate()?;
        Ok(self.opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_defaults() {
        let opts = RunnerOptions::from_json_str(r#"{"strict_methods": true}"#).unwrap();
        assert!(opts.strict_methods);
        assert_eq!(opts.stream_fetch_size, 100);
        assert!(!opts.log_bindings);
    }

    #[test]
    fn zero_fetch_size_is_rejected() {
        let err = RunnerOptions::builder().stream_fetch_size(0).build().unwrap_err();
        assert!(matches!(err, SqlRunnerError::ConfigError(_)));
        assert!(RunnerOptions::from_json_str(r#"{"stream_fetch_size": 0}"#).is_err());
    }
}
