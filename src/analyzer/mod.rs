//! Technology analyzers.
//!
//! This module provides the [`Analyzer`] trait and the backends that
//! implement it. The engine only ever talks to `dyn Analyzer`; which
//! backend runs is decided once, by [`select_analyzer`].
//!
//! # Available Backends
//!
//! | Backend | Runs | Reports |
//! |---------|------|---------|
//! | [`CommandAnalyzer`] | external CLI (Wappalyzer by default) | everything the CLI detects |
//! | [`HeaderAnalyzer`] | in process, one HTTP request | products announced in response headers |
//!
//! # Example
//!
//! ```no_run
//! use techsweep::analyzer::{select_analyzer, Backend};
//! use techsweep::Target;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let analyzer = select_analyzer(Backend::Auto, "docker run --rm wappalyzer/cli", "")?;
//!     let target = Target::parse("example.com").unwrap();
//!     let analysis = analyzer.analyze(&target).await?;
//!     for finding in analysis.findings {
//!         println!("{}: {}", finding.name, finding.render());
//!     }
//!     Ok(())
//! }
//! ```

mod command;
mod headers;

pub use command::CommandAnalyzer;
pub use headers::HeaderAnalyzer;

use crate::error::{AnalysisError, SetupError};
use crate::model::{Analysis, Target};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Which analyzer backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The external command when it can be found, otherwise headers.
    Auto,
    /// External command only.
    Command,
    /// In-process response header inspection only.
    Headers,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Auto => "auto",
            Backend::Command => "command",
            Backend::Headers => "headers",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detects the technologies used by a target.
///
/// Implementations must be safe to call concurrently; the orchestrator
/// shares one analyzer across all in-flight targets.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Returns the human-readable name of this analyzer.
    fn name(&self) -> &'static str;

    /// Returns true if this analyzer can run on this machine.
    fn is_available(&self) -> bool;

    /// Analyzes one target.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Execution`] when the analysis ran but failed
    /// and [`AnalysisError::Unavailable`] when the backend could not start.
    async fn analyze(&self, target: &Target) -> Result<Analysis, AnalysisError>;
}

/// Builds the analyzer for `backend`.
///
/// `command` is the analyzer command line (the target URL is appended to
/// it) and `args` are extra arguments placed after the URL.
///
/// # Errors
///
/// Returns [`SetupError`] when the requested backend cannot be used.
pub fn select_analyzer(
    backend: Backend,
    command: &str,
    args: &str,
) -> Result<Arc<dyn Analyzer>, SetupError> {
    match backend {
        Backend::Command => {
            let analyzer = CommandAnalyzer::new(command, args)?;
            if !analyzer.is_available() {
                return Err(SetupError::NoBackend(format!(
                    "`{}` was not found",
                    analyzer.program()
                )));
            }
            Ok(Arc::new(analyzer))
        }
        Backend::Headers => Ok(Arc::new(HeaderAnalyzer::new()?)),
        Backend::Auto => match CommandAnalyzer::new(command, args) {
            Ok(analyzer) if analyzer.is_available() => {
                info!(program = analyzer.program(), "using command analyzer");
                Ok(Arc::new(analyzer))
            }
            Ok(analyzer) => {
                debug!(
                    program = analyzer.program(),
                    "command not found, falling back to header analyzer"
                );
                Ok(Arc::new(HeaderAnalyzer::new()?))
            }
            Err(e) => {
                debug!(error = %e, "falling back to header analyzer");
                Ok(Arc::new(HeaderAnalyzer::new()?))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_backend_always_selectable() {
        let analyzer = select_analyzer(Backend::Headers, "", "").unwrap();
        assert_eq!(analyzer.name(), "Response Headers");
        assert!(analyzer.is_available());
    }

    #[test]
    fn test_missing_command_is_setup_error() {
        let result = select_analyzer(Backend::Command, "definitely-not-a-real-binary-7f3a", "");
        assert!(matches!(result, Err(SetupError::NoBackend(_))));
    }

    #[test]
    fn test_auto_falls_back_to_headers() {
        let analyzer =
            select_analyzer(Backend::Auto, "definitely-not-a-real-binary-7f3a", "").unwrap();
        assert_eq!(analyzer.name(), "Response Headers");
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(Backend::Auto.to_string(), "auto");
        assert_eq!(Backend::Headers.as_str(), "headers");
    }
}
