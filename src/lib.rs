pub mod aggregate;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod output;
pub mod targets;

pub use aggregate::{aggregate, Aggregation, NormalizedRecord};
pub use analyzer::Analyzer;
pub use config::Config;
pub use error::{AnalysisError, ExportError, SetupError};
pub use model::{Analysis, Finding, Outcome, Target, Visit};
pub use orchestrator::{Orchestrator, RunReport};
