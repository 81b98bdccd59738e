use super::Target;
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

/// One technology detected on a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub target: Target,
}

impl Finding {
    /// Creates a finding. A blank version is stored as `None`.
    pub fn new(name: impl Into<String>, version: Option<&str>, target: Target) -> Self {
        let version = version
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Self {
            name: name.into(),
            version,
            target,
        }
    }

    /// Human-readable cell value for this finding.
    pub fn render(&self) -> String {
        match &self.version {
            Some(version) => format!("Detected, version {}", version),
            None => "Detected".to_string(),
        }
    }
}

/// One hop of the URL trail followed while analyzing a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl Visit {
    pub fn new(url: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            url: url.into(),
            status,
        }
    }
}

impl std::fmt::Display for Visit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({})", self.url, status),
            None => write!(f, "{} (-)", self.url),
        }
    }
}

/// What an analyzer reported for a single target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub visits: Vec<Visit>,
}

impl Analysis {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            visits: Vec::new(),
        }
    }

    pub fn with_visits(mut self, visits: Vec<Visit>) -> Self {
        self.visits = visits;
        self
    }
}

/// The result of analyzing one target. Exactly one exists per dispatched target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub target: Target,
    pub result: Result<Analysis, AnalysisError>,
}

impl Outcome {
    pub fn success(target: Target, analysis: Analysis) -> Self {
        Self {
            target,
            result: Ok(analysis),
        }
    }

    pub fn failure(target: Target, error: AnalysisError) -> Self {
        Self {
            target,
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
