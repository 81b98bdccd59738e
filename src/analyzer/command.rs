use crate::error::{AnalysisError, SetupError};
use crate::model::{Analysis, Finding, Target, Visit};
use async_trait::async_trait;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Runs an external analyzer and parses its JSON report.
///
/// The command line is `<command> <target> <args>`. The process is killed if
/// the analysis is abandoned (timeout or interrupt).
pub struct CommandAnalyzer {
    program: String,
    leading_args: Vec<String>,
    trailing_args: Vec<String>,
}

#[derive(Deserialize)]
struct Report {
    #[serde(default, deserialize_with = "ordered_urls")]
    urls: Vec<(String, UrlInfo)>,
    #[serde(default, alias = "applications")]
    technologies: Vec<Technology>,
}

#[derive(Deserialize)]
struct UrlInfo {
    #[serde(default)]
    status: Option<u16>,
}

#[derive(Deserialize)]
struct Technology {
    name: String,
    #[serde(default)]
    version: Option<String>,
}

impl CommandAnalyzer {
    /// Parses `command` and `args` with shell quoting rules.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::InvalidCommand`] when either string has
    /// unbalanced quotes or `command` is empty.
    pub fn new(command: &str, args: &str) -> Result<Self, SetupError> {
        let mut parts = shlex::split(command)
            .ok_or_else(|| SetupError::InvalidCommand(command.to_string()))?;
        if parts.is_empty() {
            return Err(SetupError::InvalidCommand("empty command".to_string()));
        }
        let program = parts.remove(0);

        let trailing_args = shlex::split(args)
            .ok_or_else(|| SetupError::InvalidCommand(args.to_string()))?;

        Ok(Self {
            program,
            leading_args: parts,
            trailing_args,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command_line(&self, target: &Target) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.push(target.to_string());
        args.extend(self.trailing_args.iter().cloned());
        args
    }
}

#[async_trait]
impl super::Analyzer for CommandAnalyzer {
    fn name(&self) -> &'static str {
        "External Command"
    }

    fn is_available(&self) -> bool {
        find_program(&self.program)
    }

    async fn analyze(&self, target: &Target) -> Result<Analysis, AnalysisError> {
        let args = self.command_line(target);
        debug!(program = %self.program, ?args, "running analyzer");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    AnalysisError::Unavailable(format!("{}: {}", self.program, e))
                }
                _ => AnalysisError::Execution(format!("failed to run {}: {}", self.program, e)),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(target = %target, stdout = %stdout, "analyzer output");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalysisError::Execution(format!(
                "{} exited with {}: {}{}",
                self.program,
                output.status,
                stdout.trim(),
                stderr.trim()
            )));
        }

        parse_report(&stdout, target)
    }
}

/// Converts the analyzer's JSON report into an [`Analysis`].
pub(crate) fn parse_report(json: &str, target: &Target) -> Result<Analysis, AnalysisError> {
    let report: Report = serde_json::from_str(json)
        .map_err(|e| AnalysisError::Execution(format!("unparseable analyzer output: {}", e)))?;

    let findings = report
        .technologies
        .into_iter()
        .map(|t| Finding::new(t.name, t.version.as_deref(), target.clone()))
        .collect();

    let visits = report
        .urls
        .into_iter()
        .map(|(url, info)| Visit::new(url, info.status))
        .collect();

    Ok(Analysis::new(findings).with_visits(visits))
}

/// Reads a JSON object into a list, keeping the document's key order.
fn ordered_urls<'de, D>(deserializer: D) -> Result<Vec<(String, UrlInfo)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedVisitor;

    impl<'de> Visitor<'de> for OrderedVisitor {
        type Value = Vec<(String, UrlInfo)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of url to url info")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedVisitor)
}

/// Returns true if `program` is a path to a file or is found in `PATH`.
fn find_program(program: &str) -> bool {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file();
    }

    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };

    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(program);
        candidate.is_file() || (cfg!(windows) && candidate.with_extension("exe").is_file())
    })
}
