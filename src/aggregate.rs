//! Schema discovery and normalization of analysis outcomes.
//!
//! [`aggregate`] turns a list of [`Outcome`]s, each carrying its own set of
//! findings, into rectangular [`NormalizedRecord`]s: every record holds the
//! metadata columns plus one column per technology seen anywhere in the run.
//!
//! Column keys come from [`column_key`]. Two different technology names can
//! sanitize to the same key (`React` and `react`); the later finding then
//! overwrites the earlier one in that record. This is kept for compatibility
//! with existing reports and is a known sharp edge.
//!
//! # Example
//!
//! ```
//! use techsweep::aggregate::{aggregate, AggregateOptions};
//! use techsweep::{Analysis, Finding, Outcome, Target};
//!
//! let target = Target::parse("example.com").unwrap();
//! let finding = Finding::new("jQuery", Some("3.5.1"), target.clone());
//! let outcomes = vec![Outcome::success(target, Analysis::new(vec![finding]))];
//!
//! let aggregation = aggregate(&outcomes, AggregateOptions::default());
//! assert_eq!(aggregation.records[0].get("Jquery"), Some("Detected, version 3.5.1"));
//! ```

use crate::error::AnalysisError;
use crate::model::{Outcome, Target};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Metadata column holding the last URL visited for the target.
pub const LAST_URL_COLUMN: &str = "Last_Url";

/// Metadata column holding the visited URL trail with statuses.
pub const URLS_COLUMN: &str = "Urls";

/// Metadata columns, in the order they lead every table.
pub const METADATA_COLUMNS: [&str; 2] = [LAST_URL_COLUMN, URLS_COLUMN];

/// One row of the output table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedRecord(BTreeMap<String, String>);

impl NormalizedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    /// Sets `column`, replacing any previous value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The ordered column set of one run: metadata first, then technologies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    technologies: Vec<String>,
}

impl Schema {
    /// Technology columns, sorted.
    pub fn technologies(&self) -> &[String] {
        &self.technologies
    }

    /// All columns in table order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        METADATA_COLUMNS
            .iter()
            .copied()
            .chain(self.technologies.iter().map(String::as_str))
    }
}

/// Options for [`aggregate`].
#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    /// Keep a metadata-only record for targets where nothing was detected.
    pub keep_empty: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self { keep_empty: true }
    }
}

/// Result of normalizing a run.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub schema: Schema,
    pub records: Vec<NormalizedRecord>,
    /// Targets that failed, with their cause, in outcome order.
    pub failures: Vec<(Target, AnalysisError)>,
}

impl Aggregation {
    /// True when the run produced no usable results.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Normalizes `outcomes` into rectangular records.
///
/// Records follow outcome order; failed outcomes produce no record and
/// are listed in [`Aggregation::failures`].
pub fn aggregate(outcomes: &[Outcome], options: AggregateOptions) -> Aggregation {
    let keys: BTreeSet<String> = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .flat_map(|analysis| analysis.findings.iter())
        .map(|finding| column_key(&finding.name))
        .collect();
    // A technology named like a metadata column shares that column.
    let technologies: Vec<String> = keys
        .into_iter()
        .filter(|k| !METADATA_COLUMNS.contains(&k.as_str()))
        .collect();

    let mut records = Vec::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        let analysis = match &outcome.result {
            Ok(analysis) => analysis,
            Err(e) => {
                failures.push((outcome.target.clone(), e.clone()));
                continue;
            }
        };

        if analysis.findings.is_empty() && !options.keep_empty {
            continue;
        }

        let mut record = NormalizedRecord::new();

        let last_url = analysis
            .visits
            .last()
            .map(|v| v.url.clone())
            .unwrap_or_else(|| outcome.target.to_string());
        let urls = if analysis.visits.is_empty() {
            outcome.target.to_string()
        } else {
            analysis
                .visits
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        };
        record.insert(LAST_URL_COLUMN, last_url);
        record.insert(URLS_COLUMN, urls);

        for finding in &analysis.findings {
            record.insert(column_key(&finding.name), finding.render());
        }

        records.push(with_defaults(record, &technologies, ""));
    }

    Aggregation {
        schema: Schema { technologies },
        records,
        failures,
    }
}

/// Returns `record` with every key in `keys` present, missing ones set to `default`.
pub fn with_defaults(mut record: NormalizedRecord, keys: &[String], default: &str) -> NormalizedRecord {
    for key in keys {
        record.0.entry(key.clone()).or_insert_with(|| default.to_string());
    }
    record
}

/// Derives a column key from a technology name.
///
/// Drops everything outside `[0-9A-Za-z_]`, prefixes `_` when the result
/// is empty or starts with a digit, then titleizes it.
pub fn column_key(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    let key = match cleaned.chars().next() {
        None => "_".to_string(),
        Some(c) if c.is_ascii_digit() => format!("_{}", cleaned),
        Some(_) => cleaned,
    };

    titleize(&key)
}

/// Upper-cases the first letter of every run of letters and lower-cases the rest.
pub fn titleize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_is_letter = false;

    for c in s.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Analysis, Finding, Visit};
    use std::time::Duration;

    fn target(s: &str) -> Target {
        Target::parse(s).unwrap()
    }

    fn success(host: &str, findings: &[(&str, Option<&str>)]) -> Outcome {
        let t = target(host);
        let findings = findings
            .iter()
            .map(|(name, version)| Finding::new(*name, *version, t.clone()))
            .collect();
        Outcome::success(t, Analysis::new(findings))
    }

    #[test]
    fn test_column_key() {
        assert_eq!(column_key("jQuery"), "Jquery");
        assert_eq!(column_key("React"), "React");
        assert_eq!(column_key("react-dom"), "Reactdom");
        assert_eq!(column_key("Google Analytics"), "Googleanalytics");
        assert_eq!(column_key("1C-Bitrix"), "_1Cbitrix");
        assert_eq!(column_key("Node.js"), "Nodejs");
        assert_eq!(column_key("some_lib"), "Some_Lib");
        assert_eq!(column_key("日本"), "_");
        assert_eq!(column_key(""), "_");
    }

    #[test]
    fn test_titleize_is_idempotent() {
        for name in ["Last_Url", "Urls", "Some_Lib", "_1Cbitrix", "Jquery"] {
            assert_eq!(titleize(name), name);
        }
    }

    #[test]
    fn test_single_finding_with_version() {
        let outcomes = vec![success("example.com", &[("jQuery", Some("3.5.1"))])];
        let aggregation = aggregate(&outcomes, AggregateOptions::default());

        assert_eq!(aggregation.records.len(), 1);
        let record = &aggregation.records[0];
        assert_eq!(record.get("Jquery"), Some("Detected, version 3.5.1"));
        assert_eq!(record.get(LAST_URL_COLUMN), Some("http://example.com"));
        assert_eq!(record.get(URLS_COLUMN), Some("http://example.com"));
    }

    #[test]
    fn test_failures_excluded_but_reported() {
        let outcomes = vec![
            success("a.com", &[("Nginx", None)]),
            Outcome::failure(target("b.com"), AnalysisError::Timeout(Duration::from_secs(5))),
        ];
        let aggregation = aggregate(&outcomes, AggregateOptions::default());

        assert_eq!(aggregation.records.len(), 1);
        assert_eq!(aggregation.failures.len(), 1);
        assert_eq!(aggregation.failures[0].0.as_str(), "http://b.com");
        assert_eq!(aggregation.failures[0].1.kind(), "timeout");
    }

    #[test]
    fn test_records_are_rectangular() {
        let outcomes = vec![
            success("a.com", &[("React", None), ("Nginx", Some("1.2"))]),
            success("b.com", &[("react-dom", Some("18"))]),
            success("c.com", &[]),
        ];
        let aggregation = aggregate(&outcomes, AggregateOptions::default());

        assert_eq!(
            aggregation.schema.technologies(),
            &["Nginx".to_string(), "React".to_string(), "Reactdom".to_string()]
        );
        let first: Vec<_> = aggregation.records[0].columns().collect();
        for record in &aggregation.records {
            assert_eq!(record.columns().collect::<Vec<_>>(), first);
        }
        assert_eq!(aggregation.records[1].get("React"), Some(""));
        assert_eq!(aggregation.records[1].get("Reactdom"), Some("Detected, version 18"));
    }

    #[test]
    fn test_colliding_names_last_write_wins() {
        let outcomes = vec![success("a.com", &[("React", Some("16")), ("react", Some("18"))])];
        let aggregation = aggregate(&outcomes, AggregateOptions::default());

        assert_eq!(aggregation.schema.technologies().len(), 1);
        assert_eq!(aggregation.records[0].get("React"), Some("Detected, version 18"));
    }

    #[test]
    fn test_empty_findings_policy() {
        let outcomes = vec![success("a.com", &[]), success("b.com", &[("Nginx", None)])];

        let kept = aggregate(&outcomes, AggregateOptions { keep_empty: true });
        assert_eq!(kept.records.len(), 2);
        assert_eq!(kept.records[0].get("Nginx"), Some(""));

        let dropped = aggregate(&outcomes, AggregateOptions { keep_empty: false });
        assert_eq!(dropped.records.len(), 1);
        assert_eq!(dropped.records[0].get(LAST_URL_COLUMN), Some("http://b.com"));
    }

    #[test]
    fn test_visit_trail_metadata() {
        let t = target("example.com");
        let analysis = Analysis::new(vec![]).with_visits(vec![
            Visit::new("http://example.com/", Some(301)),
            Visit::new("https://www.example.com/", Some(200)),
        ]);
        let aggregation = aggregate(&[Outcome::success(t, analysis)], AggregateOptions::default());

        let record = &aggregation.records[0];
        assert_eq!(record.get(LAST_URL_COLUMN), Some("https://www.example.com/"));
        assert_eq!(
            record.get(URLS_COLUMN),
            Some("http://example.com/ (301)\nhttps://www.example.com/ (200)")
        );
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let outcomes = vec![
            success("a.com", &[("PHP", Some("8.1")), ("Nginx", None)]),
            Outcome::failure(target("b.com"), AnalysisError::Execution("x".into())),
            success("c.com", &[("WordPress", Some("6.4"))]),
        ];

        let first = aggregate(&outcomes, AggregateOptions::default());
        let second = aggregate(&outcomes, AggregateOptions::default());
        assert_eq!(first.records, second.records);
        assert_eq!(first.schema, second.schema);
    }

    #[test]
    fn test_no_usable_results() {
        let outcomes = vec![Outcome::failure(
            target("a.com"),
            AnalysisError::Unavailable("docker".into()),
        )];
        assert!(aggregate(&outcomes, AggregateOptions::default()).is_empty());
        assert!(aggregate(&[], AggregateOptions::default()).is_empty());
    }

    #[test]
    fn test_with_defaults_keeps_existing_values() {
        let mut record = NormalizedRecord::new();
        record.insert("A", "x");
        let record = with_defaults(record, &["A".to_string(), "B".to_string()], "");
        assert_eq!(record.get("A"), Some("x"));
        assert_eq!(record.get("B"), Some(""));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_schema_columns_lead_with_metadata() {
        let outcomes = vec![success("a.com", &[("Nginx", None)])];
        let aggregation = aggregate(&outcomes, AggregateOptions::default());
        let columns: Vec<_> = aggregation.schema.columns().collect();
        assert_eq!(columns, vec!["Last_Url", "Urls", "Nginx"]);
    }
}
