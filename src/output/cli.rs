use crate::aggregate::Aggregation;
use crate::orchestrator::RunReport;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Cause")]
    cause: String,
}

#[derive(Tabled)]
struct TechnologyRow {
    #[tabled(rename = "Technology")]
    column: String,
    #[tabled(rename = "Targets")]
    targets: usize,
}

/// Prints what a run produced: failed targets and the technologies seen.
pub fn print_summary(report: &RunReport, aggregation: &Aggregation) {
    println!();
    println!(
        "Run started at {}, finished at {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.finished_at.format("%H:%M:%S UTC")
    );
    if report.interrupted {
        println!(
            "Interrupted: {} of {} targets completed.",
            report.outcomes.len(),
            report.submitted
        );
    }

    if !aggregation.failures.is_empty() {
        println!();
        println!("{} targets failed:", aggregation.failures.len());
        println!();

        let rows: Vec<FailureRow> = aggregation
            .failures
            .iter()
            .map(|(target, error)| FailureRow {
                target: truncate(target.as_str(), 50),
                status: format_status(error.kind()),
                cause: truncate(&error.to_string().replace('\n', " "), 70),
            })
            .collect();

        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    let technologies = aggregation.schema.technologies();
    if !technologies.is_empty() {
        println!();
        println!("All technologies seen ({}):", technologies.len());
        println!();

        let rows: Vec<TechnologyRow> = technologies
            .iter()
            .map(|column| TechnologyRow {
                column: column.clone(),
                targets: aggregation
                    .records
                    .iter()
                    .filter(|r| r.get(column).is_some_and(|v| !v.is_empty()))
                    .count(),
            })
            .collect();

        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    println!();
    println!("Summary:");
    println!("  Targets analyzed: {}", report.outcomes.len());
    println!("  Usable results: {}", aggregation.records.len());
    println!("  Failures: {}", aggregation.failures.len());
}

fn format_status(kind: &str) -> String {
    match kind {
        "timeout" => "\x1b[33mTIMEOUT\x1b[0m".to_string(),
        "unavailable" => "\x1b[91mUNAVAILABLE\x1b[0m".to_string(),
        _ => "\x1b[31mERROR\x1b[0m".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("http://a-very-long-host.example", 10), "http:/...");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }

    #[test]
    fn test_format_status() {
        assert!(format_status("timeout").contains("TIMEOUT"));
        assert!(format_status("error").contains("ERROR"));
    }
}
