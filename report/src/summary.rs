//! End-of-run summary

use std::fmt::Write as _;
use std::path::Path;

use llmperf_bench_core::{BenchResult, CombinationOutcome, RunReport};

/// Plain-text table of every combination and the run totals
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    let rows: Vec<[String; 6]> = report
        .combinations
        .iter()
        .map(|c| {
            let detail = match &c.outcome {
                CombinationOutcome::Done => format!("{} metrics, {} files", c.published, c.uploaded),
                CombinationOutcome::Skipped(reason) => reason.to_string(),
                CombinationOutcome::Failed { error } => error.clone(),
            };
            [
                c.model.clone(),
                c.test_name.clone(),
                c.container.clone(),
                c.concurrency.to_string(),
                c.outcome.label().to_string(),
                detail,
            ]
        })
        .collect();

    let header = ["MODEL", "TEST", "CONTAINER", "CONC", "STATUS", "DETAIL"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |out: &mut String, cells: &[&str]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths.iter().copied())
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    };

    line(&mut out, &header);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        line(&mut out, &cells);
    }

    let _ = writeln!(
        out,
        "\n{} combinations: {} done, {} skipped, {} failed; {} teardowns, {} metrics published in {:.1}s",
        report.total(),
        report.done(),
        report.skipped(),
        report.failed(),
        report.teardowns(),
        report.published(),
        report.elapsed.as_secs_f64()
    );
    if !report.snapshot_uploaded {
        let _ = writeln!(out, "warning: job config snapshot was not uploaded");
    }
    out
}

/// Write the report as pretty JSON
pub async fn write_report_json(report: &RunReport, path: &Path) -> BenchResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(path, json).await?;
    tracing::info!(path = %path.display(), "wrote run report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report_summary() {
        let report = RunReport {
            snapshot_uploaded: true,
            ..Default::default()
        };
        let text = render_summary(&report);
        assert!(text.starts_with("MODEL"));
        assert!(text.contains("0 combinations: 0 done, 0 skipped, 0 failed"));
        assert!(!text.contains("warning"));
    }

    #[tokio::test]
    async fn test_report_json_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.json");
        write_report_json(&RunReport::default(), &path).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["combinations"], serde_json::json!([]));
        assert_eq!(value["snapshot_uploaded"], false);
    }
}
