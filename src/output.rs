use std::path::{Path, PathBuf};

use serde::Serialize;
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use tracing::info;

use crate::error::Result;
use crate::reports::ViewReport;
use crate::types::{Heatmap, Status};
use crate::util::format_number;

pub const HEATMAP_FILE: &str = "heatmap.csv";
pub const DISTRIBUTION_FILE: &str = "status_distribution.csv";
pub const RANKING_FILE: &str = "team_ranking.csv";
pub const SUMMARY_FILE: &str = "summary.json";

/// Serialize `rows` to `path` with a header derived from the row type.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Pretty-printed JSON, overwriting `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// The heatmap has one column per topic, so the header is written by hand
/// instead of derived from a struct.
pub fn write_heatmap_csv(path: &Path, heatmap: &Heatmap) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut header = vec!["Intern".to_string()];
    header.extend(heatmap.topics.iter().cloned());
    header.push("Completion %".to_string());
    wtr.write_record(&header)?;
    for row in &heatmap.rows {
        let mut record = vec![row.intern.clone()];
        record.extend(row.statuses.iter().map(|s| s.label().to_string()));
        record.push(format!("{:.2}", row.completion_pct));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write every table of `report` into `dir` and return the paths written.
///
/// An empty selection still truncates every file so a previous run's
/// output never passes for the current one.
pub fn export_report(dir: &Path, report: &ViewReport) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let heatmap = dir.join(HEATMAP_FILE);
    let distribution = dir.join(DISTRIBUTION_FILE);
    let ranking = dir.join(RANKING_FILE);
    let summary = dir.join(SUMMARY_FILE);

    write_heatmap_csv(&heatmap, &report.heatmap)?;
    write_csv(&distribution, &report.distribution)?;
    write_csv(&ranking, &report.ranking)?;
    write_json(&summary, &report.summary)?;

    info!(dir = %dir.display(), "exported report files");
    Ok(vec![heatmap, distribution, ranking, summary])
}

/// Markdown table of the heatmap with one status symbol per cell.
pub fn render_heatmap(heatmap: &Heatmap) -> String {
    let mut builder = Builder::default();
    let mut header = vec!["Intern".to_string()];
    header.extend(heatmap.topics.iter().cloned());
    header.push("Completion %".to_string());
    builder.push_record(header);
    for row in &heatmap.rows {
        let mut record = vec![row.intern.clone()];
        record.extend(row.statuses.iter().map(|s| s.symbol().to_string()));
        record.push(format_number(row.completion_pct, 2));
        builder.push_record(record);
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn preview_heatmap(heatmap: &Heatmap) {
    if heatmap.is_empty() {
        println!("(no rows)\n");
        return;
    }
    println!("{}\n", render_heatmap(heatmap));
    let legend: Vec<String> = [
        Status::Completed,
        Status::PartiallyCompleted,
        Status::NotStarted,
        Status::Unknown,
    ]
    .iter()
    .map(|s| format!("{} {}", s.symbol(), s.label()))
    .collect();
    println!("Legend: {}\n", legend.join("  "));
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
