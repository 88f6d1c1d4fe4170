use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info};

use crate::error::{ProgressError, Result};
use crate::types::{ProgressRecord, RawRow, Status};
use crate::util::parse_date_safe;

pub const NARROW_COLUMNS: [&str; 6] = [
    "Date",
    "Team ID",
    "Team Lead",
    "Intern Name",
    "Topic",
    "Status",
];

pub const IDENTITY_COLUMNS: [&str; 3] = ["Team ID", "Team Lead", "Intern Name"];

pub const DEFAULT_TOPICS: [&str; 5] = [
    "Python",
    "APIs",
    "Machine Learning",
    "SQL",
    "Data Visualization",
];

/// Columns whose presence marks an upload as one-row-per-observation.
const NARROW_MARKERS: [&str; 3] = ["Date", "Topic", "Status"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// One row per (date, intern, topic) observation.
    Narrow,
    /// One row per intern with a status column per topic, no dates.
    Wide,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: String,
    pub lead: String,
}

/// An uploaded table after validation and classification. Never mutated
/// once built; a new upload produces a new `Dataset`.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub schema: SchemaKind,
    pub topics: Vec<String>,
    pub records: Vec<ProgressRecord>,
    /// Distinct teams in encounter order, each with the first lead seen.
    pub teams: Vec<Team>,
}

impl Dataset {
    pub fn team(&self, id: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    pub fn team_records<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a ProgressRecord> {
        self.records.iter().filter(move |r| r.team_id == id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Topic columns for the wide schema; `DEFAULT_TOPICS` when unset.
    pub topics: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub records: usize,
    pub parse_errors: usize,
    pub unknown_statuses: usize,
    pub undated_rows: usize,
}

pub fn detect_schema(headers: &StringRecord) -> SchemaKind {
    if headers.iter().any(|h| NARROW_MARKERS.contains(&h)) {
        SchemaKind::Narrow
    } else {
        SchemaKind::Wide
    }
}

/// Confirm every column the schema needs is present. Reports all missing
/// columns at once, in the order they are required.
pub fn validate_headers(headers: &StringRecord, schema: SchemaKind, topics: &[String]) -> Result<()> {
    let required: Vec<&str> = match schema {
        SchemaKind::Narrow => NARROW_COLUMNS.to_vec(),
        SchemaKind::Wide => IDENTITY_COLUMNS
            .iter()
            .copied()
            .chain(topics.iter().map(String::as_str))
            .collect(),
    };
    let missing: Vec<String> = required
        .into_iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ProgressError::Schema { missing })
    }
}

pub fn load_and_clean(path: &Path, options: &LoadOptions) -> Result<(Dataset, LoadReport)> {
    let file = File::open(path)?;
    let loaded = load_from_reader(file, options)?;
    info!(
        path = %path.display(),
        records = loaded.1.records,
        teams = loaded.0.teams.len(),
        "loaded progress file"
    );
    Ok(loaded)
}

pub fn load_from_reader<R: Read>(reader: R, options: &LoadOptions) -> Result<(Dataset, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let schema = detect_schema(&headers);
    debug!(?schema, columns = headers.len(), "detected schema");

    let wide_topics: Vec<String> = match &options.topics {
        Some(t) => t.clone(),
        None => DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
    };
    validate_headers(&headers, schema, &wide_topics)?;

    let mut report = LoadReport::default();
    let records = match schema {
        SchemaKind::Narrow => read_narrow(&mut rdr, &mut report),
        SchemaKind::Wide => read_wide(&mut rdr, &headers, &wide_topics, &mut report),
    };

    let topics = match schema {
        SchemaKind::Narrow => distinct(records.iter().map(|r| r.topic.as_str())),
        SchemaKind::Wide => wide_topics,
    };

    let mut teams: Vec<Team> = Vec::new();
    for r in &records {
        if !teams.iter().any(|t| t.id == r.team_id) {
            teams.push(Team {
                id: r.team_id.clone(),
                lead: r.team_lead.clone(),
            });
        }
    }

    report.records = records.len();
    report.unknown_statuses = records.iter().filter(|r| r.status == Status::Unknown).count();
    if report.unknown_statuses > 0 {
        debug!(count = report.unknown_statuses, "coerced unrecognized statuses to Unknown");
    }

    Ok((
        Dataset {
            schema,
            topics,
            records,
            teams,
        },
        report,
    ))
}

fn read_narrow<R: Read>(rdr: &mut csv::Reader<R>, report: &mut LoadReport) -> Vec<ProgressRecord> {
    let mut out = Vec::new();
    for result in rdr.deserialize::<RawRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(row = report.total_rows, error = %e, "skipping unreadable row");
                report.parse_errors += 1;
                continue;
            }
        };
        let (Some(team_id), Some(intern_name), Some(topic)) =
            (non_empty(row.team_id), non_empty(row.intern_name), non_empty(row.topic))
        else {
            report.parse_errors += 1;
            continue;
        };
        let date = parse_date_safe(row.date.as_deref());
        if date.is_none() {
            report.undated_rows += 1;
        }
        out.push(ProgressRecord {
            date,
            team_id,
            team_lead: row.team_lead.unwrap_or_default(),
            intern_name,
            topic,
            status: Status::classify(row.status.as_deref().unwrap_or("")),
        });
    }
    out
}

fn read_wide<R: Read>(
    rdr: &mut csv::Reader<R>,
    headers: &StringRecord,
    topics: &[String],
    report: &mut LoadReport,
) -> Vec<ProgressRecord> {
    let position = |name: &str| headers.iter().position(|h| h == name);
    // validate_headers has already run, so every lookup succeeds.
    let team_idx = position("Team ID");
    let lead_idx = position("Team Lead");
    let intern_idx = position("Intern Name");
    let topic_idx: Vec<Option<usize>> = topics.iter().map(|t| position(t.as_str())).collect();

    let mut out = Vec::new();
    for result in rdr.records() {
        report.total_rows += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(row = report.total_rows, error = %e, "skipping unreadable row");
                report.parse_errors += 1;
                continue;
            }
        };
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).map(str::to_string);
        let (Some(team_id), Some(intern_name)) = (non_empty(cell(team_idx)), non_empty(cell(intern_idx)))
        else {
            report.parse_errors += 1;
            continue;
        };
        let team_lead = cell(lead_idx).unwrap_or_default();
        for (topic, idx) in topics.iter().zip(&topic_idx) {
            out.push(ProgressRecord {
                date: None,
                team_id: team_id.clone(),
                team_lead: team_lead.clone(),
                intern_name: intern_name.clone(),
                topic: topic.clone(),
                status: Status::classify(idx.and_then(|i| record.get(i)).unwrap_or("")),
            });
        }
    }
    out
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.iter().any(|o| o == v) {
            out.push(v.to_string());
        }
    }
    out
}
