use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::util::display_pct;

/// One row of the narrow (daily) schema, exactly as it appears in the CSV.
#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Date")]
    pub date: Option<String>,
    #[serde(rename = "Team ID")]
    pub team_id: Option<String>,
    #[serde(rename = "Team Lead")]
    pub team_lead: Option<String>,
    #[serde(rename = "Intern Name")]
    pub intern_name: Option<String>,
    #[serde(rename = "Topic")]
    pub topic: Option<String>,
    #[serde(rename = "Status")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    NotStarted,
    PartiallyCompleted,
    Completed,
    Unknown,
}

impl Status {
    /// Map a raw cell to a status. Anything outside the three recognized
    /// labels becomes `Unknown`.
    pub fn classify(raw: &str) -> Status {
        match raw.trim() {
            "Not Started" => Status::NotStarted,
            "Partially Completed" => Status::PartiallyCompleted,
            "Completed" => Status::Completed,
            _ => Status::Unknown,
        }
    }

    /// Priority used when several observations compete for one cell.
    /// `Unknown` carries no rank and never wins over a recognized status.
    pub fn rank(self) -> Option<u8> {
        match self {
            Status::NotStarted => Some(0),
            Status::PartiallyCompleted => Some(1),
            Status::Completed => Some(2),
            Status::Unknown => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::NotStarted => "Not Started",
            Status::PartiallyCompleted => "Partially Completed",
            Status::Completed => "Completed",
            Status::Unknown => "Unknown",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Status::NotStarted => "🔴",
            Status::PartiallyCompleted => "🟡",
            Status::Completed => "🟢",
            Status::Unknown => "❓",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    pub date: Option<NaiveDate>,
    pub team_id: String,
    pub team_lead: String,
    pub intern_name: String,
    pub topic: String,
    pub status: Status,
}

impl ProgressRecord {
    pub fn iso_week(&self) -> Option<IsoWeek> {
        self.date.map(IsoWeek::of)
    }
}

/// ISO-8601 week, keyed by its week-numbering year so that week 1 of two
/// different years never merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsoWeek {
    pub year: i32,
    pub week: u32,
}

impl IsoWeek {
    pub fn of(date: NaiveDate) -> Self {
        let w = date.iso_week();
        IsoWeek {
            year: w.year(),
            week: w.week(),
        }
    }
}

impl fmt::Display for IsoWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Day(NaiveDate),
    Week(IsoWeek),
    All,
    /// Daily view over a dataset with no readable dates. Matches nothing.
    NoDay,
    /// Weekly view for a team with no readable dates. Matches nothing.
    NoWeek,
}

impl Window {
    pub fn contains(&self, record: &ProgressRecord) -> bool {
        match self {
            Window::Day(d) => record.date == Some(*d),
            Window::Week(w) => record.iso_week() == Some(*w),
            Window::All => true,
            Window::NoDay | Window::NoWeek => false,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Day(d) => write!(f, "{}", d),
            Window::Week(w) => write!(f, "week {}", w),
            Window::All => f.write_str("all data"),
            Window::NoDay => f.write_str("no date"),
            Window::NoWeek => f.write_str("no week"),
        }
    }
}

/// One intern's line of the heatmap. Topic columns are dynamic, so this is
/// rendered through `tabled::builder::Builder` rather than `#[derive(Tabled)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapRow {
    pub intern: String,
    pub statuses: Vec<Status>,
    pub completed: usize,
    pub completion_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    pub topics: Vec<String>,
    pub rows: Vec<HeatmapRow>,
}

impl Heatmap {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Data behind the per-intern completion bar chart.
#[derive(Debug, Tabled, Clone, PartialEq)]
pub struct CompletionBarRow {
    #[tabled(rename = "Intern")]
    pub intern: String,
    #[tabled(rename = "Completion %", display_with = "display_pct")]
    pub completion_pct: f64,
    #[tabled(rename = "")]
    pub bar: String,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct StatusCountRow {
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct TeamRankingRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Team ID")]
    #[tabled(rename = "Team ID")]
    pub team_id: String,
    #[serde(rename = "Team Lead")]
    #[tabled(rename = "Team Lead")]
    pub team_lead: String,
    #[serde(rename = "Interns")]
    #[tabled(rename = "Interns")]
    pub interns: usize,
    #[serde(rename = "Completion %")]
    #[tabled(rename = "Completion %", display_with = "display_pct")]
    pub completion_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmptySelectionWarning {
    pub team_id: String,
    pub window: Window,
}

impl fmt::Display for EmptySelectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.window {
            Window::Day(d) => write!(f, "No data for team {} on {}", self.team_id, d),
            Window::Week(w) => write!(f, "No data for team {} in week {}", self.team_id, w),
            Window::All => write!(f, "No data for team {}", self.team_id),
            Window::NoDay => write!(f, "No dated rows to pick a day from for team {}", self.team_id),
            Window::NoWeek => write!(f, "No data for team {}: no readable dates, so no weeks", self.team_id),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SummaryStats {
    pub team_id: String,
    pub team_lead: String,
    pub window: String,
    pub topics: usize,
    pub interns: usize,
    pub observations: usize,
    pub avg_completion_pct: f64,
    pub fully_completed_interns: usize,
}
