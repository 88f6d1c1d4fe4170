// Selection state for one loaded dataset.
//
// The session owns the dataset and the current (team, mode, date, week)
// choice. Every selection event is idempotent, and loading a new dataset
// throws the previous selection away.
use std::fmt;

use chrono::NaiveDate;
use clap::ValueEnum;
use tracing::info;

use crate::error::{ProgressError, Result};
use crate::loader::{Dataset, SchemaKind};
use crate::reports::{self, ViewReport};
use crate::types::{IsoWeek, Window};
use crate::util::WeekSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Daily,
    Weekly,
    /// Every row regardless of date; the only mode for wide uploads.
    All,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Daily => "Daily",
            Mode::Weekly => "Weekly",
            Mode::All => "All",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub team: String,
    pub mode: Mode,
    pub date: Option<NaiveDate>,
    pub week: Option<IsoWeek>,
}

#[derive(Debug, Default)]
pub struct Session {
    dataset: Option<Dataset>,
    selection: Option<Selection>,
}

/// Team ids in the order they are offered for selection. Narrow uploads keep
/// encounter order; wide uploads list the best-performing team first.
pub fn team_options(data: &Dataset) -> Vec<String> {
    match data.schema {
        SchemaKind::Narrow => data.teams.iter().map(|t| t.id.clone()).collect(),
        SchemaKind::Wide => reports::build_team_ranking(data, Window::All)
            .into_iter()
            .map(|r| r.team_id)
            .collect(),
    }
}

/// Distinct dates across the whole dataset, ascending.
pub fn available_dates(data: &Dataset) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = data.records.iter().filter_map(|r| r.date).collect();
    dates.sort();
    dates.dedup();
    dates
}

/// Distinct ISO weeks with at least one row for `team`, ascending.
pub fn available_weeks(data: &Dataset, team: &str) -> Vec<IsoWeek> {
    let mut weeks: Vec<IsoWeek> = data.team_records(team).filter_map(|r| r.iso_week()).collect();
    weeks.sort();
    weeks.dedup();
    weeks
}

pub fn default_selection(data: &Dataset) -> Option<Selection> {
    let team = team_options(data).into_iter().next()?;
    let mode = match data.schema {
        SchemaKind::Narrow => Mode::Weekly,
        SchemaKind::Wide => Mode::All,
    };
    Some(Selection {
        date: available_dates(data).first().copied(),
        week: available_weeks(data, &team).first().copied(),
        team,
        mode,
    })
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the dataset and reset every selection to its default.
    pub fn load(&mut self, dataset: Dataset) {
        self.selection = default_selection(&dataset);
        if let Some(sel) = &self.selection {
            info!(team = %sel.team, mode = %sel.mode, "dataset loaded, selection reset");
        }
        self.dataset = Some(dataset);
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    fn state(&self) -> Result<(&Dataset, &Selection)> {
        match (&self.dataset, &self.selection) {
            (Some(d), Some(s)) => Ok((d, s)),
            (Some(_), None) => Err(ProgressError::InvalidSelection(
                "the loaded file has no teams".to_string(),
            )),
            _ => Err(ProgressError::NoData),
        }
    }

    fn selection_mut(&mut self) -> Result<(&Dataset, &mut Selection)> {
        match (&self.dataset, &mut self.selection) {
            (Some(d), Some(s)) => Ok((d, s)),
            (Some(_), None) => Err(ProgressError::InvalidSelection(
                "the loaded file has no teams".to_string(),
            )),
            _ => Err(ProgressError::NoData),
        }
    }

    pub fn team_options(&self) -> Vec<String> {
        self.dataset.as_ref().map(team_options).unwrap_or_default()
    }

    pub fn available_weeks(&self) -> Vec<IsoWeek> {
        match self.state() {
            Ok((data, sel)) => available_weeks(data, &sel.team),
            Err(_) => Vec::new(),
        }
    }

    pub fn available_dates(&self) -> Vec<NaiveDate> {
        self.dataset.as_ref().map(available_dates).unwrap_or_default()
    }

    pub fn select_team(&mut self, team: &str) -> Result<()> {
        let (data, sel) = self.selection_mut()?;
        if data.team(team).is_none() {
            return Err(ProgressError::InvalidSelection(format!("unknown team '{}'", team)));
        }
        let weeks = available_weeks(data, team);
        if !sel.week.is_some_and(|w| weeks.contains(&w)) {
            sel.week = weeks.first().copied();
        }
        sel.team = team.to_string();
        Ok(())
    }

    pub fn select_mode(&mut self, mode: Mode) -> Result<()> {
        let (data, sel) = self.selection_mut()?;
        if data.schema == SchemaKind::Wide && mode != Mode::All {
            return Err(ProgressError::InvalidSelection(format!(
                "{} view needs a Date column",
                mode
            )));
        }
        sel.mode = mode;
        Ok(())
    }

    /// Any calendar date is accepted; a date without rows simply produces an
    /// empty view.
    pub fn select_date(&mut self, date: NaiveDate) -> Result<()> {
        let (_, sel) = self.selection_mut()?;
        sel.date = Some(date);
        Ok(())
    }

    /// Pick one of the selected team's weeks. A bare week number resolves to
    /// the earliest matching week.
    pub fn select_week(&mut self, spec: WeekSpec) -> Result<()> {
        let (data, sel) = self.selection_mut()?;
        let week = available_weeks(data, &sel.team)
            .into_iter()
            .find(|w| spec.matches(w))
            .ok_or_else(|| {
                ProgressError::InvalidSelection(format!("team {} has no such week", sel.team))
            })?;
        sel.week = Some(week);
        Ok(())
    }

    /// The window the current selection covers. A Daily or Weekly view with
    /// nothing to pick from maps to a window that matches no rows, so the
    /// report carries a warning instead of failing.
    pub fn window(&self) -> Result<Window> {
        let (_, sel) = self.state()?;
        Ok(match sel.mode {
            Mode::All => Window::All,
            Mode::Daily => sel.date.map_or(Window::NoDay, Window::Day),
            Mode::Weekly => sel.week.map_or(Window::NoWeek, Window::Week),
        })
    }

    /// Apply command-line style selections on top of the defaults.
    ///
    /// A date without an explicit mode switches to Daily and a week without
    /// one switches to Weekly. A date and a week together, or either one
    /// paired with a mode that ignores it, is rejected.
    pub fn apply(
        &mut self,
        team: Option<&str>,
        mode: Option<Mode>,
        date: Option<NaiveDate>,
        week: Option<WeekSpec>,
    ) -> Result<()> {
        let implied = match (date.is_some(), week.is_some()) {
            (true, true) => {
                return Err(ProgressError::InvalidSelection(
                    "pick either a date or a week, not both".to_string(),
                ))
            }
            (true, false) => Some(Mode::Daily),
            (false, true) => Some(Mode::Weekly),
            (false, false) => None,
        };
        if let (Some(m), Some(needed)) = (mode, implied) {
            if m != needed {
                return Err(ProgressError::InvalidSelection(format!(
                    "{} view does not take a {}",
                    m,
                    if needed == Mode::Daily { "date" } else { "week" }
                )));
            }
        }

        if let Some(team) = team {
            self.select_team(team)?;
        }
        if let Some(mode) = mode.or(implied) {
            self.select_mode(mode)?;
        }
        if let Some(date) = date {
            self.select_date(date)?;
        }
        if let Some(week) = week {
            self.select_week(week)?;
        }
        Ok(())
    }

    /// Recompute every derived table for the current selection.
    pub fn report(&self) -> Result<ViewReport> {
        let (data, sel) = self.state()?;
        let window = self.window()?;
        Ok(reports::build_view(data, &sel.team, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_from_reader, LoadOptions};
    use crate::types::Status;

    const NARROW: &str = "\
Date,Team ID,Team Lead,Intern Name,Topic,Status
2024-03-12,T1,Asha,Sam,Python,Completed
2024-03-04,T1,Asha,Sam,SQL,Not Started
2024-03-20,T2,Ravi,Lee,Python,Completed
2024-03-21,T2,Ravi,Lee,SQL,Completed
";

    const WIDE: &str = "\
Team ID,Team Lead,Intern Name,Python,APIs,Machine Learning,SQL,Data Visualization
T1,Asha,Sam,Completed,Not Started,Not Started,Not Started,Not Started
T2,Ravi,Lee,Completed,Completed,Completed,Not Started,Not Started
";

    fn session(csv: &str) -> Session {
        let (data, _) = load_from_reader(csv.as_bytes(), &LoadOptions::default()).unwrap();
        let mut s = Session::new();
        s.load(data);
        s
    }

    fn week(n: u32) -> IsoWeek {
        IsoWeek { year: 2024, week: n }
    }

    #[test]
    fn report_without_data_is_an_error() {
        let s = Session::new();
        assert!(matches!(s.report(), Err(ProgressError::NoData)));
    }

    #[test]
    fn load_picks_defaults() {
        let s = session(NARROW);
        let sel = s.selection().unwrap();
        assert_eq!(sel.team, "T1");
        assert_eq!(sel.mode, Mode::Weekly);
        assert_eq!(sel.date, NaiveDate::from_ymd_opt(2024, 3, 4));
        assert_eq!(sel.week, Some(week(10)));
        assert_eq!(s.available_weeks(), vec![week(10), week(11)]);
    }

    #[test]
    fn new_upload_resets_selection() {
        let mut s = session(NARROW);
        s.select_team("T2").unwrap();
        s.select_mode(Mode::Daily).unwrap();
        let (data, _) = load_from_reader(NARROW.as_bytes(), &LoadOptions::default()).unwrap();
        s.load(data);
        let sel = s.selection().unwrap();
        assert_eq!(sel.team, "T1");
        assert_eq!(sel.mode, Mode::Weekly);
    }

    #[test]
    fn switching_team_resets_unavailable_week() {
        let mut s = session(NARROW);
        s.select_team("T2").unwrap();
        assert_eq!(s.selection().unwrap().week, Some(week(12)));
        assert!(s.select_team("T9").is_err());
        assert_eq!(s.selection().unwrap().team, "T2");
    }

    #[test]
    fn selections_are_idempotent() {
        let mut s = session(NARROW);
        s.select_week(WeekSpec::Number(11)).unwrap();
        let first = s.report().unwrap();
        s.select_week(WeekSpec::Exact(week(11))).unwrap();
        let second = s.report().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.window, Window::Week(week(11)));
        assert_eq!(first.heatmap.rows[0].completion_pct, 50.0);
    }

    #[test]
    fn daily_view_on_a_date_without_rows_warns() {
        let mut s = session(NARROW);
        s.select_mode(Mode::Daily).unwrap();
        s.select_date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()).unwrap();
        let report = s.report().unwrap();
        assert!(report.warning.is_some());
        assert!(report.heatmap.is_empty());
    }

    #[test]
    fn unknown_week_is_rejected() {
        let mut s = session(NARROW);
        assert!(s.select_week(WeekSpec::Number(30)).is_err());
        assert_eq!(s.selection().unwrap().week, Some(week(10)));
    }

    #[test]
    fn team_without_readable_dates_warns_in_every_dated_mode() {
        let csv = "\
Date,Team ID,Team Lead,Intern Name,Topic,Status
bad,T1,Asha,Sam,Python,Completed
2024-03-04,T2,Ravi,Lee,Python,Completed
";
        let mut s = session(csv);
        let sel = s.selection().unwrap();
        assert_eq!((sel.team.as_str(), sel.mode, sel.week), ("T1", Mode::Weekly, None));

        let weekly = s.report().unwrap();
        assert_eq!(weekly.window, Window::NoWeek);
        assert!(weekly.heatmap.is_empty());
        assert_eq!(weekly.warning.unwrap().team_id, "T1");

        s.select_mode(Mode::Daily).unwrap();
        assert!(s.report().unwrap().warning.is_some());
    }

    #[test]
    fn daily_view_without_any_dates_warns() {
        let csv = "\
Date,Team ID,Team Lead,Intern Name,Topic,Status
,T1,Asha,Sam,Python,Completed
";
        let mut s = session(csv);
        s.select_mode(Mode::Daily).unwrap();
        let report = s.report().unwrap();
        assert_eq!(report.window, Window::NoDay);
        assert!(report.warning.is_some());
    }

    #[test]
    fn all_view_includes_undated_rows() {
        let csv = "\
Date,Team ID,Team Lead,Intern Name,Topic,Status
2024-03-04,T1,Asha,Sam,Python,Completed
someday,T1,Asha,Kim,Python,Partially Completed
2024-03-11,T1,Asha,Sam,SQL,Not Started
";
        let mut s = session(csv);
        s.select_mode(Mode::All).unwrap();
        let report = s.report().unwrap();
        assert!(report.warning.is_none());
        let interns: Vec<&str> = report.heatmap.rows.iter().map(|r| r.intern.as_str()).collect();
        assert_eq!(interns, vec!["Sam", "Kim"]);
        assert_eq!(report.heatmap.rows[1].statuses[0], Status::PartiallyCompleted);
        let total: usize = report.distribution.iter().map(|r| r.count).sum();
        assert_eq!(total, 3);
        assert!(report
            .distribution
            .iter()
            .any(|r| r.status == "Partially Completed" && r.count == 1));

        s.select_mode(Mode::Weekly).unwrap();
        let weekly = s.report().unwrap();
        assert!(weekly.heatmap.rows.iter().all(|r| r.intern != "Kim"));
    }

    #[test]
    fn date_flag_implies_daily_and_week_flag_implies_weekly() {
        let mut s = session(NARROW);
        let day = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        s.apply(Some("T2"), None, Some(day), None).unwrap();
        let sel = s.selection().unwrap();
        assert_eq!((sel.mode, sel.date), (Mode::Daily, Some(day)));
        assert_eq!(s.window().unwrap(), Window::Day(day));

        s.apply(None, None, None, Some(WeekSpec::Number(12))).unwrap();
        assert_eq!(s.window().unwrap(), Window::Week(week(12)));

        s.apply(None, Some(Mode::All), None, None).unwrap();
        assert_eq!(s.window().unwrap(), Window::All);
    }

    #[test]
    fn conflicting_flags_are_rejected() {
        let mut s = session(NARROW);
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let before = s.selection().unwrap().clone();

        assert!(s.apply(None, None, Some(day), Some(WeekSpec::Number(10))).is_err());
        assert!(s.apply(None, Some(Mode::Daily), None, Some(WeekSpec::Number(10))).is_err());
        assert!(s.apply(None, Some(Mode::Weekly), Some(day), None).is_err());
        assert!(s.apply(None, Some(Mode::All), Some(day), None).is_err());
        assert_eq!(s.selection().unwrap(), &before);
    }

    #[test]
    fn wide_upload_orders_teams_by_completion() {
        let mut s = session(WIDE);
        assert_eq!(s.team_options(), vec!["T2", "T1"]);
        let sel = s.selection().unwrap();
        assert_eq!(sel.team, "T2");
        assert_eq!(sel.mode, Mode::All);
        assert!(s.select_mode(Mode::Weekly).is_err());

        let report = s.report().unwrap();
        assert_eq!(report.heatmap.rows[0].completion_pct, 60.0);
        assert_eq!(report.ranking[0].team_id, "T2");
        assert_eq!(report.ranking[1].completion_pct, 20.0);
    }
}
