use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::loader::Dataset;
use crate::types::{
    CompletionBarRow, EmptySelectionWarning, Heatmap, HeatmapRow, ProgressRecord, Status,
    StatusCountRow, SummaryStats, TeamRankingRow, Window,
};
use crate::util::{average, bar, percent, round2};

/// Everything the presentation layer needs for one (team, window) selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewReport {
    pub team_id: String,
    pub team_lead: String,
    pub window: Window,
    pub heatmap: Heatmap,
    pub bars: Vec<CompletionBarRow>,
    pub distribution: Vec<StatusCountRow>,
    pub ranking: Vec<TeamRankingRow>,
    pub summary: SummaryStats,
    pub warning: Option<EmptySelectionWarning>,
}

/// Keep whichever status ranks higher; on a tie the current one stays.
fn best(current: Status, candidate: Status) -> Status {
    if candidate.rank() > current.rank() {
        candidate
    } else {
        current
    }
}

/// Resolve several observations of the same cell to the highest-ranked
/// recognized status, or `Unknown` if none is recognized.
pub fn resolve_status<I>(observations: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    observations.into_iter().fold(Status::Unknown, best)
}

/// Records of one team that fall inside `window`, in file order.
pub fn select_window<'a>(data: &'a Dataset, team_id: &str, window: Window) -> Vec<&'a ProgressRecord> {
    data.records
        .iter()
        .filter(|r| r.team_id == team_id && window.contains(r))
        .collect()
}

/// One row per distinct intern with the resolved status of every topic.
///
/// A topic an intern has no observation for shows as `Unknown` and still
/// counts in the completion denominator. Rows are ordered by completion,
/// highest first.
pub fn build_heatmap(records: &[&ProgressRecord], topics: &[String]) -> Heatmap {
    let topic_pos: HashMap<&str, usize> = topics
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), i))
        .collect();

    let mut interns: Vec<&str> = Vec::new();
    let mut cells: HashMap<(usize, usize), Vec<Status>> = HashMap::new();
    for r in records {
        let intern = match interns.iter().position(|i| *i == r.intern_name) {
            Some(i) => i,
            None => {
                interns.push(&r.intern_name);
                interns.len() - 1
            }
        };
        let Some(&topic) = topic_pos.get(r.topic.as_str()) else {
            continue;
        };
        cells.entry((intern, topic)).or_default().push(r.status);
    }

    let mut rows: Vec<HeatmapRow> = interns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let statuses: Vec<Status> = (0..topics.len())
                .map(|t| resolve_status(cells.get(&(i, t)).into_iter().flatten().copied()))
                .collect();
            let completed = statuses.iter().filter(|s| **s == Status::Completed).count();
            HeatmapRow {
                intern: name.to_string(),
                completion_pct: percent(completed, topics.len()),
                statuses,
                completed,
            }
        })
        .collect();

    // `sort_by` is stable, so ties keep encounter order.
    rows.sort_by(|a, b| {
        b.completion_pct
            .partial_cmp(&a.completion_pct)
            .unwrap_or(Ordering::Equal)
    });

    Heatmap {
        topics: topics.to_vec(),
        rows,
    }
}

/// Per-intern completion with a text bar, in heatmap order.
pub fn build_completion_bars(heatmap: &Heatmap) -> Vec<CompletionBarRow> {
    heatmap
        .rows
        .iter()
        .map(|r| CompletionBarRow {
            intern: r.intern.clone(),
            completion_pct: r.completion_pct,
            bar: bar(r.completion_pct),
        })
        .collect()
}

/// Count every observation in the window once, in discovery order.
pub fn build_distribution(records: &[&ProgressRecord]) -> Vec<StatusCountRow> {
    let mut rows: Vec<StatusCountRow> = Vec::new();
    for r in records {
        let label = r.status.label();
        match rows.iter_mut().find(|row| row.status == label) {
            Some(row) => row.count += 1,
            None => rows.push(StatusCountRow {
                status: label.to_string(),
                count: 1,
            }),
        }
    }
    rows
}

/// Rank every team in the dataset by the share of its (intern, topic) cells
/// that resolve to Completed within `window`. Teams with no cells score 0.
pub fn build_team_ranking(data: &Dataset, window: Window) -> Vec<TeamRankingRow> {
    let mut rows: Vec<TeamRankingRow> = data
        .teams
        .iter()
        .map(|team| {
            let records = select_window(data, &team.id, window);
            let heatmap = build_heatmap(&records, &data.topics);
            let completed: usize = heatmap.rows.iter().map(|r| r.completed).sum();
            let cells = heatmap.rows.len() * data.topics.len();
            TeamRankingRow {
                rank: 0,
                team_id: team.id.clone(),
                team_lead: team.lead.clone(),
                interns: heatmap.rows.len(),
                completion_pct: percent(completed, cells),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.completion_pct
            .partial_cmp(&a.completion_pct)
            .unwrap_or(Ordering::Equal)
    });
    for (idx, row) in rows.iter_mut().enumerate() {
        row.rank = idx + 1;
    }
    rows
}

/// Headline numbers for `summary.json`.
pub fn build_summary(
    team_id: &str,
    team_lead: &str,
    window: Window,
    heatmap: &Heatmap,
    observations: usize,
) -> SummaryStats {
    let pcts: Vec<f64> = heatmap.rows.iter().map(|r| r.completion_pct).collect();
    let topics = heatmap.topics.len();
    SummaryStats {
        team_id: team_id.to_string(),
        team_lead: team_lead.to_string(),
        window: window.to_string(),
        topics,
        interns: heatmap.rows.len(),
        observations,
        avg_completion_pct: round2(average(&pcts)),
        fully_completed_interns: heatmap
            .rows
            .iter()
            .filter(|r| topics > 0 && r.completed == topics)
            .count(),
    }
}

/// Run the whole aggregation pipeline for one team and window.
///
/// An empty window is not an error: the report carries an
/// `EmptySelectionWarning` and every derived table is empty.
pub fn build_view(data: &Dataset, team_id: &str, window: Window) -> ViewReport {
    let team_lead = data
        .team(team_id)
        .map(|t| t.lead.clone())
        .unwrap_or_default();
    let records = select_window(data, team_id, window);
    debug!(team = team_id, %window, observations = records.len(), "building view");

    if records.is_empty() {
        let warning = EmptySelectionWarning {
            team_id: team_id.to_string(),
            window,
        };
        warn!("{}", warning);
        let heatmap = Heatmap {
            topics: data.topics.clone(),
            rows: Vec::new(),
        };
        let summary = build_summary(team_id, &team_lead, window, &heatmap, 0);
        return ViewReport {
            team_id: team_id.to_string(),
            team_lead,
            window,
            heatmap,
            bars: Vec::new(),
            distribution: Vec::new(),
            ranking: Vec::new(),
            summary,
            warning: Some(warning),
        };
    }

    let heatmap = build_heatmap(&records, &data.topics);
    let bars = build_completion_bars(&heatmap);
    let distribution = build_distribution(&records);
    let ranking = build_team_ranking(data, window);
    let summary = build_summary(team_id, &team_lead, window, &heatmap, records.len());

    ViewReport {
        team_id: team_id.to_string(),
        team_lead,
        window,
        heatmap,
        bars,
        distribution,
        ranking,
        summary,
        warning: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_from_reader, LoadOptions};
    use crate::types::IsoWeek;
    use chrono::NaiveDate;

    fn dataset(csv: &str) -> Dataset {
        load_from_reader(csv.as_bytes(), &LoadOptions::default())
            .unwrap()
            .0
    }

    fn day(d: u32) -> Window {
        Window::Day(NaiveDate::from_ymd_opt(2024, 3, d).unwrap())
    }

    const TWO_TEAMS: &str = "\
Date,Team ID,Team Lead,Intern Name,Topic,Status
2024-03-04,T1,Asha,Sam,Python,Completed
2024-03-04,T1,Asha,Sam,SQL,Not Started
2024-03-04,T2,Ravi,Lee,Python,Completed
2024-03-04,T2,Ravi,Lee,SQL,Completed
";

    #[test]
    fn resolves_to_highest_recognized_status() {
        use Status::*;
        assert_eq!(resolve_status([NotStarted, Completed, PartiallyCompleted]), Completed);
        assert_eq!(resolve_status([Unknown, NotStarted]), NotStarted);
        assert_eq!(resolve_status([PartiallyCompleted, Unknown]), PartiallyCompleted);
        assert_eq!(resolve_status([Unknown, Unknown]), Unknown);
        assert_eq!(resolve_status(Vec::new()), Unknown);
    }

    #[test]
    fn half_completed_intern_scores_fifty() {
        let data = dataset(TWO_TEAMS);
        let view = build_view(&data, "T1", day(4));
        assert_eq!(view.team_lead, "Asha");
        assert!(view.warning.is_none());
        assert_eq!(view.heatmap.rows.len(), 1);
        let sam = &view.heatmap.rows[0];
        assert_eq!(sam.intern, "Sam");
        assert_eq!(sam.completion_pct, 50.0);
        assert_eq!(sam.statuses, vec![Status::Completed, Status::NotStarted]);
        assert_eq!(
            view.distribution,
            vec![
                StatusCountRow { status: "Completed".into(), count: 1 },
                StatusCountRow { status: "Not Started".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn empty_window_warns_without_rows() {
        let data = dataset(TWO_TEAMS);
        let view = build_view(&data, "T1", day(5));
        assert_eq!(view.heatmap.rows.len(), 0);
        assert!(view.distribution.is_empty());
        assert!(view.ranking.is_empty());
        let warning = view.warning.expect("warning");
        assert_eq!(warning.to_string(), "No data for team T1 on 2024-03-05");
    }

    #[test]
    fn missing_cells_are_unknown_and_still_in_the_denominator() {
        let csv = "\
Date,Team ID,Team Lead,Intern Name,Topic,Status
2024-03-04,T1,Asha,Sam,Python,Completed
2024-03-04,T1,Asha,Sam,SQL,Completed
2024-03-04,T1,Asha,Kim,Python,Completed
2024-03-04,T1,Asha,Kim,Git,Completed
";
        let data = dataset(csv);
        let records = select_window(&data, "T1", day(4));
        let heatmap = build_heatmap(&records, &data.topics);
        assert_eq!(heatmap.topics, vec!["Python", "SQL", "Git"]);
        for row in &heatmap.rows {
            assert_eq!(row.statuses.len(), 3);
            assert_eq!(row.completion_pct, 66.67);
        }
        assert_eq!(heatmap.rows[0].statuses[2], Status::Unknown);
        assert_eq!(heatmap.rows[1].statuses[1], Status::Unknown);
    }

    #[test]
    fn rows_sort_by_completion_and_keep_ties_in_order() {
        let csv = "\
Date,Team ID,Team Lead,Intern Name,Topic,Status
2024-03-04,T1,Asha,Ana,Python,Not Started
2024-03-04,T1,Asha,Ben,Python,Completed
2024-03-04,T1,Asha,Cal,Python,Partially Completed
2024-03-04,T1,Asha,Dee,Python,Completed
";
        let data = dataset(csv);
        let view = build_view(&data, "T1", day(4));
        let order: Vec<&str> = view.heatmap.rows.iter().map(|r| r.intern.as_str()).collect();
        assert_eq!(order, vec!["Ben", "Dee", "Ana", "Cal"]);
        assert_eq!(view.bars[0].bar.chars().count(), 20);
    }

    #[test]
    fn weekly_view_keeps_best_status_but_counts_every_observation() {
        let csv = "\
Date,Team ID,Team Lead,Intern Name,Topic,Status
2024-03-04,T1,Asha,Sam,Python,Not Started
2024-03-05,T1,Asha,Sam,Python,Completed
2024-03-06,T1,Asha,Sam,Python,Partially Completed
2024-03-06,T1,Asha,Sam,SQL,Oops
2024-03-11,T1,Asha,Sam,SQL,Completed
";
        let data = dataset(csv);
        let week = Window::Week(IsoWeek { year: 2024, week: 10 });
        let view = build_view(&data, "T1", week);
        let sam = &view.heatmap.rows[0];
        assert_eq!(sam.statuses, vec![Status::Completed, Status::Unknown]);
        assert_eq!(sam.completion_pct, 50.0);
        let total: usize = view.distribution.iter().map(|r| r.count).sum();
        assert_eq!(total, 4);
        assert_eq!(view.distribution.len(), 4);
        assert_eq!(view.summary.observations, 4);
    }

    #[test]
    fn ranking_uses_completed_cells_over_all_cells() {
        let csv = "\
Date,Team ID,Team Lead,Intern Name,Topic,Status
2024-03-04,T1,Asha,Sam,Python,Completed
2024-03-05,T1,Asha,Sam,Python,Completed
2024-03-04,T1,Asha,Sam,SQL,Not Started
2024-03-04,T2,Ravi,Lee,Python,Completed
2024-03-04,T2,Ravi,Lee,SQL,Completed
2024-03-04,T2,Ravi,Mo,Python,Partially Completed
2024-03-11,T3,Ivy,Jo,Python,Completed
";
        let data = dataset(csv);
        let week = Window::Week(IsoWeek { year: 2024, week: 10 });
        let ranking = build_team_ranking(&data, week);
        let summary: Vec<(&str, usize, f64)> = ranking
            .iter()
            .map(|r| (r.team_id.as_str(), r.rank, r.completion_pct))
            .collect();
        assert_eq!(
            summary,
            vec![("T1", 1, 50.0), ("T2", 2, 50.0), ("T3", 3, 0.0)]
        );
        assert_eq!(ranking[1].interns, 2);
        assert_eq!(ranking[2].interns, 0);
    }

    #[test]
    fn pipeline_is_deterministic() {
        let data = dataset(TWO_TEAMS);
        let first = build_view(&data, "T2", day(4));
        let second = build_view(&data, "T2", day(4));
        assert_eq!(first, second);
        assert_eq!(first.summary.fully_completed_interns, 1);
        assert_eq!(first.summary.avg_completion_pct, 100.0);
    }

    #[test]
    fn completion_stays_within_bounds() {
        let data = dataset(TWO_TEAMS);
        for team in ["T1", "T2"] {
            let view = build_view(&data, team, day(4));
            for row in &view.heatmap.rows {
                assert!((0.0..=100.0).contains(&row.completion_pct));
                assert_eq!(row.completion_pct, round2(row.completion_pct));
            }
        }
    }
}
