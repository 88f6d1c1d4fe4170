// Entry point and high-level CLI flow.
//
// `report` runs one selection end to end and exits. `menu` keeps a session
// open so the same upload can be re-sliced by team, mode, date and week:
// - [1] loads a CSV, printing diagnostics,
// - [2]-[4] change the selection,
// - [5] prints the report previews and exports the files.
mod error;
mod loader;
mod output;
mod reports;
mod session;
mod types;
mod util;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use loader::{LoadOptions, LoadReport, SchemaKind};
use session::{Mode, Session};

#[derive(Parser)]
#[command(name = "intern_progress")]
#[command(about = "Intern training progress reports from a CSV export", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the report for one selection and export it
    Report {
        #[arg(long)]
        csv: PathBuf,
        /// Team ID; defaults to the first team offered
        #[arg(long)]
        team: Option<String>,
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Day for the daily view (YYYY-MM-DD)
        #[arg(long, conflicts_with = "week")]
        date: Option<String>,
        /// Week for the weekly view (`12` or `2024-W12`)
        #[arg(long, conflicts_with = "date")]
        week: Option<String>,
        /// Topic columns of a wide (one row per intern) upload
        #[arg(long, value_delimiter = ',')]
        topics: Option<Vec<String>>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Print previews only
        #[arg(long)]
        no_export: bool,
    },
    /// Interactive menu over a single upload
    Menu {
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long, value_delimiter = ',')]
        topics: Option<Vec<String>>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn print_load_report(report: &LoadReport, schema: SchemaKind) {
    let kind = match schema {
        SchemaKind::Narrow => "daily",
        SchemaKind::Wide => "wide",
    };
    println!(
        "Processing dataset... ({} rows read, {} status observations, {} layout)",
        util::format_int(report.total_rows),
        util::format_int(report.records),
        kind
    );
    if report.parse_errors > 0 {
        println!(
            "Note: {} rows skipped due to missing team, intern or topic.",
            util::format_int(report.parse_errors)
        );
    }
    if report.undated_rows > 0 && schema == SchemaKind::Narrow {
        println!(
            "Note: {} rows have no readable date and only appear in the All view.",
            util::format_int(report.undated_rows)
        );
    }
    println!();
}

fn load_into(session: &mut Session, path: &Path, options: &LoadOptions) -> anyhow::Result<()> {
    let (data, report) = loader::load_and_clean(path, options)
        .with_context(|| format!("failed to load {}", path.display()))?;
    print_load_report(&report, data.schema);
    session.load(data);
    Ok(())
}

/// Print every view for the current selection and optionally export it.
fn generate(session: &Session, out_dir: Option<&Path>) -> anyhow::Result<()> {
    let report = session.report()?;
    println!("Team Lead: {}", report.team_lead);
    println!("Team {} ({})\n", report.team_id, report.window);

    if let Some(w) = &report.warning {
        println!("Warning: {}\n", w);
    } else {
        println!("Progress Heatmap for {}\n", report.window);
        output::preview_heatmap(&report.heatmap);

        println!("Intern Completion Percentage\n");
        output::preview_table_rows(&report.bars, report.bars.len());

        println!("Overall Course Completion Status\n");
        output::preview_table_rows(&report.distribution, report.distribution.len());

        println!("Team Completion Ranking (All Teams)\n");
        output::preview_table_rows(&report.ranking, report.ranking.len());
    }

    // Empty selections still overwrite the files so nothing stale is left.
    if let Some(dir) = out_dir {
        let written = output::export_report(dir, &report)?;
        for path in written {
            println!("(exported {})", path.display());
        }
        println!();
    }
    Ok(())
}

fn run_report(
    csv: &Path,
    team: Option<String>,
    mode: Option<Mode>,
    date: Option<String>,
    week: Option<String>,
    options: &LoadOptions,
    out_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let date = date.as_deref().map(util::parse_date).transpose()?;
    let week = week.as_deref().map(util::parse_week).transpose()?;

    let mut session = Session::new();
    load_into(&mut session, csv, options)?;
    session.apply(team.as_deref(), mode, date, week)?;
    generate(&session, out_dir)
}

/// Read one trimmed line. `None` once the input is closed or unreadable.
fn read_answer<R: BufRead>(input: &mut R) -> Option<String> {
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn prompt(label: &str) -> Option<String> {
    print!("{}", label);
    let _ = io::stdout().flush();
    read_answer(&mut io::stdin().lock())
}

/// Like `prompt`, for follow-up questions inside a menu action.
fn ask(label: &str) -> anyhow::Result<String> {
    prompt(label).context("input closed")
}

fn print_selection(session: &Session) {
    if let Some(sel) = session.selection() {
        let focus = match sel.mode {
            Mode::Daily => sel.date.map(|d| d.to_string()),
            Mode::Weekly => sel.week.map(|w| w.to_string()),
            Mode::All => Some("all data".to_string()),
        };
        println!(
            "Current selection: team {} | {} view | {}\n",
            sel.team,
            sel.mode,
            focus.unwrap_or_else(|| "-".to_string())
        );
    }
}

fn choose_team(session: &mut Session) -> anyhow::Result<()> {
    let teams = session.team_options();
    for (i, t) in teams.iter().enumerate() {
        println!("[{}] {}", i + 1, t);
    }
    let choice = ask("Select team: ")?;
    let team = match choice.parse::<usize>() {
        Ok(n) if (1..=teams.len()).contains(&n) => teams[n - 1].clone(),
        _ => choice,
    };
    session.select_team(&team)?;
    Ok(())
}

fn choose_mode(session: &mut Session) -> anyhow::Result<()> {
    let mode = match ask("View mode (D)aily, (W)eekly or (A)ll: ")?
        .to_uppercase()
        .as_str()
    {
        "D" | "DAILY" => Mode::Daily,
        "W" | "WEEKLY" => Mode::Weekly,
        "A" | "ALL" => Mode::All,
        other => anyhow::bail!("unknown view mode '{}'", other),
    };
    session.select_mode(mode)?;
    Ok(())
}

fn choose_window(session: &mut Session) -> anyhow::Result<()> {
    let mode = session
        .selection()
        .map(|s| s.mode)
        .ok_or(error::ProgressError::NoData)?;
    match mode {
        Mode::Daily => {
            let dates = session.available_dates();
            if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
                println!("Dates with data: {} to {}", first, last);
            }
            let date = util::parse_date(&ask("Select date (YYYY-MM-DD): ")?)?;
            session.select_date(date)?;
        }
        Mode::Weekly => {
            let weeks: Vec<String> = session.available_weeks().iter().map(|w| w.to_string()).collect();
            println!("Weeks with data: {}", weeks.join(", "));
            let week = util::parse_week(&ask("Select week: ")?)?;
            session.select_week(week)?;
        }
        Mode::All => println!("The All view has no date or week to choose.\n"),
    }
    Ok(())
}

fn run_menu(csv: Option<PathBuf>, options: &LoadOptions, out_dir: &Path) {
    let mut session = Session::new();
    if let Some(path) = csv {
        if let Err(e) = load_into(&mut session, &path, options) {
            eprintln!("{:#}\n", e);
        }
    }

    loop {
        print_selection(&session);
        println!("[1] Load the file");
        println!("[2] Select team");
        println!("[3] Select view mode");
        println!("[4] Select date / week");
        println!("[5] Generate Reports");
        println!("[6] Exit\n");
        let Some(choice) = prompt("Enter choice: ") else {
            println!("\nInput closed. Exiting the program.");
            break;
        };
        let result = match choice.as_str() {
            "1" => ask("CSV file: ").and_then(|path| load_into(&mut session, Path::new(&path), options)),
            "2" => choose_team(&mut session),
            "3" => choose_mode(&mut session),
            "4" => choose_window(&mut session),
            "5" => {
                println!();
                generate(&session, Some(out_dir))
            }
            "6" => {
                println!("Exiting the program.");
                break;
            }
            _ => {
                println!("Invalid choice. Please enter 1-6.\n");
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "menu action failed");
            eprintln!("Error: {:#}\n", e);
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            csv,
            team,
            mode,
            date,
            week,
            topics,
            out_dir,
            no_export,
        } => {
            let options = LoadOptions { topics };
            let out = if no_export { None } else { Some(out_dir.as_path()) };
            run_report(&csv, team, mode, date, week, &options, out)?;
        }
        Commands::Menu {
            csv,
            topics,
            out_dir,
        } => {
            run_menu(csv, &LoadOptions { topics }, &out_dir);
        }
    }

    Ok(())
}
