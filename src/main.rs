use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};

use loadcycle::config::EngineConfig;
use loadcycle::error::LoadCycleError;
use loadcycle::export::{self, json::export_json, timeline_rows, TimelineRow};
use loadcycle::fatigue::{power_series, score_series};
use loadcycle::import::ImportManager;
use loadcycle::logging::init_logging;
use loadcycle::modifiers::{apply_to_template, modifiers_from_json, ModifierSuggestion, SuggestionStatus};
use loadcycle::simulation::{simulate_async, MonteCarloSimulator, SimulationResult};
use loadcycle::template::{ProgramTemplate, WeekDefinition};

/// loadcycle - fatigue modelling and adaptive training rules
///
/// Tracks fatigue and readiness from logged sessions, detects where an athlete sits
/// in their load cycle, and derives fatigue modifiers for a training program by
/// Monte Carlo simulation.
#[derive(Parser)]
#[command(name = "loadcycle")]
#[command(version)]
#[command(about = "Fatigue modelling and adaptive training rules", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Program template (JSON)
    #[arg(short, long)]
    template: PathBuf,

    /// Override the program length in weeks
    #[arg(short, long)]
    weeks: Option<u32>,

    /// Number of simulated trials
    #[arg(short = 'n', long)]
    iterations: Option<usize>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a program and show the weekly fatigue/readiness percentiles
    Simulate {
        #[command(flatten)]
        run: RunArgs,

        /// Write the weekly table (csv or json by extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate fatigue modifiers for a program
    Suggest {
        #[command(flatten)]
        run: RunArgs,

        /// Write the modifiers as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a copy of the template carrying the modifiers
        #[arg(long)]
        apply: Option<PathBuf>,

        /// Write the weekly analysis (csv or json by extension)
        #[arg(long)]
        analysis: Option<PathBuf>,
    },

    /// Fatigue, readiness and cycle phase for logged sessions
    Timeline {
        /// Sessions (CSV or JSON)
        #[arg(short, long)]
        sessions: PathBuf,

        /// Questionnaire responses (JSON)
        #[arg(short, long)]
        questionnaires: Option<PathBuf>,

        /// First day to report (YYYY-MM-DD); defaults to the first session
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day to report (YYYY-MM-DD); defaults to the last session
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Hide scores after this date
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Modifiers (JSON) to resolve for each day
        #[arg(short, long)]
        modifiers: Option<PathBuf>,

        /// Program length in days, for phase-detection progress
        #[arg(long)]
        program_days: Option<usize>,

        /// Write the timeline (csv or json by extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show, initialize or validate the configuration
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,

        /// Report values that will fall back to defaults
        #[arg(long)]
        validate: bool,
    },
}

#[derive(Tabled)]
struct WeekTableRow {
    #[tabled(rename = "Week")]
    week: u32,
    #[tabled(rename = "Fatigue P15/P30/P50/P70/P85")]
    fatigue: String,
    #[tabled(rename = "Readiness P15/P30/P50/P70/P85")]
    readiness: String,
    #[tabled(rename = "Daily fatigue (range)")]
    fatigue_range: String,
    #[tabled(rename = "Daily readiness (range)")]
    readiness_range: String,
}

#[derive(Tabled)]
struct ModifierTableRow {
    #[tabled(rename = "Priority")]
    priority: u32,
    #[tabled(rename = "Condition")]
    condition: String,
    #[tabled(rename = "Scope")]
    scope: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Tabled)]
struct DayTableRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Load")]
    load: String,
    #[tabled(rename = "Fatigue")]
    fatigue: String,
    #[tabled(rename = "Readiness")]
    readiness: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Modifier")]
    modifier: String,
}

fn band_cell(band: &loadcycle::signal::PercentileBand) -> String {
    format!(
        "{:.0} / {:.0} / {:.0} / {:.0} / {:.0}",
        band.p15, band.p30, band.p50, band.p70, band.p85
    )
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v))
}

fn load_config(path: Option<&Path>) -> EngineConfig {
    match path {
        Some(path) => EngineConfig::load_from_path_or_default(path),
        None => EngineConfig::load_or_default(),
    }
}

fn apply_run_args(config: &mut EngineConfig, run: &RunArgs) {
    if let Some(iterations) = run.iterations {
        config.simulation.iterations = iterations;
    }
    if let Some(seed) = run.seed {
        config.simulation.seed = Some(seed);
    }
}

fn load_weeks(config: &EngineConfig, run: &RunArgs) -> Result<(ProgramTemplate, Vec<WeekDefinition>)> {
    let template = ProgramTemplate::from_file(&run.template)
        .with_context(|| format!("Failed to load template {}", run.template.display()))?;
    let weeks = config.modifier_engine().prepare(&template, run.weeks)?;
    Ok((template, weeks))
}

/// Run a simulation with a progress bar; Ctrl-C cancels it
async fn run_simulation(simulator: MonteCarloSimulator, weeks: &[WeekDefinition]) -> Result<SimulationResult> {
    let handle = simulate_async(Arc::new(simulator), Arc::new(weeks.to_vec()));

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("simulating");

    let mut progress = handle.progress();
    let bar = pb.clone();
    let watcher = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let percent = *progress.borrow_and_update();
            bar.set_position(percent as u64);
        }
    });

    let token = handle.token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let result = handle.wait().await;
    interrupt.abort();
    let _ = watcher.await;

    match result {
        Ok(result) => {
            pb.finish_with_message(format!("{} trials in {} ms", result.iterations, result.elapsed_ms));
            Ok(result)
        }
        Err(e) => {
            pb.abandon_with_message("stopped");
            Err(LoadCycleError::from(e).into())
        }
    }
}

fn range_cell(mean: f64, min: f64, max: f64) -> String {
    format!("{:.1} ({:.0}-{:.0})", mean, min, max)
}

fn print_weeks(result: &SimulationResult) {
    let rows: Vec<WeekTableRow> = result
        .weeks
        .iter()
        .zip(result.week_ranges())
        .map(|(w, r)| WeekTableRow {
            week: w.week_number,
            fatigue: band_cell(&w.fatigue),
            readiness: band_cell(&w.readiness),
            fatigue_range: range_cell(r.fatigue_mean, r.fatigue_min, r.fatigue_max),
            readiness_range: range_cell(r.readiness_mean, r.readiness_min, r.readiness_max),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn print_summary(result: &SimulationResult) {
    let overview = result.overview();
    println!("\n{}", "Overall".bold());
    println!("  Average fatigue:   {:.1}", overview.fatigue_mean);
    println!(
        "  Peak fatigue:      {:.0} (week {})",
        overview.peak_fatigue, overview.peak_fatigue_week
    );
    println!("  Average readiness: {:.1}", overview.readiness_mean);
    println!(
        "  Lowest readiness:  {:.0} (week {})",
        overview.lowest_readiness, overview.lowest_readiness_week
    );

    let risk = result.risk();
    let line = |label: &str, count: usize| {
        let text = format!("  {:<32} {} ({:.1}%)", label, count, risk.share(count));
        if count == 0 {
            println!("{}", text.green());
        } else {
            println!("{}", text.yellow());
        }
    };
    println!("\n{}", "Risk assessment".bold());
    line("Days with elevated fatigue (>60):", risk.elevated_fatigue_days);
    line("Days with high risk (>80):", risk.overreaching_days);
    line("Days with low readiness (<50):", risk.low_readiness_days);
}

fn print_suggestion(suggestion: &ModifierSuggestion) {
    match suggestion.status {
        SuggestionStatus::Generated => println!(
            "{}",
            format!("✓ Generated {} modifiers", suggestion.modifiers.len()).green().bold()
        ),
        SuggestionStatus::Balanced => println!("{}", "✓ Program is balanced".green().bold()),
        SuggestionStatus::Failed => println!("{}", "✗ Suggestion failed".red().bold()),
    }
    if let Some(notice) = &suggestion.notice {
        println!("  {}", notice.dimmed());
    }
    if suggestion.modifiers.is_empty() {
        return;
    }

    let rows: Vec<ModifierTableRow> = suggestion
        .modifiers
        .iter()
        .map(|m| {
            let scope: Vec<String> = [
                m.cycle_phase.map(|p| p.to_string()),
                m.phase_position.map(|p| p.to_string()),
                m.phase_name.clone(),
                m.session_type.map(|s| s.to_string()),
            ]
            .into_iter()
            .flatten()
            .collect();
            ModifierTableRow {
                priority: m.priority,
                condition: m.condition.to_string(),
                scope: if scope.is_empty() { "all".to_string() } else { scope.join(" ") },
                message: m.adjustments.message.clone().unwrap_or_default(),
            }
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn print_timeline(rows: &[TimelineRow]) {
    let table: Vec<DayTableRow> = rows
        .iter()
        .map(|r| DayTableRow {
            date: r.date.to_string(),
            load: format!("{:.1}", r.daily_cost),
            fatigue: optional(r.fatigue),
            readiness: optional(r.readiness),
            phase: match (r.phase, r.confidence) {
                (Some(phase), Some(confidence)) => format!("{} ({:.0}%)", phase, confidence * 100.0),
                _ => "-".to_string(),
            },
            modifier: r.modifier_priority.map_or_else(|| "-".to_string(), |p| p.to_string()),
        })
        .collect();
    println!("{}", Table::new(table).with(Style::rounded()));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref());

    let mut log_config = config.logging.clone();
    log_config.level = log_config.level.raised_by(cli.verbose);
    init_logging(&log_config)?;

    for warning in config.validate() {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }

    match cli.command {
        Commands::Simulate { run, output } => {
            apply_run_args(&mut config, &run);
            let (template, weeks) = load_weeks(&config, &run)?;
            println!(
                "{}",
                format!("Simulating {} ({} weeks)...", template.name, weeks.len()).blue().bold()
            );

            let result = run_simulation(config.simulator(), &weeks).await?;
            print_weeks(&result);
            print_summary(&result);

            if let Some(path) = output {
                let analyses = loadcycle::modifiers::analyze_weeks(&weeks, &result, &config.modifiers);
                export::export_weeks(&analyses, &path)?;
                println!("{}", format!("✓ Weekly table written to {}", path.display()).green());
            }
        }

        Commands::Suggest {
            run,
            output,
            apply,
            analysis,
        } => {
            apply_run_args(&mut config, &run);
            let (template, weeks) = load_weeks(&config, &run)?;
            println!(
                "{}",
                format!("Suggesting modifiers for {} ({} weeks)...", template.name, weeks.len())
                    .blue()
                    .bold()
            );

            let engine = config.modifier_engine();
            let suggestion = match run_simulation(config.simulator(), &weeks).await {
                Ok(result) => engine.suggest_from_simulation(&template, &weeks, &result),
                Err(e) => match e.downcast::<LoadCycleError>() {
                    Ok(error) => ModifierSuggestion::failed(&error),
                    Err(other) => return Err(other),
                },
            };
            print_suggestion(&suggestion);

            if let Some(path) = output {
                export_json(&suggestion.modifiers, &path)?;
                println!("{}", format!("✓ Modifiers written to {}", path.display()).green());
            }
            if let Some(path) = apply {
                let updated = apply_to_template(&template, &suggestion.modifiers);
                std::fs::write(&path, updated.to_json_pretty()?)?;
                println!("{}", format!("✓ Template written to {}", path.display()).green());
            }
            if let Some(path) = analysis {
                export::export_weeks(&suggestion.weeks, &path)?;
                println!("{}", format!("✓ Weekly analysis written to {}", path.display()).green());
            }
            if suggestion.is_failed() {
                std::process::exit(1);
            }
        }

        Commands::Timeline {
            sessions,
            questionnaires,
            from,
            to,
            as_of,
            modifiers,
            program_days,
            output,
        } => {
            let manager = ImportManager::new();
            let sessions = manager.import_sessions(&sessions)?;
            let questionnaires = match questionnaires {
                Some(path) => manager.import_questionnaires(&path)?,
                None => Vec::new(),
            };
            let modifiers = match modifiers {
                Some(path) => modifiers_from_json(&std::fs::read_to_string(&path)?)?,
                None => Vec::new(),
            };

            let (Some(first), Some(last)) = (sessions.first(), sessions.last()) else {
                bail!("No sessions to build a timeline from");
            };
            let start = from.unwrap_or(first.date);
            let end = to.unwrap_or(last.date);

            let metrics = config
                .timeline()
                .calculate_as_of(&sessions, &questionnaires, start, end, as_of)?;
            let (fatigue, readiness) = score_series(&metrics);
            let power = power_series(&metrics, &sessions);
            let detections = config
                .phase_detector()
                .detect_series(&fatigue, &readiness, &power, program_days);

            let rows = timeline_rows(&metrics, &detections, &modifiers);
            print_timeline(&rows);

            if let Some(path) = output {
                export::export_timeline(&rows, &path)?;
                println!("{}", format!("✓ Timeline written to {}", path.display()).green());
            }
        }

        Commands::Config { show, init, validate } => {
            if init {
                let path = match &cli.config {
                    Some(path) => {
                        EngineConfig::default().save_to_file(path)?;
                        path.clone()
                    }
                    None => EngineConfig::default().save_default()?,
                };
                println!("{}", format!("✓ Default configuration written to {}", path.display()).green());
            }
            if validate {
                let warnings = config.validate();
                if warnings.is_empty() {
                    println!("{}", "✓ Configuration is valid".green());
                } else {
                    for warning in &warnings {
                        println!("{} {}", "✗".red(), warning);
                    }
                    let err = LoadCycleError::Configuration(format!("{} problem(s) found", warnings.len()));
                    return Err(err.into());
                }
            }
            if show || !(init || validate) {
                let path = cli.config.unwrap_or_else(EngineConfig::default_config_path);
                println!("{}", format!("# {}", path.display()).dimmed());
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}
