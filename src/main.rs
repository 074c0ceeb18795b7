use std::{fs, process, time::Instant};

use clap::{App, Arg, ArgMatches};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use config::SolverConfig;
use error::TimetableError;
use model::Model;
use optimization::{randomized_best, validation, SearchStatus};

mod config;
mod csv_reader;
mod error;
mod model;
mod optimization;

fn enable_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// main entry point of the program, configurable by CLI parameters
///
/// start with `cargo run --release -- -i <FOLDER>`
///
/// use `--help` to see a list of params
fn main() {
    enable_tracing();

    let matches = App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))

        .arg(Arg::with_name("input_folder_path")
            .short("i")
            .long("input")
            .help("folder with sessions.csv (and optionally preferences.json), if omitted the snapshot of the previous run in the output folder is used")
            .value_name("FOLDER"))

        .arg(Arg::with_name("output_folder_path")
            .short("o")
            .long("output")
            .help("folder path for snapshot and result files (default='.' aka. current directory)")
            .value_name("FOLDER"))

        .arg(Arg::with_name("config_filepath")
            .short("c")
            .long("config")
            .help("JSON file with solver configuration, missing keys fall back to defaults")
            .value_name("FILE"))

        .arg(Arg::with_name("budget")
            .short("b")
            .long("budget")
            .help("wall-clock seconds the search may spend")
            .value_name("SECONDS"))

        .arg(Arg::with_name("n_search_threads")
            .short("t")
            .long("n_search_threads")
            .help("number of worker threads running search attempts in parallel")
            .value_name("INTEGER"))

        .arg(Arg::with_name("seed")
            .short("s")
            .long("seed")
            .help("base seed for reproducible runs (worker i uses seed + i)")
            .value_name("INTEGER"))

        .arg(Arg::with_name("max_attempts")
            .short("m")
            .long("max_attempts")
            .help("stop after this many attempts even if budget is left")
            .value_name("INTEGER"))

        .arg(Arg::with_name("daily_hour_cap")
            .short("d")
            .long("daily_hour_cap")
            .help("maximum hours a professor teaches per day")
            .value_name("INTEGER"))

        .arg(Arg::with_name("popular_first")
            .long("popular_first")
            .help("visit slots preferred by many professors first"))

        .arg(Arg::with_name("export_as_dot_filepath")
            .short("e")
            .long("export_as_dot_filepath")
            .help("If specified, exports the conflict graph as GraphViz DOT-Code to filepath")
            .value_name("FILE"))

        .get_matches();

    match run(&matches) {
        Ok(SearchStatus::Solved) => {}
        Ok(_) => process::exit(2),
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{} {}", "error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn parse_value<T: std::str::FromStr>(
    matches: &ArgMatches,
    name: &str,
) -> Result<Option<T>, TimetableError> {
    match matches.value_of(name) {
        Some(value) => value.trim().parse().map(Some).map_err(|_| {
            TimetableError::InvalidConfig(format!("{} has to be a positive integer, got '{}'", name, value))
        }),
        None => Ok(None),
    }
}

/// config file (or defaults) overridden by explicit CLI values
fn build_config(matches: &ArgMatches) -> Result<SolverConfig, TimetableError> {
    let mut config = match matches.value_of("config_filepath") {
        Some(filepath) => SolverConfig::load_from_file(filepath)?,
        None => SolverConfig::default(),
    };

    if let Some(budget_secs) = parse_value(matches, "budget")? {
        config.budget_secs = budget_secs;
    }
    if let Some(n_search_threads) = parse_value(matches, "n_search_threads")? {
        config.n_search_threads = n_search_threads;
    }
    if let Some(seed) = parse_value(matches, "seed")? {
        config.seed = Some(seed);
    }
    if let Some(max_attempts) = parse_value(matches, "max_attempts")? {
        config.max_attempts = Some(max_attempts);
    }
    if let Some(daily_hour_cap) = parse_value(matches, "daily_hour_cap")? {
        config.daily_hour_cap = daily_hour_cap;
    }
    if matches.is_present("popular_first") {
        config.order_by_popularity = true;
    }

    config.validate()?;
    Ok(config)
}

fn run(matches: &ArgMatches) -> Result<SearchStatus, TimetableError> {
    let start = Instant::now();
    let config = build_config(matches)?;

    let output_folder_path = matches.value_of("output_folder_path").unwrap_or(".");
    fs::create_dir_all(output_folder_path)
        .map_err(|e| TimetableError::io(output_folder_path, e))?;

    // EXPLANATION OF input_folder_path:
    // if <input_folder_path> specified, the program reads the CSV (+ JSON) from there, builds a new model and snapshots it into the output folder
    // if <input_folder_path> is NOT specified, the program loads the snapshot of a previous run from the output folder
    let model = match matches.value_of("input_folder_path") {
        Some(input_folder_path) => {
            tracing::info!("creating new model from {}", input_folder_path);
            let model = Model::with_sessions_and_preferences(input_folder_path, &config)?;
            model.save_to_file(output_folder_path)?;
            model
        }
        None => {
            tracing::info!("no input folder given, loading snapshot from {}", output_folder_path);
            Model::load_from_file(output_folder_path, &config)?
        }
    };

    if model.is_empty() {
        tracing::warn!("instance has no sessions, the empty schedule is trivially complete");
    }
    if model.preferences.is_empty() {
        tracing::warn!("no professor preferences, every complete schedule scores 0");
    }

    if let Some(export_as_dot_filepath) = matches.value_of("export_as_dot_filepath") {
        tracing::info!("exporting dot-code of conflict graph to '{}'", export_as_dot_filepath);
        model.conflicts.save_dot_code_to(export_as_dot_filepath)?;
    }

    let outcome = randomized_best::search(&model, &config);
    let status = outcome.status();

    if let Some(best) = outcome.best.as_ref() {
        let violations = validation::validate(&model, &best.schedule, &config);
        for violation in violations.iter() {
            tracing::error!("{}", violation);
        }

        best.schedule
            .save_to_csv(&model, &format!("{}/schedule.csv", output_folder_path))?;
    }
    outcome
        .summary()
        .save_to_json(&format!("{}/search_summary.json", output_folder_path))?;

    let line = format!(
        "{} session(s), {} attempt(s), {} success(es) in {}s",
        model.len(),
        outcome.attempts,
        outcome.successes,
        start.elapsed().as_secs()
    );
    match (status, outcome.best.as_ref()) {
        (SearchStatus::Solved, Some(best)) => {
            println!("{} score={} ({})", "SOLVED".green().bold(), best.score, line)
        }
        (SearchStatus::NoAttempt, _) => println!("{} ({})", "NO ATTEMPT".yellow().bold(), line),
        _ => println!("{} ({})", "NO SCHEDULE FOUND".red().bold(), line),
    }

    Ok(status)
}
