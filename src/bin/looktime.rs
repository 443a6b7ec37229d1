//! Looktime CLI - Command-line front end for the looking-time recorder
//!
//! Commands:
//! - subject: add, list or delete subjects
//! - record: record a trial from keyboard lines (live) or an NDJSON script
//! - trials / trial: list, delete or clear a subject's trials
//! - timeline: show the looking / looking-away breakdown of a trial
//! - export: write a trial or a whole subject as CSV
//! - config: show or change stored settings

use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::Sender;
use std::thread;

use chrono::Utc;
use looking_time::config::{parse_time_limit_seconds, CONFIG_FILE_NAME, DEFAULT_DATA_DIR};
use looking_time::format::{format_date, format_duration_short, format_timestamp};
use looking_time::recorder::{
    parse_script, Command, Input, ManualClock, SilentCues, SystemClock, TerminalBell, ThreadTicker,
};
use looking_time::timeline::SegmentKind;
use looking_time::{
    keep_unsaved_trial, CsvExport, FileStore, KeyValueStore, Recorder, RecorderConfig,
    RecorderError, SessionRunner, Subject, SubjectRepository, Timeline, Trial, TrialStats, VERSION,
};

/// Looktime - Record infant looking time with a single key
#[derive(Parser)]
#[command(name = "looktime")]
#[command(version = VERSION)]
#[command(about = "Record looking intervals and export them as CSV", long_about = None)]
struct Cli {
    /// Directory holding stored subjects (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage subjects
    Subject {
        #[command(subcommand)]
        action: SubjectAction,
    },

    /// Record a trial
    Record {
        /// Subject ID (defaults to the most recently added subject)
        #[arg(short, long)]
        subject: Option<String>,

        /// Trial name (defaults to "Trial N")
        #[arg(short, long)]
        name: Option<String>,

        /// Replay an NDJSON script instead of reading keys (use - for stdin)
        #[arg(long)]
        script: Option<PathBuf>,

        /// End the trial automatically after this many seconds
        #[arg(long, conflicts_with = "no_limit")]
        time_limit: Option<String>,

        /// Record without a time limit
        #[arg(long)]
        no_limit: bool,

        /// Silence look/away cues
        #[arg(long)]
        mute: bool,
    },

    /// List a subject's trials
    Trials {
        /// Subject ID (defaults to the most recently added subject)
        #[arg(short, long)]
        subject: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete or clear trials
    Trial {
        #[command(subcommand)]
        action: TrialAction,
    },

    /// Show the timeline of a trial
    Timeline {
        /// Trial name
        trial: String,

        /// Subject ID (defaults to the most recently added subject)
        #[arg(short, long)]
        subject: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export a trial, or every trial of a subject, as CSV
    Export {
        /// Subject ID (defaults to the most recently added subject)
        #[arg(short, long)]
        subject: Option<String>,

        /// Export only this trial
        #[arg(short, long)]
        trial: Option<String>,

        /// Output file or directory (use - for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SubjectAction {
    /// Add a subject
    Add {
        /// Subject ID as used in the experiment, e.g. Subject_001
        name: String,
    },
    /// List subjects
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a subject and all of its trials
    Delete {
        name: String,
    },
}

#[derive(Subcommand)]
enum TrialAction {
    /// Delete one trial
    Delete {
        /// Trial name
        name: String,

        #[arg(short, long)]
        subject: Option<String>,
    },
    /// Delete every trial of a subject
    Clear {
        #[arg(short, long)]
        subject: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Set the automatic time limit in seconds ("off" disables it)
    SetLimit {
        seconds: String,
    },
    /// Turn cues on or off
    Mute {
        #[arg(value_enum)]
        state: Switch,
    },
}

#[derive(Clone, ValueEnum)]
enum Switch {
    On,
    Off,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Settings resolved from the config file and global flags
struct Context {
    config: RecorderConfig,
    config_path: PathBuf,
}

impl Context {
    fn load(config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<Self, LooktimeCliError> {
        let config_path =
            config_path.unwrap_or_else(|| Path::new(DEFAULT_DATA_DIR).join(CONFIG_FILE_NAME));
        let mut config = RecorderConfig::load(&config_path)?;
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        Ok(Self {
            config,
            config_path,
        })
    }

    fn repository(&self) -> Result<SubjectRepository<FileStore>, LooktimeCliError> {
        Ok(SubjectRepository::load(FileStore::new(&self.config.data_dir))?)
    }
}

fn run(cli: Cli) -> Result<(), LooktimeCliError> {
    let ctx = Context::load(cli.config, cli.data_dir)?;

    match cli.command {
        Commands::Subject { action } => cmd_subject(&ctx, action),

        Commands::Record {
            subject,
            name,
            script,
            time_limit,
            no_limit,
            mute,
        } => {
            let mut config = ctx.config.clone();
            if let Some(seconds) = time_limit {
                config.time_limit_ms = Some(parse_time_limit_seconds(&seconds)?);
            }
            if no_limit {
                config.time_limit_ms = None;
            }
            if mute {
                config.muted = true;
            }

            let mut repo = ctx.repository()?;
            let subject = resolve_subject(&repo, subject.as_deref())?.clone();

            match script {
                Some(path) => cmd_record_script(&config, &mut repo, &subject, &path),
                None => cmd_record_live(&config, &mut repo, &subject, name),
            }
        }

        Commands::Trials { subject, json } => {
            let repo = ctx.repository()?;
            let subject = resolve_subject(&repo, subject.as_deref())?;
            cmd_trials(subject, json)
        }

        Commands::Trial { action } => cmd_trial(&ctx, action),

        Commands::Timeline {
            trial,
            subject,
            json,
        } => {
            let repo = ctx.repository()?;
            let subject = resolve_subject(&repo, subject.as_deref())?;
            let trial = resolve_trial(subject, &trial)?;
            cmd_timeline(trial, json)
        }

        Commands::Export {
            subject,
            trial,
            output,
        } => {
            let repo = ctx.repository()?;
            let subject = resolve_subject(&repo, subject.as_deref())?;
            let export = match trial {
                Some(name) => CsvExport::for_trial(resolve_trial(subject, &name)?),
                None => CsvExport::for_subject(subject),
            };
            cmd_export(&export, output.as_deref())
        }

        Commands::Config { action } => cmd_config(ctx, action),
    }
}

fn resolve_subject<'a>(
    repo: &'a SubjectRepository<FileStore>,
    name: Option<&str>,
) -> Result<&'a Subject, LooktimeCliError> {
    match name {
        Some(name) => repo
            .find_by_name(name)
            .ok_or_else(|| RecorderError::SubjectNotFound(name.to_string()).into()),
        None => repo.current_subject().ok_or(LooktimeCliError::NoSubjects),
    }
}

fn resolve_trial<'a>(subject: &'a Subject, name: &str) -> Result<&'a Trial, LooktimeCliError> {
    subject
        .find_trial(name)
        .ok_or_else(|| RecorderError::TrialNotFound(name.to_string()).into())
}

fn cmd_subject(ctx: &Context, action: SubjectAction) -> Result<(), LooktimeCliError> {
    let mut repo = ctx.repository()?;

    match action {
        SubjectAction::Add { name } => {
            let subject = repo.create_subject(&name, Utc::now())?;
            println!("Added subject {}", subject.name);
        }
        SubjectAction::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(repo.subjects())?);
            } else if repo.subjects().is_empty() {
                println!("No subjects yet. Add one with 'looktime subject add <ID>'");
            } else {
                for subject in repo.subjects() {
                    println!(
                        "{:<24} {:>3} trial(s)  added {}",
                        subject.name,
                        subject.trials.len(),
                        format_date(&subject.created_at)
                    );
                }
            }
        }
        SubjectAction::Delete { name } => {
            let id = resolve_subject(&repo, Some(name.as_str()))?.id.clone();
            let removed = repo.delete_subject(&id)?;
            println!(
                "Deleted subject {} ({} trial(s))",
                removed.name,
                removed.trials.len()
            );
        }
    }

    Ok(())
}

fn cmd_record_live(
    config: &RecorderConfig,
    repo: &mut SubjectRepository<FileStore>,
    subject: &Subject,
    name: Option<String>,
) -> Result<(), LooktimeCliError> {
    let trial_name = match name {
        Some(name) => repo.check_trial_name(&subject.id, &name)?,
        None => repo.next_trial_name(&subject.id),
    };

    let recorder = Recorder::from_config(config, SystemClock::new(), TerminalBell);
    let mut runner = SessionRunner::new(recorder, ThreadTicker, config.tick_interval());

    if atty::is(atty::Stream::Stdin) {
        eprintln!("Recording {} for {}", trial_name, subject.name);
        eprintln!("  look / space    subject is looking");
        eprintln!("  away / release  subject looked away");
        eprintln!("  end / esc       end and save the trial");
        eprintln!("  cancel          discard the trial");
        eprintln!("  quit            save and exit");
        match config.time_limit_ms {
            Some(limit) => eprintln!("Time limit: {}", format_duration_short(limit)),
            None => eprintln!("No time limit"),
        }
    }

    runner.dispatch(Command::StartRecording { trial_name });
    spawn_key_reader(runner.sender());

    let stop = runner.sender();
    let mut saved: Option<Trial> = None;
    runner.run(|trial| {
        let _ = stop.send(Input::Shutdown);
        save_trial(repo, &subject.id, &config.data_dir, &trial)?;
        saved = Some(trial);
        Ok(())
    })?;

    match saved {
        Some(trial) => print_summary(&trial),
        None => println!("Trial cancelled"),
    }
    Ok(())
}

/// Forward keyboard lines to the runner until stdin closes
fn spawn_key_reader(tx: Sender<Input>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            for input in inputs_for(&line) {
                if tx.send(input).is_err() {
                    return;
                }
            }
        }
        let _ = tx.send(Input::Shutdown);
    });
}

/// Map one keyboard line to runner inputs
fn inputs_for(line: &str) -> Vec<Input> {
    match line.trim().to_lowercase().as_str() {
        "" => Vec::new(),
        "look" | "space" => vec![Command::LookStart { repeat: false }.into()],
        "away" | "release" => vec![Command::LookStop.into()],
        "end" | "esc" => vec![Command::EndRecording.into()],
        "cancel" => vec![Command::CancelRecording.into(), Input::Shutdown],
        "quit" | "q" => vec![Input::Shutdown],
        other => {
            warn!("unknown key command \"{other}\"");
            Vec::new()
        }
    }
}

fn cmd_record_script(
    config: &RecorderConfig,
    repo: &mut SubjectRepository<FileStore>,
    subject: &Subject,
    path: &Path,
) -> Result<(), LooktimeCliError> {
    let input = if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(path)?
    };

    let events = parse_script(&input)?;
    if events.is_empty() {
        return Err(LooktimeCliError::EmptyScript);
    }

    let clock = ManualClock::new(Utc::now());
    let mut recorder = Recorder::from_config(config, clock.clone(), SilentCues);
    let mut saved = 0;

    for mut event in events {
        if let Command::StartRecording { trial_name } = &mut event.command {
            if !recorder.is_recording() {
                *trial_name = if trial_name.trim().is_empty() {
                    repo.next_trial_name(&subject.id)
                } else {
                    repo.check_trial_name(&subject.id, trial_name)?
                };
            }
        }
        if let Some(trial) = event.apply(&mut recorder, &clock) {
            save_trial(repo, &subject.id, &config.data_dir, &trial)?;
            print_summary(&trial);
            saved += 1;
        }
    }

    if recorder.is_recording() {
        info!("script ended with a recording in progress, ending it");
        if let Some(trial) = recorder.handle(Command::EndRecording) {
            save_trial(repo, &subject.id, &config.data_dir, &trial)?;
            print_summary(&trial);
            saved += 1;
        }
    }

    println!("Saved {} trial(s) for {}", saved, subject.name);
    Ok(())
}

/// Store a finished trial. When that fails the trial is written next to the
/// data instead (or printed, if even that fails) before the error is returned.
fn save_trial<S: KeyValueStore>(
    repo: &mut SubjectRepository<S>,
    subject_id: &str,
    data_dir: &Path,
    trial: &Trial,
) -> Result<(), RecorderError> {
    let Err(e) = repo.add_trial(subject_id, trial.clone()) else {
        return Ok(());
    };

    match keep_unsaved_trial(data_dir, trial) {
        Ok(path) => eprintln!("Could not save {}; kept it at {}", trial.name, path.display()),
        Err(keep_err) => {
            warn!("could not keep unsaved trial: {keep_err}");
            println!("{}", serde_json::to_string_pretty(trial)?);
        }
    }
    Err(e)
}

fn print_summary(trial: &Trial) {
    let stats = TrialStats::of(trial);
    println!(
        "{}: {} total, {} looking ({:.1}%), {} interval(s)",
        trial.name,
        format_timestamp(trial.total_duration),
        format_timestamp(stats.total_looking_time),
        stats.looking_percent,
        stats.interval_count
    );
}

fn cmd_trials(subject: &Subject, json: bool) -> Result<(), LooktimeCliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(&subject.trials)?);
        return Ok(());
    }

    println!("{} ({} trial(s))", subject.name, subject.trials.len());
    for trial in &subject.trials {
        let stats = TrialStats::of(trial);
        println!(
            "  {:<16} {:>7}  {}  looking {}  {} interval(s)",
            trial.name,
            format_date(&trial.created_at),
            format_timestamp(trial.total_duration),
            format_timestamp(stats.total_looking_time),
            stats.interval_count
        );
    }
    Ok(())
}

fn cmd_trial(ctx: &Context, action: TrialAction) -> Result<(), LooktimeCliError> {
    let mut repo = ctx.repository()?;

    match action {
        TrialAction::Delete { name, subject } => {
            let subject = resolve_subject(&repo, subject.as_deref())?;
            let subject_id = subject.id.clone();
            let trial_id = resolve_trial(subject, &name)?.id.clone();
            let removed = repo.delete_trial(&subject_id, &trial_id)?;
            println!("Deleted {}", removed.name);
        }
        TrialAction::Clear { subject } => {
            let subject_id = resolve_subject(&repo, subject.as_deref())?.id.clone();
            let removed = repo.clear_trials(&subject_id)?;
            println!("Deleted {} trial(s)", removed);
        }
    }

    Ok(())
}

fn cmd_timeline(trial: &Trial, json: bool) -> Result<(), LooktimeCliError> {
    let timeline = Timeline::derive(trial);

    if json {
        println!("{}", serde_json::to_string_pretty(&timeline)?);
        return Ok(());
    }

    println!("{} ({})", trial.name, format_timestamp(timeline.total_duration));
    println!(
        "Looking {} ({:.1}%) across {} interval(s)",
        format_timestamp(timeline.stats.total_looking_time),
        timeline.stats.looking_percent,
        timeline.stats.interval_count
    );
    println!();

    for segment in &timeline.segments {
        let label = match segment.kind {
            SegmentKind::Looking => "looking",
            SegmentKind::LookingAway => "away",
            SegmentKind::Neutral => "neutral",
        };
        println!(
            "  {:<8} {} - {}  {:>5.1}%",
            label,
            format_timestamp(segment.start_time),
            format_timestamp(segment.end_time),
            segment.width_percent()
        );
    }

    if !timeline.markers.is_empty() {
        let labels: Vec<&str> = timeline.markers.iter().map(|m| m.label.as_str()).collect();
        println!();
        println!("  axis: {}", labels.join(" | "));
    }
    Ok(())
}

fn cmd_export(export: &CsvExport, output: Option<&Path>) -> Result<(), LooktimeCliError> {
    let target = match output {
        Some(path) if path.to_string_lossy() == "-" => {
            let mut stdout = io::stdout();
            writeln!(stdout, "{}", export.contents)?;
            return Ok(());
        }
        Some(path) if path.is_dir() => path.join(&export.filename),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(&export.filename),
    };

    fs::write(&target, &export.contents)?;
    println!("Wrote {}", target.display());
    Ok(())
}

fn cmd_config(ctx: Context, action: ConfigAction) -> Result<(), LooktimeCliError> {
    let Context {
        mut config,
        config_path,
    } = ctx;

    match action {
        ConfigAction::Show => {
            println!("{}", config.to_json()?);
            return Ok(());
        }
        ConfigAction::SetLimit { seconds } => {
            if seconds.trim().eq_ignore_ascii_case("off") {
                config.time_limit_ms = None;
            } else {
                config.set_time_limit_seconds(&seconds)?;
            }
        }
        ConfigAction::Mute { state } => {
            config.muted = matches!(state, Switch::On);
        }
    }

    config.save(&config_path)?;
    println!("Saved {}", config_path.display());
    Ok(())
}

// Error types

#[derive(Debug)]
enum LooktimeCliError {
    Io(io::Error),
    Json(serde_json::Error),
    Recorder(RecorderError),
    NoSubjects,
    EmptyScript,
}

impl From<io::Error> for LooktimeCliError {
    fn from(e: io::Error) -> Self {
        LooktimeCliError::Io(e)
    }
}

impl From<serde_json::Error> for LooktimeCliError {
    fn from(e: serde_json::Error) -> Self {
        LooktimeCliError::Json(e)
    }
}

impl From<RecorderError> for LooktimeCliError {
    fn from(e: RecorderError) -> Self {
        LooktimeCliError::Recorder(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<LooktimeCliError> for CliError {
    fn from(e: LooktimeCliError) -> Self {
        match e {
            LooktimeCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            LooktimeCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            LooktimeCliError::Recorder(e) => recorder_error(e),
            LooktimeCliError::NoSubjects => CliError {
                code: "NO_SUBJECTS".to_string(),
                message: "No subjects found".to_string(),
                hint: Some("Add one with 'looktime subject add <ID>'".to_string()),
            },
            LooktimeCliError::EmptyScript => CliError {
                code: "EMPTY_SCRIPT".to_string(),
                message: "Script contains no events".to_string(),
                hint: Some("Ensure the script file is not empty".to_string()),
            },
        }
    }
}

fn recorder_error(e: RecorderError) -> CliError {
    let (code, hint) = match &e {
        RecorderError::Io(_) => ("IO_ERROR", Some("Check the data directory and its permissions")),
        RecorderError::Json(_) => ("STORAGE_CORRUPT", Some("The stored subject list could not be read")),
        RecorderError::EmptyName => ("EMPTY_NAME", Some("Names cannot be blank")),
        RecorderError::DuplicateSubject(_) => ("DUPLICATE_SUBJECT", Some("Subject IDs must be unique")),
        RecorderError::DuplicateTrial(_) => ("DUPLICATE_TRIAL", Some("Pick another name with --name")),
        RecorderError::SubjectNotFound(_) => ("SUBJECT_NOT_FOUND", Some("Run 'looktime subject list'")),
        RecorderError::TrialNotFound(_) => ("TRIAL_NOT_FOUND", Some("Run 'looktime trials'")),
        RecorderError::InvalidTimeLimit(_) => ("INVALID_TIME_LIMIT", None),
        RecorderError::Script(_) => (
            "SCRIPT_ERROR",
            Some("Each line needs \"at\" (ms) and \"signal\""),
        ),
    };

    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: hint.map(str::to_string),
    }
}
