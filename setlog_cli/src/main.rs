use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use setlog_core::config::DataConfig;
use setlog_core::history::{find_last_for_template, DEFAULT_PAGE_SIZE};
use setlog_core::*;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "setlog")]
#[command(about = "Template-driven strength workout logger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the user id records are stored under
    #[arg(long, global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available workout templates
    Templates,

    /// Start a workout from a template
    Run {
        /// Template id (see `setlog templates`)
        template: String,

        /// Body weight to store with the workout
        #[arg(long)]
        body_weight: Option<f64>,

        #[command(flatten)]
        finish: FinishArgs,
    },

    /// Continue the workout left in progress
    Resume {
        #[command(flatten)]
        finish: FinishArgs,
    },

    /// Discard the workout left in progress
    Abandon,

    /// List completed workouts, newest first
    History {
        #[arg(long, default_value_t = 0)]
        skip: usize,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: usize,
    },

    /// Show the dashboard (default)
    Stats {
        /// Window size in days (defaults to the configured period)
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=stats::MAX_PERIOD_DAYS))]
        days: Option<i64>,
    },

    /// Delete a completed workout
    Delete {
        /// Execution id as shown by `setlog history`
        id: Uuid,
    },

    /// Export the full history as CSV
    Export {
        /// Output file
        path: PathBuf,
    },
}

#[derive(clap::Args, Clone, Debug, Default)]
struct FinishArgs {
    /// Auto-complete (for testing) - complete every set and finish
    #[arg(long)]
    auto_complete: bool,

    /// Duration in minutes, instead of the elapsed time
    #[arg(long)]
    duration: Option<u32>,

    /// General notes saved with the workout
    #[arg(long)]
    notes: Option<String>,
}

fn main() -> Result<()> {
    // Initialize logging
    setlog_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let paths = DataConfig {
        data_dir: cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone()),
    };
    let user_id = cli.user.unwrap_or_else(|| config.user.id.clone());

    match cli.command {
        Some(Commands::Templates) => cmd_templates(&paths),
        Some(Commands::Run {
            template,
            body_weight,
            finish,
        }) => cmd_run(
            &paths,
            &user_id,
            &template,
            body_weight.or(config.user.body_weight),
            &finish,
        ),
        Some(Commands::Resume { finish }) => cmd_resume(&paths, &finish),
        Some(Commands::Abandon) => cmd_abandon(&paths),
        Some(Commands::History { skip, limit }) => cmd_history(&paths, &user_id, skip, limit),
        Some(Commands::Stats { days }) => cmd_stats(&paths, &user_id, days, &config),
        Some(Commands::Delete { id }) => cmd_delete(&paths, id),
        Some(Commands::Export { path }) => cmd_export(&paths, &user_id, &path),
        None => cmd_stats(&paths, &user_id, None, &config),
    }
}

/// Built-in templates plus any found in the data directory
fn load_templates(paths: &DataConfig) -> Result<MemoryTemplateStore> {
    let mut store = MemoryTemplateStore::with_defaults();
    store.load_dir(&paths.templates_dir())?;
    Ok(store)
}

fn cmd_templates(paths: &DataConfig) -> Result<()> {
    let store = load_templates(paths)?;

    for template in store.list() {
        println!("{}  {}", template.id, template.name);
        if let Some(ref description) = template.description {
            println!("    {}", description);
        }
        for exercise in &template.exercises {
            let rest = if exercise.use_global_rest {
                template.global_rest_seconds
            } else {
                exercise.rest_seconds
            };
            println!(
                "    {}. {:<20} {} x {:<6} rest {}s",
                exercise.order,
                exercise.name.as_deref().unwrap_or(&exercise.exercise_id),
                exercise.target_sets,
                exercise.target_reps_range.as_deref().unwrap_or("-"),
                rest
            );
        }
        println!();
    }

    Ok(())
}

fn cmd_run(
    paths: &DataConfig,
    user_id: &str,
    template_id: &str,
    body_weight: Option<f64>,
    finish: &FinishArgs,
) -> Result<()> {
    let draft = DraftFile::new(paths.draft_path());
    if let Some(existing) = draft.load()? {
        eprintln!(
            "A '{}' workout started at {} is still in progress.",
            existing.template_name(),
            existing.started_at().with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
        eprintln!("Use `setlog resume` to continue it or `setlog abandon` to discard it.");
        return Err(Error::Other("workout already in progress".into()));
    }

    std::fs::create_dir_all(&paths.data_dir)?;

    let templates = load_templates(paths)?;
    let mut session = start_session(&templates, template_id, user_id, body_weight, Utc::now())?;
    draft.save(&session)?;

    let store = JsonlStore::new(paths.executions_path());
    let previous = load_all_executions(&store, user_id, DEFAULT_PAGE_SIZE)?;
    if let Some(last) = find_last_for_template(&previous, template_id) {
        println!(
            "Last time: {} ({} of {} sets)",
            last.started_at.with_timezone(&Local).format("%Y-%m-%d"),
            last.completed_sets(),
            last.total_sets()
        );
    }

    run_session(&mut session, &draft, paths, finish)
}

fn cmd_resume(paths: &DataConfig, finish: &FinishArgs) -> Result<()> {
    let draft = DraftFile::new(paths.draft_path());
    let Some(mut session) = draft.load()? else {
        println!("No workout in progress.");
        return Ok(());
    };

    let store = JsonlStore::new(paths.executions_path());
    if store.read_all()?.iter().any(|r| r.id == session.id()) {
        draft.discard()?;
        println!("Workout {} was already logged. Draft removed.", session.id());
        return Ok(());
    }

    println!(
        "Resuming '{}' ({} sets done so far)",
        session.template_name(),
        session.completed_sets()
    );
    run_session(&mut session, &draft, paths, finish)
}

fn cmd_abandon(paths: &DataConfig) -> Result<()> {
    let draft = DraftFile::new(paths.draft_path());

    match draft.load()? {
        Some(mut session) => {
            session.abandon()?;
            draft.discard()?;
            println!("✓ Abandoned '{}' workout", session.template_name());
        }
        None if draft.exists() => {
            draft.discard()?;
            println!("✓ Discarded unreadable draft");
        }
        None => println!("No workout in progress."),
    }

    Ok(())
}

fn cmd_history(paths: &DataConfig, user_id: &str, skip: usize, limit: usize) -> Result<()> {
    let store = JsonlStore::new(paths.executions_path());
    let records = store.list_completed_executions(user_id, Page { skip, limit })?;

    if records.is_empty() {
        println!("No workouts recorded.");
        return Ok(());
    }

    for record in &records {
        println!(
            "{}  {:<20} {:>2}/{:<2} sets  {:>4} min  {}",
            record.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            record
                .template_name
                .as_deref()
                .unwrap_or(stats::UNNAMED_TEMPLATE),
            record.completed_sets(),
            record.total_sets(),
            record
                .duration_minutes
                .map_or_else(|| "-".to_string(), |m| m.to_string()),
            record.id
        );
    }

    Ok(())
}

fn cmd_stats(paths: &DataConfig, user_id: &str, days: Option<i64>, config: &Config) -> Result<()> {
    let days = days.unwrap_or(config.dashboard.default_period_days);
    let store = JsonlStore::new(paths.executions_path());
    let records = load_all_executions(&store, user_id, DEFAULT_PAGE_SIZE)?;

    let dash = stats::dashboard(&records, days, &Local::now(), &config.goals)?;
    display_dashboard(&dash);
    Ok(())
}

fn cmd_delete(paths: &DataConfig, id: Uuid) -> Result<()> {
    let mut store = JsonlStore::new(paths.executions_path());
    store.delete_completed_execution(id)?;
    println!("✓ Deleted workout {}", id);
    Ok(())
}

fn cmd_export(paths: &DataConfig, user_id: &str, path: &std::path::Path) -> Result<()> {
    let store = JsonlStore::new(paths.executions_path());
    let records = load_all_executions(&store, user_id, DEFAULT_PAGE_SIZE)?;

    let rows = export::export_csv(&records, path)?;
    println!("✓ Exported {} workouts ({} sets)", records.len(), rows);
    println!("  CSV: {}", path.display());
    Ok(())
}

// ----------------------------------------------------------------------------
// Session loop
// ----------------------------------------------------------------------------

enum UserAction {
    CompleteNext,
    Reps(u32),
    Weight(f64),
    AddSet,
    Rest,
    Next,
    Previous,
    Finish,
    Quit,
    Abandon,
    Unknown(String),
}

/// Drive a session until it is finished, saved for later or abandoned
///
/// The draft is rewritten after every change.
fn run_session(
    session: &mut ExecutionSession,
    draft: &DraftFile,
    paths: &DataConfig,
    finish: &FinishArgs,
) -> Result<()> {
    if finish.auto_complete {
        for exercise_index in 0..session.exercises().len() {
            let sets = session.exercise(exercise_index)?.sets.len();
            for set_index in 0..sets {
                session.complete_set(exercise_index, set_index)?;
            }
        }
        draft.save(session)?;
        return finish_session(session, draft, paths, finish);
    }

    loop {
        let index = session.cursor();
        display_exercise(session, index)?;

        match prompt_user_action()? {
            UserAction::CompleteNext => match next_open_set(session, index)? {
                Some(set_index) => {
                    let rest = session.complete_set(index, set_index)?;
                    println!("\n✓ Set {} done. Rest {}s", set_index + 1, rest);
                }
                None => println!("\nAll sets done. 'n' to move on, '+' for an extra set."),
            },
            UserAction::Reps(reps) => record_next(session, index, SetInput {
                reps: Some(reps),
                ..SetInput::default()
            })?,
            UserAction::Weight(weight) => record_next(session, index, SetInput {
                weight: Some(weight),
                ..SetInput::default()
            })?,
            UserAction::AddSet => {
                let set_index = session.add_set(index)?;
                println!("\n✓ Added set {}", set_index + 1);
            }
            UserAction::Rest => rest_countdown(session, index)?,
            UserAction::Next => {
                if session.advance()? == CursorMove::ReadyToFinalize {
                    println!("\nThat was the last exercise. 'f' to finish.");
                }
            }
            UserAction::Previous => {
                session.retreat()?;
            }
            UserAction::Finish => match finish_session(session, draft, paths, finish) {
                Ok(()) => return Ok(()),
                Err(Error::NoProgress) => {
                    println!("\nNo sets completed yet - nothing to save.");
                }
                Err(e) => return Err(e),
            },
            UserAction::Quit => {
                draft.save(session)?;
                println!("\n✓ Progress saved. `setlog resume` to continue.");
                return Ok(());
            }
            UserAction::Abandon => {
                session.abandon()?;
                draft.discard()?;
                println!("\n✓ Workout abandoned");
                return Ok(());
            }
            UserAction::Unknown(input) => {
                println!("\nUnknown command: {}", input);
            }
        }

        draft.save(session)?;
    }
}

fn next_open_set(session: &ExecutionSession, exercise_index: usize) -> Result<Option<usize>> {
    Ok(session
        .exercise(exercise_index)?
        .sets
        .iter()
        .position(|s| !s.completed))
}

fn record_next(session: &mut ExecutionSession, exercise_index: usize, input: SetInput) -> Result<()> {
    match next_open_set(session, exercise_index)? {
        Some(set_index) => {
            session.record_set(exercise_index, set_index, input)?;
        }
        None => println!("\nAll sets done. '+' for an extra set."),
    }
    Ok(())
}

/// Count the exercise's rest timer down in real time
fn rest_countdown(session: &mut ExecutionSession, exercise_index: usize) -> Result<()> {
    if !session.rest_timer(exercise_index)?.is_running() {
        println!("\nNo rest running.");
        return Ok(());
    }

    loop {
        print!("\r  Rest: {:>3}s ", session.rest_timer(exercise_index)?.remaining_seconds());
        io::stdout().flush()?;
        std::thread::sleep(Duration::from_secs(1));

        if let Some(RestEvent::RestComplete) = session.tick_rest(exercise_index)? {
            println!("\r  Rest over - go!   ");
            return Ok(());
        }
    }
}

fn finish_session(
    session: &mut ExecutionSession,
    draft: &DraftFile,
    paths: &DataConfig,
    finish: &FinishArgs,
) -> Result<()> {
    let mut store = JsonlStore::new(paths.executions_path());
    let options = FinalizeOptions {
        finished_at: Utc::now(),
        duration_minutes: finish.duration,
        general_notes: finish.notes.clone(),
    };

    let (id, record) = finalize_and_save(session, options, &mut store)?;
    if let Err(e) = draft.discard() {
        tracing::warn!(
            "Workout {} saved but draft {:?} could not be removed: {}",
            id,
            draft.path(),
            e
        );
    }

    println!("\n✓ Workout logged!");
    println!("  {} of {} sets completed", record.completed_sets(), record.total_sets());
    if let Some(minutes) = record.duration_minutes {
        println!("  Duration: {} min", minutes);
    }
    println!("  Id: {}", id);
    Ok(())
}

fn display_exercise(session: &ExecutionSession, index: usize) -> Result<()> {
    let exercise = session.exercise(index)?;
    let timer = session.rest_timer(index)?;

    println!("\n╭─────────────────────────────────────────╮");
    println!(
        "│  {} ({}/{})",
        session.template_name(),
        index + 1,
        session.exercises().len()
    );
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!(
        "  {}",
        exercise.name.as_deref().unwrap_or(&exercise.exercise_id)
    );

    for set in &exercise.sets {
        let mark = if set.completed { "✓" } else { " " };
        let reps = set
            .actual_reps
            .or(set.target_reps)
            .map_or_else(|| "-".to_string(), |r| r.to_string());
        let weight = set
            .actual_weight
            .map_or_else(String::new, |w| format!(" @ {}", w));
        println!("  [{}] Set {}: {} reps{}", mark, set.order, reps, weight);
    }

    if timer.is_running() {
        println!("\n  Rest: {}s of {}s", timer.remaining_seconds(), timer.total_seconds());
    }
    println!();
    Ok(())
}

fn prompt_user_action() -> Result<UserAction> {
    println!("─────────────────────────────────────────");
    println!("Press Enter to complete the next set");
    println!("  'r N' reps, 'w N' weight for the next set");
    println!("  '+' extra set, 't' rest countdown");
    println!("  'n' next, 'p' previous, 'f' finish");
    println!("  'q' save and quit, 'a' abandon");
    print!("> ");
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        // stdin closed
        return Ok(UserAction::Quit);
    }

    let input = input.trim().to_lowercase();
    let mut parts = input.split_whitespace();
    let action = match (parts.next(), parts.next()) {
        (None, _) => UserAction::CompleteNext,
        (Some("r"), Some(n)) => n
            .parse::<u32>()
            .map_or_else(|_| UserAction::Unknown(input.clone()), UserAction::Reps),
        (Some("w"), Some(n)) => n
            .parse::<f64>()
            .map_or_else(|_| UserAction::Unknown(input.clone()), UserAction::Weight),
        (Some("+"), None) => UserAction::AddSet,
        (Some("t"), None) => UserAction::Rest,
        (Some("n"), None) => UserAction::Next,
        (Some("p"), None) => UserAction::Previous,
        (Some("f"), None) => UserAction::Finish,
        (Some("q"), None) => UserAction::Quit,
        (Some("a"), None) => UserAction::Abandon,
        _ => UserAction::Unknown(input.clone()),
    };

    Ok(action)
}

fn display_dashboard(dash: &stats::Dashboard) {
    let label = stats::Period::from_days(dash.period_days)
        .map_or_else(|| format!("last {} days", dash.period_days), |p| {
            format!("last {:?}", p).to_lowercase()
        });

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  DASHBOARD ({})", label);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Workouts:      {}", dash.totals.count);
    println!("  Total minutes: {}", dash.totals.total_minutes);
    println!("  Active days:   {}", dash.totals.active_day_count);
    println!(
        "  Sets:          {} ({:.1} per workout)",
        dash.totals.total_sets, dash.totals.sets_per_workout
    );
    println!("  Volume:        {:.1}", dash.total_volume);
    println!("  Streak:        {} days", dash.streak_days);

    if !dash.by_template.is_empty() {
        println!("\n  By template:");
        for entry in &dash.by_template {
            println!("    {:<24} {}", entry.template_name, entry.count);
        }
    }

    if !dash.by_day.is_empty() {
        println!("\n  By day:");
        for day in &dash.by_day {
            println!("    {}  {}", day.date, "■".repeat(day.count));
        }
    }

    if !dash.goals.is_empty() {
        println!("\n  Goals:");
        for (goal, progress) in &dash.goals {
            println!(
                "    {:<16} {:>6.0} / {:<6.0} ({:.0}%)",
                format!("{:?}", goal.metric),
                progress.progress,
                goal.target,
                progress.percent
            );
        }
    }
    println!();
}
