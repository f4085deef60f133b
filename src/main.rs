use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use vocab_srs::config::Config;
use vocab_srs::database::ItemProgress;
use vocab_srs::models::{ReviewRecord, ReviewRequest};
use vocab_srs::session::{
    Direction, DisplayMode, Outcome, ResumeState, ReviewForwarder, SessionError, SessionQueue,
    plan_batch,
};
use vocab_srs::{Item, Scheduler, SqliteStore};

#[derive(Parser)]
#[command(name = "vocab-srs", about = "Spaced-repetition vocabulary study", version)]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Learner id, overrides the config file
    #[arg(long, global = true)]
    learner: Option<i64>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Plain,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Sequential,
    Random,
}

impl From<ModeArg> for DisplayMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Sequential => DisplayMode::Sequential,
            ModeArg::Random => DisplayMode::Random,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create a sample collection if the learner has none
    Seed,

    /// Items due for review, most overdue first
    Due {
        /// Maximum number of items (0 = configured default)
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },

    /// Items last marked as not remembered
    Difficult,

    /// Items last marked as remembered
    Learned,

    /// Progress counts and items due now
    Stats,

    /// Progress per collection
    Sets,

    /// Record a review outcome for one item
    Review {
        item: i64,
        /// The item was not remembered
        #[arg(long)]
        forgot: bool,
        /// SM-2 quality 0-5 (default 3)
        #[arg(long)]
        quality: Option<u8>,
    },

    /// Toggle the favorite flag of an item
    Favorite { item: i64 },

    /// Forget all progress on an item
    Reset { item: i64 },

    /// Interactive study session in the terminal
    Study {
        /// Study a collection, skipping items finished in earlier sessions
        #[arg(long, conflicts_with = "difficult")]
        collection: Option<i64>,
        /// Study items last marked as not remembered (default: due items)
        #[arg(long)]
        difficult: bool,
        #[arg(long)]
        mode: Option<ModeArg>,
        /// Cards in this session (0 = all)
        #[arg(long)]
        size: Option<usize>,
        /// Forget which collection items were finished before starting
        #[arg(long, requires = "collection")]
        restart: bool,
    },
}

/// Formats a timestamp as local YYYY-MM-DD HH:MM
fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(time) => {
            let local: DateTime<Local> = time.into();
            local.format("%Y-%m-%d %H:%M").to_string()
        }
        None => "-".to_string(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressRow<'a> {
    #[serde(flatten)]
    item: &'a Item,
    progress: &'a ReviewRecord,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_progress(format: OutputFormat, rows: &[ItemProgress]) -> Result<()> {
    if let OutputFormat::Json = format {
        let rows: Vec<ProgressRow<'_>> = rows
            .iter()
            .map(|(item, progress)| ProgressRow { item, progress })
            .collect();
        return print_json(&rows);
    }

    if rows.is_empty() {
        println!("No items.");
    }
    for (item, record) in rows {
        println!(
            "{:>5}  {:<24} {:<24} next {}  {}d  ease {:.2}{}",
            item.id,
            item.term,
            item.definition,
            format_time(record.next_review_at),
            record.interval_days,
            record.ease_factor,
            if record.is_favorite { "  ♥" } else { "" }
        );
    }
    Ok(())
}

fn seed(scheduler: &Scheduler<SqliteStore>, learner_id: i64) -> Result<()> {
    let store = scheduler.store();
    if !store.collections(learner_id)?.is_empty() {
        println!("Learner {} already has collections.", learner_id);
        return Ok(());
    }

    let collection = store.add_collection(learner_id, "Polish Vocabulary")?;
    for (term, definition) in [
        ("cześć", "hello"),
        ("dziękuję", "thank you"),
        ("proszę", "please"),
        ("do widzenia", "goodbye"),
        ("tak", "yes"),
        ("nie", "no"),
    ] {
        store.add_item(collection, term, definition)?;
    }
    println!("Sample data created!");
    Ok(())
}

fn render(
    session: &SessionQueue<Item, ReviewForwarder<'_, SqliteStore, vocab_srs::clock::SystemClock>>,
) -> io::Result<()> {
    let Some(item) = session.current() else {
        return Ok(());
    };
    println!();
    println!("[{}/{}] {}", session.cursor() + 1, session.len(), item.term);
    if session.is_flipped() {
        println!("        = {}", item.definition);
    }
    print!("> ");
    io::stdout().flush()
}

const STUDY_HELP: &str =
    "Enter/f: flip   r: remembered   x: not remembered   n/p: next/previous   m: switch mode   q: quit";

struct StudyArgs {
    collection: Option<i64>,
    difficult: bool,
    mode: DisplayMode,
    size: usize,
    restart: bool,
}

fn study(config: &Config, scheduler: &Scheduler<SqliteStore>, learner_id: i64, args: StudyArgs) -> Result<()> {
    let mut resume = ResumeState::load(&config.resume_path)
        .with_context(|| format!("reading {:?}", config.resume_path))?;

    let batch: Vec<Item> = match args.collection {
        Some(collection_id) => {
            let owned = scheduler
                .store()
                .collections(learner_id)?
                .into_iter()
                .any(|c| c.id == collection_id);
            if !owned {
                bail!("learner {} has no collection {}", learner_id, collection_id);
            }
            if args.restart {
                resume.clear(collection_id);
            }
            let items = scheduler.store().items_in_collection(collection_id)?;
            if items.is_empty() {
                println!("This collection has no items yet.");
                return Ok(());
            }
            let batch = plan_batch(items, &resume.completed_ids(collection_id), args.size);
            if batch.is_empty() {
                println!("You have studied every item in this collection. Use --restart to go again.");
                return Ok(());
            }
            batch
        }
        None => {
            let candidates = if args.difficult {
                scheduler.query_difficult(learner_id)?
            } else {
                scheduler.query_due(learner_id, 0)?
            };
            let items = candidates.into_iter().map(|(item, _)| item);
            plan_batch(items, &HashSet::new(), args.size)
        }
    };

    if batch.is_empty() {
        println!("Nothing to study right now.");
        return Ok(());
    }

    let batch_ids: Vec<i64> = batch.iter().map(|item| item.id).collect();
    let forwarder = ReviewForwarder::new(scheduler, learner_id)
        .with_max_attempts(config.session.max_delivery_attempts);
    let mut session = SessionQueue::new(batch, args.mode, forwarder)
        .with_feedback_gate(config.session.feedback_gate());

    if let Some(collection_id) = args.collection {
        let saved = resume.cursor(collection_id);
        if session.restore_cursor(saved) {
            println!("Resumed at card {}/{}", saved + 1, session.len());
        }
    }

    println!("{}", STUDY_HELP);
    render(&session)?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        match line.trim() {
            "" | "f" => session.flip(),
            "n" => {
                session.advance(Direction::Next);
            }
            "p" => {
                session.advance(Direction::Previous);
            }
            "m" => {
                let mode = match session.mode() {
                    DisplayMode::Random => DisplayMode::Sequential,
                    DisplayMode::Sequential => DisplayMode::Random,
                };
                session.set_mode(mode);
                println!("Mode: {:?}", mode);
            }
            answer @ ("r" | "x") => match session.mark_outcome(answer == "r") {
                Ok(Outcome::Complete { completed, total }) => {
                    println!("Session complete! {}/{} cards mastered.", completed, total);
                    break;
                }
                Ok(Outcome::Continue { .. }) => {
                    let progress = session.progress();
                    println!(
                        "{}% done ({} learned, {} to go)",
                        progress.percent(),
                        progress.completed,
                        progress.remaining
                    );
                }
                Err(SessionError::FeedbackPending) => {
                    println!("Slow down, still showing the last answer.");
                }
                Err(SessionError::Empty) => break,
            },
            "q" => break,
            _ => println!("{}", STUDY_HELP),
        }
        render(&session)?;
    }

    let forwarder = session.into_observer();
    let unsaved = forwarder.pending().count();
    if unsaved > 0 {
        log::warn!("{} review(s) could not be saved", unsaved);
    }

    if let Some(collection_id) = args.collection {
        if forwarder.completion().is_some() {
            resume.mark_completed(collection_id, batch_ids);
        } else {
            resume.set_cursor(collection_id, forwarder.last_cursor());
        }
        resume
            .save(&config.resume_path)
            .with_context(|| format!("writing {:?}", config.resume_path))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref()).context("loading config")?;
    let learner_id = cli.learner.unwrap_or(config.learner_id);

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("opening {:?}", config.database_path))?;
    let scheduler = Scheduler::new(store).with_options(config.engine.options());

    match cli.command {
        Command::Seed => seed(&scheduler, learner_id)?,
        Command::Due { limit } => {
            print_progress(cli.format, &scheduler.query_due(learner_id, limit)?)?
        }
        Command::Difficult => print_progress(cli.format, &scheduler.query_difficult(learner_id)?)?,
        Command::Learned => print_progress(cli.format, &scheduler.query_learned(learner_id)?)?,
        Command::Stats => {
            let dashboard = scheduler.dashboard(learner_id)?;
            match cli.format {
                OutputFormat::Json => print_json(&dashboard)?,
                OutputFormat::Plain => {
                    let stats = dashboard.stats;
                    println!("Total:       {}", stats.total);
                    println!("Learned:     {}", stats.learned);
                    println!("In progress: {}", stats.in_progress);
                    println!("Not started: {}", stats.not_started);
                    println!("Due now:     {}", dashboard.due_today);
                }
            }
        }
        Command::Sets => {
            let progress = scheduler.collection_progress(learner_id)?;
            match cli.format {
                OutputFormat::Json => print_json(&progress)?,
                OutputFormat::Plain => {
                    for set in &progress {
                        println!(
                            "{:>5}  {:<30} {}/{}{}",
                            set.collection_id,
                            set.name,
                            set.learned,
                            set.total,
                            if set.is_completed { "  ✓" } else { "" }
                        );
                    }
                }
            }
        }
        Command::Review {
            item,
            forgot,
            quality,
        } => {
            let mut request = ReviewRequest::new(item, !forgot);
            request.quality = quality;
            let record = scheduler.submit_review(learner_id, &request)?;
            match cli.format {
                OutputFormat::Json => print_json(&record)?,
                OutputFormat::Plain => println!(
                    "Next review {} (in {} day(s), ease {:.2})",
                    format_time(record.next_review_at),
                    record.interval_days,
                    record.ease_factor
                ),
            }
        }
        Command::Favorite { item } => {
            let is_favorite = scheduler.toggle_favorite(learner_id, item)?;
            println!("{}", if is_favorite { "Favorited" } else { "Unfavorited" });
        }
        Command::Reset { item } => {
            scheduler.reset_progress(learner_id, item)?;
            println!("Progress reset successfully");
        }
        Command::Study {
            collection,
            difficult,
            mode,
            size,
            restart,
        } => {
            let args = StudyArgs {
                collection,
                difficult,
                mode: mode.map(DisplayMode::from).unwrap_or(config.session.mode),
                size: size.unwrap_or(config.session.size),
                restart,
            };
            study(&config, &scheduler, learner_id, args)?;
        }
    }

    Ok(())
}
