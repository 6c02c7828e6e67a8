use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use keytutor::{
    catalog::Catalog,
    config::{ConfigStore, FileConfigStore},
    curriculum::Recommendation,
    metrics::StarBands,
    runtime::{ChannelEventSource, EngineEvent, FixedTicker, RunState, Runner},
    store::SqliteStore,
    EndReason, SessionSummary, TypingEngine,
};
use log::{warn, LevelFilter};
use serde::Serialize;
use std::{
    error::Error,
    io::{self, BufRead},
    path::PathBuf,
    thread,
    time::Duration,
};
use time_humanize::HumanTime;

/// typing practice engine: replays, history, analytics and lesson recommendations
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// configuration file (defaults to the platform config dir)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// history database (defaults to ~/.local/state/keytutor/history.db)
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// custom lesson catalog in json
    #[clap(long, global = true)]
    catalog: Option<PathBuf>,

    /// log engine activity
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// list tracks and lessons
    Lessons,
    /// replay keystrokes from stdin, one `<millis> <key>` per line
    Practice {
        lesson_id: String,
        /// type this text instead of the lesson's own
        #[clap(short = 't', long)]
        text: Option<String>,
    },
    /// show stored sessions, newest first
    History {
        /// write csv instead of a table
        #[clap(long)]
        csv: bool,
        #[clap(short = 'n', long)]
        limit: Option<usize>,
    },
    /// aggregate statistics over the stored sessions
    Stats,
    /// what to practice after a lesson with the given result
    Recommend {
        track_id: String,
        lesson_id: String,
        #[clap(long)]
        stars: u8,
        #[clap(long)]
        accuracy: u32,
    },
    /// delete all stored sessions
    Clear,
}

#[derive(Serialize)]
struct HistoryRow<'a> {
    id: &'a str,
    date: String,
    lesson_id: &'a str,
    lesson_title: &'a str,
    track: &'a str,
    duration_ms: u64,
    wpm: u32,
    cpm: u32,
    accuracy: u32,
    stars: u8,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    simple_logger::SimpleLogger::new()
        .with_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .init()?;

    let config = match &cli.config {
        Some(path) => FileConfigStore::with_path(path).load(),
        None => FileConfigStore::new().load(),
    };
    let catalog = match &cli.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin()?,
    };
    let backend = match &cli.db {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_default()?,
    };
    let mut engine = TypingEngine::builder(backend, catalog).config(config).build();

    match cli.command {
        Command::Lessons => print_lessons(&engine),
        Command::Practice { lesson_id, text } => practice(&mut engine, &lesson_id, text)?,
        Command::History { csv, limit } => print_history(&engine, csv, limit)?,
        Command::Stats => print_stats(&engine),
        Command::Recommend {
            track_id,
            lesson_id,
            stars,
            accuracy,
        } => {
            let mut summary = SessionSummary::from_counts(0, 0, 0, &StarBands::default());
            summary.star_rating = stars;
            summary.accuracy = accuracy;
            let recommendation = engine.recommendation_for(&track_id, &lesson_id, &summary)?;
            println!("{}", describe(&recommendation));
        }
        Command::Clear => {
            engine.clear_history()?;
            println!("history cleared");
        }
    }

    Ok(())
}

fn print_lessons(engine: &TypingEngine<SqliteStore>) {
    let curriculum = engine.curriculum();
    for track in &engine.catalog().tracks {
        let lock = if curriculum.is_unlocked(&track.id) { "" } else { " (locked)" };
        println!("{} - {}{}", track.id, track.name, lock);
        for lesson in &track.lessons {
            let best = curriculum
                .progress(&lesson.id)
                .map(|p| format!("{}/5 stars, {} attempt(s)", p.best_stars, p.attempts))
                .unwrap_or_else(|| "not started".to_string());
            println!(
                "  {:<18} {:<28} ~{}min  {}",
                lesson.id, lesson.title, lesson.estimated_minutes, best
            );
        }
    }
}

fn practice(
    engine: &mut TypingEngine<SqliteStore>,
    lesson_id: &str,
    text: Option<String>,
) -> Result<(), Box<dyn Error>> {
    match text {
        Some(text) => engine.start_session(lesson_id, &text)?,
        None => engine.start_lesson(lesson_id)?,
    };
    let base = engine
        .active_session()
        .map(|s| s.started_at)
        .unwrap_or_else(|| engine.now_ms());

    let (tx, events) = ChannelEventSource::new();
    let reader = thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let Some(event) = parse_replay_line(&line, base) else {
                if !line.trim().is_empty() {
                    warn!("skipping replay line {line:?}");
                }
                continue;
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    });

    let runner = Runner::new(events, FixedTicker::new(Duration::from_secs(60)));
    let state = runner.run(engine, usize::MAX)?;
    // the reader may still be blocked on stdin once the text is done
    drop(runner);
    if state != RunState::Finished {
        reader.join().ok();
    }

    if engine.active_session().is_some() {
        let summary = engine.end_session(EndReason::Abandoned)?;
        println!("session abandoned, nothing saved");
        print_summary(&summary);
        return Ok(());
    }

    if let Some(summary) = engine.last_summary() {
        print_summary(summary);
    }
    if let Some(recommendation) = engine.last_recommendation() {
        println!("next: {}", describe(recommendation));
    }
    Ok(())
}

fn parse_replay_line(line: &str, base: i64) -> Option<EngineEvent> {
    let (millis, key) = line.split_once(' ')?;
    let offset: i64 = millis.trim().parse().ok()?;
    if key.is_empty() {
        return None;
    }
    Some(EngineEvent::Key {
        key: key.to_string(),
        timestamp: base + offset,
    })
}

fn print_summary(summary: &SessionSummary) {
    println!(
        "{} wpm / {} cpm / {}% accuracy / {} star(s) in {:.1}s",
        summary.wpm,
        summary.cpm,
        summary.accuracy,
        summary.star_rating,
        summary.duration_ms as f64 / 1000.0
    );
    println!(
        "correct {} / errors {} / longest streak {}",
        summary.correct_count, summary.error_count, summary.streak
    );
    if let Some(burst) = summary.burst_speed {
        println!("burst speed {burst} wpm");
    }
    if let Some(h) = &summary.hesitation_stats {
        println!(
            "mean key latency {:.0}ms (sd {:.0}ms), {} pause(s)",
            h.mean_latency_ms, h.std_dev_latency_ms, h.pauses
        );
    }
}

fn describe(recommendation: &Recommendation) -> String {
    match recommendation {
        Recommendation::Remediate(id) => format!("repeat {id}"),
        Recommendation::Advance(id) => format!("continue with {id}"),
        Recommendation::CourseComplete => "course complete".to_string(),
    }
}

fn print_history(
    engine: &TypingEngine<SqliteStore>,
    csv: bool,
    limit: Option<usize>,
) -> Result<(), Box<dyn Error>> {
    let records = engine.history();
    let shown = &records[..limit.unwrap_or(records.len()).min(records.len())];
    let now = engine.now_ms();

    if csv {
        let mut wtr = csv::Writer::from_writer(io::stdout());
        for r in shown {
            wtr.serialize(HistoryRow {
                id: &r.id,
                date: format_date(r.timestamp),
                lesson_id: &r.lesson_id,
                lesson_title: &r.lesson_title,
                track: r.track_id.as_deref().unwrap_or(""),
                duration_ms: r.summary.duration_ms,
                wpm: r.summary.wpm,
                cpm: r.summary.cpm,
                accuracy: r.summary.accuracy,
                stars: r.summary.star_rating,
            })?;
        }
        wtr.flush()?;
        return Ok(());
    }

    if shown.is_empty() {
        println!("no sessions yet");
    }
    for r in shown {
        let ago = HumanTime::from_seconds(-((now - r.timestamp).max(0) / 1000));
        println!(
            "{:<20} {:<28} {:>4} wpm {:>4}% {}*  {}",
            ago.to_string(),
            r.lesson_title,
            r.summary.wpm,
            r.summary.accuracy,
            r.summary.star_rating,
            format_date(r.timestamp)
        );
    }
    Ok(())
}

fn print_stats(engine: &TypingEngine<SqliteStore>) {
    let Some(snapshot) = engine.get_analytics() else {
        println!("no data yet");
        return;
    };
    println!(
        "{} session(s), {:.1} min total, {} in the last {} day(s)",
        snapshot.total_sessions,
        snapshot.total_duration_ms as f64 / 60_000.0,
        snapshot.sessions_in_window,
        snapshot.window_days
    );
    println!(
        "average {} wpm / {}%, best {} wpm / {}%",
        snapshot.average_wpm, snapshot.average_accuracy, snapshot.best_wpm, snapshot.best_accuracy
    );
    let stars = snapshot
        .star_counts
        .iter()
        .enumerate()
        .map(|(n, count)| format!("{n}*:{count}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!("stars {stars}");
    for lesson in &snapshot.lessons {
        println!(
            "  {:<28} {:>3} attempt(s) {:>4} wpm {:>4}% best {}*",
            lesson.lesson_title,
            lesson.attempts,
            lesson.average_wpm,
            lesson.average_accuracy,
            lesson.best_stars
        );
    }
}

fn format_date(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}
