use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use studyplan::config::{EngineConfig, ServerConfig};
use studyplan::store::{CsvStore, StudyStore};
use studyplan::{review, schedule, service};

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: studyplan <command> [args...]");
        eprintln!("Commands:");
        eprintln!("  plan <data-dir> <user>               Show today's study schedule");
        eprintln!("  review <data-dir> <user> <topic-id>  Mark a topic as reviewed");
        eprintln!("  serve [data-dir] [-p PORT]           Start the HTTP API");
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "plan" => {
            if args.len() < 4 {
                eprintln!("Usage: studyplan plan <data-dir> <user>");
                std::process::exit(1);
            }
            plan(&PathBuf::from(&args[2]), &args[3])
        }
        "review" => {
            if args.len() < 5 {
                eprintln!("Usage: studyplan review <data-dir> <user> <topic-id>");
                std::process::exit(1);
            }
            review_topic(&PathBuf::from(&args[2]), &args[3], &args[4])
        }
        "serve" => serve(&args[2..]),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            eprintln!("Commands: plan, review, serve");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn parse_serve_args(args: &[String], mut config: ServerConfig) -> ServerConfig {
    let mut i = 0;
    while i < args.len() {
        if args[i] == "-p" && i + 1 < args.len() {
            config.port = args[i + 1].parse().unwrap_or_else(|_| {
                eprintln!("Invalid port: {}", args[i + 1]);
                std::process::exit(1);
            });
            i += 2;
        } else {
            config.data_dir = PathBuf::from(&args[i]);
            i += 1;
        }
    }
    config
}

fn serve(args: &[String]) -> CliResult {
    let config = parse_serve_args(args, ServerConfig::from_env()?);
    let engine = EngineConfig::load(&config.data_dir)?;
    let store = CsvStore::open(&config.data_dir)?;
    let addr = config.addr()?;
    tokio::runtime::Runtime::new()?.block_on(studyplan::web::serve(store, engine, addr))?;
    Ok(())
}

fn plan(dir: &Path, user: &str) -> CliResult {
    let engine = EngineConfig::load(dir)?;
    let store = CsvStore::open(dir)?;
    let now = Utc::now();

    let subjects = store.subjects(user)?;
    let topics = store.topics(user)?;
    let prefs = service::preferences_for(&store, user)?;
    let plan = schedule::generate(&subjects, &topics, &prefs, now, &engine);

    let subject_names: HashMap<&str, &str> = subjects
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect();
    let topic_names: HashMap<&str, &str> = topics
        .iter()
        .map(|t| (t.id.as_str(), t.name.as_str()))
        .collect();

    println!("Subjects:");
    for s in review::subject_summaries(&subjects, &topics, now) {
        println!("  {} ({} due / {} total)", s.name, s.due, s.total);
    }
    println!();

    if plan.entries.is_empty() {
        println!("Nothing to study right now.");
    } else {
        println!(
            "Today's plan ({} of {} minutes):",
            plan.total_minutes(),
            prefs.daily_study_goal_minutes
        );
        for (i, entry) in plan.entries.iter().enumerate() {
            println!(
                "  {}. {} [{}]  {} min  {}  (score {:.2})  {}",
                i + 1,
                topic_names.get(entry.topic_id.as_str()).unwrap_or(&"?"),
                subject_names.get(entry.subject_id.as_str()).unwrap_or(&"?"),
                entry.allocated_minutes,
                entry.due_reason.as_str(),
                entry.priority_score,
                entry.topic_id,
            );
        }
    }

    if !plan.issues.is_empty() {
        println!();
        println!("Skipped:");
        for issue in &plan.issues {
            println!("  {issue}");
        }
    }
    Ok(())
}

fn review_topic(dir: &Path, user: &str, topic_id: &str) -> CliResult {
    let engine = EngineConfig::load(dir)?;
    let mut store = CsvStore::open(dir)?;
    let topic = service::review_topic(&mut store, user, topic_id, &engine, Utc::now())?;
    println!(
        "Reviewed {} ({} reviews, {}). Next review {}.",
        topic.name,
        topic.review_count,
        topic.status.as_str(),
        topic.next_due_at.format("%Y-%m-%d"),
    );
    Ok(())
}
