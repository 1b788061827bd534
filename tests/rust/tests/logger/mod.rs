//! Logger facade integration tests
//!
//! File output through the standard sinks, runtime level changes under
//! concurrent use and the process-wide default logger.

use axum::response::Response;
use axum::routing::get;
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use tests::http::{body_json, get as get_uri};
use tests::{file_records, memory_logger, LogLine};
use xylitol_core::{
    default_logger, set_default_logger, Field, Fields, Level, Logger, LoggerConfig,
    LoggerError, MemorySinks, RotationPolicy,
};
use xylitol_web::Reply;

fn file_config(dir: &TempDir, level: &str) -> LoggerConfig {
    LoggerConfig {
        level: level.to_string(),
        file: dir.path().join("logs").join("run.log"),
        console_ansi: false,
        rotation: RotationPolicy::default(),
    }
}

#[test]
fn test_file_sink_receives_lines_at_or_above_level() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir, "INFO");
    let logger = Logger::from_config(&config);

    logger.debug("not written", Fields::new());
    logger.info("service started", Field::uint("port", 8080));
    logger.error("dependency down", Field::str("dependency", "db"));
    // Dropping the logger flushes the background file writer.
    drop(logger);

    let contents = std::fs::read_to_string(&config.file).unwrap();
    let records: Vec<LogLine> = contents.lines().filter_map(LogLine::parse).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].level, "INFO");
    assert_eq!(records[0].message, "service started");
    assert_eq!(records[0].fields, json!({"port": 8080}));
    assert!(records[0].caller.contains("logger/mod.rs:"));
    assert_eq!(records[1].level, "ERROR");
    assert!(!contents.contains("not written"));
    assert!(!contents.contains('\u{1b}'));
}

#[test]
fn test_level_change_reopens_same_file() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir, "error");
    let logger = Logger::from_config(&config);

    logger.info("before", Fields::new());
    logger.set_log_level("debug");
    logger.debug("after", Fields::new());
    drop(logger);

    let contents = std::fs::read_to_string(&config.file).unwrap();
    assert!(!contents.contains("before"));
    assert!(contents.contains("\tafter"));
}

#[test]
fn test_strict_level_rejects_typos() {
    let err = Logger::try_new("verbose", "tmp/never.log").unwrap_err();
    assert!(matches!(err, LoggerError::InvalidLevel(ref name) if name == "verbose"));

    let config = LoggerConfig {
        level: "wrn".to_string(),
        ..LoggerConfig::default()
    };
    assert!(config.validate().is_err());
    assert_eq!(config.resolved_level(), Level::Info);
}

#[test]
fn test_level_changes_under_concurrent_logging() {
    let (logger, sinks) = memory_logger(Level::Debug);

    let writers: Vec<_> = (0..4)
        .map(|worker| {
            let logger = logger.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    logger.warn("tick", [Field::int("worker", worker), Field::int("i", i)]);
                }
            })
        })
        .collect();

    for round in 0..50 {
        let level = if round % 2 == 0 { "error" } else { "debug" };
        logger.set_log_level(level);
    }
    for writer in writers {
        writer.join().unwrap();
    }

    // Lines may be filtered while the level is `error`, but none are torn.
    let lines = sinks.file_lines();
    assert!(lines.len() <= 800);
    for line in &lines {
        let record = LogLine::parse(line).unwrap();
        assert_eq!(record.level, "WARN");
        assert_eq!(record.message, "tick");
    }
}

async fn fallback(reply: Reply) -> Response {
    reply.ok(json!(null), "from default")
}

/// The only test in this binary that touches the process-wide logger.
#[tokio::test]
async fn test_default_logger_replacement() {
    let sinks = MemorySinks::new();
    let replacement = Logger::with_sinks(Level::Info, "tmp/default.log", sinks.clone());
    let previous = set_default_logger(replacement);
    assert_eq!(previous.level(), Level::Debug);
    assert_eq!(default_logger().level(), Level::Info);

    default_logger().info("via default", Fields::new());

    // No request logging layer: the reply falls back to the default logger.
    let app = Router::new().route("/fallback", get(fallback));
    let body = body_json(get_uri(app, "/fallback").await).await;
    assert_eq!(body["msg"], json!("from default"));

    let records = file_records(&sinks);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].message, "via default");
    assert_eq!(records[1].message, "[Return]/fallback");

    let restored: Arc<Logger> = set_default_logger(previous);
    assert_eq!(restored.level(), Level::Info);
}
