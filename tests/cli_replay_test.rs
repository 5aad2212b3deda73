//! End-to-end tests of the replay command.

mod common;

use common::*;
use redtrace_lib::cli::{replay, replay_file, ReplayQuery};
use redtrace_lib::core::{Config, KeyValue};
use std::io::Write;

fn jsonl(spans: &[redtrace_lib::core::Span]) -> String {
    spans
        .iter()
        .map(|span| serde_json::to_string(span).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn test_replay_lists_catalog() {
    let spans = vec![
        TestSpanBuilder::new(1, 0).as_root().service("frontend").operation("GET /").build(),
        TestSpanBuilder::new(1, 1).service("cart").operation("add item").build(),
        TestSpanBuilder::new(2, 0).as_root().service("frontend").operation("GET /").build(),
    ];

    let output = replay(&Config::default(), &spans, &ReplayQuery::default()).await.unwrap();
    let services = output["services"].as_object().unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(services["frontend"].as_array().unwrap().len(), 1);
    assert_eq!(services["cart"][0]["name"], "add item");
}

#[tokio::test]
async fn test_replay_file_finds_traces() {
    let spans = vec![
        TestSpanBuilder::new(1, 0).as_root().service("frontend").build(),
        TestSpanBuilder::new(1, 1)
            .service("frontend")
            .tag(KeyValue::bool("error", true))
            .build(),
        TestSpanBuilder::new(2, 0).as_root().service("backend").build(),
    ];
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}", jsonl(&spans)).unwrap();
    writeln!(file, "this line is not a span").unwrap();

    let query = ReplayQuery {
        service: Some("frontend".to_string()),
        operation: None,
        limit: 10,
    };
    let output = replay_file(&Config::default(), file.path(), &query).await.unwrap();

    let traces = output.as_array().unwrap();
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0]["spans"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_replay_missing_file() {
    let result = replay_file(
        &Config::default(),
        std::path::Path::new("/nonexistent/spans.jsonl"),
        &ReplayQuery::default(),
    )
    .await;
    assert!(result.is_err());
}
