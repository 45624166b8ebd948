// tests/output_tests.rs
mod common;

use common::*;
use pipeflow::{NameValue, Output};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

#[test]
fn test_list_returns_entries_in_append_order() {
  setup_tracing();
  let output = Output::new();
  assert!(output.is_empty());

  output.append(vec![NameValue::new("a", json!(1))]);
  output.append(vec![NameValue::new("b", json!(2)), NameValue::new("c", json!(3))]);

  let names: Vec<String> = output.list().into_iter().map(|nv| nv.name).collect();
  assert_eq!(names, vec!["a", "b", "c"]);
  assert_eq!(output.len(), 3);
}

#[test]
fn test_list_is_a_snapshot() {
  setup_tracing();
  let output = Output::new();
  output.append(vec![NameValue::new("a", json!(1))]);
  let snapshot = output.list();
  output.append(vec![NameValue::new("b", json!(2))]);

  assert_eq!(snapshot.len(), 1);
  assert_eq!(output.list().len(), 2);
}

#[test]
fn test_find_matches_name_and_all_requested_tags() {
  setup_tracing();
  let output = Output::new();
  output.append(vec![
    NameValue::new("user", json!({"id": 1})).with_tags(["created", "primary"]),
    NameValue::new("user", json!({"id": 2})).with_tags(["created"]),
    NameValue::new("user", json!({"id": 3})),
    NameValue::new("account", json!({"id": 4})).with_tags(["created", "primary"]),
  ]);

  assert_eq!(output.find("user", &[]).len(), 3);
  assert_eq!(output.find("user", &["created"]).len(), 2);

  let primary = output.find("user", &["primary", "created"]);
  assert_eq!(primary.len(), 1);
  assert_eq!(primary[0].value, json!({"id": 1}));

  assert!(output.find("user", &["archived"]).is_empty());
  assert!(output.find("users", &[]).is_empty());
}

#[test]
fn test_duplicate_requested_tags_count_once() {
  let entry = NameValue::new("x", json!(null)).with_tags(["t"]);
  assert!(entry.has_tags(&["t", "t"]));
  assert!(!entry.has_tags(&["t", "u"]));
}

#[test]
fn test_concurrent_appends_lose_nothing() {
  setup_tracing();
  const WRITERS: usize = 8;
  const PER_WRITER: usize = 250;

  let output = Arc::new(Output::new());
  std::thread::scope(|scope| {
    for writer in 0..WRITERS {
      let output = Arc::clone(&output);
      scope.spawn(move || {
        for i in 0..PER_WRITER {
          output.append(vec![NameValue::new(format!("w{}", writer), json!(i))]);
        }
      });
    }
  });

  let entries = output.list();
  assert_eq!(entries.len(), WRITERS * PER_WRITER);

  let unique: HashSet<(String, i64)> = entries
    .iter()
    .map(|nv| (nv.name.clone(), nv.value.as_i64().unwrap()))
    .collect();
  assert_eq!(unique.len(), WRITERS * PER_WRITER);

  // Each writer's own entries keep their relative order.
  for writer in 0..WRITERS {
    let values: Vec<i64> = output
      .find(&format!("w{}", writer), &[])
      .iter()
      .map(|nv| nv.value.as_i64().unwrap())
      .collect();
    assert_eq!(values, (0..PER_WRITER as i64).collect::<Vec<_>>());
  }
}

#[test]
fn test_name_value_serializes_without_empty_tags() {
  let plain = serde_json::to_value(NameValue::new("n", json!(1))).unwrap();
  assert_eq!(plain, json!({"name": "n", "value": 1}));

  let tagged = serde_json::to_value(NameValue::new("n", json!(1)).with_tags(["a"])).unwrap();
  assert_eq!(tagged, json!({"name": "n", "value": 1, "tags": ["a"]}));
}
