// tests/params_config_tests.rs
mod common;

use common::*;
use pipeflow::{Config, FlowError, Params};
use serde_json::json;
use std::time::Duration;

#[test]
fn test_params_typed_accessors_round_trip() {
  setup_tracing();
  let params = Params::new()
    .with("name", "alice".to_string())
    .with("quota", 42i64)
    .with("timeout", Duration::from_secs(3));

  assert_eq!(params.string("name"), "alice");
  assert_eq!(params.int64("quota"), 42);
  assert_eq!(params.duration("timeout"), Duration::from_secs(3));
  assert_eq!(params.len(), 3);
}

#[test]
fn test_params_zero_value_on_miss_or_mismatch() {
  setup_tracing();
  let params = Params::new()
    .with("name", "alice".to_string())
    .with("quota", 42i64)
    .with("small", 7i32);

  // never set
  assert_eq!(params.string("absent"), "");
  assert_eq!(params.int64("absent"), 0);
  assert_eq!(params.duration("absent"), Duration::ZERO);
  assert!(!params.boolean("absent"));

  // different type
  assert_eq!(params.int64("name"), 0);
  assert_eq!(params.string("quota"), "");
  assert_eq!(params.duration("quota"), Duration::ZERO);
  assert_eq!(params.int64("small"), 0);
  assert_eq!(params.int32("small"), 7);
  assert_eq!(params.float64("quota"), 0.0);
}

#[test]
fn test_params_presence_and_raw_values() {
  let params = Params::new().with("flag", true).with("ratio", 0.5f64).with("label", "static");

  assert!(params.exist("flag"));
  assert!(!params.exist("nope"));
  assert!(params.boolean("flag"));
  assert_eq!(params.float64("ratio"), 0.5);
  assert_eq!(params.string("label"), "static");
  assert!(params.val("flag").is_some());
  assert!(params.val("nope").is_none());
  assert!(Params::new().is_empty());
}

#[test]
fn test_params_int_reads_unsuffixed_literals() {
  let params = Params::new()
    .with("literal", 5)
    .with("wide", 7i64)
    .with("native", 9isize)
    .with("text", "5".to_string());

  assert_eq!(params.int("literal"), 5);
  assert_eq!(params.int("wide"), 7);
  assert_eq!(params.int("native"), 9);
  assert_eq!(params.int("text"), 0);
  assert_eq!(params.int("absent"), 0);
  // the width-specific accessors stay strict
  assert_eq!(params.int64("literal"), 0);
  assert_eq!(params.int32("literal"), 5);
}

#[test]
fn test_config_typed_getters_with_defaults() {
  setup_tracing();
  let conf = Config::from_json_str(
    r#"{
      "name": "mailer",
      "retries": 3,
      "ratio": 0.25,
      "enabled": true,
      "timeout": "250ms",
      "backoff": 1500,
      "hosts": ["a", "b", 7],
      "nested": { "inner": { "value": "deep" } }
    }"#,
  )
  .unwrap();

  assert_eq!(conf.get_string("name", "x"), "mailer");
  assert_eq!(conf.get_string("missing", "x"), "x");
  assert_eq!(conf.get_string("retries", "x"), "x");
  assert_eq!(conf.get_i64("retries", 0), 3);
  assert_eq!(conf.get_f64("ratio", 0.0), 0.25);
  assert!(conf.get_bool("enabled", false));
  assert!(conf.get_bool("missing", true));
  assert_eq!(conf.get_duration("timeout", Duration::ZERO), Duration::from_millis(250));
  assert_eq!(conf.get_duration("backoff", Duration::ZERO), Duration::from_millis(1500));
  assert_eq!(conf.get_duration("name", Duration::from_secs(1)), Duration::from_secs(1));
  assert_eq!(conf.get_string_list("hosts"), vec!["a", "b"]);
  assert_eq!(conf.get_string("nested.inner.value", ""), "deep");
  assert_eq!(conf.get_config("nested").get_string("inner.value", ""), "deep");
  assert!(conf.get_config("name").is_empty());
}

#[test]
fn test_config_duration_units() {
  let conf = Config::new()
    .set("a", "2s")
    .set("b", "5m")
    .set("c", "1h")
    .set("d", "soon");
  assert_eq!(conf.get_duration("a", Duration::ZERO), Duration::from_secs(2));
  assert_eq!(conf.get_duration("b", Duration::ZERO), Duration::from_secs(300));
  assert_eq!(conf.get_duration("c", Duration::ZERO), Duration::from_secs(3600));
  assert_eq!(conf.get_duration("d", Duration::from_millis(9)), Duration::from_millis(9));
}

#[test]
fn test_config_fallback_layers_recursively() {
  setup_tracing();
  let defaults = Config::from_value(json!({
    "singleton": true,
    "table": "users",
    "pool": { "size": 4, "timeout": "1s" }
  }));
  let step = Config::from_value(json!({
    "singleton": false,
    "pool": { "size": 16 }
  }));

  let effective = step.with_fallback(&defaults);
  assert!(!effective.get_bool("singleton", true));
  assert_eq!(effective.get_string("table", ""), "users");
  assert_eq!(effective.get_i64("pool.size", 0), 16);
  assert_eq!(effective.get_duration("pool.timeout", Duration::ZERO), Duration::from_secs(1));

  // Neither side is modified.
  assert!(!step.has("table"));
  assert_eq!(defaults.get_i64("pool.size", 0), 4);
}

#[test]
fn test_config_set_builds_nested_paths() {
  let conf = Config::new().set("runner.options.P.singleton", false).set("runner.name", "PipeTaskRunner");
  assert!(!conf.get_bool("runner.options.P.singleton", true));
  assert_eq!(conf.get_string("runner.name", ""), "PipeTaskRunner");
  assert_eq!(conf.keys(), vec!["runner"]);
}

#[test]
fn test_config_set_replaces_scalar_on_the_path() {
  let conf = Config::new().set("pool", 4).set("pool.size", 8).set("pool.name", "main");
  assert_eq!(conf.get_i64("pool.size", 0), 8);
  assert_eq!(conf.get_string("pool.name", ""), "main");
  assert_eq!(conf.get_config("pool").keys().len(), 2);
}

#[test]
fn test_config_child_does_not_split_dots() {
  let conf = Config::from_value(json!({ "mail.send": { "singleton": false } }));
  assert!(!conf.child("mail.send").get_bool("singleton", true));
  assert!(conf.get_config("mail.send").is_empty());
}

#[test]
fn test_config_from_json_str_rejects_bad_input() {
  assert!(matches!(Config::from_json_str("{ not json"), Err(FlowError::Config { .. })));
  match Config::from_json_str("[1, 2]") {
    Err(FlowError::Config { message, .. }) => assert!(message.contains("an array")),
    other => panic!("Expected Config error, got {:?}", other),
  }
  assert!(Config::from_value(json!(5)).is_empty());
}
