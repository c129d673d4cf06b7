#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::path::PathBuf;
use std::time::Duration;

use vigil_core::Level;
use vigil_gateway::config::{self, Profile, SinkSpec};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
logging:
  loki:
    hots: "http://loki:3100" # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.environment, Profile::Development);
    assert_eq!(cfg.server.listen, "0.0.0.0:3000");
    assert_eq!(cfg.server.body_limit_bytes, 10 * 1024 * 1024);
    assert_eq!(cfg.metrics.buckets_ms, vec![0.1, 5.0, 15.0, 50.0, 100.0, 500.0]);
    assert!(cfg.metrics.enabled);
}

#[test]
fn unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn buckets_must_ascend() {
    let bad = r#"
version: 1
metrics:
  buckets_ms: [5, 5, 10]
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn listen_must_be_a_socket_addr() {
    let bad = r#"
version: 1
server:
  listen: "localhost"
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn loki_host_must_be_http() {
    let bad = r#"
version: 1
logging:
  loki:
    host: "loki:3100"
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn development_plan_has_console_and_both_files() {
    let cfg = config::load_from_str(
        r#"
version: 1
environment: development
logging:
  files:
    error: "var/err.log"
    combined: "var/all.log"
"#,
    )
    .unwrap();

    assert_eq!(
        cfg.sink_plan(),
        vec![
            SinkSpec::Console,
            SinkSpec::File {
                path: PathBuf::from("var/err.log"),
                min_level: Level::Error,
            },
            SinkSpec::File {
                path: PathBuf::from("var/all.log"),
                min_level: Level::Debug,
            },
        ]
    );
}

#[test]
fn production_plan_pushes_to_loki_with_labels() {
    let cfg = config::load_from_str(
        r#"
version: 1
environment: production
logging:
  loki:
    host: "http://loki.internal:3100/"
    labels:
      job: "edge"
    batch_interval_ms: 250
"#,
    )
    .unwrap();
    assert_eq!(cfg.environment.min_level(), Level::Info);

    let plan = cfg.sink_plan();
    assert_eq!(plan.len(), 2);
    let SinkSpec::Loki(target) = &plan[1] else {
        panic!("expected loki sink, got {:?}", plan[1]);
    };
    assert_eq!(target.push_url, "http://loki.internal:3100/loki/api/v1/push");
    assert_eq!(target.labels["job"], "edge");
    assert_eq!(target.labels["environment"], "production");
    assert_eq!(target.batch_interval, Duration::from_millis(250));
}

#[test]
fn production_without_host_is_console_only() {
    let cfg = config::load_from_str(
        r#"
version: 1
environment: production
logging:
  loki:
    host: null
"#,
    )
    .unwrap();
    assert_eq!(cfg.sink_plan(), vec![SinkSpec::Console]);
}

#[test]
fn test_profile_is_console_only() {
    let cfg = config::load_from_str("version: 1\nenvironment: test\n").unwrap();
    assert_eq!(cfg.sink_plan(), vec![SinkSpec::Console]);
    assert!(cfg.environment.exposes_stack());
}

#[test]
fn profile_aliases_parse() {
    assert_eq!("prod".parse::<Profile>().unwrap(), Profile::Production);
    assert_eq!("Development".parse::<Profile>().unwrap(), Profile::Development);
    assert!("staging".parse::<Profile>().is_err());
}
