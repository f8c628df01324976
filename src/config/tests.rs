//! Tests for configuration validation.

use super::*;
use crate::app::args::Args;
use clap::Parser;

fn parse(extra: &[&str]) -> Args {
    let mut argv = vec!["valkey-bench"];
    argv.extend_from_slice(extra);
    Args::try_parse_from(argv).expect("argument parsing failed")
}

fn config(extra: &[&str]) -> Result<RunConfig, ConfigError> {
    RunConfig::from_args(&parse(extra))
}

#[test]
fn defaults() {
    let cfg = config(&["--single-process"]).unwrap();
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 6379);
    assert_eq!(cfg.pool, PoolSizing::Fixed(50));
    assert_eq!(cfg.worker_count, 1);
    assert_eq!(cfg.bound, RunBound::Requests(100_000));
    assert_eq!(cfg.rate, RatePolicy::None);
    assert_eq!(cfg.key_mode, KeyMode::FixedPerWorker);
    assert_eq!(cfg.operation, Operation::Set);
    assert_eq!(cfg.value_size, 3);
    assert!(!cfg.csv_mode());
    assert_eq!(cfg.groups, 1);
}

#[test]
fn fixed_and_dynamic_rate_conflict() {
    assert_eq!(
        config(&["--qps", "100", "--start-qps", "10"]).unwrap_err(),
        ConfigError::FixedAndDynamicRate
    );
}

#[test]
fn zero_qps_rejected() {
    assert_eq!(config(&["--qps", "0"]).unwrap_err(), ConfigError::NonPositiveQps);
}

#[test]
fn linear_ramp_accepted() {
    let cfg = config(&[
        "--start-qps",
        "100",
        "--end-qps",
        "1000",
        "--qps-change-interval",
        "1",
        "--qps-change",
        "100",
    ])
    .unwrap();
    assert_eq!(
        cfg.rate,
        RatePolicy::Linear {
            start: 100,
            end: 1000,
            step: 100,
            interval: Duration::from_secs(1),
        }
    );
}

#[test]
fn linear_step_must_share_sign() {
    assert_eq!(
        config(&[
            "--start-qps",
            "1000",
            "--end-qps",
            "100",
            "--qps-change-interval",
            "1",
            "--qps-change",
            "100",
        ])
        .unwrap_err(),
        ConfigError::BadLinearStep
    );
}

#[test]
fn dynamic_rate_requires_interval() {
    assert_eq!(
        config(&["--start-qps", "100", "--end-qps", "1000"]).unwrap_err(),
        ConfigError::IncompleteDynamicRate
    );
}

#[test]
fn missing_start_qps_falls_back_to_end() {
    let cfg = config(&["--end-qps", "500", "--qps-change-interval", "1"]).unwrap();
    assert_eq!(cfg.rate, RatePolicy::Fixed(500));
}

#[test]
fn exponential_requires_explicit_factor() {
    assert_eq!(
        config(&[
            "--start-qps",
            "100",
            "--end-qps",
            "1600",
            "--qps-change-interval",
            "1",
            "--qps-ramp-mode",
            "exponential",
        ])
        .unwrap_err(),
        ConfigError::MissingRampFactor
    );
}

#[test]
fn exponential_ramp_accepted() {
    let cfg = config(&[
        "--start-qps",
        "100",
        "--end-qps",
        "1600",
        "--qps-change-interval",
        "1",
        "--qps-ramp-mode",
        "exponential",
        "--qps-ramp-factor",
        "2",
    ])
    .unwrap();
    assert_eq!(
        cfg.rate,
        RatePolicy::Exponential {
            start: 100,
            end: 1600,
            factor: 2.0,
            interval: Duration::from_secs(1),
        }
    );
}

#[test]
fn requests_and_duration_conflict() {
    assert_eq!(
        config(&["--requests", "1000", "--test-duration", "10"]).unwrap_err(),
        ConfigError::RequestsAndDuration
    );
}

#[test]
fn random_and_sequential_conflict() {
    assert_eq!(
        config(&["--random", "1000", "--sequential", "1000"]).unwrap_err(),
        ConfigError::RandomAndSequential
    );
}

#[test]
fn offset_requires_a_keyspace() {
    assert_eq!(
        config(&["--keyspace-offset", "10"]).unwrap_err(),
        ConfigError::OffsetWithoutKeyspace
    );
    let cfg = config(&["--random", "1000", "--keyspace-offset", "10"]).unwrap();
    assert_eq!(
        cfg.key_mode,
        KeyMode::Random {
            keyspace: 1000,
            offset: 10,
        }
    );
}

#[test]
fn random_start_requires_sequential() {
    assert_eq!(
        config(&["--sequential-random-start"]).unwrap_err(),
        ConfigError::RandomStartWithoutSequential
    );
    let cfg = config(&["--sequential", "64", "--sequential-random-start"]).unwrap();
    assert_eq!(
        cfg.key_mode,
        KeyMode::Sequential {
            keyspace: 64,
            offset: 0,
            random_start: true,
        }
    );
}

#[test]
fn clients_and_ramp_conflict() {
    assert_eq!(
        config(&[
            "--clients",
            "10",
            "--clients-ramp-start",
            "1",
            "--clients-ramp-end",
            "10",
            "--clients-per-ramp",
            "1",
            "--client-ramp-interval",
            "1",
        ])
        .unwrap_err(),
        ConfigError::ClientsAndRamp
    );
}

#[test]
fn ramp_options_travel_together() {
    assert_eq!(
        config(&["--clients-ramp-start", "1", "--clients-ramp-end", "10"]).unwrap_err(),
        ConfigError::IncompleteClientRamp
    );
    let cfg = config(&[
        "--clients-ramp-start",
        "1",
        "--clients-ramp-end",
        "10",
        "--clients-per-ramp",
        "1",
        "--client-ramp-interval",
        "1",
    ])
    .unwrap();
    assert_eq!(
        cfg.pool,
        PoolSizing::Ramp {
            start: 1,
            end: 10,
            per_ramp: 1,
            interval: Duration::from_secs(1),
        }
    );
}

#[test]
fn custom_without_file_rejected() {
    assert_eq!(
        config(&["--type", "custom"]).unwrap_err(),
        ConfigError::MissingCustomCommand
    );
}

#[test]
fn custom_resolves_file_stem_against_registry() {
    let cfg = config(&[
        "--type",
        "custom",
        "--custom-command-file",
        "/opt/plugins/hmget.so",
        "--custom-command-args",
        "user:1 name email",
    ])
    .unwrap();
    assert_eq!(
        cfg.operation,
        Operation::Custom {
            name: "hmget".into(),
            args: Some("user:1 name email".into()),
        }
    );
    assert!(matches!(
        config(&["--type", "custom", "--custom-command-file", "nope.so"]).unwrap_err(),
        ConfigError::UnknownCustomCommand(_)
    ));
}

#[test]
fn processes_parsing() {
    assert_eq!(config(&["--processes", "4"]).unwrap().groups, 4);
    assert_eq!(config(&["--processes", "4", "--single-process"]).unwrap().groups, 1);
    assert!(config(&["--processes", "auto"]).unwrap().groups >= 1);
    assert!(matches!(
        config(&["--processes", "many"]).unwrap_err(),
        ConfigError::BadProcesses(_)
    ));
}

#[test]
fn request_timeout_non_positive_means_unset() {
    assert_eq!(config(&["--request-timeout", "0"]).unwrap().request_timeout, None);
    assert_eq!(config(&["--request-timeout", "-5"]).unwrap().request_timeout, None);
    assert_eq!(
        config(&["--request-timeout", "250"]).unwrap().request_timeout,
        Some(Duration::from_millis(250))
    );
}

#[test]
fn group_plans_partition_budget_and_rate() {
    let cfg = config(&["--processes", "4", "--requests", "402", "--qps", "1000", "--threads", "2"]).unwrap();
    let plans = cfg.group_plans();
    assert_eq!(plans.len(), 4);
    assert_eq!(
        plans.iter().map(|p| p.budget.unwrap()).sum::<u64>(),
        402
    );
    assert_eq!(plans[0].budget, Some(101));
    assert_eq!(plans[3].budget, Some(100));
    assert_eq!(plans[0].first_worker_id, 0);
    assert_eq!(plans[1].first_worker_id, 2);
    for plan in &plans {
        assert_eq!(plan.rate, RatePolicy::Fixed(250));
    }
}

#[test]
fn rate_divide_keeps_step_sign_and_floor() {
    let policy = RatePolicy::Linear {
        start: 8,
        end: 2,
        step: -2,
        interval: Duration::from_secs(1),
    };
    assert_eq!(
        policy.divide(4),
        RatePolicy::Linear {
            start: 2,
            end: 1,
            step: -1,
            interval: Duration::from_secs(1),
        }
    );
}
