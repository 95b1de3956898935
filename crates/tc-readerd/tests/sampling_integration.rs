//! Sampling integration tests
//!
//! Feeds captured tc listings through the sampler and checks the tree it
//! builds, leaf by leaf.

use std::collections::HashMap;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tc_reader_common::{CommandExecutor, FixtureExecutor, TcReaderError};
use tc_reader_test::{TcScenario, ALL_SCENARIOS, CUSTOM, DEFAULT_QDISC, LARGE_VALUES};
use tc_readerd::*;

// ============================================================================
// HELPERS
// ============================================================================

fn oid(suffix: &str) -> String {
    format!("{}{}", ROOT_OID, suffix)
}

fn scenario_executor(scenarios: &[TcScenario]) -> Arc<FixtureExecutor> {
    let executor = FixtureExecutor::new();
    for scenario in scenarios {
        executor.push_output(scenario.qdisc_output);
        executor.push_output(scenario.class_output);
    }
    Arc::new(executor)
}

fn config_with_users(users: &[(&str, &str, &str)]) -> Arc<TcReaderConfig> {
    Arc::new(TcReaderConfig {
        users: users
            .iter()
            .map(|(name, upload, download)| UserConfig {
                name: name.to_string(),
                upload_class: upload.to_string(),
                download_class: download.to_string(),
            })
            .collect(),
        ..TcReaderConfig::default()
    })
}

async fn sample_once(
    config: Arc<TcReaderConfig>,
    executor: &Arc<FixtureExecutor>,
) -> (SharedNamespace, Result<usize, TcReaderError>) {
    let namespace = SharedNamespace::new();
    let executor: Arc<dyn CommandExecutor> = executor.clone();
    let sampler = Sampler::new(config, executor, namespace.clone()).unwrap();
    let result = sampler.run_cycle().await;
    (namespace, result)
}

fn counter(ns: &Namespace, key: &str) -> Option<u64> {
    match ns.get(key)?.value {
        EntryValue::Counter(value) => Some(value),
        _ => None,
    }
}

// ============================================================================
// PARSER AGAINST CAPTURED OUTPUT
// ============================================================================

#[test]
fn test_parser_matches_every_scenario() {
    let users = HashMap::new();
    for scenario in ALL_SCENARIOS {
        let mut samples: Vec<Sample> = Vec::new();
        parse_output(
            scenario.qdisc_output,
            scenario.iface,
            StatsKind::Qdisc,
            &users,
            &mut samples,
        )
        .unwrap();
        parse_output(
            scenario.class_output,
            scenario.iface,
            StatsKind::Class,
            &users,
            &mut samples,
        )
        .unwrap();

        let expected: Vec<Sample> = scenario
            .expected
            .iter()
            .map(|e| {
                Sample::new(
                    e.name,
                    e.sent_bytes,
                    e.sent_packets,
                    e.dropped_packets,
                    e.over_limit_packets,
                )
            })
            .collect();
        assert_eq!(samples, expected, "{}", scenario.description);
    }
}

#[test]
fn test_parser_with_users_interleaves_user_samples() {
    let mut users = HashMap::new();
    users.insert(
        "eth0:4:1".to_string(),
        UserClass::new(Direction::Upload, "username"),
    );
    users.insert(
        "eth0:4:10".to_string(),
        UserClass::new(Direction::Download, "username"),
    );

    let mut samples: Vec<Sample> = Vec::new();
    parse_output(
        CUSTOM.class_output,
        "eth0",
        StatsKind::Class,
        &users,
        &mut samples,
    )
    .unwrap();

    let names: Vec<(&str, Option<Direction>)> = samples
        .iter()
        .map(|s| (s.name.as_str(), s.user_class.as_ref().map(|u| u.direction)))
        .collect();
    assert_eq!(
        names,
        vec![
            ("eth0:2:1", None),
            ("eth0:2:2", None),
            ("eth0:4:1", None),
            ("eth0:4:1", Some(Direction::Upload)),
            ("eth0:4:10", None),
            ("eth0:4:10", Some(Direction::Download)),
            ("eth0:4:110", None),
        ]
    );
}

// ============================================================================
// FULL CYCLE
// ============================================================================

#[tokio::test]
async fn test_custom_scenario_tree() {
    let executor = scenario_executor(&[CUSTOM]);
    let (namespace, result) = sample_once(Arc::new(TcReaderConfig::default()), &executor).await;
    assert_eq!(result.unwrap(), CUSTOM.expected.len());

    let ns = namespace.lock().await;
    assert_eq!(
        ns.get(&oid(".2")),
        Some(&Entry::integer(oid(".2"), CUSTOM.expected.len() as i64))
    );

    for (i, expected) in CUSTOM.expected.iter().enumerate() {
        let index = i + 1;
        assert_eq!(ns.name_index(expected.name), Some(index as u32));
        assert_eq!(
            ns.get(&oid(&format!(".3.{}", index))),
            Some(&Entry::string(oid(&format!(".3.{}", index)), expected.name))
        );
        for (leaf, value) in [4, 5, 6, 7].iter().zip(expected.counters()) {
            assert_eq!(
                counter(&ns, &oid(&format!(".{}.{}", leaf, index))),
                Some(value),
                "{} leaf {}",
                expected.name,
                leaf
            );
        }
    }

    // No users configured: the user leaves hold only their names.
    assert!(ns.get(&oid(".9")).is_none());
    assert!(ns.get(&oid(".8.1")).is_none());
    assert!(ns.get(&oid(".8")).is_some());
}

#[tokio::test]
async fn test_user_tree_from_config() {
    let executor = scenario_executor(&[CUSTOM]);
    let config = config_with_users(&[("username", "eth0:4:1", "eth0:4:10")]);
    let (namespace, result) = sample_once(config, &executor).await;
    assert_eq!(result.unwrap(), CUSTOM.expected.len() + 2);

    let ns = namespace.lock().await;
    assert_eq!(ns.get(&oid(".9")), Some(&Entry::integer(oid(".9"), 1)));
    assert_eq!(
        ns.get(&oid(".10.1")),
        Some(&Entry::string(oid(".10.1"), "username"))
    );

    let upload = CUSTOM.expected("eth0:4:1").unwrap();
    let download = CUSTOM.expected("eth0:4:10").unwrap();
    for (i, value) in upload.counters().into_iter().enumerate() {
        assert_eq!(counter(&ns, &oid(&format!(".{}.1", 15 + i))), Some(value));
    }
    for (i, value) in download.counters().into_iter().enumerate() {
        assert_eq!(counter(&ns, &oid(&format!(".{}.1", 11 + i))), Some(value));
    }
}

#[tokio::test]
async fn test_two_users_get_separate_indexes() {
    let executor = scenario_executor(&[CUSTOM]);
    let config = config_with_users(&[
        ("alice", "eth0:2:1", "eth0:2:2"),
        ("bob", "eth0:4:10", "eth0:4:110"),
    ]);
    let (namespace, result) = sample_once(config, &executor).await;
    result.unwrap();

    let ns = namespace.lock().await;
    assert_eq!(ns.user_index("alice"), Some(1));
    assert_eq!(ns.user_index("bob"), Some(2));
    assert_eq!(ns.get(&oid(".9")), Some(&Entry::integer(oid(".9"), 2)));
    assert_eq!(counter(&ns, &oid(".15.2")), Some(1096857));
    assert_eq!(counter(&ns, &oid(".11.2")), Some(256));
}

#[tokio::test]
async fn test_large_values_stored_at_full_width() {
    let executor = scenario_executor(&[LARGE_VALUES]);
    let (namespace, result) = sample_once(Arc::new(TcReaderConfig::default()), &executor).await;
    result.unwrap();

    let ns = namespace.lock().await;
    assert_eq!(counter(&ns, &oid(".4.1")), Some(4791659924490));
    assert_eq!(counter(&ns, &oid(".7.2")), Some(4791659924498));

    let entry = ns.get(&oid(".4.1")).unwrap();
    assert_eq!(
        entry.formatted_value(),
        Some((4791659924490u64 % COUNTER_MODULUS).to_string())
    );
}

#[tokio::test]
async fn test_multiple_interfaces() {
    let executor = scenario_executor(&[DEFAULT_QDISC, CUSTOM]);
    let config = Arc::new(TcReaderConfig {
        ifaces: vec!["eth1".to_string(), "eth0".to_string()],
        ..TcReaderConfig::default()
    });
    let (namespace, result) = sample_once(config, &executor).await;
    result.unwrap();

    let calls = executor.invocations();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0].args.last().map(String::as_str), Some("eth1"));
    assert_eq!(calls[1].args.last().map(String::as_str), Some("eth1"));
    assert_eq!(calls[2].args.last().map(String::as_str), Some("eth0"));

    let ns = namespace.lock().await;
    // The default qdisc listing was answered for eth1.
    assert_eq!(ns.name_index("eth1:0:0"), Some(1));
    assert_eq!(ns.name_index("eth0:1:0"), Some(2));
}

#[tokio::test]
async fn test_custom_command_templates() {
    let executor = scenario_executor(&[DEFAULT_QDISC]);
    let config = Arc::new(TcReaderConfig {
        tc_cmd_path: "/usr/local/sbin/tc".to_string(),
        tc_qdisc_stats: ["-s", "-d", "qdisc", "show", "dev"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ..TcReaderConfig::default()
    });
    let (_namespace, result) = sample_once(config, &executor).await;
    result.unwrap();

    let calls = executor.invocations();
    assert_eq!(calls[0].path, "/usr/local/sbin/tc");
    assert_eq!(calls[0].args, vec!["-s", "-d", "qdisc", "show", "dev", "eth0"]);
    assert_eq!(calls[1].args, vec!["-s", "class", "show", "dev", "eth0"]);
}

#[tokio::test]
async fn test_walk_order_after_cycle() {
    let executor = scenario_executor(&[CUSTOM]);
    let config = config_with_users(&[("username", "eth0:4:1", "eth0:4:10")]);
    let (namespace, _) = sample_once(config, &executor).await;

    let ns = namespace.lock().await;
    let keys = ns.keys();
    assert_eq!(keys.len(), ns.len());
    for pair in keys.windows(2) {
        assert_eq!(
            compare_oids(&pair[0], &pair[1]),
            std::cmp::Ordering::Less,
            "{} before {}",
            pair[0],
            pair[1]
        );
    }
    assert_eq!(keys[0], ROOT_OID);
    assert_eq!(keys.last().map(String::as_str), Some(oid(".18.1").as_str()));
}
