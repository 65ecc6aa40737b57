#![cfg(feature = "metrics")]
//! Tests for `gqlwire` metrics helpers.
//!
//! Counters and gauges are observed through
//! `metrics_util::debugging::DebuggingRecorder` installed as a thread-local
//! recorder. Sessions run on a current-thread runtime so every task records
//! into the same recorder.

use gqlwire::{
    GraphQLApp,
    Message,
    metrics::{self as gql_metrics, Direction},
    session::active_session_count,
};
use gqlwire_testing::{ScriptedEngine, spawn_app};
use metrics::{SharedString, Unit};
use metrics_util::{
    CompositeKey,
    debugging::{DebugValue, DebuggingRecorder, Snapshotter},
};
use rstest::rstest;
use serial_test::serial;

fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

type Entries = Vec<(CompositeKey, Option<Unit>, Option<SharedString>, DebugValue)>;

/// Sum the counters named `name` in one snapshot, optionally filtered by
/// direction. Taking a snapshot drains the recorder, so read it once.
fn counter_value(metrics: &Entries, name: &str, direction: Option<&str>) -> u64 {
    metrics
        .iter()
        .filter(|(key, _, _, _)| {
            key.key().name() == name
                && direction.is_none_or(|d| {
                    key.key()
                        .labels()
                        .any(|l| l.key() == "direction" && l.value() == d)
                })
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(c) => *c,
            _ => 0,
        })
        .sum()
}

fn run_local<F: Future<Output = ()>>(recorder: &DebuggingRecorder, body: F) {
    metrics::with_local_recorder(recorder, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("build runtime")
            .block_on(body);
    });
}

#[rstest]
#[case(Direction::Inbound, "inbound")]
#[case(Direction::Outbound, "outbound")]
fn message_metric_carries_direction(#[case] direction: Direction, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || gql_metrics::inc_messages(direction));
    let metrics = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_value(&metrics, gql_metrics::MESSAGES_TOTAL, Some(label)),
        1
    );
}

#[rstest]
#[case(1)]
#[case(3)]
fn error_metric_counts(#[case] expected: u64) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        (0..expected).for_each(|_| gql_metrics::inc_errors());
    });
    let metrics = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_value(&metrics, gql_metrics::ERRORS_TOTAL, None),
        expected
    );
}

#[test]
#[serial]
fn session_records_traffic_and_gauges() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    run_local(&recorder, async {
        let app = GraphQLApp::<()>::new(ScriptedEngine::number());
        let (mut client, session) = spawn_app(&app);
        client.init().await.expect("ack");
        client.send(&Message::Ping { payload: None }).expect("send ping");
        client.recv_message().await.expect("pong");
        assert_eq!(active_session_count(), 1);
        client.disconnect();
        session.await.expect("session task");
        assert_eq!(active_session_count(), 0);
    });

    let metrics = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_value(&metrics, gql_metrics::MESSAGES_TOTAL, Some("inbound")),
        2
    );
    assert_eq!(
        counter_value(&metrics, gql_metrics::MESSAGES_TOTAL, Some("outbound")),
        2
    );
    let gauge = metrics
        .iter()
        .find(|(key, _, _, _)| key.key().name() == gql_metrics::SESSIONS_ACTIVE)
        .map(|(_, _, _, value)| value);
    assert!(
        matches!(gauge, Some(DebugValue::Gauge(g)) if g.into_inner() == 0.0),
        "sessions gauge should return to zero, got {gauge:?}"
    );
}

#[test]
#[serial]
fn protocol_violations_count_as_errors() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    run_local(&recorder, async {
        let app = GraphQLApp::<()>::new(ScriptedEngine::number());
        let (mut client, session) = spawn_app(&app);
        client.send(&Message::Ping { payload: None }).expect("send ping");
        let close = client.recv_close().await.expect("close frame");
        assert_eq!(close.code, 4401);
        session.await.expect("session task");
    });
    let metrics = snapshotter.snapshot().into_vec();
    assert_eq!(counter_value(&metrics, gql_metrics::ERRORS_TOTAL, None), 1);
}
