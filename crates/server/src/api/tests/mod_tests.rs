use super::*;

use shared::{domain::ReadingRecord, fixture::ResultsFixture};
use tokio::time::{sleep, Instant};

use crate::config::Settings;

fn wells(names: &[&str]) -> Vec<WellId> {
    names.iter().map(|name| name.parse().expect("well")).collect()
}

fn fixture() -> ResultsFixture {
    let records = ["A1", "A2", "A3", "A4"]
        .iter()
        .flat_map(|well| {
            ["A", "B"].iter().map(move |analyte| ReadingRecord {
                well: well.parse().expect("well"),
                analyte: analyte.to_string(),
                reading: 1.5,
            })
        })
        .collect();
    ResultsFixture::new(records)
}

fn setup(settings: Settings) -> AppState {
    AppState::new(fixture(), &settings).expect("state")
}

fn timing(read_interval_ms: u64, cancel_delay_ms: u64, eject_delay_ms: u64) -> Settings {
    Settings {
        run_delay_ms: 0,
        read_interval_ms,
        cancel_delay_ms,
        eject_delay_ms,
        ..Settings::default()
    }
}

#[test]
fn parse_wells_rejects_malformed_entries() {
    assert_eq!(
        parse_wells(br#"["a1","H12"]"#).expect("valid"),
        wells(&["A1", "H12"])
    );

    let bodies: [&[u8]; 5] = [br#"["A1","Z1"]"#, b"{}", b"\"A1\"", b"[1,2]", b"not json"];
    for body in bodies {
        let err = parse_wells(body).expect_err("must fail");
        assert_eq!(err.code, ErrorCode::Validation);
    }
}

#[tokio::test(start_paused = true)]
async fn results_follow_live_read_progress() {
    let state = setup(timing(100, 5_000, 5_000));

    let ack = start_run(&state, wells(&["A1", "A2"])).await.expect("run");
    assert_eq!(ack.pending, wells(&["A1", "A2"]));

    sleep(Duration::from_millis(50)).await;
    let early = collect_results(&state, wells(&["A1", "A2"])).await;
    assert_eq!(early.pending, wells(&["A1", "A2"]));
    assert!(early.results.is_empty());

    sleep(Duration::from_millis(100)).await;
    let later = collect_results(&state, wells(&["A1", "A2"])).await;
    assert_eq!(later.pending, wells(&["A2"]));
    assert_eq!(later.results.len(), 1);
    assert_eq!(later.results[0].well, wells(&["A1"])[0]);
    assert_eq!(later.results[0].data.len(), 2);

}

#[tokio::test(start_paused = true)]
async fn results_only_report_wells_the_client_still_has_pending() {
    let state = setup(timing(100, 5_000, 5_000));
    start_run(&state, wells(&["A1", "A2", "A3"])).await.expect("run");

    sleep(Duration::from_millis(250)).await;
    let response = collect_results(&state, wells(&["A2", "A3"])).await;
    assert_eq!(response.delivered_wells(), wells(&["A2"]));
    assert_eq!(response.pending, wells(&["A3"]));
}

#[tokio::test(start_paused = true)]
async fn unread_fixture_wells_come_back_blank() {
    let state = setup(timing(100, 5_000, 5_000));
    start_run(&state, wells(&["H12"])).await.expect("run");

    sleep(Duration::from_millis(150)).await;
    let response = collect_results(&state, wells(&["H12"])).await;
    assert!(response.pending.is_empty());
    assert_eq!(response.results.len(), 1);
    assert!(response.results[0].is_blank());
}

#[tokio::test(start_paused = true)]
async fn cancel_drains_reads_from_the_delay_then_stops() {
    let state = setup(timing(100, 250, 5_000));
    let selection = wells(&["A1", "A2", "A3", "A4"]);
    start_run(&state, selection.clone()).await.expect("run");

    let started = Instant::now();
    let response = cancel_run(&state, selection).await.expect("cancel");
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(response.delivered_wells(), wells(&["A1", "A2"]));
    assert_eq!(response.pending, wells(&["A3", "A4"]));

    sleep(Duration::from_millis(500)).await;
    let session = state.session.lock().await;
    assert!(!session.simulator.continue_read());
    assert_eq!(session.simulator.read_wells(), wells(&["A1", "A2"]).as_slice());
}

#[tokio::test(start_paused = true)]
async fn second_run_replaces_the_first() {
    let state = setup(timing(100, 5_000, 5_000));
    start_run(&state, wells(&["A1", "A2"])).await.expect("run");
    sleep(Duration::from_millis(150)).await;

    start_run(&state, wells(&["B1"])).await.expect("run");
    let stale = collect_results(&state, wells(&["A1", "A2"])).await;
    assert!(stale.results.is_empty());
    assert_eq!(stale.pending, wells(&["A1", "A2"]));

    sleep(Duration::from_millis(500)).await;
    let session = state.session.lock().await;
    assert_eq!(session.simulator.read_wells(), wells(&["B1"]).as_slice());
}

#[tokio::test(start_paused = true)]
async fn eject_waits_only_while_the_carrier_is_in() {
    let state = setup(timing(100, 5_000, 1_000));

    let started = Instant::now();
    let first = eject(&state).await.expect("eject");
    assert_eq!(first, EjectResponse::ejected());
    assert!(started.elapsed() >= Duration::from_millis(1_000));
    assert!(!state.session.lock().await.carrier_in());

    let started = Instant::now();
    let second = eject(&state).await.expect("eject");
    assert_eq!(second, EjectResponse::ejected());
    assert!(started.elapsed() < Duration::from_millis(1));
}

#[tokio::test(start_paused = true)]
async fn overlapping_eject_is_refused() {
    let state = setup(timing(100, 5_000, 1_000));

    let moving = {
        let state = state.clone();
        tokio::spawn(async move { eject(&state).await })
    };
    sleep(Duration::from_millis(10)).await;
    let overlapping = eject(&state).await.expect("eject");
    assert!(matches!(overlapping, EjectResponse::Failed { .. }));
    assert_eq!(
        moving.await.expect("join").expect("eject"),
        EjectResponse::ejected()
    );
    assert!(!state.session.lock().await.carrier_in());
}

#[tokio::test(start_paused = true)]
async fn eject_does_not_depend_on_a_running_read() {
    let state = setup(timing(400, 5_000, 1_000));
    start_run(&state, wells(&["A1", "A2", "A3", "A4"])).await.expect("run");

    let started = Instant::now();
    let response = eject(&state).await.expect("eject");
    assert_eq!(response, EjectResponse::ejected());
    assert!(started.elapsed() >= Duration::from_millis(1_000));
    {
        let session = state.session.lock().await;
        assert!(!session.carrier_in());
        assert!(session.simulator.is_reading());
        assert_eq!(session.simulator.read_wells(), wells(&["A1", "A2"]).as_slice());
    }

    sleep(Duration::from_millis(1_000)).await;
    let session = state.session.lock().await;
    assert_eq!(
        session.simulator.read_wells(),
        wells(&["A1", "A2", "A3", "A4"]).as_slice()
    );
}

#[tokio::test(start_paused = true)]
async fn repeated_results_request_gets_the_same_answer() {
    let state = setup(timing(100, 5_000, 5_000));
    start_run(&state, wells(&["A1", "A2"])).await.expect("run");
    sleep(Duration::from_millis(150)).await;

    let first = collect_results(&state, wells(&["A1", "A2"])).await;
    let retried = collect_results(&state, wells(&["A1", "A2"])).await;
    assert_eq!(first, retried);
    assert_eq!(retried.pending, wells(&["A2"]));
    assert_eq!(retried.delivered_wells(), wells(&["A1"]));
}
