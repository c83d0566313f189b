use std::collections::HashSet;

use super::*;

fn wells(names: &[&str]) -> Vec<WellId> {
    names.iter().map(|name| name.parse().expect("well")).collect()
}

#[test]
fn len_ticks_read_every_queued_well() {
    let selections = [
        wells(&["A1"]),
        wells(&["A1", "A2", "A3"]),
        wells(&["H12", "B4", "C1", "D7", "A1"]),
        WellId::all().collect::<Vec<_>>(),
    ];

    for selection in selections {
        let mut simulator = ReadSimulator::new();
        simulator.init_run(selection.clone());
        simulator.start();

        let outcomes: Vec<TickOutcome> = (0..selection.len()).map(|_| simulator.tick()).collect();

        let read: HashSet<WellId> = simulator.read_wells().iter().copied().collect();
        let expected: HashSet<WellId> = selection.iter().copied().collect();
        assert_eq!(read, expected);
        assert_eq!(simulator.queued_wells().count(), 0);
        assert_eq!(outcomes.last(), Some(&TickOutcome::Finished));
        assert!(outcomes[..outcomes.len() - 1]
            .iter()
            .all(|outcome| *outcome == TickOutcome::Continue));
        assert!(!simulator.continue_read());
    }
}

#[test]
fn reads_in_queue_order() {
    let mut simulator = ReadSimulator::new();
    simulator.init_run(wells(&["C3", "A1", "B2"]));
    simulator.start();
    simulator.tick();
    simulator.tick();
    assert_eq!(simulator.read_wells(), wells(&["C3", "A1"]).as_slice());
    assert_eq!(simulator.current_well(), Some("B2".parse().expect("well")));
}

#[test]
fn tick_without_start_is_a_no_op() {
    let mut simulator = ReadSimulator::new();
    simulator.init_run(wells(&["A1"]));
    assert_eq!(simulator.tick(), TickOutcome::Idle);
    assert!(simulator.read_wells().is_empty());
}

#[test]
fn empty_queue_operations_are_no_ops() {
    let mut simulator = ReadSimulator::new();
    simulator.init_run(Vec::new());
    simulator.start();
    assert_eq!(simulator.tick(), TickOutcome::Idle);
    assert!(!simulator.is_reading());
    assert_eq!(simulator.current_well(), None);
}

#[test]
fn stop_is_idempotent_after_draining() {
    let mut simulator = ReadSimulator::new();
    simulator.init_run(wells(&["A1", "A2"]));
    simulator.start();
    simulator.tick();
    simulator.tick();

    let read_before = simulator.read_wells().to_vec();
    simulator.stop();
    simulator.stop();

    assert_eq!(simulator.read_wells(), read_before.as_slice());
    assert!(!simulator.continue_read());
    assert_eq!(simulator.tick(), TickOutcome::Idle);
}

#[test]
fn stop_halts_reading_mid_run() {
    let mut simulator = ReadSimulator::new();
    simulator.init_run(wells(&["A1", "A2", "A3"]));
    simulator.start();
    simulator.tick();
    simulator.stop();

    assert_eq!(simulator.tick(), TickOutcome::Idle);
    assert_eq!(simulator.read_wells(), wells(&["A1"]).as_slice());
    assert_eq!(simulator.queued_wells().count(), 2);
}

#[test]
fn init_run_resets_previous_progress() {
    let mut simulator = ReadSimulator::new();
    simulator.init_run(wells(&["A1", "A2"]));
    simulator.start();
    simulator.tick();

    simulator.init_run(wells(&["B1"]));
    assert!(simulator.read_wells().is_empty());
    assert!(!simulator.continue_read());
    assert_eq!(simulator.queued_wells().copied().collect::<Vec<_>>(), wells(&["B1"]));
}
