//! Integration tests for the RelayService → ConnectionGate → link pipeline.
//!
//! Every test drives the service with explicit timestamps, so timer
//! behaviour is exact and nothing sleeps.

use relayctl::actuator::ActuatorState;
use relayctl::app::ports::ConnectionState;
use relayctl::{
    BoardLayout, ConfigError, EngineConfig, Error, Misuse, Opcode, Outcome, RegistryBuilder,
    RelayService,
};

use crate::mock_link::{MockLink, RecordingUi, UiCall};

type Service = RelayService<MockLink, RecordingUi>;

/// Arrow pad with two exclusive axes plus a gas valve toggle.
fn make_service(link: MockLink) -> Service {
    let registry = RegistryBuilder::new()
        .register_hold("up", "A", Some("vertical"))
        .register_hold("down", "B", Some("vertical"))
        .register_hold("left", "C", Some("horizontal"))
        .register_hold("right", "D", Some("horizontal"))
        .register_toggle("gas", "G", None)
        .build()
        .unwrap();
    RelayService::new(EngineConfig::default(), registry, link, RecordingUi::new()).unwrap()
}

fn state_of(svc: &Service, source: &str) -> ActuatorState {
    svc.actuator(source).unwrap().state()
}

fn enabled(svc: &Service, source: &str) -> bool {
    svc.actuator(source).unwrap().is_enabled()
}

// ── Hold lifecycle ───────────────────────────────────────────

#[test]
fn press_hold_release_walkthrough() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());

    assert_eq!(svc.press("up", 0), Ok(Outcome::Applied));
    assert_eq!(link.writes(), vec!["A4"]);
    assert!(!enabled(&svc, "down"), "sibling must be locked while A is held");

    svc.poll(400);
    svc.poll(800);
    assert_eq!(link.writes(), vec!["A4", "A0", "A0"]);

    assert_eq!(svc.release("up", 1000), Ok(Outcome::Applied));
    assert_eq!(link.writes(), vec!["A4", "A0", "A0", "A3"]);
    assert_eq!(state_of(&svc, "up"), ActuatorState::DeactivatingGrace);
    assert!(!enabled(&svc, "up"));
    assert!(!enabled(&svc, "down"));

    svc.poll(1999);
    assert_eq!(state_of(&svc, "up"), ActuatorState::DeactivatingGrace);

    svc.poll(2000);
    assert_eq!(state_of(&svc, "up"), ActuatorState::Idle);
    assert!(enabled(&svc, "up"));
    assert!(enabled(&svc, "down"));
    assert_eq!(link.writes().len(), 4, "nothing is sent when grace ends");

    assert_eq!(
        svc.ui().calls,
        vec![
            UiCall::Active('A', true),
            UiCall::Enabled('B', false),
            UiCall::Enabled('A', false),
            UiCall::Active('A', false),
            UiCall::Enabled('A', true),
            UiCall::Enabled('B', true),
        ]
    );
}

#[test]
fn one_activation_per_period_then_one_deactivate() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());

    svc.press("left", 0).unwrap();
    for t in (50..=2000).step_by(50) {
        svc.poll(t);
    }
    // t = 0, 400, 800, 1200, 1600, 2000
    assert_eq!(link.writes_for('C'), vec!["C4", "C0", "C0", "C0", "C0", "C0"]);

    svc.release("left", 2010).unwrap();
    for t in (2050..=4000).step_by(50) {
        svc.poll(t);
    }
    let writes = link.writes_for('C');
    assert_eq!(writes.len(), 7);
    assert_eq!(writes.last().map(String::as_str), Some("C3"));
}

#[test]
fn momentary_press_opcode_sends_zero_from_the_first_tick() {
    let link = MockLink::connected();
    let registry = RegistryBuilder::new()
        .register_hold("up", "A", Some("vertical"))
        .build()
        .unwrap();
    let config = EngineConfig {
        press_opcode: Opcode::Heartbeat,
        ..EngineConfig::default()
    };
    let mut svc = RelayService::new(config, registry, link.clone(), RecordingUi::new()).unwrap();

    svc.press("up", 0).unwrap();
    assert_eq!(link.writes(), vec!["A0"]);

    for t in [400, 800, 1200] {
        svc.poll(t);
    }
    svc.release("up", 1300).unwrap();
    assert_eq!(link.writes(), vec!["A0", "A0", "A0", "A0", "A3"]);
}

#[test]
fn late_poll_does_not_burst() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());
    svc.press("up", 0).unwrap();

    svc.poll(2000);
    assert_eq!(link.writes(), vec!["A4", "A0"]);
    assert_eq!(svc.next_deadline(), Some(2400));
}

#[test]
fn independent_groups_run_independent_heartbeats() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());

    svc.press("up", 0).unwrap();
    svc.press("left", 20).unwrap();
    svc.poll(400);
    svc.poll(420);
    assert_eq!(link.writes(), vec!["A4", "C4", "A0", "C0"]);

    svc.release("up", 500).unwrap();
    svc.poll(820);
    assert_eq!(link.writes_for('C'), vec!["C4", "C0", "C0"]);
    assert_eq!(link.writes_for('A'), vec!["A4", "A0", "A3"]);
}

// ── Misuse is ignored, never raised ─────────────────────────

#[test]
fn sibling_press_is_ignored_while_group_held() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());

    svc.press("up", 0).unwrap();
    assert_eq!(svc.press("down", 10), Ok(Outcome::Ignored(Misuse::GroupLocked)));
    assert_eq!(svc.release("down", 20), Ok(Outcome::Ignored(Misuse::NotHeld)));
    assert!(link.writes_for('B').is_empty());
}

#[test]
fn press_during_grace_is_ignored() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());

    svc.press("up", 0).unwrap();
    svc.release("up", 100).unwrap();
    assert_eq!(svc.press("up", 500), Ok(Outcome::Ignored(Misuse::InGrace)));
    assert_eq!(link.writes(), vec!["A4", "A3"]);

    // Grace elapses at 1100; a press after that is processed normally.
    assert_eq!(svc.press("up", 1200), Ok(Outcome::Applied));
    assert_eq!(link.writes(), vec!["A4", "A3", "A4"]);
}

#[test]
fn duplicate_press_and_stray_release_are_ignored() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());

    assert_eq!(svc.release("up", 0), Ok(Outcome::Ignored(Misuse::NotHeld)));
    svc.press("up", 0).unwrap();
    assert_eq!(svc.press("up", 10), Ok(Outcome::Ignored(Misuse::AlreadyHeld)));
    assert_eq!(link.writes(), vec!["A4"]);
}

#[test]
fn unknown_source_is_a_typed_error() {
    let mut svc = make_service(MockLink::connected());
    assert_eq!(svc.press("ghost", 0), Err(Error::UnknownSource("ghost".into())));
    assert_eq!(svc.release("ghost", 0), Err(Error::UnknownSource("ghost".into())));
    assert_eq!(svc.click("ghost", 0), Err(Error::UnknownSource("ghost".into())));
}

// ── Toggles ──────────────────────────────────────────────────

#[test]
fn toggle_click_alternates_close_and_open() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());

    svc.click("gas", 0).unwrap();
    svc.click("gas", 10).unwrap();
    assert_eq!(link.writes(), vec!["G4", "G3"]);
    assert_eq!(
        svc.ui().calls,
        vec![UiCall::Active('G', true), UiCall::Active('G', false)]
    );

    assert_eq!(svc.press("gas", 20), Ok(Outcome::Ignored(Misuse::WrongBehavior)));
    assert_eq!(svc.click("up", 20), Ok(Outcome::Ignored(Misuse::WrongBehavior)));
}

fn rotation_service(link: MockLink) -> Service {
    let registry = RegistryBuilder::new()
        .register_hold("rotate", "E", Some("rotation"))
        .register_toggle("brake", "F", Some("rotation"))
        .register_toggle("clamp", "H", Some("rotation"))
        .build()
        .unwrap();
    RelayService::new(EngineConfig::default(), registry, link, RecordingUi::new()).unwrap()
}

fn active_in_group(svc: &Service) -> Vec<char> {
    svc.snapshot()
        .channels
        .iter()
        .filter(|c| c.active)
        .map(|c| c.channel.label())
        .collect()
}

#[test]
fn closed_toggle_locks_its_group() {
    let link = MockLink::connected();
    let mut svc = rotation_service(link.clone());

    assert_eq!(svc.click("brake", 0), Ok(Outcome::Applied));
    assert!(!enabled(&svc, "rotate"));
    assert!(!enabled(&svc, "clamp"));

    assert_eq!(svc.press("rotate", 10), Ok(Outcome::Ignored(Misuse::GroupLocked)));
    assert_eq!(svc.click("clamp", 20), Ok(Outcome::Ignored(Misuse::GroupLocked)));
    svc.poll(1000);
    assert_eq!(link.writes(), vec!["F4"]);
    assert_eq!(active_in_group(&svc), vec!['F']);

    // Opening the toggle frees the group at once; toggles have no grace.
    assert_eq!(svc.click("brake", 1100), Ok(Outcome::Applied));
    assert!(enabled(&svc, "rotate"));
    assert_eq!(svc.press("rotate", 1110), Ok(Outcome::Applied));
    assert_eq!(link.writes(), vec!["F4", "F3", "E4"]);
    assert_eq!(active_in_group(&svc), vec!['E']);
}

#[test]
fn toggle_in_group_is_locked_by_held_sibling() {
    let link = MockLink::connected();
    let mut svc = rotation_service(link.clone());

    svc.press("rotate", 0).unwrap();
    assert_eq!(svc.click("brake", 10), Ok(Outcome::Ignored(Misuse::GroupLocked)));
    assert_eq!(active_in_group(&svc), vec!['E']);

    svc.release("rotate", 100).unwrap();
    assert_eq!(svc.click("brake", 600), Ok(Outcome::Ignored(Misuse::GroupLocked)));
    svc.poll(1100);
    assert_eq!(svc.click("brake", 1100), Ok(Outcome::Applied));
    assert_eq!(link.writes(), vec!["E4", "E3", "F4"]);
}

#[test]
fn force_deactivating_a_closed_toggle_frees_its_group() {
    let link = MockLink::connected();
    let mut svc = rotation_service(link.clone());

    svc.click("brake", 0).unwrap();
    assert_eq!(svc.force_deactivate("brake"), Ok(Outcome::Applied));
    assert!(active_in_group(&svc).is_empty());
    assert_eq!(svc.click("clamp", 10), Ok(Outcome::Applied));
    assert_eq!(link.writes(), vec!["F4", "F3", "H4"]);
}

// ── Connection gate ──────────────────────────────────────────

#[test]
fn disconnected_link_sends_nothing_and_raises_nothing() {
    let link = MockLink::disconnected();
    let mut svc = make_service(link.clone());

    assert_eq!(svc.press("up", 0), Ok(Outcome::Applied));
    assert_eq!(svc.release("up", 500), Ok(Outcome::Applied));
    assert_eq!(svc.click("gas", 600), Ok(Outcome::Applied));

    assert!(link.writes().is_empty());
    let stats = svc.gate_stats();
    assert_eq!(stats.sent, 0);
    // A4, A0 at 400, A3, G4
    assert_eq!(stats.dropped_not_connected, 4);
}

#[test]
fn write_failures_are_counted_not_retried() {
    let link = MockLink::connected();
    link.set_fail_writes(true);
    let mut svc = make_service(link.clone());

    assert_eq!(svc.press("up", 0), Ok(Outcome::Applied));
    svc.poll(400);
    assert_eq!(svc.gate_stats().write_failures, 2);

    link.set_fail_writes(false);
    svc.poll(800);
    assert_eq!(link.writes(), vec!["A0"]);
}

#[test]
fn link_drop_while_held_forces_everything_off() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());

    svc.press("up", 0).unwrap();
    svc.click("gas", 0).unwrap();
    link.set_state(ConnectionState::Disconnected);
    svc.sync_link_state();

    let snap = svc.snapshot();
    assert_eq!(snap.link, ConnectionState::Disconnected);
    assert!(snap.channels.iter().all(|c| c.state == ActuatorState::Idle && !c.active));
    assert_eq!(snap.active_timers, 0);
    // Controls stay interactable; the link simply carries nothing.
    assert!(enabled(&svc, "down"));

    svc.poll(400);
    assert_eq!(link.writes(), vec!["A4", "G4"]);
    assert!(svc.ui().calls.contains(&UiCall::Connection(ConnectionState::Disconnected)));

    // Same state reported twice: no second sweep.
    let calls = svc.ui().calls.len();
    svc.on_link_state_changed(ConnectionState::Disconnected);
    assert_eq!(svc.ui().calls.len(), calls);

    link.set_state(ConnectionState::Connected);
    svc.sync_link_state();
    assert_eq!(svc.press("up", 1000), Ok(Outcome::Applied));
    assert_eq!(link.writes().last().map(String::as_str), Some("A4"));
}

#[test]
fn reconnecting_link_does_not_resume_a_held_channel() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());

    svc.press("up", 0).unwrap();
    link.set_state(ConnectionState::Connecting);
    svc.sync_link_state();
    assert_eq!(state_of(&svc, "up"), ActuatorState::Idle);
    assert!(enabled(&svc, "down"));

    link.set_state(ConnectionState::Connected);
    svc.sync_link_state();
    svc.poll(400);
    svc.poll(800);
    // The sweep's A3 went nowhere while the link was reconnecting.
    assert_eq!(link.writes(), vec!["A4"]);
    assert_eq!(svc.snapshot().active_timers, 0);
    assert_eq!(
        svc.ui().calls.iter().filter(|c| matches!(c, UiCall::Connection(_))).count(),
        2
    );
}

#[test]
fn connecting_from_disconnected_sweeps_nothing() {
    let link = MockLink::disconnected();
    let mut svc = make_service(link.clone());

    svc.press("up", 0).unwrap();
    svc.on_link_state_changed(ConnectionState::Connecting);
    assert_eq!(state_of(&svc, "up"), ActuatorState::Held);

    link.set_state(ConnectionState::Connected);
    svc.sync_link_state();
    svc.poll(400);
    assert_eq!(link.writes(), vec!["A0"]);
}

#[test]
fn connect_and_disconnect_go_through_the_link() {
    let link = MockLink::disconnected();
    let mut svc = make_service(link.clone());

    svc.connect("/dev/rfcomm0").unwrap();
    assert_eq!(link.connects(), vec!["/dev/rfcomm0"]);
    assert_eq!(svc.snapshot().link, ConnectionState::Connected);

    svc.press("up", 0).unwrap();
    svc.disconnect();
    // Deactivates go out before the link closes.
    assert_eq!(link.writes(), vec!["A4", "A3", "B3", "C3", "D3", "G3"]);
    assert_eq!(svc.snapshot().link, ConnectionState::Disconnected);
    assert_eq!(
        svc.ui().calls.iter().filter(|c| matches!(c, UiCall::Connection(_))).count(),
        2
    );
}

// ── Global operations ────────────────────────────────────────

#[test]
fn force_deactivate_on_idle_sends_and_stays_idle() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());

    assert_eq!(svc.force_deactivate("up"), Ok(Outcome::Applied));
    assert_eq!(svc.force_deactivate("up"), Ok(Outcome::Applied));
    assert_eq!(link.writes(), vec!["A3", "A3"]);
    assert_eq!(state_of(&svc, "up"), ActuatorState::Idle);
    assert!(enabled(&svc, "up"));
}

#[test]
fn force_deactivate_while_held_unlocks_the_group() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());

    svc.press("up", 0).unwrap();
    svc.force_deactivate("up").unwrap();
    assert!(enabled(&svc, "down"));
    assert_eq!(svc.next_deadline(), None);
    svc.poll(400);
    assert_eq!(link.writes(), vec!["A4", "A3"]);
}

#[test]
fn deactivate_all_sweeps_every_channel() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());

    svc.press("up", 0).unwrap();
    svc.release("up", 100).unwrap();
    svc.press("right", 150).unwrap();
    link.clear();

    svc.deactivate_all();
    assert_eq!(link.writes(), vec!["A3", "B3", "C3", "D3", "G3"]);
    assert!(svc.snapshot().channels.iter().all(|c| c.enabled));
    assert_eq!(svc.next_deadline(), None);
}

#[test]
fn global_disable_blocks_presses_but_not_releases() {
    let link = MockLink::connected();
    let mut svc = make_service(link.clone());

    svc.set_enabled_all(false);
    assert_eq!(svc.ui().calls.len(), 5);
    assert_eq!(svc.press("up", 0), Ok(Outcome::Ignored(Misuse::Disabled)));
    assert_eq!(svc.click("gas", 0), Ok(Outcome::Ignored(Misuse::Disabled)));

    svc.set_enabled_all(true);
    svc.press("up", 10).unwrap();
    svc.set_enabled_all(false);
    assert_eq!(svc.release("up", 100), Ok(Outcome::Applied));
    assert_eq!(link.writes(), vec!["A4", "A3"]);

    // Re-enabling during grace leaves the settling channel and its
    // locked sibling disabled until the grace ends.
    svc.set_enabled_all(true);
    assert!(!enabled(&svc, "up"));
    assert!(!enabled(&svc, "down"));
    svc.poll(1100);
    assert!(enabled(&svc, "up"));
    assert!(enabled(&svc, "down"));
}

// ── Layout loading ───────────────────────────────────────────

#[test]
fn service_from_json_layout_uses_its_timing() {
    let json = r#"{
        "engine": { "heartbeat_period_ms": 200, "grace_period_ms": 1000, "board_blink_ms": 1000 },
        "controls": [
            { "source": "up", "channel": "A", "behavior": "hold", "group": "vertical" },
            { "source": "down", "channel": "B", "behavior": "hold", "group": "vertical" }
        ]
    }"#;
    let layout = BoardLayout::from_json(json).unwrap();
    let link = MockLink::connected();
    let mut svc = RelayService::from_layout(&layout, link.clone(), RecordingUi::new()).unwrap();

    svc.press("up", 0).unwrap();
    svc.poll(200);
    assert_eq!(link.writes(), vec!["A4", "A0"]);
}

#[test]
fn bad_layout_is_rejected_at_build_time() {
    let json = r#"{
        "controls": [
            { "source": "up", "channel": "A", "behavior": "hold" },
            { "source": "also_up", "channel": "A", "behavior": "hold" }
        ]
    }"#;
    let layout = BoardLayout::from_json(json).unwrap();
    let result = RelayService::from_layout(&layout, MockLink::connected(), RecordingUi::new());
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::DuplicateChannel('A')))
    ));
}
