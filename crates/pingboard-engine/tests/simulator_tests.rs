use pingboard_engine::{
    Canvas, LineKind, MachineDraft, SessionKey, SimConfig, SimError, Simulator, TopologyMode,
    TopologyStore, FRAME_INTERVAL,
};
use pingboard_link::{ChannelState, LinkError, LinkEvent, Transport};
use pingboard_model::{MachineId, Position};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
struct FakeTransport {
    opens: Arc<Mutex<u32>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl FakeTransport {
    fn sent(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }
}

impl Transport for FakeTransport {
    fn open(&mut self) {
        *self.opens.lock().unwrap() += 1;
    }

    fn transmit(&mut self, payload: String) -> Result<(), LinkError> {
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }
}

const A: MachineId = MachineId(1);
const B: MachineId = MachineId(2);
const C: MachineId = MachineId(3);

fn two_machines() -> TopologyStore {
    let mut store = TopologyStore::new(Canvas::default(), 5);
    for (address, x) in [("10.0.0.1", 100.0), ("10.0.0.2", 500.0)] {
        store
            .add_machine(MachineDraft {
                address: Some(address.to_string()),
                position: Some(Position::new(x, 100.0)),
                ..MachineDraft::default()
            })
            .unwrap();
    }
    store
}

fn connected(store: TopologyStore, now: Instant) -> (Simulator<FakeTransport>, FakeTransport) {
    let transport = FakeTransport::default();
    let mut sim = Simulator::with_topology(store, SimConfig::default(), transport.clone());
    sim.start();
    sim.handle_link(LinkEvent::Opened, now);
    assert_eq!(sim.channel_state(), ChannelState::Open);
    (sim, transport)
}

fn backend(sim: &mut Simulator<FakeTransport>, json: &str, now: Instant) {
    sim.handle_link(LinkEvent::Message(json.to_string()), now);
}

fn texts(sim: &Simulator<FakeTransport>, id: MachineId) -> Vec<String> {
    sim.terminal(id).iter().map(|line| line.text.clone()).collect()
}

#[test]
fn ping_round_trip_scenario() {
    let start = Instant::now();
    let (mut sim, transport) = connected(two_machines(), start);
    backend(
        &mut sim,
        r#"{"type":"server_started","machine_id":2,"message":"server up"}"#,
        start,
    );
    assert!(sim.machine(B).unwrap().is_server);

    sim.submit_line(A, "ping 10.0.0.2").unwrap();
    assert_eq!(texts(&sim, A), vec!["PC1@10.0.0.1:~$ ping 10.0.0.2"]);
    assert_eq!(sim.terminal(A)[0].kind, LineKind::Command);
    let key = SessionKey::new(A, B);
    assert!(sim.is_session_active(key));
    assert_eq!(sim.connections().len(), 1);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["command"], "ping");
    assert_eq!(sent[0]["machine_id"], 1);
    assert_eq!(sent[0]["source_ip"], "10.0.0.1");
    assert_eq!(sent[0]["target_ip"], "10.0.0.2");
    assert_eq!(sent[0]["target_port"], 9002);
    let session_id = sent[0]["session_id"].as_u64().unwrap();

    backend(
        &mut sim,
        r#"{"type":"ping_start","machine_id":1,"message":"pinging 10.0.0.2:9002"}"#,
        start,
    );
    backend(
        &mut sim,
        &format!(
            r#"{{"type":"ping_packet","machine_id":1,"session_id":{session_id},"data":{{"packet":1,"status":"success","rtt":40,"message":"packet 1: time=40ms"}}}}"#
        ),
        start,
    );
    let packets = sim.packets();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].key, key);
    assert_eq!(packets[0].progress, 0.0);
    assert_eq!(packets[0].position, Position::new(100.0, 100.0));

    sim.tick(start + FRAME_INTERVAL);
    let mid = sim.packets()[0].clone();
    assert!(mid.progress > 0.0 && mid.progress < 1.0);
    assert!(mid.position.x > 100.0 && mid.position.x < 500.0);

    sim.tick(start + Duration::from_millis(40));
    let landed = sim.packets();
    assert_eq!(landed[0].progress, 1.0);
    assert_eq!(landed[0].position, Position::new(500.0, 100.0));

    sim.tick(start + Duration::from_millis(56));
    assert!(sim.packets().is_empty());

    backend(
        &mut sim,
        r#"{"type":"ping_complete","machine_id":1,"stats":{"sent":4,"received":4,"lost":0,"loss_percentage":0,"avg_rtt":40,"min_rtt":38,"max_rtt":42}}"#,
        start,
    );
    let lines = texts(&sim, A);
    assert!(lines.contains(&"pinging 10.0.0.2:9002".to_string()));
    assert!(lines.contains(&"packet 1: time=40ms".to_string()));
    assert!(lines.contains(&"    packets: sent = 4, received = 4, lost = 0 (0% loss)".to_string()));
    assert!(lines.contains(&"    rtt (ms): min = 38, max = 42, avg = 40".to_string()));
    assert!(!sim.is_session_active(key));
    assert_eq!(sim.connections().len(), 1);
}

#[test]
fn closed_channel_fails_before_any_host_check() {
    let transport = FakeTransport::default();
    let mut sim = Simulator::with_topology(two_machines(), SimConfig::default(), transport.clone());
    assert_eq!(sim.submit_line(A, "ping 10.0.0.1"), Err(SimError::NotConnected));
    assert_eq!(sim.submit_line(A, "ping 10.9.9.9"), Err(SimError::NotConnected));
    assert!(transport.sent().is_empty());
}

#[test]
fn closed_channel_rejects_ping_without_sending() {
    let transport = FakeTransport::default();
    let mut sim = Simulator::with_topology(two_machines(), SimConfig::default(), transport.clone());
    assert_eq!(sim.channel_state(), ChannelState::Closed);

    assert_eq!(sim.submit_line(A, "ping 10.0.0.2"), Err(SimError::NotConnected));
    assert!(transport.sent().is_empty());
    assert!(sim.active_sessions().is_empty());

    let lines = sim.terminal(A);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1].kind, LineKind::Error);
    assert_eq!(lines[2].kind, LineKind::Warning);
}

#[test]
fn self_ping_fails_whatever_the_server_state() {
    let now = Instant::now();
    let (mut sim, transport) = connected(two_machines(), now);
    assert_eq!(sim.submit_line(A, "ping 10.0.0.1"), Err(SimError::SelfPing));
    backend(
        &mut sim,
        r#"{"type":"server_started","machine_id":1,"message":"up"}"#,
        now,
    );
    assert_eq!(sim.submit_line(A, "ping 10.0.0.1"), Err(SimError::SelfPing));
    assert!(transport.sent().is_empty());
}

#[test]
fn offline_target_succeeds_once_its_server_starts() {
    let now = Instant::now();
    let (mut sim, transport) = connected(two_machines(), now);
    assert_eq!(
        sim.submit_line(A, "ping 10.0.0.2"),
        Err(SimError::TargetOffline {
            name: "PC2".to_string()
        })
    );
    assert_eq!(sim.terminal(A)[1].kind, LineKind::Warning);

    sim.toggle_server(B).unwrap();
    let sent = transport.sent();
    assert_eq!(sent[0]["command"], "start_server");
    assert_eq!(sent[0]["ip"], "10.0.0.2");
    assert_eq!(sent[0]["port"], 9002);
    assert!(!sim.machine(B).unwrap().is_server);

    backend(
        &mut sim,
        r#"{"type":"server_started","machine_id":2,"message":"up"}"#,
        now,
    );
    sim.submit_line(A, "ping 10.0.0.2").unwrap();
    assert!(sim.is_session_active(SessionKey::new(A, B)));
}

#[test]
fn unknown_host_lists_pingable_peers() {
    let now = Instant::now();
    let mut store = two_machines();
    store
        .add_machine(MachineDraft {
            address: Some("10.0.0.3".to_string()),
            ..MachineDraft::default()
        })
        .unwrap();
    store.set_pingable(C, false).unwrap();
    let (mut sim, _transport) = connected(store, now);

    let err = sim.submit_line(A, "ping 10.0.0.99").unwrap_err();
    assert_eq!(
        err,
        SimError::UnknownHost {
            address: "10.0.0.99".to_string(),
            suggestions: vec!["10.0.0.2".to_string()]
        }
    );
    assert_eq!(texts(&sim, A).last().unwrap(), "available hosts: 10.0.0.2");
}

#[test]
fn second_ping_to_busy_pair_is_rejected() {
    let now = Instant::now();
    let (mut sim, transport) = connected(two_machines(), now);
    backend(
        &mut sim,
        r#"{"type":"server_started","machine_id":2,"message":"up"}"#,
        now,
    );
    sim.submit_line(A, "ping 10.0.0.2").unwrap();
    assert_eq!(
        sim.submit_line(A, "ping 10.0.0.2"),
        Err(SimError::AlreadyActive { from: A, to: B })
    );
    assert_eq!(transport.sent().len(), 1);
}

#[test]
fn every_non_empty_line_is_echoed_first() {
    let now = Instant::now();
    let (mut sim, _transport) = connected(two_machines(), now);

    sim.submit_line(A, "").unwrap();
    sim.submit_line(A, "   ").unwrap();
    assert!(sim.terminal(A).is_empty());

    assert_eq!(
        sim.submit_line(A, "Frobnicate now"),
        Err(SimError::UnknownCommand("frobnicate".to_string()))
    );
    assert_eq!(
        texts(&sim, A),
        vec![
            "PC1@10.0.0.1:~$ Frobnicate now".to_string(),
            "error: unknown command: frobnicate".to_string(),
            "type \"help\" to list the available commands".to_string(),
        ]
    );

    assert_eq!(sim.submit_line(A, "ping"), Err(SimError::Usage("ping <address>")));
    sim.submit_line(A, "HELP").unwrap();
    assert!(sim.terminal(A).iter().any(|line| line.text.contains("ping <address>")));
}

#[test]
fn list_is_local_and_clear_is_scoped() {
    let now = Instant::now();
    let (mut sim, transport) = connected(two_machines(), now);
    sim.submit_line(B, "list").unwrap();
    sim.submit_line(A, "list").unwrap();
    assert!(texts(&sim, A).contains(&"  PC1: 10.0.0.1:9001 - offline (this machine)".to_string()));
    assert!(transport.sent().is_empty());

    sim.submit_line(A, "clear").unwrap();
    assert!(sim.terminal(A).is_empty());
    assert!(!sim.terminal(B).is_empty());
}

#[test]
fn removing_a_machine_cleans_up_after_it() {
    let now = Instant::now();
    let (mut sim, transport) = connected(two_machines(), now);
    backend(
        &mut sim,
        r#"{"type":"server_started","machine_id":2,"message":"up"}"#,
        now,
    );
    sim.open_terminal(B).unwrap();
    sim.submit_line(A, "ping 10.0.0.2").unwrap();
    backend(
        &mut sim,
        r#"{"type":"ping_packet","machine_id":1,"data":{"packet":1,"status":"success","rtt":500,"message":"ok"}}"#,
        now,
    );
    assert_eq!(sim.packets().len(), 1);

    sim.remove_machine(B).unwrap();
    assert!(sim.machine(B).is_none());
    assert!(sim.terminal(B).is_empty());
    assert_eq!(sim.active_terminal(), None);
    assert!(sim.connections().is_empty());
    assert!(sim.active_sessions().is_empty());
    assert!(sim.packets().is_empty());
    sim.tick(now + Duration::from_millis(16));
    assert!(sim.packets().is_empty());

    let sent = transport.sent();
    assert_eq!(sent.last().unwrap()["command"], "stop_server");
    assert_eq!(sent.last().unwrap()["machine_id"], 2);

    let id = sim.add_machine(MachineDraft::default()).unwrap();
    assert_eq!(id, MachineId(3));
    assert_eq!(sim.remove_machine(B), Err(SimError::NotFound(B)));
}

#[test]
fn default_topology_accepts_two_more_machines() {
    let mut sim = Simulator::new(SimConfig::default(), FakeTransport::default());
    assert_eq!(sim.machines().len(), 3);
    sim.add_machine(MachineDraft::default()).unwrap();
    sim.add_machine(MachineDraft::default()).unwrap();
    assert!(matches!(
        sim.add_machine(MachineDraft::default()),
        Err(SimError::CapacityExceeded(_))
    ));
}

#[test]
fn interleaved_runs_resolve_to_their_own_sessions() {
    let now = Instant::now();
    let mut store = two_machines();
    store
        .add_machine(MachineDraft {
            address: Some("10.0.0.3".to_string()),
            ..MachineDraft::default()
        })
        .unwrap();
    let (mut sim, _transport) = connected(store, now);
    backend(
        &mut sim,
        r#"{"type":"server_started","machine_id":2,"message":"up"}"#,
        now,
    );
    sim.submit_line(A, "ping 10.0.0.2").unwrap();
    sim.submit_line(C, "ping 10.0.0.2").unwrap();

    backend(
        &mut sim,
        r#"{"type":"ping_packet","machine_id":3,"data":{"packet":1,"status":"success","rtt":30,"message":"ok"}}"#,
        now,
    );
    assert_eq!(sim.packets()[0].key, SessionKey::new(C, B));

    backend(
        &mut sim,
        r#"{"type":"ping_complete","machine_id":3,"stats":{"sent":1,"received":1,"lost":0,"loss_percentage":0,"avg_rtt":30,"min_rtt":30,"max_rtt":30}}"#,
        now,
    );
    assert!(!sim.is_session_active(SessionKey::new(C, B)));
    assert!(sim.is_session_active(SessionKey::new(A, B)));
}

#[test]
fn failed_packets_do_not_animate() {
    let now = Instant::now();
    let (mut sim, _transport) = connected(two_machines(), now);
    backend(
        &mut sim,
        r#"{"type":"server_started","machine_id":2,"message":"up"}"#,
        now,
    );
    sim.submit_line(A, "ping 10.0.0.2").unwrap();
    backend(
        &mut sim,
        r#"{"type":"ping_packet","machine_id":1,"data":{"packet":1,"status":"timeout","rtt":null,"message":"timed out"}}"#,
        now,
    );
    assert!(sim.packets().is_empty());
    let last = sim.terminal(A).last().unwrap();
    assert_eq!(last.kind, LineKind::Error);
    assert_eq!(last.text, "timed out");
}

#[test]
fn scan_replaces_topology_and_hides_mobile_terminals() {
    let now = Instant::now();
    let (mut sim, _transport) = connected(two_machines(), now);
    sim.open_terminal(A).unwrap();
    sim.submit_line(A, "help").unwrap();
    sim.scan_network().unwrap();

    backend(
        &mut sim,
        r#"{"type":"network_scan_complete","devices":[{"ip":"1.1.1.1","type":"pc"},{"ip":"1.1.1.2","type":"mobile"}]}"#,
        now,
    );
    assert_eq!(sim.mode(), TopologyMode::Scanned);
    assert_eq!(sim.machines().len(), 2);
    assert!(sim.terminal(A).is_empty());
    assert_eq!(sim.active_terminal(), None);

    let pc = sim.topology().find_by_address("1.1.1.1").unwrap().id;
    let mobile = sim.topology().find_by_address("1.1.1.2").unwrap();
    assert!(!mobile.pingable);
    let mobile_id = mobile.id;
    assert!(matches!(
        sim.open_terminal(mobile_id),
        Err(SimError::TerminalUnavailable { .. })
    ));
    assert!(matches!(
        sim.submit_line(mobile_id, "ping 1.1.1.1"),
        Err(SimError::TerminalUnavailable { .. })
    ));
    assert!(sim.terminal(mobile_id).is_empty());
    sim.open_terminal(pc).unwrap();

    backend(
        &mut sim,
        r#"{"type":"server_started","machine_id":"1.1.1.1","message":"up"}"#,
        now,
    );
    assert!(sim.machine(pc).unwrap().is_server);

    sim.reset_topology();
    assert_eq!(sim.mode(), TopologyMode::Manual);
    assert_eq!(sim.machines().len(), 3);
}

#[test]
fn bad_messages_are_dropped_and_channel_stays_open() {
    let now = Instant::now();
    let (mut sim, _transport) = connected(two_machines(), now);
    backend(&mut sim, "not json at all", now);
    backend(&mut sim, r#"{"type":"telemetry","cpu":3}"#, now);
    backend(&mut sim, r#"{"type":"server_started","machine_id":77,"message":"?"}"#, now);
    assert_eq!(sim.channel_state(), ChannelState::Open);
    assert!(sim.terminal(A).is_empty());
    assert!(sim.machines().iter().all(|m| !m.is_server));
}

#[test]
fn backend_errors_reach_the_named_terminal() {
    let now = Instant::now();
    let (mut sim, _transport) = connected(two_machines(), now);
    backend(
        &mut sim,
        r#"{"type":"error","machine_id":2,"message":"server already running"}"#,
        now,
    );
    backend(&mut sim, r#"{"type":"error","message":"global failure"}"#, now);
    assert_eq!(texts(&sim, B), vec!["error: server already running"]);
    assert!(sim.terminal(A).is_empty());
}

#[test]
fn toggle_without_channel_reports_on_that_machine() {
    let transport = FakeTransport::default();
    let mut sim = Simulator::with_topology(two_machines(), SimConfig::default(), transport.clone());
    sim.open_terminal(A).unwrap();
    assert_eq!(sim.toggle_server(B), Err(SimError::NotConnected));
    assert_eq!(sim.terminal(B)[0].text, "error: no connection to the backend");
    assert!(sim.terminal(A).is_empty());
    assert!(transport.sent().is_empty());
}

#[test]
fn send_failures_surface_on_the_open_terminal() {
    let transport = FakeTransport::default();
    let mut sim = Simulator::with_topology(two_machines(), SimConfig::default(), transport);
    sim.open_terminal(A).unwrap();
    assert_eq!(sim.request_network_info(), Err(SimError::NotConnected));
    assert_eq!(sim.terminal(A).len(), 2);
}

#[test]
fn network_info_is_recorded() {
    let now = Instant::now();
    let (mut sim, transport) = connected(two_machines(), now);
    sim.open_terminal(A).unwrap();
    sim.request_network_info().unwrap();
    assert_eq!(transport.sent()[0]["command"], "get_network_info");
    backend(
        &mut sim,
        r#"{"type":"network_info","local_ip":"192.168.0.20"}"#,
        now,
    );
    assert_eq!(sim.local_ip(), Some("192.168.0.20"));
    assert_eq!(sim.terminal(A)[0].kind, LineKind::System);
}

#[test]
fn dropped_channel_reconnects_on_tick() {
    let now = Instant::now();
    let (mut sim, transport) = connected(two_machines(), now);
    sim.handle_link(
        LinkEvent::Closed {
            reason: "reset".to_string(),
        },
        now,
    );
    assert_eq!(sim.channel_state(), ChannelState::Closed);
    assert!(sim.terminal(A).is_empty());

    sim.tick(now + Duration::from_secs(2));
    assert_eq!(sim.channel_state(), ChannelState::Closed);
    sim.tick(now + Duration::from_secs(3));
    assert_eq!(sim.channel_state(), ChannelState::Connecting);
    assert_eq!(*transport.opens.lock().unwrap(), 2);

    sim.shutdown();
    assert_eq!(sim.channel_state(), ChannelState::Closed);
}

#[test]
fn lost_channel_releases_running_pings() {
    let now = Instant::now();
    let (mut sim, transport) = connected(two_machines(), now);
    backend(
        &mut sim,
        r#"{"type":"server_started","machine_id":2,"message":"up"}"#,
        now,
    );
    sim.submit_line(A, "ping 10.0.0.2").unwrap();
    backend(
        &mut sim,
        r#"{"type":"ping_packet","machine_id":1,"data":{"packet":1,"status":"success","rtt":500,"message":"ok"}}"#,
        now,
    );
    assert_eq!(sim.packets().len(), 1);

    sim.handle_link(
        LinkEvent::Closed {
            reason: "reset".to_string(),
        },
        now,
    );
    let key = SessionKey::new(A, B);
    assert!(!sim.is_session_active(key));
    assert!(sim.packets().is_empty());
    assert_eq!(sim.connections().len(), 1);
    let last = sim.terminal(A).last().unwrap();
    assert_eq!(last.kind, LineKind::System);
    assert_eq!(last.text, "ping to PC2 interrupted: connection lost");

    sim.tick(now + Duration::from_secs(3));
    sim.handle_link(LinkEvent::Opened, now + Duration::from_secs(3));
    sim.submit_line(A, "ping 10.0.0.2").unwrap();
    assert!(sim.is_session_active(key));
    assert_eq!(transport.sent().len(), 2);
}

#[test]
fn removing_a_server_offline_reports_on_the_open_terminal() {
    let now = Instant::now();
    let (mut sim, transport) = connected(two_machines(), now);
    backend(
        &mut sim,
        r#"{"type":"server_started","machine_id":2,"message":"up"}"#,
        now,
    );
    sim.open_terminal(A).unwrap();
    sim.handle_link(
        LinkEvent::Closed {
            reason: "reset".to_string(),
        },
        now,
    );

    sim.remove_machine(B).unwrap();
    assert!(sim.machine(B).is_none());
    assert_eq!(
        texts(&sim, A),
        vec![
            "error: no connection to the backend".to_string(),
            "make sure the backend service is running".to_string(),
        ]
    );
    assert!(transport.sent().is_empty());
}
