// The relay supervisor: owns every `Connection` and every `Server`,
// ticks them on a fixed schedule, applies `ConnectionAction`s against
// the arena, and drives dial-out for client-mode inputs/outputs. A
// listener task is spawned per unique address and hands accepted
// sockets back over a channel; this is the single task that owns all
// relay state directly, rather than a task-per-connection each owning
// its own slice of it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};

use crate::config::{ConnectionKind, RelayConfiguration};
use crate::connection::{
    spawn_reader_writer, tick_ping_and_measurement, Connection, ConnectionAction, ConnectionEvent,
    Mode,
};
use crate::log::Logger;
use crate::log_error;
use crate::log_info;
use crate::log_warning;
use crate::server::routing::Server;
use crate::status::{spawn_http_server, StatusSnapshot};

use super::reconnect::{RetryPolicy, RetryTick};
use super::transport::dial;

const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// One still-to-connect (or currently reconnecting) client-mode
/// input/output description.
struct DialSlot {
    server_index: usize,
    mode: Mode,
    addresses: Vec<String>,
    application_name: String,
    stream_name: String,
    override_application_name: Option<String>,
    override_stream_name: Option<String>,
    forward_video: bool,
    forward_audio: bool,
    forward_data: bool,
    reconnect_count: u32,
    policy: RetryPolicy,
    active_connection_id: Option<u64>,
}

/// A freshly accepted socket, handed from an accept-loop task to the
/// supervisor over a channel.
struct AcceptedSocket {
    stream: tokio::net::TcpStream,
    listen_address: String,
}

/// Outcome of a background dial attempt.
struct DialOutcome {
    slot_index: usize,
    result: std::io::Result<tokio::net::TcpStream>,
}

pub struct RelaySupervisor {
    logger: Logger,
    config: RelayConfiguration,
    connections: HashMap<u64, Connection>,
    servers: Vec<Server>,
    next_connection_id: u64,
    dial_slots: Vec<DialSlot>,
    status_snapshot: Arc<Mutex<StatusSnapshot>>,
}

impl RelaySupervisor {
    pub fn new(config: RelayConfiguration, logger: Logger) -> RelaySupervisor {
        let servers = config.servers.iter().cloned().map(Server::new).collect();

        let mut dial_slots = Vec::new();
        for (server_index, server) in config.servers.iter().enumerate() {
            for desc in &server.inputs {
                if desc.kind == ConnectionKind::Client {
                    dial_slots.push(make_dial_slot(server_index, Mode::Subscriber, desc));
                }
            }
            for desc in &server.outputs {
                if desc.kind == ConnectionKind::Client {
                    dial_slots.push(make_dial_slot(server_index, Mode::Publisher, desc));
                }
            }
        }

        RelaySupervisor {
            logger,
            config,
            connections: HashMap::new(),
            servers,
            next_connection_id: 1,
            dial_slots,
            status_snapshot: Arc::new(Mutex::new(StatusSnapshot::default())),
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        id
    }

    /// Binds a `TcpListener` for every unique `Host`-type address and
    /// runs the tick/event loop until the process receives a shutdown
    /// signal.
    pub async fn run(mut self) {
        let (accepted_tx, mut accepted_rx) = mpsc::unbounded_channel::<AcceptedSocket>();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ConnectionEvent>();
        let (dial_tx, mut dial_rx) = mpsc::unbounded_channel::<DialOutcome>();

        for address in self.config.listen_addresses() {
            spawn_listener(address, accepted_tx.clone(), self.logger.make_child_logger("[RELAY:LISTEN] "));
        }

        if let Some(status_address) = self.config.status_page_listen.clone() {
            spawn_http_server(
                status_address,
                self.status_snapshot.clone(),
                self.logger.make_child_logger("[RELAY:STATUS] "),
            );
        }

        let mut ticker = interval(TICK_INTERVAL);
        let mut last_tick = Instant::now();

        #[cfg(unix)]
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("could not install SIGTERM handler");
        #[cfg(unix)]
        let mut sigusr1 = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::user_defined1())
            .expect("could not install SIGUSR1 handler");

        loop {
            #[cfg(unix)]
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let delta = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;
                    self.tick(delta, &dial_tx);
                }
                Some(accepted) = accepted_rx.recv() => {
                    self.handle_accepted(accepted, &event_tx);
                }
                Some(event) = event_rx.recv() => {
                    self.handle_event(event);
                }
                Some(outcome) = dial_rx.recv() => {
                    self.handle_dial_outcome(outcome, &event_tx);
                }
                _ = tokio::signal::ctrl_c() => {
                    let logger = &self.logger;
                    log_info!(logger, "received interrupt signal, shutting down");
                    break;
                }
                _ = sigterm.recv() => {
                    let logger = &self.logger;
                    log_info!(logger, "received termination signal, shutting down");
                    break;
                }
                _ = sigusr1.recv() => {
                    self.dump_status();
                }
            }

            #[cfg(not(unix))]
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let delta = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;
                    self.tick(delta, &dial_tx);
                }
                Some(accepted) = accepted_rx.recv() => {
                    self.handle_accepted(accepted, &event_tx);
                }
                Some(event) = event_rx.recv() => {
                    self.handle_event(event);
                }
                Some(outcome) = dial_rx.recv() => {
                    self.handle_dial_outcome(outcome, &event_tx);
                }
                _ = tokio::signal::ctrl_c() => {
                    let logger = &self.logger;
                    log_info!(logger, "received interrupt signal, shutting down");
                    break;
                }
            }
        }
    }

    fn tick(&mut self, delta_seconds: f32, dial_tx: &UnboundedSender<DialOutcome>) {
        let ping_interval = self.config.ping_interval;
        for conn in self.connections.values_mut() {
            tick_ping_and_measurement(conn, delta_seconds, ping_interval);
        }

        if self.config.status_page_listen.is_some() {
            self.refresh_status_snapshot();
        }

        for (slot_index, slot) in self.dial_slots.iter_mut().enumerate() {
            if slot.active_connection_id.is_some() {
                continue;
            }
            match slot.policy.tick(delta_seconds) {
                RetryTick::Wait => {}
                RetryTick::GiveUp => {}
                RetryTick::DialNow { address_index } => {
                    let address = slot.addresses[address_index % slot.addresses.len()].clone();
                    spawn_dial(slot_index, address, dial_tx.clone());
                }
            }
        }
    }

    fn handle_accepted(&mut self, accepted: AcceptedSocket, event_tx: &UnboundedSender<ConnectionEvent>) {
        let id = self.allocate_id();
        let logger = self.logger.make_child_logger(&format!("[CONN:{id}] "));
        log_info!(logger, format!("accepted connection from listener {}", accepted.listen_address));

        let mut conn = Connection::accepted(id, accepted.listen_address, logger);
        let io = spawn_reader_writer(id, accepted.stream, event_tx.clone());
        conn.attach_writer(io.out_tx);
        self.connections.insert(id, conn);
    }

    fn handle_dial_outcome(&mut self, outcome: DialOutcome, event_tx: &UnboundedSender<ConnectionEvent>) {
        let Some(slot) = self.dial_slots.get_mut(outcome.slot_index) else { return };

        match outcome.result {
            Ok(stream) => {
                let id = self.next_connection_id;
                self.next_connection_id += 1;
                let logger = self.logger.make_child_logger(&format!("[CONN:{id}] "));
                log_info!(logger, "dial succeeded, starting handshake");

                let peer_address = stream
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());

                let mut conn = Connection::dialed(id, peer_address, slot.mode, logger);
                conn.application_name = slot.application_name.clone();
                conn.stream_name = slot.stream_name.clone();
                conn.override_application_name = slot.override_application_name.clone();
                conn.override_stream_name = slot.override_stream_name.clone();
                conn.forward_video = slot.forward_video;
                conn.forward_audio = slot.forward_audio;
                conn.forward_data = slot.forward_data;
                conn.server_id = Some(slot.server_index);

                let io = spawn_reader_writer(id, stream, event_tx.clone());
                conn.attach_writer(io.out_tx);
                self.connections.insert(id, conn);
                slot.active_connection_id = Some(id);
            }
            Err(err) => {
                let logger = &self.logger;
                log_warning!(logger, format!("dial attempt failed: {err}"));
                slot.policy.attempt_ended();
            }
        }
    }

    fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Bytes(id, bytes) => self.handle_bytes(id, &bytes),
            ConnectionEvent::Closed(id) => self.handle_closed(id),
        }
    }

    fn handle_bytes(&mut self, id: u64, bytes: &[u8]) {
        let was_handshake_done = self
            .connections
            .get(&id)
            .map(|c| c.handshake_state == crate::rtmp::HandshakeState::Done)
            .unwrap_or(false);

        let actions = {
            let Some(conn) = self.connections.get_mut(&id) else { return };
            match conn.process_inbound_bytes(bytes) {
                Ok(actions) => actions,
                Err(err) => {
                    let logger = &conn.logger;
                    log_error!(logger, format!("protocol error: {err}"));
                    self.close_connection(id);
                    return;
                }
            }
        };

        if !was_handshake_done {
            if let Some(conn) = self.connections.get(&id) {
                if conn.handshake_state == crate::rtmp::HandshakeState::Done {
                    self.note_handshake_done(id);
                }
            }
        }

        for action in actions {
            self.apply_action(id, action);
        }
    }

    fn note_handshake_done(&mut self, id: u64) {
        if let Some(conn) = self.connections.get(&id) {
            if let Some(server_index) = conn.server_id {
                if let Some(slot) = self
                    .dial_slots
                    .iter_mut()
                    .find(|s| s.active_connection_id == Some(id))
                {
                    slot.policy.reset_on_handshake_done(slot.reconnect_count);
                    let _ = server_index;
                }
            }
        }
    }

    fn apply_action(&mut self, id: u64, action: ConnectionAction) {
        match action {
            ConnectionAction::Connect { trans_id, app } => self.handle_connect(id, trans_id, app),
            ConnectionAction::StreamNamed { stream_name } => self.handle_stream_named(id, stream_name),
            ConnectionAction::BecomePublisher => self.handle_become_publisher(id),
            ConnectionAction::BecomeSubscriber => self.handle_become_subscriber(id),
            ConnectionAction::StopPublishing => self.handle_stop_publishing(id),
            ConnectionAction::Audio { timestamp, payload } => self.forward_audio(id, timestamp, &payload),
            ConnectionAction::Video { timestamp, payload } => self.forward_video(id, timestamp, &payload),
            ConnectionAction::Meta { timestamp, data } => self.forward_meta(id, timestamp, &data),
            ConnectionAction::Close => self.close_connection(id),
        }
    }

    fn handle_connect(&mut self, id: u64, trans_id: f64, app: String) {
        let Some(conn) = self.connections.get(&id) else { return };
        let address = conn.peer_address.clone();

        match self.config.find_server_for_connect(&address, &app) {
            Some(server_index) => {
                if let Some(conn) = self.connections.get_mut(&id) {
                    conn.application_name = app;
                    conn.server_id = Some(server_index);
                    conn.accept_connect(trans_id);
                }
            }
            None => {
                if let Some(conn) = self.connections.get_mut(&id) {
                    let logger = &conn.logger;
                    log_warning!(logger, format!("rejected connect for unknown app '{app}' from {address}"));
                }
                self.close_connection(id);
            }
        }
    }

    /// `FCPublish` landed: validates the now-known stream name against
    /// the connect-matched server's input list right away, instead of
    /// waiting for the bind attempt at `publish` time.
    fn handle_stream_named(&mut self, id: u64, stream_name: String) {
        let Some((server_index, address, app)) = self
            .connections
            .get(&id)
            .and_then(|c| c.server_id.map(|s| (s, c.peer_address.clone(), c.application_name.clone())))
        else {
            return;
        };

        let Some(server) = self.servers.get(server_index) else { return };
        if !server.accepts_input(&address, &app, &stream_name) {
            if let Some(conn) = self.connections.get_mut(&id) {
                let logger = &conn.logger;
                log_warning!(logger, format!("rejected stream name '{stream_name}': doesn't match configured input"));
            }
            self.close_connection(id);
        }
    }

    fn handle_become_publisher(&mut self, id: u64) {
        let Some((server_index, address, app, stream_name)) = self.connections.get(&id).and_then(|c| {
            c.server_id
                .map(|s| (s, c.peer_address.clone(), c.application_name.clone(), c.effective_stream_name().to_string()))
        }) else {
            return;
        };

        let Some(server) = self.servers.get_mut(server_index) else { return };

        if !server.accepts_input(&address, &app, &stream_name) {
            if let Some(conn) = self.connections.get_mut(&id) {
                let logger = &conn.logger;
                log_warning!(logger, format!("rejected publish: stream '{stream_name}' doesn't match configured input"));
            }
            self.close_connection(id);
            return;
        }

        if !server.bind_publisher(id, &stream_name) {
            if let Some(conn) = self.connections.get_mut(&id) {
                let logger = &conn.logger;
                log_warning!(logger, "rejected publish: server already has a publisher");
            }
            self.close_connection(id);
        }
    }

    fn handle_become_subscriber(&mut self, id: u64) {
        let Some((server_index, address, app, stream_name)) = self.connections.get(&id).and_then(|c| {
            c.server_id
                .map(|s| (s, c.peer_address.clone(), c.application_name.clone(), c.effective_stream_name().to_string()))
        }) else {
            return;
        };

        let Some(server) = self.servers.get_mut(server_index) else { return };

        if !server.accepts_output(&address, &app, &stream_name) {
            if let Some(conn) = self.connections.get_mut(&id) {
                let logger = &conn.logger;
                log_warning!(logger, format!("rejected subscribe: stream '{stream_name}' doesn't match configured output"));
            }
            self.close_connection(id);
            return;
        }

        server.add_subscriber(id, &mut self.connections);
    }

    fn handle_stop_publishing(&mut self, id: u64) {
        if let Some(server_index) = self.connections.get(&id).and_then(|c| c.server_id) {
            if let Some(server) = self.servers.get_mut(server_index) {
                server.unbind_publisher(id);
            }
        }
    }

    fn forward_audio(&mut self, id: u64, timestamp: u32, payload: &[u8]) {
        let Some(conn) = self.connections.get(&id) else { return };
        let Some(server_index) = conn.server_id else { return };
        let header = conn.audio_header.clone();

        if let Some(server) = self.servers.get_mut(server_index) {
            server.update_audio_header(header);
            server.broadcast_audio(id, timestamp, payload, &mut self.connections);
        }
    }

    fn forward_video(&mut self, id: u64, timestamp: u32, payload: &[u8]) {
        let Some(conn) = self.connections.get(&id) else { return };
        let Some(server_index) = conn.server_id else { return };
        let header = conn.video_header.clone();

        if let Some(server) = self.servers.get_mut(server_index) {
            server.update_video_header(header);
            server.broadcast_video(id, timestamp, payload, &mut self.connections);
        }
    }

    fn forward_meta(&mut self, id: u64, timestamp: u32, data: &crate::rtmp::RtmpData) {
        let server_index = match self.connections.get(&id).and_then(|c| c.server_id) {
            Some(s) => s,
            None => return,
        };
        if let Some(server) = self.servers.get_mut(server_index) {
            server.update_metadata(data.clone());
            server.broadcast_meta(id, timestamp, data, &mut self.connections);
        }
    }

    fn handle_closed(&mut self, id: u64) {
        self.close_connection(id);
    }

    fn close_connection(&mut self, id: u64) {
        if let Some(mut conn) = self.connections.remove(&id) {
            conn.close();
            if let Some(server_index) = conn.server_id {
                if let Some(server) = self.servers.get_mut(server_index) {
                    server.unbind_publisher(id);
                    server.remove_subscriber(id);
                }
            }
        }

        if let Some(slot) = self.dial_slots.iter_mut().find(|s| s.active_connection_id == Some(id)) {
            slot.active_connection_id = None;
            slot.policy.attempt_ended();
        }
    }

    fn dump_status(&self) {
        let report = crate::status::render(self.connections.values(), crate::status::ReportType::Text);
        let logger = &self.logger;
        log_info!(logger, format!("status dump:\n{report}"));
    }

    fn refresh_status_snapshot(&self) {
        let Ok(mut snapshot) = self.status_snapshot.try_lock() else { return };
        snapshot.text = crate::status::render(self.connections.values(), crate::status::ReportType::Text);
        snapshot.html = crate::status::render(self.connections.values(), crate::status::ReportType::Html);
        snapshot.json = crate::status::render(self.connections.values(), crate::status::ReportType::Json);
    }
}

fn make_dial_slot(server_index: usize, mode: Mode, desc: &crate::config::ConnectionDescription) -> DialSlot {
    DialSlot {
        server_index,
        mode,
        addresses: desc.addresses.clone(),
        application_name: desc.application_name.clone(),
        stream_name: desc.stream_name.clone(),
        override_application_name: desc.override_application_name.clone(),
        override_stream_name: desc.override_stream_name.clone(),
        forward_video: desc.video,
        forward_audio: desc.audio,
        forward_data: desc.data,
        reconnect_count: desc.reconnect_count,
        policy: RetryPolicy::new(desc.addresses.len(), desc.connection_timeout, desc.reconnect_interval, desc.reconnect_count),
        active_connection_id: None,
    }
}

fn spawn_listener(address: String, accepted_tx: UnboundedSender<AcceptedSocket>, logger: Logger) {
    tokio::spawn(async move {
        let listener = match super::transport::listen(&address).await {
            Ok(l) => l,
            Err(err) => {
                log_error!(logger, format!("could not bind '{address}': {err}"));
                return;
            }
        };

        log_info!(logger, format!("listening on {address}"));

        loop {
            match listener.accept().await {
                Ok((stream, _peer)) => {
                    if accepted_tx
                        .send(AcceptedSocket { stream, listen_address: address.clone() })
                        .is_err()
                    {
                        return;
                    }
                }
                Err(err) => {
                    log_error!(logger, format!("accept failed on '{address}': {err}"));
                }
            }
        }
    });
}

fn spawn_dial(slot_index: usize, address: String, dial_tx: UnboundedSender<DialOutcome>) {
    tokio::spawn(async move {
        let result = dial(&address).await;
        let _ = dial_tx.send(DialOutcome { slot_index, result });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionDescription, ConnectionKind, ServerDescription};
    use crate::connection::Role;

    fn host_description(kind: ConnectionKind) -> ConnectionDescription {
        ConnectionDescription {
            kind,
            addresses: vec!["0.0.0.0:1935".to_string()],
            connection_timeout: 5.0,
            reconnect_interval: 1.0,
            reconnect_count: 0,
            application_name: "live".to_string(),
            stream_name: String::new(),
            override_application_name: None,
            override_stream_name: None,
            video: true,
            audio: true,
            data: true,
        }
    }

    fn config_with_one_server(input_kind: ConnectionKind, output_kind: ConnectionKind) -> RelayConfiguration {
        RelayConfiguration {
            log_level: 2,
            status_page_listen: None,
            ping_interval: 5.0,
            servers: vec![ServerDescription {
                inputs: vec![host_description(input_kind)],
                outputs: vec![host_description(output_kind)],
            }],
        }
    }

    #[test]
    fn new_turns_client_mode_descriptions_into_dial_slots() {
        let config = config_with_one_server(ConnectionKind::Client, ConnectionKind::Client);
        let supervisor = RelaySupervisor::new(config, Logger::new_disabled());

        assert_eq!(supervisor.dial_slots.len(), 2);
        assert!(supervisor.dial_slots.iter().any(|s| s.mode == Mode::Subscriber));
        assert!(supervisor.dial_slots.iter().any(|s| s.mode == Mode::Publisher));
    }

    #[test]
    fn new_skips_host_mode_descriptions() {
        let config = config_with_one_server(ConnectionKind::Host, ConnectionKind::Host);
        let supervisor = RelaySupervisor::new(config, Logger::new_disabled());

        assert!(supervisor.dial_slots.is_empty());
    }

    #[test]
    fn become_publisher_binds_once_and_rejects_a_second_publisher() {
        let config = config_with_one_server(ConnectionKind::Host, ConnectionKind::Host);
        let mut supervisor = RelaySupervisor::new(config, Logger::new_disabled());

        let mut first = Connection::accepted(1, "0.0.0.0:1935".to_string(), Logger::new_disabled());
        first.role = Role::Receiver;
        first.server_id = Some(0);
        first.application_name = "live".to_string();
        first.stream_name = "a".to_string();
        supervisor.connections.insert(1, first);

        let mut second = Connection::accepted(2, "0.0.0.0:1935".to_string(), Logger::new_disabled());
        second.role = Role::Receiver;
        second.server_id = Some(0);
        second.application_name = "live".to_string();
        second.stream_name = "b".to_string();
        supervisor.connections.insert(2, second);

        supervisor.handle_become_publisher(1);
        assert_eq!(supervisor.servers[0].publisher, Some(1));

        supervisor.handle_become_publisher(2);
        assert_eq!(supervisor.servers[0].publisher, Some(1));
        assert!(!supervisor.connections.contains_key(&2));
    }

    #[test]
    fn closing_the_publisher_frees_its_slot_for_a_later_publisher() {
        let config = config_with_one_server(ConnectionKind::Host, ConnectionKind::Host);
        let mut supervisor = RelaySupervisor::new(config, Logger::new_disabled());

        let mut conn = Connection::accepted(1, "0.0.0.0:1935".to_string(), Logger::new_disabled());
        conn.server_id = Some(0);
        conn.application_name = "live".to_string();
        supervisor.connections.insert(1, conn);
        supervisor.handle_become_publisher(1);
        assert_eq!(supervisor.servers[0].publisher, Some(1));

        supervisor.close_connection(1);

        assert_eq!(supervisor.servers[0].publisher, None);
        assert!(!supervisor.connections.contains_key(&1));
    }

    #[test]
    fn become_publisher_rejects_a_stream_name_outside_a_restrictive_input() {
        let mut restrictive = host_description(ConnectionKind::Host);
        restrictive.stream_name = "allowed".to_string();
        let config = RelayConfiguration {
            log_level: 2,
            status_page_listen: None,
            ping_interval: 5.0,
            servers: vec![ServerDescription { inputs: vec![restrictive], outputs: vec![] }],
        };
        let mut supervisor = RelaySupervisor::new(config, Logger::new_disabled());

        let mut conn = Connection::accepted(1, "0.0.0.0:1935".to_string(), Logger::new_disabled());
        conn.server_id = Some(0);
        conn.application_name = "live".to_string();
        conn.stream_name = "not-allowed".to_string();
        supervisor.connections.insert(1, conn);

        supervisor.handle_become_publisher(1);

        assert!(supervisor.servers[0].publisher.is_none());
        assert!(!supervisor.connections.contains_key(&1));
    }

    #[test]
    fn forward_audio_is_ignored_for_a_connection_not_bound_to_a_server() {
        let config = config_with_one_server(ConnectionKind::Host, ConnectionKind::Host);
        let mut supervisor = RelaySupervisor::new(config, Logger::new_disabled());

        let conn = Connection::accepted(1, "0.0.0.0:1935".to_string(), Logger::new_disabled());
        supervisor.connections.insert(1, conn);

        supervisor.forward_audio(1, 0, &[1, 2, 3]);
        assert!(supervisor.servers[0].cached_audio_header.is_none());
    }

    #[test]
    fn forward_video_syncs_the_connections_header_into_the_servers_cache() {
        let config = config_with_one_server(ConnectionKind::Host, ConnectionKind::Host);
        let mut supervisor = RelaySupervisor::new(config, Logger::new_disabled());

        let mut conn = Connection::accepted(1, "0.0.0.0:1935".to_string(), Logger::new_disabled());
        conn.server_id = Some(0);
        conn.video_header = Some(vec![9, 9]);
        supervisor.connections.insert(1, conn);
        supervisor.servers[0].publisher = Some(1);

        supervisor.forward_video(1, 0, &[1, 2, 3]);

        assert_eq!(supervisor.servers[0].cached_video_header, Some(vec![9, 9]));
    }
}
