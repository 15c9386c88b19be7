// The `Connection` entity: everything about one socket's protocol state.
// Owned exclusively by the relay supervisor. `process_inbound_bytes` is
// the single entry point for bytes arriving off the wire; it either
// resolves fully in place (handshake progress, control messages, simple
// command replies) or returns a `ConnectionAction` for the supervisor to
// apply against the wider arena (binding a publisher, fanning out a
// media frame, tearing down a subscription).

use std::collections::VecDeque;

use byteorder::{BigEndian, ByteOrder};
use indexmap::IndexMap;
use tokio::sync::mpsc::UnboundedSender;

use crate::amf::Amf0Value;
use crate::error::ProtocolError;
use crate::log::Logger;
use crate::relay::RetryPolicy;
use crate::rtmp::{
    self, messages, ChunkFramer, HandshakeState, RtmpCommand, RtmpData, RtmpMessage,
    RESERVED_STREAM_ID_CONNECTION, RESERVED_STREAM_ID_TWO,
    RTMP_DEFAULT_PEER_BANDWIDTH_LIMIT_TYPE, RTMP_DEFAULT_SERVER_BANDWIDTH, RTMP_TYPE_ABORT,
    RTMP_TYPE_ACKNOWLEDGEMENT, RTMP_TYPE_AUDIO, RTMP_TYPE_DATA_AMF0, RTMP_TYPE_INVOKE,
    RTMP_TYPE_SET_CHUNK_SIZE, RTMP_TYPE_SET_PEER_BANDWIDTH, RTMP_TYPE_USER_CONTROL, RTMP_TYPE_VIDEO,
    RTMP_TYPE_WINDOW_ACK_SIZE,
};

use super::{dispatch_receiver_command, dispatch_sender_command};

/// Which command-dispatch table a connection uses once the handshake
/// completes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The remote peer publishes to, or commands, us — we answer the
    /// receiver-role dialogue in `dialogue_receiver`.
    Receiver,
    /// We drive the dialogue — connect/createStream/publish or play —
    /// against a remote origin or subscriber endpoint.
    Sender,
}

/// What a connection is doing with its bound stream, once known
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Publisher,
    Subscriber,
}

/// How the underlying socket came to exist
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Accepted,
    Dialed,
}

/// Work a `Connection` cannot finish by itself because it crosses into
/// another connection's state or a `Server`'s routing table. Returned
/// from `process_inbound_bytes` / dispatch for the supervisor to apply.
#[derive(Debug, Clone)]
pub enum ConnectionAction {
    /// `connect` landed on a receiver-role connection: the supervisor
    /// must check `app` against the configured servers for this
    /// connection's listen address before replying accept/reject.
    Connect { trans_id: f64, app: String },
    /// `FCPublish` landed on a receiver-role connection: the stream name
    /// is now known, ahead of `publish`. The supervisor validates it
    /// against the matched server's input list right away.
    StreamNamed { stream_name: String },
    /// `publish` landed on a receiver-role connection, or `play` landed
    /// (i.e. succeeded) on a sender-role connection dialed to pull an
    /// upstream origin: try to bind it as the matching server's
    /// publisher.
    BecomePublisher,
    /// `publish` succeeded on a sender-role connection dialed to push to
    /// a downstream output: register it as a subscriber of the matching
    /// server so it receives the broadcast.
    BecomeSubscriber,
    /// `FCUnpublish` / `deleteStream` landed, or a dialed connection
    /// dropped: release the publisher slot or drop the subscription.
    StopPublishing,
    /// An inbound AUDIO message, ready for fan-out to subscribers.
    Audio { timestamp: u32, payload: Vec<u8> },
    /// An inbound VIDEO message, ready for fan-out to subscribers.
    Video { timestamp: u32, payload: Vec<u8> },
    /// `@setDataFrame`/`onMetaData`/`onTextData`, ready for fan-out.
    Meta { timestamp: u32, data: RtmpData },
    /// A protocol violation or a rejected `connect` — close the socket.
    Close,
}

/// One RTMP connection: a publisher dialed out to, a subscriber we dial
/// out to, or an accepted socket acting as either.
pub struct Connection {
    pub id: u64,
    pub role: Role,
    pub mode: Option<Mode>,
    pub direction: Direction,
    pub peer_address: String,
    pub logger: Logger,

    pub handshake_state: HandshakeState,
    handshake_buffer: Vec<u8>,
    pending_c1: Vec<u8>,

    pub chunk: ChunkFramer,
    pub server_bandwidth: u32,

    pub invoke_id_counter: u32,
    pub outstanding_invokes: IndexMap<u32, String>,

    pub stream_id: u32,
    pub next_stream_id: u32,
    pub stream_name: String,
    pub application_name: String,
    pub override_application_name: Option<String>,
    pub override_stream_name: Option<String>,

    pub audio_header: Option<Vec<u8>>,
    pub video_header: Option<Vec<u8>>,
    pub metadata: Option<RtmpData>,

    pub ping_accum: f32,
    pub measure_accum: f32,
    audio_bytes_this_second: u64,
    video_bytes_this_second: u64,
    pub audio_byte_rate: u64,
    pub video_byte_rate: u64,

    /// Which media channels we forward, per the matched server
    /// description's `video`/`audio`/`data` flags
    pub forward_video: bool,
    pub forward_audio: bool,
    pub forward_data: bool,

    pub reconnect: Option<RetryPolicy>,
    pub server_id: Option<usize>,

    out_tx: Option<UnboundedSender<Vec<u8>>>,
    pending_out: VecDeque<Vec<u8>>,
}

impl Connection {
    fn new(id: u64, role: Role, direction: Direction, peer_address: String, logger: Logger) -> Connection {
        Connection {
            id,
            role,
            mode: None,
            direction,
            peer_address,
            logger,
            handshake_state: match direction {
                Direction::Accepted => HandshakeState::AwaitingC0C1,
                Direction::Dialed => HandshakeState::AwaitingS0S1,
            },
            handshake_buffer: Vec::new(),
            pending_c1: Vec::new(),
            chunk: ChunkFramer::new(),
            server_bandwidth: RTMP_DEFAULT_SERVER_BANDWIDTH,
            invoke_id_counter: 0,
            outstanding_invokes: IndexMap::new(),
            stream_id: 0,
            next_stream_id: 1,
            stream_name: String::new(),
            application_name: String::new(),
            override_application_name: None,
            override_stream_name: None,
            audio_header: None,
            video_header: None,
            metadata: None,
            ping_accum: 0.0,
            measure_accum: 0.0,
            audio_bytes_this_second: 0,
            video_bytes_this_second: 0,
            audio_byte_rate: 0,
            video_byte_rate: 0,
            forward_video: true,
            forward_audio: true,
            forward_data: true,
            reconnect: None,
            server_id: None,
            out_tx: None,
            pending_out: VecDeque::new(),
        }
    }

    /// Builds a freshly accepted socket's connection: we are the
    /// receiver, the peer is expected to publish or issue commands.
    pub fn accepted(id: u64, peer_address: String, logger: Logger) -> Connection {
        Connection::new(id, Role::Receiver, Direction::Accepted, peer_address, logger)
    }

    /// Builds a connection we dialed out: we drive the sender-role
    /// dialogue (`connect`, then `publish` for a push/output connection
    /// or `play` for a pull/input connection).
    pub fn dialed(id: u64, peer_address: String, mode: Mode, logger: Logger) -> Connection {
        let mut conn = Connection::new(id, Role::Sender, Direction::Dialed, peer_address, logger);
        conn.mode = Some(mode);
        conn
    }

    /// Wires the channel used to push encoded bytes to this connection's
    /// writer task. Anything queued before this is called (there
    /// shouldn't be any) is flushed immediately.
    pub fn attach_writer(&mut self, out_tx: UnboundedSender<Vec<u8>>) {
        for bytes in self.pending_out.drain(..) {
            let _ = out_tx.send(bytes);
        }
        self.out_tx = Some(out_tx);
    }

    fn send_raw(&mut self, bytes: Vec<u8>) {
        match &self.out_tx {
            Some(tx) => {
                let _ = tx.send(bytes);
            }
            None => self.pending_out.push_back(bytes),
        }
    }

    pub(crate) fn send_message(&mut self, message: &RtmpMessage) {
        let mut bytes = Vec::new();
        self.chunk.encode_message(message, &mut bytes);
        self.send_raw(bytes);
    }

    pub(crate) fn next_invoke_id(&mut self) -> u32 {
        self.invoke_id_counter += 1;
        self.invoke_id_counter
    }

    /// Sends `connect(app)` and records the matching outstanding invoke;
    /// the first step of the sender-role dialogue.
    pub fn begin_sender_dialogue(&mut self) {
        let tid = self.next_invoke_id();
        self.outstanding_invokes.insert(tid, "connect".to_string());
        let msg = messages::connect_command(&self.application_name, tid as f64);
        self.send_message(&msg);
    }

    /// Feeds newly-arrived bytes through the handshake, then — once
    /// complete — through the chunk framer and command/media dispatch.
    /// Returns every cross-connection action the caller (the supervisor)
    /// must apply.
    pub fn process_inbound_bytes(&mut self, bytes: &[u8]) -> Result<Vec<ConnectionAction>, ProtocolError> {
        let mut actions = Vec::new();

        if self.handshake_state != HandshakeState::Done {
            self.drive_handshake(bytes)?;
            return Ok(actions);
        }

        let messages = self.chunk.push_bytes(bytes)?;
        for message in messages {
            self.dispatch_message(message, &mut actions)?;
        }

        Ok(actions)
    }

    fn drive_handshake(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.handshake_buffer.extend_from_slice(bytes);

        match self.handshake_state {
            HandshakeState::AwaitingC0C1 => {
                if self.handshake_buffer.len() < 1 + rtmp::RTMP_HANDSHAKE_SIG_SIZE {
                    return Ok(());
                }
                let c0 = self.handshake_buffer[0];
                let c1: Vec<u8> = self.handshake_buffer[1..1 + rtmp::RTMP_HANDSHAKE_SIG_SIZE].to_vec();
                let response = rtmp::respond_to_c0_c1(c0, &c1)?;
                self.handshake_buffer.drain(0..1 + rtmp::RTMP_HANDSHAKE_SIG_SIZE);
                self.send_raw(response);
                self.handshake_state = HandshakeState::AwaitingC2;
            }
            HandshakeState::AwaitingC2 => {
                if self.handshake_buffer.len() < rtmp::RTMP_HANDSHAKE_SIG_SIZE {
                    return Ok(());
                }
                self.handshake_buffer.drain(0..rtmp::RTMP_HANDSHAKE_SIG_SIZE);
                self.handshake_state = HandshakeState::Done;
            }
            HandshakeState::AwaitingS0S1 => {
                if self.handshake_buffer.len() < 1 + rtmp::RTMP_HANDSHAKE_SIG_SIZE {
                    return Ok(());
                }
                let s0 = self.handshake_buffer[0];
                let s1: Vec<u8> = self.handshake_buffer[1..1 + rtmp::RTMP_HANDSHAKE_SIG_SIZE].to_vec();
                let c2 = rtmp::respond_to_s0_s1(s0, &s1)?;
                self.handshake_buffer.drain(0..1 + rtmp::RTMP_HANDSHAKE_SIG_SIZE);
                self.send_raw(c2);
                self.handshake_state = HandshakeState::AwaitingS2;
            }
            HandshakeState::AwaitingS2 => {
                if self.handshake_buffer.len() < rtmp::RTMP_HANDSHAKE_SIG_SIZE {
                    return Ok(());
                }
                self.handshake_buffer.drain(0..rtmp::RTMP_HANDSHAKE_SIG_SIZE);
                self.handshake_state = HandshakeState::Done;
                self.begin_sender_dialogue();
            }
            HandshakeState::Done => {}
        }

        Ok(())
    }

    fn dispatch_message(&mut self, message: RtmpMessage, actions: &mut Vec<ConnectionAction>) -> Result<(), ProtocolError> {
        match message.header.message_type_id {
            RTMP_TYPE_SET_CHUNK_SIZE => {
                if message.body.len() >= 4 {
                    self.chunk.set_in_chunk_size(BigEndian::read_u32(&message.body))?;
                }
            }
            RTMP_TYPE_ABORT => {
                if message.body.len() >= 4 {
                    self.chunk.abort_channel(BigEndian::read_u32(&message.body));
                }
            }
            RTMP_TYPE_ACKNOWLEDGEMENT | RTMP_TYPE_USER_CONTROL | RTMP_TYPE_WINDOW_ACK_SIZE | RTMP_TYPE_SET_PEER_BANDWIDTH => {
                // informational only; no response required from either role
            }
            RTMP_TYPE_AUDIO => {
                self.audio_bytes_this_second += message.body.len() as u64;
                if looks_like_sequence_header(&message.body) {
                    self.audio_header = Some(message.body.clone());
                }
                actions.push(ConnectionAction::Audio {
                    timestamp: message.header.timestamp,
                    payload: message.body,
                });
            }
            RTMP_TYPE_VIDEO => {
                self.video_bytes_this_second += message.body.len() as u64;
                if looks_like_sequence_header(&message.body) {
                    self.video_header = Some(message.body.clone());
                }
                actions.push(ConnectionAction::Video {
                    timestamp: message.header.timestamp,
                    payload: message.body,
                });
            }
            RTMP_TYPE_DATA_AMF0 => {
                let data = RtmpData::decode(&message.body)?;
                let data = if data.tag == "@setDataFrame" { data.to_on_metadata() } else { data };
                // `onTextData` forwards without touching the cached
                // metadata replayed to freshly-bound subscribers.
                if data.tag == "onMetaData" {
                    self.metadata = Some(data.clone());
                }
                actions.push(ConnectionAction::Meta {
                    timestamp: message.header.timestamp,
                    data,
                });
            }
            RTMP_TYPE_INVOKE => {
                let command = RtmpCommand::decode(&message.body)?;
                match self.role {
                    Role::Receiver => dispatch_receiver_command(self, &command, actions)?,
                    Role::Sender => dispatch_sender_command(self, &command, actions)?,
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Allocates the next `createStream` id, skipping the reserved ids.
    pub fn allocate_stream_id(&mut self) -> u32 {
        loop {
            let candidate = self.next_stream_id;
            self.next_stream_id = self.next_stream_id.wrapping_add(1);
            if candidate != RESERVED_STREAM_ID_CONNECTION && candidate != RESERVED_STREAM_ID_TWO {
                self.stream_id = candidate;
                return candidate;
            }
        }
    }

    /// Latches and resets the per-second byte counters into the
    /// reported rate; called once per elapsed real-time second.
    pub fn latch_measurement(&mut self) {
        self.audio_byte_rate = self.audio_bytes_this_second;
        self.video_byte_rate = self.video_bytes_this_second;
        self.audio_bytes_this_second = 0;
        self.video_bytes_this_second = 0;
    }

    /// The application/stream name an outbound command should carry:
    /// the override when one is configured, otherwise the inbound value.
    pub fn effective_application_name(&self) -> &str {
        self.override_application_name.as_deref().unwrap_or(&self.application_name)
    }

    pub fn effective_stream_name(&self) -> &str {
        self.override_stream_name.as_deref().unwrap_or(&self.stream_name)
    }

    // --- internal sink interface used by `Server` fan-out ---

    pub fn send_audio_header(&mut self) {
        if let Some(header) = self.audio_header.clone() {
            self.send_audio(0, &header);
        }
    }

    pub fn send_video_header(&mut self) {
        if let Some(header) = self.video_header.clone() {
            self.send_video(0, &header);
        }
    }

    pub fn send_metadata(&mut self) {
        if let Some(data) = self.metadata.clone() {
            self.send_text_data(0, &data);
        }
    }

    pub fn send_audio(&mut self, timestamp: u32, payload: &[u8]) {
        if !self.forward_audio {
            return;
        }
        let msg = messages::audio_message(self.stream_id, payload, timestamp);
        self.send_message(&msg);
    }

    pub fn send_video(&mut self, timestamp: u32, payload: &[u8]) {
        if !self.forward_video {
            return;
        }
        let msg = messages::video_message(self.stream_id, payload, timestamp);
        self.send_message(&msg);
    }

    pub fn send_text_data(&mut self, timestamp: u32, data: &RtmpData) {
        if !self.forward_data {
            return;
        }
        let msg = messages::data_message(data, self.stream_id, timestamp);
        self.send_message(&msg);
    }

    /// Accepts a `connect` that passed the application-name filter:
    /// sends the bandwidth/ping preamble, the `_result`, then
    /// `onBWDone`, exactly the sequence a Flash-derived client expects
    /// before it will issue `createStream`.
    pub fn accept_connect(&mut self, trans_id: f64) {
        self.send_message(&messages::window_ack_size(self.server_bandwidth));
        self.send_message(&messages::set_peer_bandwidth(
            self.server_bandwidth,
            RTMP_DEFAULT_PEER_BANDWIDTH_LIMIT_TYPE,
        ));
        self.send_message(&messages::stream_begin(RESERVED_STREAM_ID_CONNECTION));
        let out_chunk_size = self.chunk.out_chunk_size();
        self.send_message(&messages::set_chunk_size(out_chunk_size));
        self.send_message(&messages::connect_response(trans_id));

        let mut bw_done = RtmpCommand::new("onBWDone");
        bw_done.set_argument("transId", Amf0Value::number(0.0));
        bw_done.set_argument("cmdObj", Amf0Value::Null);
        self.send_message(&messages::invoke(&bw_done, RESERVED_STREAM_ID_CONNECTION));
    }

    pub fn close(&mut self) {
        // Dropping the writer handle ends the writer task's select loop
        // on its next poll; nothing else to do on the protocol side.
        self.out_tx = None;
    }
}

/// FLV AUDIODATA/VIDEODATA sequence headers carry a fixed marker in
/// their second byte (AAC/AVC "sequence header" packet type 0); both
/// codecs agree on this layout closely enough for cache-replay purposes.
fn looks_like_sequence_header(payload: &[u8]) -> bool {
    payload.len() >= 2 && payload[1] == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Logger;

    fn logger() -> Logger {
        Logger::new_disabled()
    }

    #[test]
    fn accepted_connection_starts_awaiting_c0_c1() {
        let conn = Connection::accepted(1, "127.0.0.1:1935".to_string(), logger());
        assert_eq!(conn.handshake_state, HandshakeState::AwaitingC0C1);
        assert_eq!(conn.role, Role::Receiver);
    }

    #[test]
    fn dialed_connection_starts_awaiting_s0_s1() {
        let conn = Connection::dialed(2, "127.0.0.1:1935".to_string(), Mode::Publisher, logger());
        assert_eq!(conn.handshake_state, HandshakeState::AwaitingS0S1);
        assert_eq!(conn.role, Role::Sender);
    }

    #[test]
    fn accepted_connection_completes_handshake_and_buffers_reply() {
        let mut conn = Connection::accepted(1, "127.0.0.1:1935".to_string(), logger());

        let c1 = rtmp::build_signature();
        let mut c0_c1 = vec![0x03u8];
        c0_c1.extend(&c1);

        conn.process_inbound_bytes(&c0_c1).unwrap();
        assert_eq!(conn.handshake_state, HandshakeState::AwaitingC2);

        let c2 = rtmp::build_signature();
        conn.process_inbound_bytes(&c2).unwrap();
        assert_eq!(conn.handshake_state, HandshakeState::Done);
    }

    #[test]
    fn bad_version_byte_is_rejected() {
        let mut conn = Connection::accepted(1, "127.0.0.1:1935".to_string(), logger());
        let mut bytes = vec![0x06u8];
        bytes.extend(rtmp::build_signature());

        let err = conn.process_inbound_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedVersion(0x06)));
    }

    #[test]
    fn allocate_stream_id_skips_reserved_ids() {
        let mut conn = Connection::accepted(1, "127.0.0.1:1935".to_string(), logger());
        assert_eq!(conn.allocate_stream_id(), 1);
        assert_eq!(conn.allocate_stream_id(), 3);
        assert_eq!(conn.allocate_stream_id(), 4);
    }

    #[test]
    fn measurement_latches_and_resets_counters() {
        let mut conn = Connection::accepted(1, "127.0.0.1:1935".to_string(), logger());
        conn.audio_bytes_this_second = 1000;
        conn.video_bytes_this_second = 2000;
        conn.latch_measurement();
        assert_eq!(conn.audio_byte_rate, 1000);
        assert_eq!(conn.video_byte_rate, 2000);
        assert_eq!(conn.audio_bytes_this_second, 0);
    }
}
