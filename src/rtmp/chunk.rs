// Chunk framer
//
// Splits and reassembles RTMP messages across the fixed-size chunks that
// share the underlying TCP byte stream. One `ChunkFramer` serves both
// directions of a connection: decoding uses `in_chunk_size` and the decode
// channel table, encoding uses `out_chunk_size` and the encode channel
// table. The two tables are independent, matching the per-direction
// chunk-stream state the protocol requires.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::ProtocolError;

use super::constants::{message_header_size, RTMP_CHUNK_SIZE_DEFAULT, RTMP_MAX_CHUNK_SIZE, RTMP_MIN_CHUNK_SIZE};
use super::header::RtmpHeader;

const EXTENDED_TIMESTAMP_MARKER: u32 = 0x00FF_FFFF;

/// A fully reassembled RTMP message
#[derive(Clone, Debug, PartialEq)]
pub struct RtmpMessage {
    pub header: RtmpHeader,
    pub body: Vec<u8>,
}

/// In-flight (incomplete) message state for a decode channel
struct PendingMessage {
    header: RtmpHeader,
    body: Vec<u8>,
}

/// Per-channel state on the decode side
#[derive(Default)]
struct DecodeChannelState {
    last_header: Option<RtmpHeader>,
    pending: Option<PendingMessage>,
}

/// Per-channel state on the encode side
#[derive(Default)]
struct EncodeChannelState {
    last_header: Option<RtmpHeader>,
}

/// Splits/reassembles RTMP messages over a chunked TCP byte stream
pub struct ChunkFramer {
    in_chunk_size: u32,
    out_chunk_size: u32,
    recv_buffer: Vec<u8>,
    decode_channels: HashMap<u32, DecodeChannelState>,
    encode_channels: HashMap<u32, EncodeChannelState>,
}

impl Default for ChunkFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkFramer {
    pub fn new() -> ChunkFramer {
        ChunkFramer {
            in_chunk_size: RTMP_CHUNK_SIZE_DEFAULT,
            out_chunk_size: RTMP_CHUNK_SIZE_DEFAULT,
            recv_buffer: Vec::new(),
            decode_channels: HashMap::new(),
            encode_channels: HashMap::new(),
        }
    }

    pub fn in_chunk_size(&self) -> u32 {
        self.in_chunk_size
    }

    pub fn out_chunk_size(&self) -> u32 {
        self.out_chunk_size
    }

    /// Applies a SET_CHUNK_SIZE value received from the peer
    pub fn set_in_chunk_size(&mut self, size: u32) -> Result<(), ProtocolError> {
        validate_chunk_size(size)?;
        self.in_chunk_size = size;
        Ok(())
    }

    /// Applies a SET_CHUNK_SIZE value we are about to send to the peer
    pub fn set_out_chunk_size(&mut self, size: u32) -> Result<(), ProtocolError> {
        validate_chunk_size(size)?;
        self.out_chunk_size = size;
        Ok(())
    }

    /// Discards the buffered body of an in-flight message on `channel`
    /// (ABORT, type 2)
    pub fn abort_channel(&mut self, channel: u32) {
        if let Some(state) = self.decode_channels.get_mut(&channel) {
            state.pending = None;
        }
    }

    /// Feeds newly-received bytes into the decoder, returning every
    /// message that became complete as a result
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<Vec<RtmpMessage>, ProtocolError> {
        self.recv_buffer.extend_from_slice(bytes);

        let mut messages = Vec::new();

        loop {
            match self.try_parse_chunk()? {
                Some(Some(message)) => messages.push(message),
                Some(None) => continue,
                None => break,
            }
        }

        Ok(messages)
    }

    /// Attempts to parse exactly one chunk from the front of `recv_buffer`.
    ///
    /// Returns `Ok(None)` if not enough bytes are buffered yet (nothing is
    /// consumed). Returns `Ok(Some(None))` if a chunk was consumed but the
    /// message it belongs to is still incomplete. Returns
    /// `Ok(Some(Some(message)))` once a message completes.
    #[allow(clippy::type_complexity)]
    fn try_parse_chunk(&mut self) -> Result<Option<Option<RtmpMessage>>, ProtocolError> {
        if self.recv_buffer.is_empty() {
            return Ok(None);
        }

        let first = self.recv_buffer[0];
        let fmt = first >> 6;
        let low6 = first & 0x3F;

        let (basic_len, channel) = match low6 {
            0 => {
                if self.recv_buffer.len() < 2 {
                    return Ok(None);
                }
                (2usize, 64 + self.recv_buffer[1] as u32)
            }
            1 => {
                if self.recv_buffer.len() < 3 {
                    return Ok(None);
                }
                let channel = 64 + self.recv_buffer[1] as u32 + 256 * self.recv_buffer[2] as u32;
                (3usize, channel)
            }
            n => (1usize, n as u32),
        };

        let pending_in_flight = self
            .decode_channels
            .get(&channel)
            .and_then(|s| s.pending.as_ref())
            .is_some();

        if pending_in_flight {
            if fmt != 3 {
                return Err(ProtocolError::InterleavedMessage { channel });
            }

            return self.continue_pending_message(channel, basic_len);
        }

        self.start_new_message(channel, fmt, basic_len)
    }

    fn continue_pending_message(
        &mut self,
        channel: u32,
        basic_len: usize,
    ) -> Result<Option<Option<RtmpMessage>>, ProtocolError> {
        let extended = {
            let state = self.decode_channels.get(&channel).expect("checked above");
            state
                .pending
                .as_ref()
                .expect("checked above")
                .header
                .has_extended_timestamp
        };

        let mut offset = basic_len;
        if extended {
            offset += 4;
        }

        if self.recv_buffer.len() < offset {
            return Ok(None);
        }

        let (remaining, in_chunk_size) = {
            let state = self.decode_channels.get(&channel).expect("checked above");
            let pending = state.pending.as_ref().expect("checked above");
            (
                pending.header.message_length as usize - pending.body.len(),
                self.in_chunk_size as usize,
            )
        };

        let body_chunk_len = remaining.min(in_chunk_size.max(1));

        if self.recv_buffer.len() < offset + body_chunk_len {
            return Ok(None);
        }

        let chunk_body = self.recv_buffer[offset..offset + body_chunk_len].to_vec();
        self.recv_buffer.drain(0..offset + body_chunk_len);

        let state = self.decode_channels.get_mut(&channel).expect("checked above");
        let mut pending = state.pending.take().expect("checked above");
        pending.body.extend_from_slice(&chunk_body);

        if pending.body.len() as u32 >= pending.header.message_length {
            state.last_header = Some(pending.header.clone());
            Ok(Some(Some(RtmpMessage {
                header: pending.header,
                body: pending.body,
            })))
        } else {
            state.pending = Some(pending);
            Ok(Some(None))
        }
    }

    fn start_new_message(
        &mut self,
        channel: u32,
        fmt: u8,
        basic_len: usize,
    ) -> Result<Option<Option<RtmpMessage>>, ProtocolError> {
        let header_field_len = message_header_size(fmt);
        let mut offset = basic_len;

        if self.recv_buffer.len() < offset + header_field_len {
            return Ok(None);
        }

        let last_header = self.decode_channels.get(&channel).and_then(|s| s.last_header.clone());

        if fmt != 0 && last_header.is_none() {
            return Err(ProtocolError::BadChunkHeader { channel });
        }

        // Peek the timestamp/delta field to know whether an extended
        // timestamp follows, without yet committing to consuming it.
        let needs_extended_peek = fmt <= 2;
        let raw_ts_field = if needs_extended_peek {
            let b = &self.recv_buffer[offset..offset + 3];
            u32::from_be_bytes([0, b[0], b[1], b[2]])
        } else {
            0
        };

        let is_extended = if fmt <= 2 {
            raw_ts_field == EXTENDED_TIMESTAMP_MARKER
        } else {
            last_header.as_ref().map(|h| h.has_extended_timestamp).unwrap_or(false)
        };

        let extended_bytes = if is_extended { 4 } else { 0 };

        if self.recv_buffer.len() < offset + header_field_len + extended_bytes {
            return Ok(None);
        }

        let header_bytes = self.recv_buffer[offset..offset + header_field_len].to_vec();
        offset += header_field_len;

        let extended_ts = if is_extended {
            let b = &self.recv_buffer[offset..offset + 4];
            let v = BigEndian::read_u32(b);
            offset += 4;
            Some(v)
        } else {
            None
        };

        let header = build_header(fmt, channel, &header_bytes, extended_ts, last_header.as_ref())?;

        let message_length = header.message_length as usize;
        let in_chunk_size = self.in_chunk_size as usize;
        let body_chunk_len = message_length.min(in_chunk_size.max(1));

        if self.recv_buffer.len() < offset + body_chunk_len {
            return Ok(None);
        }

        let body = self.recv_buffer[offset..offset + body_chunk_len].to_vec();
        self.recv_buffer.drain(0..offset + body_chunk_len);

        let state = self.decode_channels.entry(channel).or_default();

        if body.len() == message_length {
            state.last_header = Some(header.clone());
            Ok(Some(Some(RtmpMessage { header, body })))
        } else {
            state.pending = Some(PendingMessage { header, body });
            Ok(Some(None))
        }
    }

    /// Encodes `message` into `out`, choosing the smallest chunk header
    /// format given the last header sent on the same channel, then
    /// splitting the body across `out_chunk_size`-sized chunks.
    pub fn encode_message(&mut self, message: &RtmpMessage, out: &mut Vec<u8>) {
        let channel = message.header.channel;
        let previous = self.encode_channels.get(&channel).and_then(|s| s.last_header.clone());

        let delta = match &previous {
            Some(prev) => message.header.timestamp.wrapping_sub(prev.timestamp),
            None => message.header.timestamp,
        };

        let fmt = match &previous {
            None => 0,
            Some(prev) => {
                if message.header.message_stream_id != prev.message_stream_id {
                    0
                } else if message.header.message_length != prev.message_length
                    || message.header.message_type_id != prev.message_type_id
                {
                    1
                } else if delta != prev.timestamp_delta {
                    2
                } else {
                    3
                }
            }
        };

        let is_extended = if fmt == 0 {
            message.header.timestamp >= EXTENDED_TIMESTAMP_MARKER
        } else {
            delta >= EXTENDED_TIMESTAMP_MARKER
        };

        write_basic_header(fmt, channel, out);

        match fmt {
            0 => {
                write_u24(out, message.header.timestamp.min(EXTENDED_TIMESTAMP_MARKER));
                write_u24(out, message.header.message_length);
                out.push(message.header.message_type_id);
                let mut stream_id = [0u8; 4];
                LittleEndian::write_u32(&mut stream_id, message.header.message_stream_id);
                out.extend(stream_id);
            }
            1 => {
                write_u24(out, delta.min(EXTENDED_TIMESTAMP_MARKER));
                write_u24(out, message.header.message_length);
                out.push(message.header.message_type_id);
            }
            2 => {
                write_u24(out, delta.min(EXTENDED_TIMESTAMP_MARKER));
            }
            _ => {}
        }

        if is_extended {
            let mut b = [0u8; 4];
            BigEndian::write_u32(&mut b, message.header.timestamp);
            out.extend(b);
        }

        let out_chunk_size = self.out_chunk_size as usize;
        let mut sent = 0usize;
        let body = &message.body;

        if body.is_empty() {
            // nothing more to write
        }

        while sent < body.len() {
            let take = (body.len() - sent).min(out_chunk_size.max(1));
            out.extend(&body[sent..sent + take]);
            sent += take;

            if sent < body.len() {
                write_basic_header(3, channel, out);
                if is_extended {
                    let mut b = [0u8; 4];
                    BigEndian::write_u32(&mut b, message.header.timestamp);
                    out.extend(b);
                }
            }
        }

        let mut stored = message.header.clone();
        stored.timestamp_delta = delta;
        stored.has_extended_timestamp = is_extended;

        self.encode_channels.entry(channel).or_default().last_header = Some(stored);
    }
}

fn validate_chunk_size(size: u32) -> Result<(), ProtocolError> {
    if !(RTMP_MIN_CHUNK_SIZE..=RTMP_MAX_CHUNK_SIZE).contains(&size) {
        return Err(ProtocolError::BadChunkSize(size));
    }
    Ok(())
}

fn write_u24(out: &mut Vec<u8>, value: u32) {
    let mut b = [0u8; 4];
    BigEndian::write_u32(&mut b, value);
    out.extend(&b[1..]);
}

fn write_basic_header(fmt: u8, channel: u32, out: &mut Vec<u8>) {
    if channel >= 64 + 255 {
        let offset = channel - 64;
        out.push((fmt << 6) | 1);
        out.push(offset as u8);
        out.push((offset >> 8) as u8);
    } else if channel >= 64 {
        out.push(fmt << 6);
        out.push((channel - 64) as u8);
    } else {
        out.push((fmt << 6) | (channel as u8));
    }
}

fn build_header(
    fmt: u8,
    channel: u32,
    header_bytes: &[u8],
    extended_ts: Option<u32>,
    last_header: Option<&RtmpHeader>,
) -> Result<RtmpHeader, ProtocolError> {
    match fmt {
        0 => {
            let raw_ts = u32::from_be_bytes([0, header_bytes[0], header_bytes[1], header_bytes[2]]);
            let timestamp = extended_ts.unwrap_or(raw_ts);
            let message_length =
                u32::from_be_bytes([0, header_bytes[3], header_bytes[4], header_bytes[5]]);
            let message_type_id = header_bytes[6];
            let message_stream_id = LittleEndian::read_u32(&header_bytes[7..11]);

            Ok(RtmpHeader {
                channel,
                timestamp,
                message_length,
                message_type_id,
                message_stream_id,
                timestamp_delta: 0,
                has_extended_timestamp: extended_ts.is_some(),
            })
        }
        1 => {
            let raw_delta = u32::from_be_bytes([0, header_bytes[0], header_bytes[1], header_bytes[2]]);
            let delta = extended_ts.unwrap_or(raw_delta);
            let message_length =
                u32::from_be_bytes([0, header_bytes[3], header_bytes[4], header_bytes[5]]);
            let message_type_id = header_bytes[6];

            let last = last_header.expect("validated by caller");

            Ok(RtmpHeader {
                channel,
                timestamp: last.timestamp.wrapping_add(delta),
                message_length,
                message_type_id,
                message_stream_id: last.message_stream_id,
                timestamp_delta: delta,
                has_extended_timestamp: extended_ts.is_some(),
            })
        }
        2 => {
            let raw_delta = u32::from_be_bytes([0, header_bytes[0], header_bytes[1], header_bytes[2]]);
            let delta = extended_ts.unwrap_or(raw_delta);

            let last = last_header.expect("validated by caller");

            Ok(RtmpHeader {
                channel,
                timestamp: last.timestamp.wrapping_add(delta),
                message_length: last.message_length,
                message_type_id: last.message_type_id,
                message_stream_id: last.message_stream_id,
                timestamp_delta: delta,
                has_extended_timestamp: extended_ts.is_some(),
            })
        }
        _ => {
            let last = last_header.expect("validated by caller");

            Ok(RtmpHeader {
                channel,
                timestamp: last.timestamp.wrapping_add(last.timestamp_delta),
                message_length: last.message_length,
                message_type_id: last.message_type_id,
                message_stream_id: last.message_stream_id,
                timestamp_delta: last.timestamp_delta,
                has_extended_timestamp: last.has_extended_timestamp,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_message(channel: u32, stream_id: u32, type_id: u8, timestamp: u32, body: Vec<u8>) -> RtmpMessage {
        RtmpMessage {
            header: RtmpHeader {
                channel,
                timestamp,
                message_length: body.len() as u32,
                message_type_id: type_id,
                message_stream_id: stream_id,
                timestamp_delta: 0,
                has_extended_timestamp: false,
            },
            body,
        }
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let mut encoder = ChunkFramer::new();
        let msg = make_message(6, 1, 18, 1000, vec![1, 2, 3, 4, 5]);

        let mut bytes = Vec::new();
        encoder.encode_message(&msg, &mut bytes);

        let mut decoder = ChunkFramer::new();
        let messages = decoder.push_bytes(&bytes).unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], msg);
    }

    #[test]
    fn reassembles_message_split_across_small_chunk_size() {
        let mut decoder = ChunkFramer::new();
        decoder.set_in_chunk_size(8).unwrap();

        let body: Vec<u8> = (0..20u8).collect();
        let header = RtmpHeader {
            channel: 6,
            timestamp: 0,
            message_length: 20,
            message_type_id: 18,
            message_stream_id: 1,
            timestamp_delta: 0,
            has_extended_timestamp: false,
        };

        let mut bytes = Vec::new();
        write_basic_header(0, 6, &mut bytes);
        write_u24(&mut bytes, 0);
        write_u24(&mut bytes, 20);
        bytes.push(18);
        let mut sid = [0u8; 4];
        LittleEndian::write_u32(&mut sid, 1);
        bytes.extend(sid);

        let mut sent = 0;
        while sent < body.len() {
            let take = (body.len() - sent).min(8);
            bytes.extend(&body[sent..sent + take]);
            sent += take;
            if sent < body.len() {
                write_basic_header(3, 6, &mut bytes);
            }
        }

        let messages = decoder.push_bytes(&bytes).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body.len(), 20);
        assert_eq!(messages[0].header, header);
    }

    #[test]
    fn feeding_bytes_one_at_a_time_still_reassembles() {
        let mut encoder = ChunkFramer::new();
        encoder.set_out_chunk_size(4).unwrap();
        let msg = make_message(6, 3, 9, 500, vec![9, 9, 9, 9, 9, 9, 9, 9, 9, 9]);

        let mut bytes = Vec::new();
        encoder.encode_message(&msg, &mut bytes);

        let mut decoder = ChunkFramer::new();
        decoder.set_in_chunk_size(4).unwrap();

        let mut collected = Vec::new();
        for b in &bytes {
            collected.extend(decoder.push_bytes(&[*b]).unwrap());
        }

        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0], msg);
    }

    #[test]
    fn interleaved_message_on_same_channel_is_an_error() {
        let mut decoder = ChunkFramer::new();
        decoder.set_in_chunk_size(4).unwrap();

        let mut bytes = Vec::new();
        write_basic_header(0, 6, &mut bytes);
        write_u24(&mut bytes, 0);
        write_u24(&mut bytes, 20);
        bytes.push(18);
        let mut sid = [0u8; 4];
        LittleEndian::write_u32(&mut sid, 1);
        bytes.extend(sid);
        bytes.extend([1, 2, 3, 4]);

        // A fresh fmt=0 header on the same channel before the first
        // message's body (20 bytes) has finished arriving.
        write_basic_header(0, 6, &mut bytes);
        write_u24(&mut bytes, 0);
        write_u24(&mut bytes, 20);
        bytes.push(18);
        bytes.extend(sid);

        let err = decoder.push_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::InterleavedMessage { channel: 6 }));
    }

    #[test]
    fn rejects_out_of_range_chunk_size() {
        let mut framer = ChunkFramer::new();
        assert!(framer.set_in_chunk_size(0).is_err());
        assert!(framer.set_in_chunk_size(16_777_216).is_err());
        assert!(framer.set_in_chunk_size(128).is_ok());
    }
}
