// RTMP message header

/// Header of a single RTMP message (not a chunk — see `ChunkFramer` for
/// the on-wire fragmentation).
#[derive(Clone, Debug, PartialEq)]
pub struct RtmpHeader {
    /// Chunk-stream / channel id, in [2, 65599]
    pub channel: u32,

    /// Absolute timestamp, milliseconds
    pub timestamp: u32,

    /// Length of the message body
    pub message_length: u32,

    pub message_type_id: u8,

    /// Little-endian on the wire, unlike every other multi-byte field
    pub message_stream_id: u32,

    /// Delta applied on top of the previous header's timestamp for this
    /// channel (fmt 1/2 chunks)
    pub timestamp_delta: u32,

    pub has_extended_timestamp: bool,
}

impl RtmpHeader {
    pub fn new(channel: u32, message_type_id: u8, message_stream_id: u32) -> RtmpHeader {
        RtmpHeader {
            channel,
            timestamp: 0,
            message_length: 0,
            message_type_id,
            message_stream_id,
            timestamp_delta: 0,
            has_extended_timestamp: false,
        }
    }
}
