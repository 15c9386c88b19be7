// RTMP wire constants

pub const RTMP_VERSION: u8 = 0x03;
pub const RTMP_HANDSHAKE_SIG_SIZE: usize = 1536;

pub const RTMP_MIN_CHUNK_SIZE: u32 = 1;
pub const RTMP_MAX_CHUNK_SIZE: u32 = 16_777_215;
pub const RTMP_CHUNK_SIZE_DEFAULT: u32 = 128;

pub const RTMP_DEFAULT_SERVER_BANDWIDTH: u32 = 2_500_000;
pub const RTMP_DEFAULT_PEER_BANDWIDTH_LIMIT_TYPE: u8 = 2;

// Channel ids used for protocol-control / command / media traffic. Any
// channel in [2, 65599] is otherwise a valid chunk-stream id.
pub const RTMP_CHANNEL_PROTOCOL: u32 = 2;
pub const RTMP_CHANNEL_INVOKE: u32 = 3;
pub const RTMP_CHANNEL_AUDIO: u32 = 4;
pub const RTMP_CHANNEL_VIDEO: u32 = 5;
pub const RTMP_CHANNEL_DATA: u32 = 6;

pub const RTMP_CHANNEL_MIN: u32 = 2;
pub const RTMP_CHANNEL_MAX: u32 = 65599;

// Message type ids
pub const RTMP_TYPE_SET_CHUNK_SIZE: u8 = 1;
pub const RTMP_TYPE_ABORT: u8 = 2;
pub const RTMP_TYPE_ACKNOWLEDGEMENT: u8 = 3;
pub const RTMP_TYPE_USER_CONTROL: u8 = 4;
pub const RTMP_TYPE_WINDOW_ACK_SIZE: u8 = 5;
pub const RTMP_TYPE_SET_PEER_BANDWIDTH: u8 = 6;
pub const RTMP_TYPE_AUDIO: u8 = 8;
pub const RTMP_TYPE_VIDEO: u8 = 9;
pub const RTMP_TYPE_DATA_AMF3: u8 = 15;
pub const RTMP_TYPE_SHARED_OBJECT_AMF3: u8 = 16;
pub const RTMP_TYPE_COMMAND_AMF3: u8 = 17;
pub const RTMP_TYPE_DATA_AMF0: u8 = 18;
pub const RTMP_TYPE_SHARED_OBJECT_AMF0: u8 = 19;
pub const RTMP_TYPE_INVOKE: u8 = 20;
pub const RTMP_TYPE_AGGREGATE: u8 = 22;

// User control (type 4) event ids
pub const USER_CONTROL_STREAM_BEGIN: u16 = 0x00;
pub const USER_CONTROL_STREAM_EOF: u16 = 0x01;
pub const USER_CONTROL_STREAM_DRY: u16 = 0x02;
pub const USER_CONTROL_SET_BUFFER_LENGTH: u16 = 0x03;
pub const USER_CONTROL_STREAM_IS_RECORDED: u16 = 0x04;
pub const USER_CONTROL_PING_REQUEST: u16 = 0x06;
pub const USER_CONTROL_PING_RESPONSE: u16 = 0x07;

// Reserved message stream ids, never handed out by createStream
pub const RESERVED_STREAM_ID_CONNECTION: u32 = 0;
pub const RESERVED_STREAM_ID_TWO: u32 = 2;

/// Size, in bytes, of the fixed part of a chunk message header for a
/// given basic-header fmt (0..=3)
pub fn message_header_size(fmt: u8) -> usize {
    match fmt {
        0 => 11,
        1 => 7,
        2 => 3,
        _ => 0,
    }
}
