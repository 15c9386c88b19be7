// RTMP protocol plumbing: wire constants, message/chunk framing, the
// handshake, and the AMF0 command/data payload shapes.

mod chunk;
mod command;
mod constants;
mod data;
mod handshake;
mod header;
pub mod messages;

pub use chunk::{ChunkFramer, RtmpMessage};
pub use command::RtmpCommand;
pub use constants::*;
pub use data::RtmpData;
pub use handshake::{build_c0_c1, build_signature, respond_to_c0_c1, respond_to_s0_s1, HandshakeState};
pub use header::RtmpHeader;
