// AMF0 encoding and decoding
//
// RTMP command and metadata payloads are encoded as a sequence of AMF0
// values. This module models the value tree as a tagged enum and provides
// free-standing encode/decode functions, plus typed accessors so callers
// never need to match on the enum directly.

mod cursor;
mod decode;
mod value;

pub use cursor::*;
pub use decode::*;
pub use value::*;
