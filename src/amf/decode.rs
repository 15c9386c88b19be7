// AMF0 decoding

use crate::error::DecodeError;

use super::cursor::AmfCursor;
use super::value::{Amf0Object, Amf0Value, AMF0_TAG_SWITCH_AMF3};

/// Decodes a single AMF0 value starting at `offset` in `buffer`.
///
/// Returns the decoded value plus the total number of bytes consumed
/// (absolute, not relative to `offset`).
pub fn decode_value(buffer: &[u8], offset: usize) -> Result<(Amf0Value, usize), DecodeError> {
    let mut cursor = AmfCursor::new(buffer, offset);
    let value = read_value(&mut cursor)?;
    Ok((value, cursor.position()))
}

fn read_value(cursor: &mut AmfCursor) -> Result<Amf0Value, DecodeError> {
    let marker = cursor.read_u8()?;

    match marker {
        0x00 => Ok(Amf0Value::Number(cursor.read_f64()?)),
        0x01 => Ok(Amf0Value::Boolean(cursor.read_u8()? != 0)),
        0x02 => Ok(Amf0Value::String(cursor.read_short_string()?)),
        0x03 => Ok(Amf0Value::Object(read_properties(cursor)?)),
        0x05 => Ok(Amf0Value::Null),
        0x06 => Ok(Amf0Value::Undefined),
        0x07 => Ok(Amf0Value::Reference(cursor.read_u16()?)),
        0x08 => {
            let _count_hint = cursor.read_u32()?;
            Ok(Amf0Value::EcmaArray(read_properties(cursor)?))
        }
        0x0A => {
            let count = cursor.read_u32()? as usize;
            let mut items = Vec::with_capacity(count.min(1 << 20));
            for _ in 0..count {
                items.push(read_value(cursor)?);
            }
            Ok(Amf0Value::StrictArray(items))
        }
        0x0B => {
            let timestamp_ms = cursor.read_f64()?;
            let timezone = cursor.read_i16()?;
            Ok(Amf0Value::Date {
                timestamp_ms,
                timezone,
            })
        }
        0x0C => Ok(Amf0Value::LongString(cursor.read_long_string()?)),
        0x0D => Ok(Amf0Value::Unsupported),
        0x0F => Ok(Amf0Value::XmlDocument(cursor.read_long_string()?)),
        0x10 => {
            let class_name = cursor.read_short_string()?;
            let object = read_properties(cursor)?;
            Ok(Amf0Value::TypedObject { class_name, object })
        }
        AMF0_TAG_SWITCH_AMF3 => Err(DecodeError::BadMarker {
            marker,
            offset: cursor.position() - 1,
        }),
        other => Err(DecodeError::BadMarker {
            marker: other,
            offset: cursor.position() - 1,
        }),
    }
}

/// Reads key/value pairs until the object end marker (`00 00 09`)
fn read_properties(cursor: &mut AmfCursor) -> Result<Amf0Object, DecodeError> {
    let mut object = Amf0Object::new();

    loop {
        let key = cursor.read_short_string()?;
        let peek_marker_is_terminator = key.is_empty();

        if peek_marker_is_terminator {
            let terminator = cursor.read_u8()?;
            if terminator != 0x09 {
                return Err(DecodeError::BadMarker {
                    marker: terminator,
                    offset: cursor.position() - 1,
                });
            }
            return Ok(object);
        }

        let value = read_value(cursor)?;
        object.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_buffer_is_an_error() {
        let err = decode_value(&[0x00, 0x00, 0x00], 0).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn unknown_marker_is_an_error() {
        let err = decode_value(&[0xFE], 0).unwrap_err();
        assert!(matches!(err, DecodeError::BadMarker { marker: 0xFE, .. }));
    }

    #[test]
    fn decodes_from_a_nonzero_offset() {
        let mut buf = vec![0xAA, 0xBB];
        buf.extend(Amf0Value::Number(7.0).encode());

        let (value, consumed) = decode_value(&buf, 2).unwrap();
        assert_eq!(value, Amf0Value::Number(7.0));
        assert_eq!(consumed, buf.len());
    }
}
