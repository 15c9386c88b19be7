// AMF0 value tree

use byteorder::{BigEndian, ByteOrder};
use indexmap::IndexMap;

const AMF0_TYPE_NUMBER: u8 = 0x00;
const AMF0_TYPE_BOOL: u8 = 0x01;
const AMF0_TYPE_STRING: u8 = 0x02;
const AMF0_TYPE_OBJECT: u8 = 0x03;
const AMF0_TYPE_NULL: u8 = 0x05;
const AMF0_TYPE_UNDEFINED: u8 = 0x06;
const AMF0_TYPE_REFERENCE: u8 = 0x07;
const AMF0_TYPE_ECMA_ARRAY: u8 = 0x08;
const AMF0_TYPE_STRICT_ARRAY: u8 = 0x0A;
const AMF0_TYPE_DATE: u8 = 0x0B;
const AMF0_TYPE_LONG_STRING: u8 = 0x0C;
const AMF0_TYPE_UNSUPPORTED: u8 = 0x0D;
const AMF0_TYPE_XML_DOCUMENT: u8 = 0x0F;
const AMF0_TYPE_TYPED_OBJECT: u8 = 0x10;
const AMF0_TYPE_SWITCH_AMF3: u8 = 0x11;

pub const AMF0_OBJECT_TERMINATOR: [u8; 3] = [0x00, 0x00, 0x09];

/// An ordered string-keyed map, as used by AMF0 `Object` and `EcmaArray`
pub type Amf0Object = IndexMap<String, Amf0Value>;

/// An AMF0 value
#[derive(Clone, Debug, PartialEq)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),
    String(String),
    Object(Amf0Object),
    Null,
    Undefined,
    Reference(u16),
    EcmaArray(Amf0Object),
    StrictArray(Vec<Amf0Value>),
    Date { timestamp_ms: f64, timezone: i16 },
    LongString(String),
    Unsupported,
    XmlDocument(String),
    TypedObject { class_name: String, object: Amf0Object },
}

impl Amf0Value {
    /// Convenience constructor for a short string value
    pub fn string<S: Into<String>>(s: S) -> Amf0Value {
        Amf0Value::String(s.into())
    }

    /// Convenience constructor for a number value
    pub fn number(n: f64) -> Amf0Value {
        Amf0Value::Number(n)
    }

    /// Convenience constructor for an empty ordered object
    pub fn object() -> Amf0Object {
        Amf0Object::new()
    }

    // Typed accessors. Each fails softly (returns a default / None) rather
    // than panicking on a marker mismatch, so callers never need to match
    // the enum directly.

    pub fn is_null(&self) -> bool {
        matches!(self, Amf0Value::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Amf0Value::Undefined)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            Amf0Value::Reference(r) => Some(*r as f64),
            Amf0Value::Date { timestamp_ms, .. } => Some(*timestamp_ms),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(b) => Some(*b),
            Amf0Value::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) => Some(s.as_str()),
            Amf0Value::LongString(s) => Some(s.as_str()),
            Amf0Value::XmlDocument(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Amf0Object> {
        match self {
            Amf0Value::Object(o) => Some(o),
            Amf0Value::EcmaArray(o) => Some(o),
            Amf0Value::TypedObject { object, .. } => Some(object),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Amf0Value> {
        self.as_object().and_then(|o| o.get(key))
    }

    pub fn as_array(&self) -> Option<&[Amf0Value]> {
        match self {
            Amf0Value::StrictArray(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Human-readable dump, used for debug logging and the status reporter
    pub fn to_debug_string(&self, indent: &str) -> String {
        match self {
            Amf0Value::Number(n) => format!("{n}"),
            Amf0Value::Boolean(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
            Amf0Value::String(s) => format!("'{s}'"),
            Amf0Value::Object(o) => Self::dump_object("Object", o, indent),
            Amf0Value::Null => "NULL".to_string(),
            Amf0Value::Undefined => "UNDEFINED".to_string(),
            Amf0Value::Reference(r) => format!("REF#{r}"),
            Amf0Value::EcmaArray(o) => Self::dump_object("EcmaArray", o, indent),
            Amf0Value::StrictArray(items) => {
                let mut out = "[\n".to_string();
                for item in items {
                    out.push_str(indent);
                    out.push_str("    ");
                    out.push_str(&item.to_debug_string(&format!("{indent}    ")));
                    out.push('\n');
                }
                out.push_str(indent);
                out.push(']');
                out
            }
            Amf0Value::Date { timestamp_ms, .. } => format!("DATE({timestamp_ms})"),
            Amf0Value::LongString(s) => format!("L'{s}'"),
            Amf0Value::Unsupported => "UNSUPPORTED".to_string(),
            Amf0Value::XmlDocument(s) => format!("XML'{s}'"),
            Amf0Value::TypedObject { class_name, object } => {
                Self::dump_object(class_name, object, indent)
            }
        }
    }

    fn dump_object(label: &str, o: &Amf0Object, indent: &str) -> String {
        let mut out = format!("{label} {{\n");
        for (key, value) in o {
            out.push_str(indent);
            out.push_str("    '");
            out.push_str(key);
            out.push_str("' = ");
            out.push_str(&value.to_debug_string(&format!("{indent}    ")));
            out.push('\n');
        }
        out.push_str(indent);
        out.push('}');
        out
    }

    /// Encodes the value into its wire representation
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Amf0Value::Number(n) => {
                let mut buf = vec![AMF0_TYPE_NUMBER];
                buf.extend(Self::encode_f64(*n));
                buf
            }
            Amf0Value::Boolean(b) => vec![AMF0_TYPE_BOOL, if *b { 1 } else { 0 }],
            Amf0Value::String(s) => {
                let mut buf = vec![AMF0_TYPE_STRING];
                buf.extend(Self::encode_short_string(s));
                buf
            }
            Amf0Value::Object(o) => {
                let mut buf = vec![AMF0_TYPE_OBJECT];
                buf.extend(Self::encode_properties(o));
                buf
            }
            Amf0Value::Null => vec![AMF0_TYPE_NULL],
            Amf0Value::Undefined => vec![AMF0_TYPE_UNDEFINED],
            Amf0Value::Reference(r) => {
                let mut buf = vec![AMF0_TYPE_REFERENCE; 1];
                let mut b = [0u8; 2];
                BigEndian::write_u16(&mut b, *r);
                buf.extend(b);
                buf
            }
            Amf0Value::EcmaArray(o) => {
                let mut buf = vec![AMF0_TYPE_ECMA_ARRAY];
                let mut len = [0u8; 4];
                BigEndian::write_u32(&mut len, o.len() as u32);
                buf.extend(len);
                buf.extend(Self::encode_properties(o));
                buf
            }
            Amf0Value::StrictArray(items) => {
                let mut buf = vec![AMF0_TYPE_STRICT_ARRAY];
                let mut len = [0u8; 4];
                BigEndian::write_u32(&mut len, items.len() as u32);
                buf.extend(len);
                for item in items {
                    buf.extend(item.encode());
                }
                buf
            }
            Amf0Value::Date { timestamp_ms, timezone } => {
                let mut buf = vec![AMF0_TYPE_DATE];
                buf.extend(Self::encode_f64(*timestamp_ms));
                let mut tz = [0u8; 2];
                BigEndian::write_i16(&mut tz, *timezone);
                buf.extend(tz);
                buf
            }
            Amf0Value::LongString(s) => {
                let mut buf = vec![AMF0_TYPE_LONG_STRING];
                buf.extend(Self::encode_long_string(s));
                buf
            }
            Amf0Value::Unsupported => vec![AMF0_TYPE_UNSUPPORTED],
            Amf0Value::XmlDocument(s) => {
                let mut buf = vec![AMF0_TYPE_XML_DOCUMENT];
                buf.extend(Self::encode_long_string(s));
                buf
            }
            Amf0Value::TypedObject { class_name, object } => {
                let mut buf = vec![AMF0_TYPE_TYPED_OBJECT];
                buf.extend(Self::encode_short_string(class_name));
                buf.extend(Self::encode_properties(object));
                buf
            }
        }
    }

    fn encode_f64(n: f64) -> [u8; 8] {
        let mut b = [0u8; 8];
        BigEndian::write_f64(&mut b, n);
        b
    }

    fn encode_short_string(s: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 + s.len());
        let mut len = [0u8; 2];
        BigEndian::write_u16(&mut len, s.len() as u16);
        buf.extend(len);
        buf.extend(s.as_bytes());
        buf
    }

    fn encode_long_string(s: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + s.len());
        let mut len = [0u8; 4];
        BigEndian::write_u32(&mut len, s.len() as u32);
        buf.extend(len);
        buf.extend(s.as_bytes());
        buf
    }

    /// Encodes object properties in insertion order, terminated by the
    /// object end marker. Unlike a sorted-keys encoding, this preserves
    /// `decode(encode(value)) == value` including key order.
    fn encode_properties(o: &Amf0Object) -> Vec<u8> {
        let mut buf = Vec::new();

        for (key, value) in o {
            buf.extend(Self::encode_short_string(key));
            buf.extend(value.encode());
        }

        buf.extend(AMF0_OBJECT_TERMINATOR);
        buf
    }
}

pub(crate) const AMF0_TAG_SWITCH_AMF3: u8 = AMF0_TYPE_SWITCH_AMF3;
