// RTMP data (the AMF0 payload of a DATA_AMF0 message — metadata, not a
// command/reply dialogue)

use std::sync::LazyLock;

use indexmap::IndexMap;

use crate::amf::{decode_value, Amf0Object, Amf0Value};
use crate::error::DecodeError;

#[derive(Clone, Debug, PartialEq)]
pub struct RtmpData {
    pub tag: String,
    pub arguments: Amf0Object,
}

static RTMP_DATA_ARGS: LazyLock<IndexMap<&'static str, &'static [&'static str]>> = LazyLock::new(|| {
    let mut m = IndexMap::new();
    m.insert("@setDataFrame", &["method", "dataObj"][..]);
    m.insert("onMetaData", &["dataObj"][..]);
    m.insert("|RtmpSampleAccess", &["bool1", "bool2"][..]);
    m
});

impl RtmpData {
    pub fn new<S: Into<String>>(tag: S) -> RtmpData {
        RtmpData {
            tag: tag.into(),
            arguments: Amf0Object::new(),
        }
    }

    pub fn set_argument<S: Into<String>>(&mut self, name: S, value: Amf0Value) {
        self.arguments.insert(name.into(), value);
    }

    pub fn get_argument(&self, name: &str) -> Option<&Amf0Value> {
        self.arguments.get(name)
    }

    pub fn to_debug_string(&self) -> String {
        let mut s = format!("{} {{\n", self.tag);
        for (name, value) in &self.arguments {
            s.push_str(&format!("    '{name}' = {}\n", value.to_debug_string("    ")));
        }
        s.push('}');
        s
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Amf0Value::string(self.tag.clone()).encode();

        if let Some(arg_names) = RTMP_DATA_ARGS.get(self.tag.as_str()) {
            for arg_name in arg_names.iter() {
                if let Some(value) = self.arguments.get(*arg_name) {
                    buf.extend(value.encode());
                }
            }
        }

        buf
    }

    pub fn decode(data: &[u8]) -> Result<RtmpData, DecodeError> {
        let (tag_value, mut offset) = decode_value(data, 0)?;
        let tag = tag_value.as_str().unwrap_or_default().to_string();

        let mut rtmp_data = RtmpData::new(tag.clone());

        if let Some(arg_names) = RTMP_DATA_ARGS.get(tag.as_str()) {
            for arg_name in arg_names.iter() {
                if offset >= data.len() {
                    break;
                }
                let (value, next_offset) = decode_value(data, offset)?;
                rtmp_data.set_argument(*arg_name, value);
                offset = next_offset;
            }
        }

        Ok(rtmp_data)
    }

    /// Builds the `onMetaData` payload re-broadcast to subscribers from a
    /// publisher's `@setDataFrame` message, dropping the `method` wrapper.
    pub fn to_on_metadata(&self) -> RtmpData {
        let mut out = RtmpData::new("onMetaData");
        match self.get_argument("dataObj") {
            Some(value) => out.set_argument("dataObj", value.clone()),
            None => out.set_argument("dataObj", Amf0Value::Null),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_set_data_frame() {
        let mut data = RtmpData::new("@setDataFrame");
        data.set_argument("method", Amf0Value::string("onMetaData"));
        let mut obj = Amf0Object::new();
        obj.insert("width".to_string(), Amf0Value::number(1920.0));
        data.set_argument("dataObj", Amf0Value::Object(obj));

        let encoded = data.encode();
        let decoded = RtmpData::decode(&encoded).unwrap();

        assert_eq!(decoded.tag, "@setDataFrame");
        assert_eq!(
            decoded.get_argument("dataObj").and_then(|v| v.get("width")).and_then(|v| v.as_f64()),
            Some(1920.0)
        );
    }

    #[test]
    fn rewraps_set_data_frame_as_on_metadata() {
        let mut data = RtmpData::new("@setDataFrame");
        data.set_argument("method", Amf0Value::string("onMetaData"));
        data.set_argument("dataObj", Amf0Value::number(1.0));

        let on_metadata = data.to_on_metadata();
        assert_eq!(on_metadata.tag, "onMetaData");
        assert_eq!(on_metadata.get_argument("dataObj").and_then(|v| v.as_f64()), Some(1.0));
    }
}
