// RTMP command (the AMF0 payload of an INVOKE / COMMAND_AMF0 message)

use std::sync::LazyLock;

use indexmap::IndexMap;

use crate::amf::{decode_value, Amf0Object, Amf0Value};
use crate::error::DecodeError;

/// An RTMP command: a command name followed by a fixed, command-specific
/// sequence of AMF0 arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct RtmpCommand {
    pub name: String,
    pub arguments: Amf0Object,
}

/// The fixed argument-name sequence for every command this relay needs to
/// read or write. Unlisted commands decode with no named arguments (the
/// raw AMF0 values are dropped) and encode as just their name.
static RTMP_COMMAND_ARGS: LazyLock<IndexMap<&'static str, &'static [&'static str]>> = LazyLock::new(|| {
    let mut m = IndexMap::new();
    m.insert("_result", &["transId", "cmdObj", "info"][..]);
    m.insert("_error", &["transId", "cmdObj", "info", "streamId"][..]);
    m.insert("onStatus", &["transId", "cmdObj", "info"][..]);
    m.insert("releaseStream", &["transId", "cmdObj", "streamName"][..]);
    m.insert("FCPublish", &["transId", "cmdObj", "streamName"][..]);
    m.insert("FCUnpublish", &["transId", "cmdObj", "streamName"][..]);
    m.insert("FCSubscribe", &["transId", "cmdObj", "streamName"][..]);
    m.insert("onFCPublish", &["transId", "cmdObj", "info"][..]);
    m.insert("connect", &["transId", "cmdObj", "args"][..]);
    m.insert("call", &["transId", "cmdObj", "args"][..]);
    m.insert("createStream", &["transId", "cmdObj"][..]);
    m.insert("close", &["transId", "cmdObj"][..]);
    m.insert(
        "play",
        &["transId", "cmdObj", "streamName", "start", "duration", "reset"][..],
    );
    m.insert("deleteStream", &["transId", "cmdObj", "streamId"][..]);
    m.insert("receiveAudio", &["transId", "cmdObj", "bool"][..]);
    m.insert("receiveVideo", &["transId", "cmdObj", "bool"][..]);
    m.insert("publish", &["transId", "cmdObj", "streamName", "type"][..]);
    m
});

impl RtmpCommand {
    pub fn new<S: Into<String>>(name: S) -> RtmpCommand {
        RtmpCommand {
            name: name.into(),
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
        let mut s = format!("{} {{\n", self.name);
        for (name, value) in &self.arguments {
            s.push_str(&format!("    '{name}' = {}\n", value.to_debug_string("    ")));
        }
        s.push('}');
        s
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Amf0Value::string(self.name.clone()).encode();

        if let Some(arg_names) = RTMP_COMMAND_ARGS.get(self.name.as_str()) {
            for arg_name in arg_names.iter() {
                match self.arguments.get(*arg_name) {
                    Some(value) => buf.extend(value.encode()),
                    None => buf.extend(Amf0Value::Undefined.encode()),
                }
            }
        }

        buf
    }

    pub fn decode(data: &[u8]) -> Result<RtmpCommand, DecodeError> {
        let (name_value, mut offset) = decode_value(data, 0)?;
        let name = name_value.as_str().unwrap_or_default().to_string();

        let mut command = RtmpCommand::new(name.clone());

        if let Some(arg_names) = RTMP_COMMAND_ARGS.get(name.as_str()) {
            for arg_name in arg_names.iter() {
                if offset >= data.len() {
                    break;
                }
                let (value, next_offset) = decode_value(data, offset)?;
                command.set_argument(*arg_name, value);
                offset = next_offset;
            }
        }

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_connect_command() {
        let mut cmd = RtmpCommand::new("connect");
        cmd.set_argument("transId", Amf0Value::number(1.0));
        let mut cmd_obj = Amf0Object::new();
        cmd_obj.insert("app".to_string(), Amf0Value::string("live"));
        cmd.set_argument("cmdObj", Amf0Value::Object(cmd_obj));

        let encoded = cmd.encode();
        let decoded = RtmpCommand::decode(&encoded).unwrap();

        assert_eq!(decoded.name, "connect");
        assert_eq!(
            decoded.get_argument("cmdObj").and_then(|v| v.get("app")).and_then(|v| v.as_str()),
            Some("live")
        );
    }

    #[test]
    fn missing_argument_encodes_as_undefined() {
        let cmd = RtmpCommand::new("createStream");
        let encoded = cmd.encode();
        let decoded = RtmpCommand::decode(&encoded).unwrap();

        assert!(decoded.get_argument("transId").unwrap().is_undefined());
        assert!(decoded.get_argument("cmdObj").unwrap().is_undefined());
    }

    #[test]
    fn unknown_command_decodes_with_no_arguments() {
        let mut buf = Amf0Value::string("onCuePoint").encode();
        buf.extend(Amf0Value::number(1.0).encode());

        let decoded = RtmpCommand::decode(&buf).unwrap();
        assert_eq!(decoded.name, "onCuePoint");
        assert!(decoded.arguments.is_empty());
    }
}
