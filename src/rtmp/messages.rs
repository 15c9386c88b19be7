// RTMP message builders
//
// Each function here builds a complete `RtmpMessage` (header + body). The
// `ChunkFramer` is responsible for splitting it into wire chunks; nothing
// in this module deals with chunk sizes directly.

use byteorder::{BigEndian, ByteOrder};

use super::chunk::RtmpMessage;
use super::command::RtmpCommand;
use super::constants::*;
use super::data::RtmpData;
use super::header::RtmpHeader;
use crate::amf::{Amf0Object, Amf0Value};

fn control_message(message_type_id: u8, body: Vec<u8>) -> RtmpMessage {
    let mut header = RtmpHeader::new(RTMP_CHANNEL_PROTOCOL, message_type_id, RESERVED_STREAM_ID_CONNECTION);
    header.message_length = body.len() as u32;
    RtmpMessage { header, body }
}

pub fn set_chunk_size(size: u32) -> RtmpMessage {
    let mut b = [0u8; 4];
    BigEndian::write_u32(&mut b, size);
    control_message(RTMP_TYPE_SET_CHUNK_SIZE, b.to_vec())
}

pub fn window_ack_size(size: u32) -> RtmpMessage {
    let mut b = [0u8; 4];
    BigEndian::write_u32(&mut b, size);
    control_message(RTMP_TYPE_WINDOW_ACK_SIZE, b.to_vec())
}

pub fn set_peer_bandwidth(size: u32, limit_type: u8) -> RtmpMessage {
    let mut b = [0u8; 5];
    BigEndian::write_u32(&mut b[0..4], size);
    b[4] = limit_type;
    control_message(RTMP_TYPE_SET_PEER_BANDWIDTH, b.to_vec())
}

pub fn acknowledgement(sequence_number: u32) -> RtmpMessage {
    let mut b = [0u8; 4];
    BigEndian::write_u32(&mut b, sequence_number);
    control_message(RTMP_TYPE_ACKNOWLEDGEMENT, b.to_vec())
}

fn user_control_event(event: u16, data: &[u8]) -> RtmpMessage {
    let mut b = Vec::with_capacity(2 + data.len());
    let mut event_bytes = [0u8; 2];
    BigEndian::write_u16(&mut event_bytes, event);
    b.extend(event_bytes);
    b.extend(data);
    control_message(RTMP_TYPE_USER_CONTROL, b)
}

pub fn stream_begin(stream_id: u32) -> RtmpMessage {
    let mut sid = [0u8; 4];
    BigEndian::write_u32(&mut sid, stream_id);
    user_control_event(USER_CONTROL_STREAM_BEGIN, &sid)
}

pub fn ping_request(timestamp: u32) -> RtmpMessage {
    let mut ts = [0u8; 4];
    BigEndian::write_u32(&mut ts, timestamp);
    user_control_event(USER_CONTROL_PING_REQUEST, &ts)
}

pub fn ping_response(timestamp: u32) -> RtmpMessage {
    let mut ts = [0u8; 4];
    BigEndian::write_u32(&mut ts, timestamp);
    user_control_event(USER_CONTROL_PING_RESPONSE, &ts)
}

pub fn invoke(cmd: &RtmpCommand, stream_id: u32) -> RtmpMessage {
    let body = cmd.encode();
    let mut header = RtmpHeader::new(RTMP_CHANNEL_INVOKE, RTMP_TYPE_INVOKE, stream_id);
    header.message_length = body.len() as u32;
    RtmpMessage { header, body }
}

pub fn data_message(data: &RtmpData, stream_id: u32, timestamp: u32) -> RtmpMessage {
    let body = data.encode();
    let mut header = RtmpHeader::new(RTMP_CHANNEL_DATA, RTMP_TYPE_DATA_AMF0, stream_id);
    header.timestamp = timestamp;
    header.message_length = body.len() as u32;
    RtmpMessage { header, body }
}

pub fn audio_message(stream_id: u32, payload: &[u8], timestamp: u32) -> RtmpMessage {
    let mut header = RtmpHeader::new(RTMP_CHANNEL_AUDIO, RTMP_TYPE_AUDIO, stream_id);
    header.timestamp = timestamp;
    header.message_length = payload.len() as u32;
    RtmpMessage {
        header,
        body: payload.to_vec(),
    }
}

pub fn video_message(stream_id: u32, payload: &[u8], timestamp: u32) -> RtmpMessage {
    let mut header = RtmpHeader::new(RTMP_CHANNEL_VIDEO, RTMP_TYPE_VIDEO, stream_id);
    header.timestamp = timestamp;
    header.message_length = payload.len() as u32;
    RtmpMessage {
        header,
        body: payload.to_vec(),
    }
}

/// `onStatus` reply, used for publish/play accept and reject notices
pub fn status(stream_id: u32, level: &str, code: &str, description: Option<&str>) -> RtmpMessage {
    let mut cmd = RtmpCommand::new("onStatus");
    cmd.set_argument("transId", Amf0Value::number(0.0));
    cmd.set_argument("cmdObj", Amf0Value::Null);

    let mut info = Amf0Object::new();
    info.insert("level".to_string(), Amf0Value::string(level));
    info.insert("code".to_string(), Amf0Value::string(code));
    if let Some(description) = description {
        info.insert("description".to_string(), Amf0Value::string(description));
    }
    cmd.set_argument("info", Amf0Value::Object(info));

    invoke(&cmd, stream_id)
}

/// `_result` reply to `connect`
pub fn connect_response(trans_id: f64) -> RtmpMessage {
    let mut cmd = RtmpCommand::new("_result");
    cmd.set_argument("transId", Amf0Value::number(trans_id));

    let mut cmd_obj = Amf0Object::new();
    cmd_obj.insert("fmsVer".to_string(), Amf0Value::string("FMS/3,0,1,123"));
    cmd_obj.insert("capabilities".to_string(), Amf0Value::number(31.0));
    cmd.set_argument("cmdObj", Amf0Value::Object(cmd_obj));

    let mut info = Amf0Object::new();
    info.insert("level".to_string(), Amf0Value::string("status"));
    info.insert("code".to_string(), Amf0Value::string("NetConnection.Connect.Success"));
    info.insert("description".to_string(), Amf0Value::string("Connection succeeded."));
    info.insert("objectEncoding".to_string(), Amf0Value::number(0.0));
    cmd.set_argument("info", Amf0Value::Object(info));

    invoke(&cmd, RESERVED_STREAM_ID_CONNECTION)
}

/// `_result` reply to `createStream`
pub fn create_stream_response(trans_id: f64, stream_index: u32) -> RtmpMessage {
    let mut cmd = RtmpCommand::new("_result");
    cmd.set_argument("transId", Amf0Value::number(trans_id));
    cmd.set_argument("cmdObj", Amf0Value::Null);
    cmd.set_argument("info", Amf0Value::number(stream_index as f64));

    invoke(&cmd, RESERVED_STREAM_ID_CONNECTION)
}

/// `connect` command sent when dialing out as a publisher/subscriber
pub fn connect_command(app: &str, trans_id: f64) -> RtmpMessage {
    let mut cmd = RtmpCommand::new("connect");
    cmd.set_argument("transId", Amf0Value::number(trans_id));

    let mut cmd_obj = Amf0Object::new();
    cmd_obj.insert("app".to_string(), Amf0Value::string(app));
    cmd_obj.insert("type".to_string(), Amf0Value::string("nonprivate"));
    cmd_obj.insert("flashVer".to_string(), Amf0Value::string("FMLE/3.0"));
    cmd.set_argument("cmdObj", Amf0Value::Object(cmd_obj));

    invoke(&cmd, RESERVED_STREAM_ID_CONNECTION)
}

pub fn create_stream_command(trans_id: f64) -> RtmpMessage {
    let mut cmd = RtmpCommand::new("createStream");
    cmd.set_argument("transId", Amf0Value::number(trans_id));
    cmd.set_argument("cmdObj", Amf0Value::Null);

    invoke(&cmd, RESERVED_STREAM_ID_CONNECTION)
}

pub fn publish_command(trans_id: f64, stream_id: u32, stream_name: &str) -> RtmpMessage {
    let mut cmd = RtmpCommand::new("publish");
    cmd.set_argument("transId", Amf0Value::number(trans_id));
    cmd.set_argument("cmdObj", Amf0Value::Null);
    cmd.set_argument("streamName", Amf0Value::string(stream_name));
    cmd.set_argument("type", Amf0Value::string("live"));

    invoke(&cmd, stream_id)
}

pub fn play_command(trans_id: f64, stream_id: u32, stream_name: &str) -> RtmpMessage {
    let mut cmd = RtmpCommand::new("play");
    cmd.set_argument("transId", Amf0Value::number(trans_id));
    cmd.set_argument("cmdObj", Amf0Value::Null);
    cmd.set_argument("streamName", Amf0Value::string(stream_name));
    cmd.set_argument("start", Amf0Value::number(-2.0));

    invoke(&cmd, stream_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_chunk_size_carries_the_four_byte_value() {
        let msg = set_chunk_size(4096);
        assert_eq!(msg.header.message_type_id, RTMP_TYPE_SET_CHUNK_SIZE);
        assert_eq!(BigEndian::read_u32(&msg.body), 4096);
    }

    #[test]
    fn status_message_is_a_valid_invoke() {
        let msg = status(1, "status", "NetStream.Publish.Start", Some("ok"));
        assert_eq!(msg.header.message_type_id, RTMP_TYPE_INVOKE);
        assert_eq!(msg.header.channel, RTMP_CHANNEL_INVOKE);

        let decoded = RtmpCommand::decode(&msg.body).unwrap();
        assert_eq!(decoded.name, "onStatus");
        assert_eq!(
            decoded.get_argument("info").and_then(|v| v.get("code")).and_then(|v| v.as_str()),
            Some("NetStream.Publish.Start")
        );
    }

    #[test]
    fn connect_response_reports_success() {
        let msg = connect_response(1.0);
        let decoded = RtmpCommand::decode(&msg.body).unwrap();
        assert_eq!(decoded.name, "_result");
        assert_eq!(
            decoded.get_argument("info").and_then(|v| v.get("code")).and_then(|v| v.as_str()),
            Some("NetConnection.Connect.Success")
        );
    }
}
