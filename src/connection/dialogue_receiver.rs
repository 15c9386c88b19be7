// Receiver-role command dispatch: the peer on the other end of this
// connection is publishing to us or otherwise driving the NetConnection
// dialogue. Replies that don't need cross-connection state are sent
// directly; everything else becomes a `ConnectionAction` for the
// supervisor.

use crate::error::ProtocolError;
use crate::log_debug;
use crate::rtmp::{messages, RtmpCommand};

use super::entity::{Connection, ConnectionAction};

pub(crate) fn dispatch_receiver_command(
    conn: &mut Connection,
    command: &RtmpCommand,
    actions: &mut Vec<ConnectionAction>,
) -> Result<(), ProtocolError> {
    let logger = &conn.logger;
    log_debug!(logger, format!("receiver dispatch: {}", command.to_debug_string()));

    match command.name.as_str() {
        "connect" => {
            let trans_id = trans_id_of(command);
            let app = command
                .get_argument("cmdObj")
                .and_then(|v| v.get("app"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            actions.push(ConnectionAction::Connect { trans_id, app });
        }
        "_checkbw" => {
            let trans_id = trans_id_of(command);
            let mut reply = RtmpCommand::new("_result");
            reply.set_argument("transId", crate::amf::Amf0Value::number(trans_id));
            reply.set_argument("cmdObj", crate::amf::Amf0Value::Null);
            conn.send_message(&messages::invoke(&reply, 0));
        }
        "createStream" => {
            let trans_id = trans_id_of(command);
            let stream_id = conn.allocate_stream_id();
            conn.send_message(&messages::create_stream_response(trans_id, stream_id));
        }
        "releaseStream" => {
            let trans_id = trans_id_of(command);
            let mut reply = RtmpCommand::new("_result");
            reply.set_argument("transId", crate::amf::Amf0Value::number(trans_id));
            reply.set_argument("cmdObj", crate::amf::Amf0Value::Null);
            conn.send_message(&messages::invoke(&reply, 0));
        }
        "FCPublish" => {
            if let Some(name) = stream_name_argument(command) {
                conn.stream_name = name.clone();
                actions.push(ConnectionAction::StreamNamed { stream_name: name });
            }
            let mut reply = RtmpCommand::new("onFCPublish");
            reply.set_argument("transId", crate::amf::Amf0Value::number(0.0));
            reply.set_argument("cmdObj", crate::amf::Amf0Value::Null);
            conn.send_message(&messages::invoke(&reply, 0));
        }
        "publish" => {
            if let Some(name) = stream_name_argument(command) {
                conn.stream_name = name;
            }
            conn.mode = Some(super::entity::Mode::Publisher);
            conn.send_message(&messages::stream_begin(conn.stream_id));
            conn.send_message(&messages::status(
                conn.stream_id,
                "status",
                "NetStream.Publish.Start",
                Some("Publishing."),
            ));
            actions.push(ConnectionAction::BecomePublisher);
        }
        "FCUnpublish" | "deleteStream" => {
            actions.push(ConnectionAction::StopPublishing);
        }
        "play" | "getStreamLength" => {
            return Err(ProtocolError::UnexpectedCommand { command: command.name.clone() });
        }
        "_result" | "_error" => {
            let trans_id = trans_id_of(command) as u32;
            conn.outstanding_invokes.shift_remove(&trans_id);
        }
        _ => {
            // Unlisted commands (e.g. `receiveAudio`/`receiveVideo`) are
            // acknowledged by doing nothing; the peer isn't expecting a
            // reply we don't already model.
        }
    }

    Ok(())
}

fn trans_id_of(command: &RtmpCommand) -> f64 {
    command.get_argument("transId").and_then(|v| v.as_f64()).unwrap_or(0.0)
}

fn stream_name_argument(command: &RtmpCommand) -> Option<String> {
    command.get_argument("streamName").and_then(|v| v.as_str()).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::Amf0Value;
    use crate::connection::entity::Connection;
    use crate::log::Logger;

    fn conn() -> Connection {
        Connection::accepted(1, "127.0.0.1:1935".to_string(), Logger::new_disabled())
    }

    #[test]
    fn connect_is_deferred_to_the_supervisor() {
        let mut c = conn();
        let mut cmd = RtmpCommand::new("connect");
        cmd.set_argument("transId", Amf0Value::number(1.0));
        let mut cmd_obj = crate::amf::Amf0Object::new();
        cmd_obj.insert("app".to_string(), Amf0Value::string("live"));
        cmd.set_argument("cmdObj", Amf0Value::Object(cmd_obj));

        let mut actions = Vec::new();
        dispatch_receiver_command(&mut c, &cmd, &mut actions).unwrap();

        assert!(matches!(
            &actions[0],
            ConnectionAction::Connect { app, .. } if app == "live"
        ));
    }

    #[test]
    fn create_stream_allocates_and_replies_locally() {
        let mut c = conn();
        let mut cmd = RtmpCommand::new("createStream");
        cmd.set_argument("transId", Amf0Value::number(2.0));

        let mut actions = Vec::new();
        dispatch_receiver_command(&mut c, &cmd, &mut actions).unwrap();

        assert!(actions.is_empty());
        assert_eq!(c.stream_id, 1);
    }

    #[test]
    fn publish_transitions_to_publisher_and_requests_bind() {
        let mut c = conn();
        c.allocate_stream_id();
        let mut cmd = RtmpCommand::new("publish");
        cmd.set_argument("transId", Amf0Value::number(3.0));
        cmd.set_argument("streamName", Amf0Value::string("mystream"));

        let mut actions = Vec::new();
        dispatch_receiver_command(&mut c, &cmd, &mut actions).unwrap();

        assert_eq!(c.stream_name, "mystream");
        assert!(matches!(c.mode, Some(super::super::entity::Mode::Publisher)));
        assert!(matches!(actions[0], ConnectionAction::BecomePublisher));
    }

    #[test]
    fn fc_publish_records_stream_name_and_notifies_the_supervisor() {
        let mut c = conn();
        let mut cmd = RtmpCommand::new("FCPublish");
        cmd.set_argument("streamName", Amf0Value::string("mystream"));

        let mut actions = Vec::new();
        dispatch_receiver_command(&mut c, &cmd, &mut actions).unwrap();

        assert_eq!(c.stream_name, "mystream");
        assert!(matches!(
            &actions[0],
            ConnectionAction::StreamNamed { stream_name } if stream_name == "mystream"
        ));
    }

    #[test]
    fn play_on_a_receiver_is_a_protocol_violation() {
        let mut c = conn();
        let cmd = RtmpCommand::new("play");
        let mut actions = Vec::new();
        let err = dispatch_receiver_command(&mut c, &cmd, &mut actions).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedCommand { .. }));
    }
}
