// Sender-role dialogue: we dialed out, either to push a publish upstream
// or to pull a stream as a subscriber. Drives `connect` ->
// `releaseStream` -> `FCPublish` -> `createStream` (+ `play` for
// subscribe mode), matching each step's `_result` against
// `outstanding_invokes`.

use crate::error::ProtocolError;
use crate::log_debug;
use crate::rtmp::{messages, RtmpCommand};

use super::entity::{Connection, ConnectionAction, Mode};

pub(crate) fn dispatch_sender_command(
    conn: &mut Connection,
    command: &RtmpCommand,
    actions: &mut Vec<ConnectionAction>,
) -> Result<(), ProtocolError> {
    let logger = &conn.logger;
    log_debug!(logger, format!("sender dispatch: {}", command.to_debug_string()));

    match command.name.as_str() {
        "_result" => {
            let trans_id = trans_id_of(command) as u32;
            let step = conn.outstanding_invokes.shift_remove(&trans_id);
            if let Some(step) = step {
                advance_dialogue(conn, &step, command, actions)?;
            }
        }
        "_error" => {
            let trans_id = trans_id_of(command) as u32;
            conn.outstanding_invokes.shift_remove(&trans_id);
            actions.push(ConnectionAction::Close);
        }
        "onStatus" => {
            // Subscriber-mode `play` acceptance/rejection notices; no
            // further dialogue step follows either way.
        }
        _ => {}
    }

    Ok(())
}

fn advance_dialogue(
    conn: &mut Connection,
    completed_step: &str,
    command: &RtmpCommand,
    actions: &mut Vec<ConnectionAction>,
) -> Result<(), ProtocolError> {
    match completed_step {
        "connect" => match conn.mode {
            Some(Mode::Subscriber) => {
                let tid = conn.next_invoke_id();
                conn.outstanding_invokes.insert(tid, "createStream".to_string());
                let msg = messages::create_stream_command(tid as f64);
                conn.send_message(&msg);
            }
            _ => {
                let tid = conn.next_invoke_id();
                conn.outstanding_invokes.insert(tid, "releaseStream".to_string());
                let mut cmd = RtmpCommand::new("releaseStream");
                cmd.set_argument("transId", crate::amf::Amf0Value::number(tid as f64));
                cmd.set_argument("cmdObj", crate::amf::Amf0Value::Null);
                cmd.set_argument("streamName", crate::amf::Amf0Value::string(conn.effective_stream_name()));
                conn.send_message(&messages::invoke(&cmd, 0));
            }
        },
        "releaseStream" => {
            let tid = conn.next_invoke_id();
            conn.outstanding_invokes.insert(tid, "FCPublish".to_string());
            let mut cmd = RtmpCommand::new("FCPublish");
            cmd.set_argument("transId", crate::amf::Amf0Value::number(tid as f64));
            cmd.set_argument("cmdObj", crate::amf::Amf0Value::Null);
            cmd.set_argument("streamName", crate::amf::Amf0Value::string(conn.effective_stream_name()));
            conn.send_message(&messages::invoke(&cmd, 0));
        }
        "FCPublish" => {
            let tid = conn.next_invoke_id();
            conn.outstanding_invokes.insert(tid, "createStream".to_string());
            let msg = messages::create_stream_command(tid as f64);
            conn.send_message(&msg);
        }
        "createStream" => {
            let stream_index = command.get_argument("info").and_then(|v| v.as_f64()).unwrap_or(1.0) as u32;
            conn.stream_id = stream_index;

            match conn.mode {
                Some(Mode::Subscriber) => {
                    let tid = conn.next_invoke_id();
                    conn.outstanding_invokes.insert(tid, "play".to_string());
                    let msg = messages::play_command(tid as f64, stream_index, conn.effective_stream_name());
                    conn.send_message(&msg);
                }
                _ => {
                    let tid = conn.next_invoke_id();
                    conn.outstanding_invokes.insert(tid, "publish".to_string());
                    let msg = messages::publish_command(tid as f64, stream_index, conn.effective_stream_name());
                    conn.send_message(&msg);
                }
            }
        }
        "play" => {
            // We pulled an upstream origin: this connection now feeds
            // its bound server as the publisher.
            conn.mode = Some(Mode::Subscriber);
            actions.push(ConnectionAction::BecomePublisher);
        }
        "publish" => {
            // We pushed to a downstream output: this connection is a
            // sink, registered as a subscriber of its bound server.
            conn.mode = Some(Mode::Publisher);
            actions.push(ConnectionAction::BecomeSubscriber);
        }
        _ => {}
    }

    Ok(())
}

fn trans_id_of(command: &RtmpCommand) -> f64 {
    command.get_argument("transId").and_then(|v| v.as_f64()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::Amf0Value;
    use crate::connection::entity::Connection;
    use crate::log::Logger;

    fn conn() -> Connection {
        let mut c = Connection::dialed(1, "origin:1935".to_string(), Mode::Publisher, Logger::new_disabled());
        c.application_name = "live".to_string();
        c.stream_name = "mystream".to_string();
        c
    }

    #[test]
    fn connect_result_advances_to_release_stream() {
        let mut c = conn();
        let tid = c.next_invoke_id();
        c.outstanding_invokes.insert(tid, "connect".to_string());

        let mut result = RtmpCommand::new("_result");
        result.set_argument("transId", Amf0Value::number(tid as f64));

        let mut actions = Vec::new();
        dispatch_sender_command(&mut c, &result, &mut actions).unwrap();

        assert!(c.outstanding_invokes.values().any(|v| v == "releaseStream"));
    }

    #[test]
    fn create_stream_result_drives_publish_for_publisher_mode() {
        let mut c = conn();
        let tid = c.next_invoke_id();
        c.outstanding_invokes.insert(tid, "createStream".to_string());

        let mut result = RtmpCommand::new("_result");
        result.set_argument("transId", Amf0Value::number(tid as f64));
        result.set_argument("info", Amf0Value::number(5.0));

        let mut actions = Vec::new();
        dispatch_sender_command(&mut c, &result, &mut actions).unwrap();

        assert_eq!(c.stream_id, 5);
        assert!(c.outstanding_invokes.values().any(|v| v == "publish"));
    }

    #[test]
    fn error_reply_closes_the_connection() {
        let mut c = conn();
        let tid = c.next_invoke_id();
        c.outstanding_invokes.insert(tid, "connect".to_string());

        let mut err = RtmpCommand::new("_error");
        err.set_argument("transId", Amf0Value::number(tid as f64));

        let mut actions = Vec::new();
        dispatch_sender_command(&mut c, &err, &mut actions).unwrap();

        assert!(matches!(actions[0], ConnectionAction::Close));
    }
}
