// Status reporting: a pure function of the connection arena producing a
// text/HTML/JSON snapshot, one row per connection (rather than grouped
// by a fixed receiver/sender type) since a connection's role and mode
// here can change over its lifetime.

mod http;

use crate::connection::{Connection, Direction, Mode, Role};
use crate::rtmp::HandshakeState;

pub use http::{spawn_http_server, StatusSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Text,
    Html,
    Json,
}

/// Renders a snapshot of every connection currently in the arena.
pub fn render<'a>(connections: impl Iterator<Item = &'a Connection>, report_type: ReportType) -> String {
    let rows: Vec<&Connection> = connections.collect();

    match report_type {
        ReportType::Text => render_text(&rows),
        ReportType::Html => render_html(&rows),
        ReportType::Json => render_json(&rows),
    }
}

fn render_text(rows: &[&Connection]) -> String {
    let mut out = String::from("Connections:\n");
    for conn in rows {
        out.push_str(&format!(
            "\t[{}, {}] {} {}, role: {}, mode: {}, state: {}, video bitrate: {}, audio bitrate: {}, metadata: {}\n",
            conn.id,
            display_name(conn),
            direction_label(conn.direction),
            conn.peer_address,
            role_label(conn.role),
            mode_label(conn.mode),
            state_label(conn.handshake_state),
            conn.video_byte_rate * 8,
            conn.audio_byte_rate * 8,
            metadata_summary(conn),
        ));
    }
    out
}

fn render_html(rows: &[&Connection]) -> String {
    let mut out = String::from("<html><title>Status</title><body>");
    for conn in rows {
        out.push_str(&format!(
            "<h2>Connection {}</h2><table border=\"1\"><tr><th>Name</th><th>Direction</th><th>Address</th><th>State</th><th>Video bitrate</th><th>Audio bitrate</th><th>Metadata</th></tr><tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr></table>",
            conn.id,
            display_name(conn),
            direction_label(conn.direction),
            conn.peer_address,
            state_label(conn.handshake_state),
            conn.video_byte_rate * 8,
            conn.audio_byte_rate * 8,
            metadata_summary(conn),
        ));
    }
    out.push_str("</body></html>");
    out
}

fn render_json(rows: &[&Connection]) -> String {
    let mut out = String::from("{\"connections\":[");
    for (i, conn) in rows.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!(
            "{{\"id\":{},\"name\":\"{}\",\"direction\":\"{}\",\"address\":\"{}\",\"state\":\"{}\",\"videoBitrate\":{},\"audioBitrate\":{},\"metaData\":{{{}}}}}",
            conn.id,
            json_escape(&display_name(conn)),
            direction_label(conn.direction),
            json_escape(&conn.peer_address),
            state_label(conn.handshake_state),
            conn.video_byte_rate * 8,
            conn.audio_byte_rate * 8,
            metadata_json_pairs(conn),
        ));
    }
    out.push_str("]}");
    out
}

fn display_name(conn: &Connection) -> String {
    let stream = conn.effective_stream_name();
    if stream.is_empty() {
        conn.application_name.clone()
    } else {
        format!("{}/{}", conn.application_name, stream)
    }
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Accepted => "accepted",
        Direction::Dialed => "dialed",
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::Receiver => "receiver",
        Role::Sender => "sender",
    }
}

fn mode_label(mode: Option<Mode>) -> &'static str {
    match mode {
        Some(Mode::Publisher) => "publisher",
        Some(Mode::Subscriber) => "subscriber",
        None => "undetermined",
    }
}

fn state_label(state: HandshakeState) -> &'static str {
    match state {
        HandshakeState::AwaitingC0C1 => "AWAITING_C0_C1",
        HandshakeState::AwaitingC2 => "AWAITING_C2",
        HandshakeState::AwaitingS0S1 => "AWAITING_S0_S1",
        HandshakeState::AwaitingS2 => "AWAITING_S2",
        HandshakeState::Done => "HANDSHAKE_DONE",
    }
}

fn metadata_fields(conn: &Connection) -> Option<&crate::amf::Amf0Object> {
    let data = conn.metadata.as_ref()?;
    // `onMetaData`/`@setDataFrame` carry their real key-value pairs nested
    // under a single "dataObj" argument; fall back to the top-level
    // arguments if that shape isn't present.
    match data.get_argument("dataObj").and_then(|v| v.as_object()) {
        Some(obj) => Some(obj),
        None => Some(&data.arguments),
    }
}

fn metadata_summary(conn: &Connection) -> String {
    let Some(fields) = metadata_fields(conn) else { return "empty".to_string() };
    let pairs: Vec<String> = fields.iter().map(|(k, v)| format!("{k}:{}", v.to_debug_string(""))).collect();
    if pairs.is_empty() {
        "empty".to_string()
    } else {
        pairs.join(" ")
    }
}

fn metadata_json_pairs(conn: &Connection) -> String {
    let Some(fields) = metadata_fields(conn) else { return String::new() };
    fields
        .iter()
        .map(|(k, v)| format!("\"{}\":\"{}\"", json_escape(k), json_escape(&v.to_debug_string(""))))
        .collect::<Vec<_>>()
        .join(",")
}

fn json_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Logger;

    fn conn() -> Connection {
        Connection::accepted(1, "127.0.0.1:1935".to_string(), Logger::new_disabled())
    }

    #[test]
    fn text_report_lists_every_connection() {
        let c = conn();
        let report = render(std::iter::once(&c), ReportType::Text);
        assert!(report.starts_with("Connections:\n"));
        assert!(report.contains("127.0.0.1:1935"));
        assert!(report.contains("AWAITING_C0_C1"));
    }

    #[test]
    fn html_report_wraps_in_title_and_body() {
        let c = conn();
        let report = render(std::iter::once(&c), ReportType::Html);
        assert!(report.starts_with("<html><title>Status</title><body>"));
        assert!(report.ends_with("</body></html>"));
    }

    #[test]
    fn json_report_is_a_connections_array() {
        let c = conn();
        let report = render(std::iter::once(&c), ReportType::Json);
        assert!(report.starts_with("{\"connections\":["));
        assert!(report.ends_with("]}"));
        assert!(report.contains("\"id\":1"));
    }

    #[test]
    fn empty_arena_still_produces_well_formed_wrappers() {
        let rows: Vec<&Connection> = Vec::new();
        assert_eq!(render(rows.into_iter(), ReportType::Json), "{\"connections\":[]}");
    }
}
