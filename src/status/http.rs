// Minimal HTTP/1.1 status endpoint, spawned only when `statusPage.listen`
// is set in the configuration: bind, log, loop accepting connections,
// hand each off to its own task. One GET route, a query string
// selecting the report format, not a web framework.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::log::Logger;
use crate::log_error;
use crate::log_info;
use crate::log_warning;

use super::ReportType;

/// The three pre-rendered report bodies, refreshed by the supervisor on
/// every tick. The HTTP task only ever locks this (tiny, cheap-to-clone)
/// snapshot — it never touches the connection arena directly.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub text: String,
    pub html: String,
    pub json: String,
}

pub fn spawn_http_server(address: String, snapshot: Arc<Mutex<StatusSnapshot>>, logger: Logger) {
    tokio::spawn(async move {
        let listener = match TcpListener::bind(&address).await {
            Ok(l) => l,
            Err(err) => {
                log_error!(logger, format!("could not bind status page listener on '{address}': {err}"));
                return;
            }
        };

        log_info!(logger, format!("status page listening on {address}"));

        loop {
            match listener.accept().await {
                Ok((stream, _peer)) => {
                    let snapshot = snapshot.clone();
                    let logger = logger.make_child_logger("[STATUS:HTTP] ");
                    tokio::spawn(async move {
                        if let Err(err) = serve_one(stream, &snapshot).await {
                            log_warning!(logger, format!("status page request failed: {err}"));
                        }
                    });
                }
                Err(err) => {
                    log_error!(logger, format!("status page accept failed: {err}"));
                }
            }
        }
    });
}

async fn serve_one(mut stream: TcpStream, snapshot: &Mutex<StatusSnapshot>) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);
    let report_type = parse_report_type(&request);

    let body = {
        let snapshot = snapshot.lock().await;
        match report_type {
            ReportType::Text => snapshot.text.clone(),
            ReportType::Html => snapshot.html.clone(),
            ReportType::Json => snapshot.json.clone(),
        }
    };

    let content_type = match report_type {
        ReportType::Text => "text/plain; charset=utf-8",
        ReportType::Html => "text/html; charset=utf-8",
        ReportType::Json => "application/json",
    };

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    );

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// The request line's first token pair (`GET /path HTTP/1.1`) decides the
/// format from a `format=` query parameter; defaults to TEXT like the
/// original's plain-text report.
fn parse_report_type(request: &str) -> ReportType {
    let Some(request_line) = request.lines().next() else { return ReportType::Text };
    let Some(path) = request_line.split_whitespace().nth(1) else { return ReportType::Text };
    let Some(query) = path.split('?').nth(1) else { return ReportType::Text };

    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("format=") {
            return match value {
                "html" => ReportType::Html,
                "json" => ReportType::Json,
                _ => ReportType::Text,
            };
        }
    }

    ReportType::Text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_text_with_no_query() {
        assert_eq!(parse_report_type("GET / HTTP/1.1\r\n"), ReportType::Text);
    }

    #[test]
    fn recognizes_html_and_json_formats() {
        assert_eq!(parse_report_type("GET /?format=html HTTP/1.1\r\n"), ReportType::Html);
        assert_eq!(parse_report_type("GET /status?format=json HTTP/1.1\r\n"), ReportType::Json);
    }

    #[test]
    fn unknown_format_falls_back_to_text() {
        assert_eq!(parse_report_type("GET /?format=xml HTTP/1.1\r\n"), ReportType::Text);
    }
}
