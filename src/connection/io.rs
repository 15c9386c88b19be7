// Per-connection IO: two dumb byte-pump tasks per socket, talking to the
// relay supervisor over channels. Neither task ever touches protocol
// state; the reader hands raw bytes to the supervisor and the writer
// drains whatever `Connection::send_message`/`send_raw` queued.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::relay::Transport;

/// What a reader task reports back to the supervisor
#[derive(Debug)]
pub enum ConnectionEvent {
    Bytes(u64, Vec<u8>),
    Closed(u64),
}

/// The writer-side handle the supervisor wires into a `Connection` via
/// `Connection::attach_writer`.
pub struct ConnectionIo {
    pub out_tx: UnboundedSender<Vec<u8>>,
}

const READ_BUFFER_SIZE: usize = 4096;

/// Splits `transport` and spawns its reader and writer tasks. The
/// reader forwards every non-empty read as a `ConnectionEvent::Bytes`
/// and reports EOF/error once as `ConnectionEvent::Closed`; the writer
/// simply drains `out_tx` until it's dropped or a write fails.
pub fn spawn_reader_writer<T: Transport>(
    id: u64,
    transport: T,
    inbound_tx: UnboundedSender<ConnectionEvent>,
) -> ConnectionIo {
    let (read_half, write_half) = tokio::io::split(transport);
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    tokio::spawn(reader_loop(id, read_half, inbound_tx));
    tokio::spawn(writer_loop(write_half, out_rx));

    ConnectionIo { out_tx }
}

async fn reader_loop<R: tokio::io::AsyncRead + Unpin>(
    id: u64,
    mut read_half: R,
    inbound_tx: UnboundedSender<ConnectionEvent>,
) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                let _ = inbound_tx.send(ConnectionEvent::Closed(id));
                return;
            }
            Ok(n) => {
                if inbound_tx.send(ConnectionEvent::Bytes(id, buf[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(_) => {
                let _ = inbound_tx.send(ConnectionEvent::Closed(id));
                return;
            }
        }
    }
}

async fn writer_loop<W: tokio::io::AsyncWrite + Unpin>(
    mut write_half: W,
    mut out_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(bytes) = out_rx.recv().await {
        if write_half.write_all(&bytes).await.is_err() {
            return;
        }
    }
    let _ = write_half.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reader_forwards_bytes_then_reports_closed_on_eof() {
        let (client, server) = tokio::io::duplex(64);
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();

        let io = spawn_reader_writer(1, server, inbound_tx);

        let mut client = client;
        client.write_all(b"hello").await.unwrap();
        drop(io); // closes the writer side once out_tx is dropped
        drop(client);

        let mut saw_bytes = false;
        let mut saw_closed = false;
        while let Some(event) = inbound_rx.recv().await {
            match event {
                ConnectionEvent::Bytes(1, bytes) => {
                    assert_eq!(bytes, b"hello");
                    saw_bytes = true;
                }
                ConnectionEvent::Closed(1) => {
                    saw_closed = true;
                    break;
                }
                _ => panic!("unexpected event"),
            }
        }

        assert!(saw_bytes);
        assert!(saw_closed);
    }

    #[tokio::test]
    async fn writer_forwards_queued_bytes_to_the_transport() {
        let (mut client, server) = tokio::io::duplex(64);
        let (inbound_tx, _inbound_rx) = mpsc::unbounded_channel();

        let io = spawn_reader_writer(1, server, inbound_tx);
        io.out_tx.send(b"world".to_vec()).unwrap();

        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"world");
    }
}
