// The byte-pipe seam a `Connection` runs over. `TcpStream` is the real
// thing; tests swap in `tokio::io::DuplexStream` halves so the protocol
// state machine can be driven without opening a socket.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

/// Anything that can carry an RTMP byte stream
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> Transport for T {}

/// Binds a listener for one of the configuration's deduplicated
/// `Host`-type addresses
pub async fn listen(address: &str) -> std::io::Result<TcpListener> {
    TcpListener::bind(address).await
}

/// Dials a single `Client`-type address
pub async fn dial(address: &str) -> std::io::Result<TcpStream> {
    TcpStream::connect(address).await
}
