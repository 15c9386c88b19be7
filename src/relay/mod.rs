// The relay supervisor: the single owner of every connection and every
// routing `Server`. Nothing outside this module ever locks connection
// state from another task; cross-connection effects arrive here as
// `connection::ConnectionAction`s and are applied by mutating the arena
// directly (see `supervisor.rs`).

mod reconnect;
mod supervisor;
mod transport;

pub use reconnect::{RetryPolicy, RetryTick};
pub use supervisor::RelaySupervisor;
pub use transport::{dial, listen, Transport};
