pub mod connection;
pub mod stream;

pub use connection::Connection;
pub(crate) use connection::ConnectionState;
pub use stream::Transport;
