//! The framed socket, handshake negotiation, per-connection dispatch
//! session, and the server accept loop / client reconnect loop built on top
//! of `smolrpc-core` and `smolrpc-reflect`.
//!
//! Everything here assumes a single-threaded cooperative event loop: no
//! `Arc`, no `Mutex`, no `Send` bound anywhere in the connection state. Run
//! a [`Server`] or [`Client`] inside a `tokio::task::LocalSet` on a
//! `current_thread` runtime.

mod address;
mod backoff;
mod client;
mod framed;
mod handshake;
mod server;
mod session;
mod transport;

pub use address::{Address, AddressParseError};
pub use backoff::backoff_seconds;
pub use client::{Client, ImplFactory as ClientImplFactory};
pub use handshake::HandshakeError;
pub use server::{ClientId, Server};
pub use server::ImplFactory as ServerImplFactory;
pub use session::Session;
pub use transport::Transport;
