//! Foundational wire types for the smolrpc protocol: the binary codec, the
//! canonical signature-string grammar derived from it, the framed message
//! and hello envelope shapes, and the single-assignment [`Promise`] that
//! carries results across the event loop.
//!
//! Everything in this crate is transport-agnostic; see `smolrpc-rpc` for the
//! framed socket, handshake and connection lifecycle built on top of it.

mod codec;
mod error;
mod limits;
mod message;
mod promise;

pub use codec::{decode, encode, function_signature, Byte, Cursor, Pair, Wire};
pub use error::DecodeError;
pub use limits::MAX_HELLO_SIZE;
pub use message::{ClientHello, MethodId, MethodName, RpcMessage, ServerHello, ERROR_REPLY, REPLY};
pub use promise::Promise;
