//! Reflection over smolrpc protocols: the descriptors exchanged at
//! handshake time, the dispatch thunks a server uses to invoke a method by
//! name and raw bytes, and the typed peer proxy a duplex implementation
//! exposes for calling the other side.
//!
//! There is no macro here and no derive. A protocol is a plain Rust value
//! built with [`ProtocolDescriptor::new`] plus [`MethodDescriptor`]s; a
//! duplex implementation is built with [`DuplexImplBuilder`]. This mirrors
//! the registration-time builder pattern the protocol itself calls out as
//! equivalent to compile-time code generation, minus the macro machinery.

mod descriptor;
mod dispatch;
mod peer;

pub use descriptor::{MethodDescriptor, ProtocolDescriptor};
pub use dispatch::{DuplexImpl, DuplexImplBuilder, MethodImpl};
pub use peer::{GenericPeerInvoker, PeerProxyInvoker};
