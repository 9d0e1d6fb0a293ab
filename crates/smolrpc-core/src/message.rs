use crate::codec::{Cursor, Wire};
use crate::error::DecodeError;

/// A method name as advertised during handshake or referenced by a proxy
/// stub.
pub type MethodName = String;

/// A method index assigned by one endpoint to one of the peer's methods,
/// valid for the lifetime of a single connection. `>= 0` means "invoke
/// method index N"; `-1` means "reply"; `-2` means "error reply".
pub type MethodId = i32;

pub const REPLY: MethodId = -1;
pub const ERROR_REPLY: MethodId = -2;

/// Patch the first four bytes of `buf` (a `u32` length field) with the
/// buffer's own length, satisfying the invariant that `message_size` /
/// `hello_size` always equals the serialized length of the complete frame.
fn patch_self_length(buf: &mut Vec<u8>) {
    let len = (buf.len() as u32).to_be_bytes();
    buf[0..4].copy_from_slice(&len);
}

/// One length-prefixed message on the wire after handshake completion.
///
/// Wire layout: `message_size: u32, method_id: i32, message_id: u64, args: bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcMessage {
    pub method_id: MethodId,
    pub message_id: u64,
    pub args: Vec<u8>,
}

impl RpcMessage {
    pub fn reply(message_id: u64, args: Vec<u8>) -> Self {
        RpcMessage {
            method_id: REPLY,
            message_id,
            args,
        }
    }

    pub fn error_reply(message_id: u64, text: &str) -> Self {
        RpcMessage {
            method_id: ERROR_REPLY,
            message_id,
            args: crate::codec::encode(&text.to_string()),
        }
    }

    pub fn invoke(method_id: MethodId, message_id: u64, args: Vec<u8>) -> Self {
        RpcMessage {
            method_id,
            message_id,
            args,
        }
    }

    /// Encode the full self-length-prefixed frame, ready to write to the
    /// transport.
    pub fn encode_framed(&self) -> Vec<u8> {
        let mut out = Vec::new();
        0u32.encode(&mut out); // placeholder for message_size
        self.method_id.encode(&mut out);
        self.message_id.encode(&mut out);
        // `args` is already-serialized bytes, written raw with a length
        // prefix rather than as a `Vec<Byte>` so callers don't pay for a
        // per-byte newtype wrap.
        (self.args.len() as u64).encode(&mut out);
        out.extend_from_slice(&self.args);
        patch_self_length(&mut out);
        out
    }

    /// Decode a complete frame (as sliced off by the framed socket once
    /// `message_size` bytes have arrived), including its own length field.
    pub fn decode_framed(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut cur = Cursor::new(buf);
        let _message_size = u32::decode(&mut cur)?;
        let method_id = i32::decode(&mut cur)?;
        let message_id = u64::decode(&mut cur)?;
        let len = u64::decode(&mut cur)? as usize;
        let args = cur.take(len)?.to_vec();
        if !cur.is_empty() {
            return Err(DecodeError::TrailingBytes {
                remaining: cur.remaining(),
            });
        }
        Ok(RpcMessage {
            method_id,
            message_id,
            args,
        })
    }
}

/// The client's opening handshake message: upper-case magic, the server
/// protocol it wants to talk to, the client protocol it advertises, and
/// the two ordered (name, signature) lists it wants to call / will serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub requested_server_protocol_name: String,
    pub advertised_client_protocol_name: String,
    pub requested_server_methods: Vec<(MethodName, String)>,
    pub advertised_client_methods: Vec<(MethodName, String)>,
}

/// Client hello magic bytes, upper case: distinguishes the initiator.
pub const CLIENT_MAGIC: [u8; 4] = *b"SMOL";
/// Server hello magic bytes, lower case: distinguishes the listener's reply.
pub const SERVER_MAGIC: [u8; 4] = *b"smol";

fn magic_matches(found: [u8; 4], expected: [u8; 4]) -> bool {
    found
        .iter()
        .zip(expected.iter())
        .all(|(a, b)| a.to_ascii_lowercase() == b.to_ascii_lowercase())
}

impl ClientHello {
    pub fn magic_is_client_shaped(magic: [u8; 4]) -> bool {
        magic_matches(magic, CLIENT_MAGIC) && magic.iter().all(u8::is_ascii_uppercase)
    }

    pub fn encode_framed(&self) -> Vec<u8> {
        let mut out = Vec::new();
        0u32.encode(&mut out); // placeholder for hello_size
        CLIENT_MAGIC.encode(&mut out);
        self.requested_server_protocol_name.encode(&mut out);
        self.advertised_client_protocol_name.encode(&mut out);
        self.requested_server_methods.encode(&mut out);
        self.advertised_client_methods.encode(&mut out);
        patch_self_length(&mut out);
        out
    }

    /// Decode the body of a client hello, `buf` starting right after the
    /// `hello_size`/`magic` prelude that the framed socket already peeled
    /// off and validated.
    pub fn decode_body(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut cur = Cursor::new(buf);
        let requested_server_protocol_name = String::decode(&mut cur)?;
        let advertised_client_protocol_name = String::decode(&mut cur)?;
        let requested_server_methods = Vec::<(MethodName, String)>::decode(&mut cur)?;
        let advertised_client_methods = Vec::<(MethodName, String)>::decode(&mut cur)?;
        if !cur.is_empty() {
            return Err(DecodeError::TrailingBytes {
                remaining: cur.remaining(),
            });
        }
        Ok(ClientHello {
            requested_server_protocol_name,
            advertised_client_protocol_name,
            requested_server_methods,
            advertised_client_methods,
        })
    }
}

/// The server's reply handshake message: an error message (empty if OK)
/// and, position by position, the server-assigned method IDs for the
/// client's requested method list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub error_message: String,
    pub method_ids: Vec<MethodId>,
}

impl ServerHello {
    pub fn ok(method_ids: Vec<MethodId>) -> Self {
        ServerHello {
            error_message: String::new(),
            method_ids,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        ServerHello {
            error_message: text.into(),
            method_ids: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error_message.is_empty()
    }

    pub fn magic_is_server_shaped(magic: [u8; 4]) -> bool {
        magic_matches(magic, SERVER_MAGIC) && magic.iter().all(u8::is_ascii_lowercase)
    }

    pub fn encode_framed(&self) -> Vec<u8> {
        let mut out = Vec::new();
        0u32.encode(&mut out); // placeholder for hello_size
        SERVER_MAGIC.encode(&mut out);
        self.error_message.encode(&mut out);
        self.method_ids.encode(&mut out);
        patch_self_length(&mut out);
        out
    }

    pub fn decode_body(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut cur = Cursor::new(buf);
        let error_message = String::decode(&mut cur)?;
        let method_ids = Vec::<MethodId>::decode(&mut cur)?;
        if !cur.is_empty() {
            return Err(DecodeError::TrailingBytes {
                remaining: cur.remaining(),
            });
        }
        Ok(ServerHello {
            error_message,
            method_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_message_roundtrip() {
        let msg = RpcMessage::invoke(3, 42, vec![1, 2, 3]);
        let bytes = msg.encode_framed();
        let decoded = RpcMessage::decode_framed(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn message_size_includes_itself() {
        let msg = RpcMessage::reply(1, vec![]);
        let bytes = msg.encode_framed();
        let size = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(size as usize, bytes.len());
    }

    #[test]
    fn client_magic_is_upper_case() {
        assert!(ClientHello::magic_is_client_shaped(*b"SMOL"));
        assert!(!ClientHello::magic_is_client_shaped(*b"smol"));
    }

    #[test]
    fn server_magic_is_lower_case() {
        assert!(ServerHello::magic_is_server_shaped(*b"smol"));
        assert!(!ServerHello::magic_is_server_shaped(*b"SMOL"));
    }

    #[test]
    fn client_hello_roundtrip() {
        let hello = ClientHello {
            requested_server_protocol_name: "echo_protocol".to_string(),
            advertised_client_protocol_name: "reverse_echo_protocol".to_string(),
            requested_server_methods: vec![("echo_v1".to_string(), "string(string)".to_string())],
            advertised_client_methods: vec![],
        };
        let bytes = hello.encode_framed();
        // First 8 bytes are hello_size + magic, handled by the framed socket.
        let decoded = ClientHello::decode_body(&bytes[8..]).unwrap();
        assert_eq!(hello, decoded);
    }

    #[test]
    fn server_hello_roundtrip() {
        let hello = ServerHello::ok(vec![0, 1, 2]);
        let bytes = hello.encode_framed();
        let decoded = ServerHello::decode_body(&bytes[8..]).unwrap();
        assert_eq!(hello, decoded);
    }
}
