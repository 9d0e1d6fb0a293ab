use std::collections::HashMap;
use std::io;

use smolrpc_core::{ClientHello, MethodId, ServerHello};
use smolrpc_reflect::ProtocolDescriptor;

use crate::framed::{FramedReader, FramedWriter};

/// Everything a freshly-connected client needs to say to open a
/// connection: which server protocol it wants, which protocol it offers in
/// return, and the two method lists that let each side number the other's
/// methods for the life of the connection.
pub fn build_client_hello(
    requested_server_protocol: &ProtocolDescriptor,
    advertised_client_protocol: &ProtocolDescriptor,
) -> ClientHello {
    ClientHello {
        requested_server_protocol_name: requested_server_protocol.name.clone(),
        advertised_client_protocol_name: advertised_client_protocol.name.clone(),
        requested_server_methods: requested_server_protocol.method_names_and_signatures(),
        advertised_client_methods: advertised_client_protocol.method_names_and_signatures(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeError(pub String);

impl std::fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for HandshakeError {}

/// Send the client hello and wait for the server's reply, returning the
/// method-name -> method-id table the client should use for outgoing calls.
pub async fn perform_client_handshake<R, W>(
    reader: &mut FramedReader<R>,
    writer: &mut FramedWriter<W>,
    requested_server_protocol: &ProtocolDescriptor,
    advertised_client_protocol: &ProtocolDescriptor,
) -> Result<HashMap<String, MethodId>, HandshakeError>
where
    R: tokio::io::AsyncReadExt + Unpin,
    W: tokio::io::AsyncWriteExt + Unpin,
{
    let hello = build_client_hello(requested_server_protocol, advertised_client_protocol);
    writer
        .write_frame(&hello.encode_framed())
        .await
        .map_err(|e| HandshakeError(e.to_string()))?;

    let raw = reader
        .read_hello()
        .await
        .map_err(|e| HandshakeError(e.to_string()))?;
    let magic: [u8; 4] = raw[4..8].try_into().unwrap();
    if !ServerHello::magic_is_server_shaped(magic) {
        return Err(HandshakeError("invalid magic in server hello".to_string()));
    }
    let reply =
        ServerHello::decode_body(&raw[8..]).map_err(|e| HandshakeError(e.to_string()))?;
    if reply.is_error() {
        return Err(HandshakeError(reply.error_message));
    }
    if reply.method_ids.len() != requested_server_protocol.methods.len() {
        return Err(HandshakeError(
            "the requested method count and the returned method ID count differ".to_string(),
        ));
    }

    let mut ids = HashMap::new();
    for (method, id) in requested_server_protocol
        .methods
        .iter()
        .zip(reply.method_ids.into_iter())
    {
        ids.insert(method.name.clone(), id);
    }
    Ok(ids)
}

/// The server side of the handshake: validate the incoming client hello
/// against what this server serves and what it requires the client to
/// serve, and produce either the reply to send back plus the client's
/// method-id table, or an error to report before closing the connection.
pub fn negotiate_server_side(
    hello: &ClientHello,
    server_impl_protocol: &ProtocolDescriptor,
    required_client_protocol: &ProtocolDescriptor,
) -> Result<(ServerHello, HashMap<String, MethodId>), HandshakeError> {
    if hello.requested_server_protocol_name != server_impl_protocol.name {
        return Err(HandshakeError(format!(
            "This server only supports {} protocol",
            server_impl_protocol.name
        )));
    }
    if hello.advertised_client_protocol_name != required_client_protocol.name {
        return Err(HandshakeError(format!(
            "This server requires the client to support {} protocol",
            required_client_protocol.name
        )));
    }

    let mut advertised: HashMap<&str, (&str, i32)> = HashMap::new();
    for (i, (name, signature)) in hello.advertised_client_methods.iter().enumerate() {
        advertised.insert(name.as_str(), (signature.as_str(), i as i32));
    }

    let mut client_ids_of_methods = HashMap::new();
    for method in &required_client_protocol.methods {
        let Some(&(signature, id)) = advertised.get(method.name.as_str()) else {
            return Err(HandshakeError(format!(
                "The client method {} is not supported",
                method.name
            )));
        };
        if signature != method.signature {
            return Err(HandshakeError(format!(
                "The client method {} has mismatching signature. Expected: {}, present: {}",
                method.name, method.signature, signature
            )));
        }
        client_ids_of_methods.insert(method.name.clone(), id);
    }

    let mut method_ids = Vec::new();
    for (name, signature) in &hello.requested_server_methods {
        let Some(method) = server_impl_protocol.find(name) else {
            return Err(HandshakeError(format!(
                "The server method {name} is not supported"
            )));
        };
        if &method.signature != signature {
            return Err(HandshakeError(format!(
                "The server method {} has mismatching signature. Expected: {}, present: {}",
                name, method.signature, signature
            )));
        }
        let id = server_impl_protocol
            .methods
            .iter()
            .position(|m| m.name == *name)
            .unwrap() as i32;
        method_ids.push(id);
    }

    Ok((ServerHello::ok(method_ids), client_ids_of_methods))
}

pub fn decode_and_validate_client_hello(raw: &[u8]) -> Result<ClientHello, io::Error> {
    let magic: [u8; 4] = raw[4..8]
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "hello too short for magic"))?;
    if !ClientHello::magic_is_client_shaped(magic) {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "invalid magic"));
    }
    ClientHello::decode_body(&raw[8..]).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use smolrpc_reflect::MethodDescriptor;

    fn echo_protocol() -> ProtocolDescriptor {
        ProtocolDescriptor::new(
            "echo_protocol",
            vec![MethodDescriptor::new("echo", "string(string)")],
        )
    }

    fn reverse_echo_protocol() -> ProtocolDescriptor {
        ProtocolDescriptor::new(
            "reverse_echo_protocol",
            vec![MethodDescriptor::new("reverse_echo", "string(string)")],
        )
    }

    #[test]
    fn negotiate_success_returns_ids_in_client_request_order() {
        let client_protocol = reverse_echo_protocol();
        let server_protocol = echo_protocol();
        let hello = build_client_hello(&server_protocol, &client_protocol);
        let (reply, client_ids) =
            negotiate_server_side(&hello, &server_protocol, &client_protocol).unwrap();
        assert!(!reply.is_error());
        assert_eq!(reply.method_ids, vec![0]);
        assert_eq!(client_ids.get("reverse_echo"), Some(&0));
    }

    #[test]
    fn wrong_server_protocol_name_is_rejected() {
        let hello = ClientHello {
            requested_server_protocol_name: "other_protocol".to_string(),
            advertised_client_protocol_name: reverse_echo_protocol().name,
            requested_server_methods: vec![],
            advertised_client_methods: vec![],
        };
        let err = negotiate_server_side(&hello, &echo_protocol(), &reverse_echo_protocol())
            .unwrap_err();
        assert!(err.0.contains("only supports"));
    }

    #[test]
    fn missing_client_method_is_rejected() {
        let hello = ClientHello {
            requested_server_protocol_name: echo_protocol().name,
            advertised_client_protocol_name: reverse_echo_protocol().name,
            requested_server_methods: vec![],
            advertised_client_methods: vec![],
        };
        let err = negotiate_server_side(&hello, &echo_protocol(), &reverse_echo_protocol())
            .unwrap_err();
        assert!(err.0.contains("is not supported"));
    }

    #[test]
    fn mismatched_signature_is_rejected() {
        let hello = ClientHello {
            requested_server_protocol_name: echo_protocol().name,
            advertised_client_protocol_name: reverse_echo_protocol().name,
            requested_server_methods: vec![],
            advertised_client_methods: vec![("reverse_echo".to_string(), "void(void)".to_string())],
        };
        let err = negotiate_server_side(&hello, &echo_protocol(), &reverse_echo_protocol())
            .unwrap_err();
        assert!(err.0.contains("mismatching signature"));
    }
}
