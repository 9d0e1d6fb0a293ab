/// One method in a protocol's advertised surface: its name and its
/// canonical signature string, as produced by
/// `smolrpc_core::function_signature`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    pub signature: String,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, signature: impl Into<String>) -> Self {
        MethodDescriptor {
            name: name.into(),
            signature: signature.into(),
        }
    }
}

/// The ordered set of methods a protocol defines. Exchanged (by name and
/// signature) during the handshake so each side can agree on a stable
/// per-connection method-ID numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolDescriptor {
    pub name: String,
    pub methods: Vec<MethodDescriptor>,
}

impl ProtocolDescriptor {
    pub fn new(name: impl Into<String>, methods: Vec<MethodDescriptor>) -> Self {
        ProtocolDescriptor {
            name: name.into(),
            methods,
        }
    }

    pub fn method_names_and_signatures(&self) -> Vec<(String, String)> {
        self.methods
            .iter()
            .map(|m| (m.name.clone(), m.signature.clone()))
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// The protocol a simplex endpoint advertises when it never calls back
    /// into its peer: an empty, conventionally-named surface both sides
    /// agree on so the handshake's name check still has something to
    /// compare against.
    pub fn none() -> Self {
        ProtocolDescriptor::new("none", Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_looks_up_by_name() {
        let proto = ProtocolDescriptor::new(
            "echo_protocol",
            vec![MethodDescriptor::new("echo", "string(string)")],
        );
        assert_eq!(proto.find("echo").unwrap().signature, "string(string)");
        assert!(proto.find("missing").is_none());
    }
}
