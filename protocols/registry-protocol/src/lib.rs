//! The registry's advertised surface: two methods over a content-addressed
//! blob store, keyed by a data class name plus a 64-bit id. The store
//! itself is out of scope here — this crate only describes the wire shape,
//! grounded on the original's `registry_impl::store`/`retrieve` pair.

use smolrpc_core::{Byte, Wire};
use smolrpc_reflect::{MethodDescriptor, ProtocolDescriptor};

pub const PROTOCOL_NAME: &str = "registry_protocol";

pub const STORE: &str = "store";
pub const RETRIEVE: &str = "retrieve";

/// `store(data_class: string, id: uint64_t, data: vec<byte>) -> uint8_t`
pub type StoreArgs = (String, u64, Vec<Byte>);
pub type StoreReturn = bool;

/// `retrieve(data_class: string, id: uint64_t) -> variant<void, vec<byte>>`
pub type RetrieveArgs = (String, u64);
pub type RetrieveReturn = Option<Vec<Byte>>;

pub fn store_signature() -> String {
    smolrpc_core::function_signature(
        &StoreReturn::type_name(),
        &[String::type_name(), u64::type_name(), Vec::<Byte>::type_name()],
    )
}

pub fn retrieve_signature() -> String {
    smolrpc_core::function_signature(
        &RetrieveReturn::type_name(),
        &[String::type_name(), u64::type_name()],
    )
}

pub fn protocol() -> ProtocolDescriptor {
    ProtocolDescriptor::new(
        PROTOCOL_NAME,
        vec![
            MethodDescriptor::new(STORE, store_signature()),
            MethodDescriptor::new(RETRIEVE, retrieve_signature()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_match_expected_grammar() {
        assert_eq!(store_signature(), "uint8_t(string, uint64_t, vec<byte>)");
        assert_eq!(
            retrieve_signature(),
            "variant<void, vec<byte>>(string, uint64_t)"
        );
    }
}
