//! The invoker's advertised surface: the broker calls back into a connected
//! invoker to hand it work and to cancel work in flight. This is the
//! duplex half of the broker/invoker connection — the broker is the
//! listener, but `assign_job`/`cancel_job` flow server-to-client.

use smolrpc_core::{Byte, Wire};
use smolrpc_reflect::{MethodDescriptor, ProtocolDescriptor};

pub const PROTOCOL_NAME: &str = "invoker_protocol";

pub const ASSIGN_JOB: &str = "assign_job";
pub const CANCEL_JOB: &str = "cancel_job";

/// `assign_job(job_id: uint64_t, payload: vec<byte>) -> void`
pub type AssignJobArgs = (u64, Vec<Byte>);
pub type AssignJobReturn = ();

/// `cancel_job(job_id: uint64_t) -> void`
pub type CancelJobArgs = u64;
pub type CancelJobReturn = ();

pub fn assign_job_signature() -> String {
    smolrpc_core::function_signature(
        &AssignJobReturn::type_name(),
        &[u64::type_name(), Vec::<Byte>::type_name()],
    )
}

pub fn cancel_job_signature() -> String {
    smolrpc_core::function_signature(&CancelJobReturn::type_name(), &[u64::type_name()])
}

pub fn protocol() -> ProtocolDescriptor {
    ProtocolDescriptor::new(
        PROTOCOL_NAME,
        vec![
            MethodDescriptor::new(ASSIGN_JOB, assign_job_signature()),
            MethodDescriptor::new(CANCEL_JOB, cancel_job_signature()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_match_expected_grammar() {
        assert_eq!(assign_job_signature(), "void(uint64_t, vec<byte>)");
        assert_eq!(cancel_job_signature(), "void(uint64_t)");
    }
}
