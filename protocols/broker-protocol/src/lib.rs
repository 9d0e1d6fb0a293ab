//! The broker's advertised surface: invokers pull work and report results
//! through it. The queue backing these calls is out of scope here (see
//! `broker::queue` in the broker service); this crate only pins the wire
//! shape, named after the original's `broker::pending_addition_submission`.

use smolrpc_core::{Byte, Pair, Wire};
use smolrpc_reflect::{MethodDescriptor, ProtocolDescriptor};

pub const PROTOCOL_NAME: &str = "broker_protocol";

pub const REQUEST_JOB: &str = "request_job";
pub const SUBMIT_RESULT: &str = "submit_result";

/// `request_job() -> variant<void, pair<uint64_t, vec<byte>>>`
pub type RequestJobArgs = ();
pub type RequestJobReturn = Option<Pair<u64, Vec<Byte>>>;

/// `submit_result(job_id: uint64_t, output: vec<byte>) -> void`
pub type SubmitResultArgs = (u64, Vec<Byte>);
pub type SubmitResultReturn = ();

pub fn request_job_signature() -> String {
    smolrpc_core::function_signature(&RequestJobReturn::type_name(), &[])
}

pub fn submit_result_signature() -> String {
    smolrpc_core::function_signature(
        &SubmitResultReturn::type_name(),
        &[u64::type_name(), Vec::<Byte>::type_name()],
    )
}

pub fn protocol() -> ProtocolDescriptor {
    ProtocolDescriptor::new(
        PROTOCOL_NAME,
        vec![
            MethodDescriptor::new(REQUEST_JOB, request_job_signature()),
            MethodDescriptor::new(SUBMIT_RESULT, submit_result_signature()),
        ],
    )
}
