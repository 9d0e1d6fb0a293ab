/// Maximum serialized size of a hello envelope (client or server), in bytes,
/// including the `hello_size` and magic fields. A peer that advertises a
/// larger `hello_size` is dropped before any of the hello body is read.
pub const MAX_HELLO_SIZE: usize = 8192;
