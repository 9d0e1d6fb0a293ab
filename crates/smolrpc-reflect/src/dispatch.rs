use std::cell::RefCell;
use std::rc::Rc;

use smolrpc_core::{decode, encode, function_signature, DecodeError, Promise, Wire};

use crate::descriptor::{MethodDescriptor, ProtocolDescriptor};
use crate::peer::PeerProxyInvoker;

/// A single registered method: its descriptor plus the byte-in, byte-out
/// thunk that decodes the arguments, calls the bound implementation, and
/// encodes whatever it settles with.
pub struct MethodImpl {
    pub descriptor: MethodDescriptor,
    thunk: Box<dyn Fn(Vec<u8>) -> Promise<Vec<u8>>>,
}

impl MethodImpl {
    pub fn invoke(&self, args: Vec<u8>) -> Promise<Vec<u8>> {
        (self.thunk)(args)
    }
}

fn decode_err_to_string(err: DecodeError) -> String {
    err.to_string()
}

/// A protocol's dispatch table bound to a concrete implementation, plus a
/// typed proxy for calling the peer's protocol. One `DuplexImpl` exists per
/// connection: it owns the `Rc<RefCell<Impl>>` the thunks close over, so
/// the implementation never needs to be `Send`.
pub struct DuplexImpl {
    pub protocol_name: String,
    methods: Vec<MethodImpl>,
    pub peer: PeerProxyInvoker,
}

impl DuplexImpl {
    pub fn to_descriptor(&self) -> ProtocolDescriptor {
        ProtocolDescriptor::new(
            self.protocol_name.clone(),
            self.methods
                .iter()
                .map(|m| m.descriptor.clone())
                .collect(),
        )
    }

    pub fn find(&self, name: &str) -> Option<&MethodImpl> {
        self.methods.iter().find(|m| m.descriptor.name == name)
    }

    pub fn method_at(&self, index: usize) -> Option<&MethodImpl> {
        self.methods.get(index)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Registration-time builder for a [`DuplexImpl`]: the Rust analogue of the
/// original's `RPC_PROTOCOL`/`RPC_METHOD` macro expansion, built by calling
/// `.method(...)` once per method instead of generating the boilerplate at
/// compile time.
pub struct DuplexImplBuilder<Impl> {
    protocol_name: String,
    methods: Vec<MethodImpl>,
    state: Rc<RefCell<Impl>>,
}

impl<Impl: 'static> DuplexImplBuilder<Impl> {
    pub fn new(protocol_name: impl Into<String>, state: Rc<RefCell<Impl>>) -> Self {
        DuplexImplBuilder {
            protocol_name: protocol_name.into(),
            methods: Vec::new(),
            state,
        }
    }

    /// Register a method whose implementation settles asynchronously.
    /// `arg_type_names` should list each positional argument's
    /// `Wire::type_name()` in order; the return type name is derived from
    /// `Ret`.
    pub fn method_async<Args, Ret, F>(
        mut self,
        name: impl Into<String>,
        arg_type_names: &[String],
        f: F,
    ) -> Self
    where
        Args: Wire + 'static,
        Ret: Wire + 'static,
        F: Fn(&Rc<RefCell<Impl>>, Args) -> Promise<Ret> + 'static,
    {
        let name = name.into();
        let signature = function_signature(&Ret::type_name(), arg_type_names);
        let state = Rc::clone(&self.state);
        let thunk: Box<dyn Fn(Vec<u8>) -> Promise<Vec<u8>>> = Box::new(move |args_bytes| {
            match decode::<Args>(&args_bytes) {
                Ok(args) => f(&state, args).try_then(|result| Ok(encode(&result))),
                Err(err) => Promise::rejected(decode_err_to_string(err)),
            }
        });
        self.methods.push(MethodImpl {
            descriptor: MethodDescriptor::new(name, signature),
            thunk,
        });
        self
    }

    /// Register a method that computes its result synchronously.
    pub fn method<Args, Ret, F>(
        self,
        name: impl Into<String>,
        arg_type_names: &[String],
        f: F,
    ) -> Self
    where
        Args: Wire + 'static,
        Ret: Wire + 'static,
        F: Fn(&Rc<RefCell<Impl>>, Args) -> Ret + 'static,
    {
        self.method_async(name, arg_type_names, move |state, args| {
            Promise::fulfilled(f(state, args))
        })
    }

    pub fn build(self, peer: PeerProxyInvoker) -> DuplexImpl {
        DuplexImpl {
            protocol_name: self.protocol_name,
            methods: self.methods,
            peer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counter {
        calls: Cell<u32>,
    }

    struct NullInvoker;
    impl crate::peer::GenericPeerInvoker for NullInvoker {
        fn invoke(&self, _method_name: &str, _args: Vec<u8>) -> Promise<Vec<u8>> {
            Promise::rejected("no peer in this test")
        }
    }

    #[test]
    fn sync_method_roundtrips_through_the_thunk() {
        let state = Rc::new(RefCell::new(Counter {
            calls: Cell::new(0),
        }));
        let builder = DuplexImplBuilder::new("counter_protocol", Rc::clone(&state))
            .method::<u32, u32, _>("add_and_count", &[u32::type_name()], |state, delta| {
                let calls = state.borrow().calls.get();
                state.borrow().calls.set(calls + 1);
                delta + calls
            });
        let duplex = builder.build(PeerProxyInvoker::new(Rc::new(NullInvoker)));

        let method = duplex.find("add_and_count").unwrap();
        assert_eq!(method.descriptor.signature, "uint32_t(uint32_t)");

        let args = encode(&5u32);
        let result = Rc::new(RefCell::new(None));
        let result2 = Rc::clone(&result);
        method
            .invoke(args)
            .on_settle(move |v| *result2.borrow_mut() = Some(v), |e| panic!("{e}"));
        let value: u32 = decode(&result.borrow().as_ref().unwrap()[..]).unwrap();
        assert_eq!(value, 5);
        assert_eq!(state.borrow().calls.get(), 1);
    }

    #[test]
    fn bad_args_reject_instead_of_panicking() {
        let state = Rc::new(RefCell::new(Counter {
            calls: Cell::new(0),
        }));
        let duplex = DuplexImplBuilder::new("counter_protocol", state)
            .method::<u32, u32, _>("identity", &[u32::type_name()], |_, v| v)
            .build(PeerProxyInvoker::new(Rc::new(NullInvoker)));

        let method = duplex.find("identity").unwrap();
        let rejected = Rc::new(Cell::new(false));
        let rejected2 = Rc::clone(&rejected);
        method
            .invoke(vec![0x01]) // too short to be a valid u32
            .on_settle(|_| panic!("should not fulfill"), move |_| rejected2.set(true));
        assert!(rejected.get());
        let _ = DecodeError::Truncated {
            needed: 4,
            available: 1,
        }; // documents what `invoke` above actually rejected with
    }
}
