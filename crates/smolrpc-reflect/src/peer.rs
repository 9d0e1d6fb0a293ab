use std::rc::Rc;

use smolrpc_core::{decode, encode, Promise, Wire};

/// The dynamic half of a peer call: something that can send `method_name`
/// plus pre-serialized `args` across the connection and hand back a
/// promise of the raw reply bytes. Implemented by the framed-socket session
/// in `smolrpc-rpc`; kept as a trait here so this crate stays
/// transport-agnostic and testable on its own.
pub trait GenericPeerInvoker {
    fn invoke(&self, method_name: &str, args: Vec<u8>) -> Promise<Vec<u8>>;
}

/// Typed facade over a [`GenericPeerInvoker`]: encodes the call's arguments,
/// decodes the reply, and folds a decode failure into the same rejection
/// channel a peer-reported error would use.
#[derive(Clone)]
pub struct PeerProxyInvoker {
    invoker: Rc<dyn GenericPeerInvoker>,
}

impl PeerProxyInvoker {
    pub fn new(invoker: Rc<dyn GenericPeerInvoker>) -> Self {
        PeerProxyInvoker { invoker }
    }

    pub fn invoke<Args, Ret>(&self, method_name: &'static str, args: Args) -> Promise<Ret>
    where
        Args: Wire + 'static,
        Ret: Wire + 'static,
    {
        let bytes = encode(&args);
        self.invoker
            .invoke(method_name, bytes)
            .try_then(|reply| decode::<Ret>(&reply).map_err(|e| e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::cell::RefCell;

    struct EchoingInvoker {
        last_call: RefCell<Option<(String, Vec<u8>)>>,
    }

    impl GenericPeerInvoker for EchoingInvoker {
        fn invoke(&self, method_name: &str, args: Vec<u8>) -> Promise<Vec<u8>> {
            *self.last_call.borrow_mut() = Some((method_name.to_string(), args.clone()));
            Promise::fulfilled(args)
        }
    }

    #[test]
    fn invoke_encodes_args_and_decodes_reply() {
        let invoker = Rc::new(EchoingInvoker {
            last_call: RefCell::new(None),
        });
        let proxy = PeerProxyInvoker::new(invoker.clone());
        let seen = Rc::new(Cell::new(0u32));
        let seen2 = Rc::clone(&seen);
        proxy
            .invoke::<u32, u32>("identity", 99)
            .on_settle(move |v| seen2.set(v), |e| panic!("{e}"));
        assert_eq!(seen.get(), 99);
        assert_eq!(invoker.last_call.borrow().as_ref().unwrap().0, "identity");
    }

    struct RejectingInvoker;
    impl GenericPeerInvoker for RejectingInvoker {
        fn invoke(&self, _method_name: &str, _args: Vec<u8>) -> Promise<Vec<u8>> {
            Promise::rejected("peer exploded")
        }
    }

    #[test]
    fn peer_rejection_propagates() {
        let proxy = PeerProxyInvoker::new(Rc::new(RejectingInvoker));
        let seen = Rc::new(RefCell::new(String::new()));
        let seen2 = Rc::clone(&seen);
        proxy
            .invoke::<u32, u32>("boom", 1)
            .on_settle(|_| panic!("should not fulfill"), move |e| *seen2.borrow_mut() = e);
        assert_eq!(&*seen.borrow(), "peer exploded");
    }

    #[test]
    fn bad_reply_bytes_reject() {
        struct GarbageInvoker;
        impl GenericPeerInvoker for GarbageInvoker {
            fn invoke(&self, _method_name: &str, _args: Vec<u8>) -> Promise<Vec<u8>> {
                Promise::fulfilled(vec![0x01]) // too short for a u32
            }
        }
        let proxy = PeerProxyInvoker::new(Rc::new(GarbageInvoker));
        let rejected = Rc::new(Cell::new(false));
        let rejected2 = Rc::clone(&rejected);
        proxy
            .invoke::<u32, u32>("whatever", 1)
            .on_settle(|_| panic!("should not fulfill"), move |_| rejected2.set(true));
        assert!(rejected.get());
    }
}
