use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use smolrpc_core::{MethodId, Promise, RpcMessage};
use smolrpc_reflect::{DuplexImpl, GenericPeerInvoker};
use tokio::sync::mpsc;

/// The live state of one connection: the outgoing-frame queue, the table of
/// calls awaiting a reply, and the peer's method-id assignment for calls
/// going the other way. Shared (via `Rc`) between the read loop that
/// dispatches incoming frames and the [`GenericPeerInvoker`] a
/// [`DuplexImpl`]'s proxy calls into — both live on the same task, so
/// `RefCell`/`Cell` are enough; nothing here is `Send`.
struct SessionInner {
    write_tx: mpsc::UnboundedSender<Vec<u8>>,
    pending: RefCell<HashMap<u64, Promise<Vec<u8>>>>,
    peer_method_ids: HashMap<String, MethodId>,
    next_message_id: Cell<u64>,
    label: String,
}

#[derive(Clone)]
pub struct Session(Rc<SessionInner>);

impl Session {
    pub fn new(
        write_tx: mpsc::UnboundedSender<Vec<u8>>,
        peer_method_ids: HashMap<String, MethodId>,
        label: String,
    ) -> Self {
        Session(Rc::new(SessionInner {
            write_tx,
            pending: RefCell::new(HashMap::new()),
            peer_method_ids,
            next_message_id: Cell::new(0),
            label,
        }))
    }

    fn send(&self, bytes: Vec<u8>) {
        // The receiving end only disappears once the writer task has shut
        // down, which happens when the connection itself is gone; there is
        // nothing useful left to do with the frame at that point.
        let _ = self.0.write_tx.send(bytes);
    }

    /// Dispatch one incoming frame: resolve a pending call on a reply,
    /// log-and-drop on a peer-reported error (the promise is left
    /// unsettled, matching upstream's current behavior), or invoke a local
    /// method and reply/error-reply with its outcome.
    pub fn handle_incoming(&self, message: RpcMessage, duplex: &DuplexImpl) {
        match message.method_id {
            smolrpc_core::REPLY => {
                let promise = self.0.pending.borrow_mut().remove(&message.message_id);
                match promise {
                    Some(promise) => promise.fulfill(message.args),
                    None => tracing::warn!(
                        peer = %self.0.label,
                        message_id = message.message_id,
                        "response to unknown message: no corresponding request or double response"
                    ),
                }
            }
            smolrpc_core::ERROR_REPLY => {
                let text = smolrpc_core::decode::<String>(&message.args)
                    .unwrap_or_else(|_| "<undecodable error>".to_string());
                tracing::warn!(
                    peer = %self.0.label,
                    message_id = message.message_id,
                    error = %text,
                    "peer reported an error"
                );
                // The pending promise for this message_id, if any, is left
                // hanging: the present design does not reject it.
            }
            id if id >= 0 => match duplex.method_at(id as usize) {
                Some(method) => {
                    let message_id = message.message_id;
                    let on_ok = self.clone();
                    let on_err = self.clone();
                    method.invoke(message.args).on_settle(
                        move |result| on_ok.send(RpcMessage::reply(message_id, result).encode_framed()),
                        move |text| {
                            on_err.send(RpcMessage::error_reply(message_id, &text).encode_framed())
                        },
                    );
                }
                None => self.send(
                    RpcMessage::error_reply(message.message_id, "Unknown method").encode_framed(),
                ),
            },
            _ => self.send(
                RpcMessage::error_reply(message.message_id, "Unknown method").encode_framed(),
            ),
        }
    }
}

impl GenericPeerInvoker for Session {
    fn invoke(&self, method_name: &str, args: Vec<u8>) -> Promise<Vec<u8>> {
        let Some(&method_id) = self.0.peer_method_ids.get(method_name) else {
            return Promise::rejected(format!("peer does not support method {method_name}"));
        };
        let message_id = self.0.next_message_id.get();
        self.0.next_message_id.set(message_id + 1);

        let promise = Promise::new();
        self.0
            .pending
            .borrow_mut()
            .insert(message_id, promise.clone());
        self.send(RpcMessage::invoke(method_id, message_id, args).encode_framed());
        promise
    }
}
