use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use smolrpc_core::Promise;
use smolrpc_reflect::{DuplexImpl, GenericPeerInvoker, PeerProxyInvoker, ProtocolDescriptor};
use tokio::io::split;
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::mpsc;

use crate::address::{resolve_first, Address};
use crate::backoff::backoff_seconds;
use crate::framed::{FramedReader, FramedWriter};
use crate::handshake::perform_client_handshake;
use crate::session::Session;
use crate::transport::Transport;

/// Builds the client-side [`DuplexImpl`], given a peer proxy that outlives
/// any single connection: calls made while disconnected are queued and
/// flushed, in order, once the next handshake succeeds.
pub type ImplFactory = Rc<dyn Fn(PeerProxyInvoker) -> DuplexImpl>;

struct QueuedCall {
    method_name: String,
    args: Vec<u8>,
    promise: Promise<Vec<u8>>,
}

/// The client's peer invoker, one per `Client` for its whole lifetime. While
/// no connection is up, `invoke` appends to `pending` instead of rejecting;
/// `attach` flushes that buffer in FIFO order once a session exists, and
/// `detach` goes back to buffering when the connection drops.
struct ClientPeer {
    connected: RefCell<Option<Session>>,
    pending: RefCell<Vec<QueuedCall>>,
}

impl ClientPeer {
    fn new() -> Rc<Self> {
        Rc::new(ClientPeer {
            connected: RefCell::new(None),
            pending: RefCell::new(Vec::new()),
        })
    }

    fn attach(&self, session: Session) {
        let queued = std::mem::take(&mut *self.pending.borrow_mut());
        *self.connected.borrow_mut() = Some(session.clone());
        for call in queued {
            let fulfil_target = call.promise.clone();
            let reject_target = call.promise;
            GenericPeerInvoker::invoke(&session, &call.method_name, call.args).on_settle(
                move |value| fulfil_target.fulfill(value),
                move |message| reject_target.reject(message),
            );
        }
    }

    fn detach(&self) {
        *self.connected.borrow_mut() = None;
    }
}

impl GenericPeerInvoker for ClientPeer {
    fn invoke(&self, method_name: &str, args: Vec<u8>) -> Promise<Vec<u8>> {
        if let Some(session) = self.connected.borrow().as_ref() {
            return GenericPeerInvoker::invoke(session, method_name, args);
        }
        let promise = Promise::new();
        self.pending.borrow_mut().push(QueuedCall {
            method_name: method_name.to_string(),
            args,
            promise: promise.clone(),
        });
        promise
    }
}

/// Connects to one server address, maintaining the connection across
/// failures with the pinned exponential backoff. Must be driven from a
/// `LocalSet`.
pub struct Client {
    address_text: String,
    server_protocol: ProtocolDescriptor,
    advertised_client_protocol: ProtocolDescriptor,
    peer: Rc<ClientPeer>,
    duplex: Rc<DuplexImpl>,
    n_failures: Cell<u32>,
    active: Cell<bool>,
}

impl Client {
    pub fn new(
        address_text: impl Into<String>,
        server_protocol: ProtocolDescriptor,
        advertised_client_protocol: ProtocolDescriptor,
        make_impl: ImplFactory,
    ) -> Rc<Self> {
        let peer = ClientPeer::new();
        let duplex = Rc::new((make_impl)(PeerProxyInvoker::new(
            Rc::clone(&peer) as Rc<dyn GenericPeerInvoker>
        )));
        Rc::new(Client {
            address_text: address_text.into(),
            server_protocol,
            advertised_client_protocol,
            peer,
            duplex,
            n_failures: Cell::new(0),
            active: Cell::new(true),
        })
    }

    /// The client's duplex implementation. Stable for the client's whole
    /// lifetime: calls through its `peer` proxy are queued while
    /// disconnected rather than failing.
    pub fn duplex(&self) -> Rc<DuplexImpl> {
        Rc::clone(&self.duplex)
    }

    /// Start the connect-retry loop. Runs until [`stop`](Client::stop) is
    /// called; spawn it with `spawn_local` and keep the `Rc<Client>` around
    /// to make calls through `duplex()`.
    pub async fn run(self: Rc<Self>) {
        loop {
            if !self.active.get() {
                return;
            }
            match self.connect_once().await {
                // connect_once only returns once the connection drops; the
                // failure counter is reset on the handshake succeeding, not
                // here.
                Ok(()) => {}
                Err(err) => {
                    tracing::warn!(address = %self.address_text, error = %err, "connection failed");
                    self.n_failures.set(self.n_failures.get() + 1);
                }
            }
            self.peer.detach();
            if !self.active.get() {
                return;
            }
            let delay = backoff_seconds(self.n_failures.get());
            if delay > 0 {
                tracing::info!(address = %self.address_text, delay_seconds = delay, "reconnecting");
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
        }
    }

    pub fn stop(&self) {
        self.active.set(false);
    }

    async fn connect_once(self: &Rc<Self>) -> std::io::Result<()> {
        let address = Address::parse(&self.address_text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
        let transport = match address {
            Address::Unix(path) => Transport::Unix(UnixStream::connect(&path).await?),
            Address::Tcp { host, port } => {
                let resolved = resolve_first(&host, port).await?;
                Transport::Tcp(TcpStream::connect(resolved).await?)
            }
        };

        let (read_half, write_half) = split(transport);
        let mut reader = FramedReader::new(read_half);
        let mut writer = FramedWriter::new(write_half);

        let peer_method_ids = perform_client_handshake(
            &mut reader,
            &mut writer,
            &self.server_protocol,
            &self.advertised_client_protocol,
        )
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        tracing::info!(address = %self.address_text, "handshake with server established");

        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        tokio::task::spawn_local(async move {
            while let Some(bytes) = write_rx.recv().await {
                if writer.write_frame(&bytes).await.is_err() {
                    break;
                }
            }
        });

        let session = Session::new(write_tx, peer_method_ids, self.address_text.clone());
        self.peer.attach(session.clone());
        self.n_failures.set(0);

        loop {
            let message = reader.read_message().await?;
            session.handle_incoming(message, &self.duplex);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn calls_made_before_attach_are_queued_and_flushed_in_order() {
        let peer = ClientPeer::new();
        let mut seen = Vec::new();

        let first = GenericPeerInvoker::invoke(&*peer, "first", vec![1]);
        let second = GenericPeerInvoker::invoke(&*peer, "second", vec![2]);
        assert!(peer.connected.borrow().is_none());
        assert_eq!(peer.pending.borrow().len(), 2);

        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let mut ids = HashMap::new();
        ids.insert("first".to_string(), 10);
        ids.insert("second".to_string(), 11);
        let session = Session::new(tx, ids, "test".to_string());
        peer.attach(session);

        // Two invoke frames were written, first-queued first.
        let frame_a = rx.try_recv().unwrap();
        let frame_b = rx.try_recv().unwrap();
        let msg_a = smolrpc_core::RpcMessage::decode_framed(&frame_a).unwrap();
        let msg_b = smolrpc_core::RpcMessage::decode_framed(&frame_b).unwrap();
        assert_eq!(msg_a.method_id, 10);
        assert_eq!(msg_b.method_id, 11);

        first.on_settle(
            move |v| seen.push(v),
            |_| panic!("should not reject"),
        );
        let _ = second;
    }

    #[test]
    fn calls_after_attach_go_straight_through() {
        let peer = ClientPeer::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let mut ids = HashMap::new();
        ids.insert("m".to_string(), 0);
        let session = Session::new(tx, ids, "test".to_string());
        peer.attach(session);

        GenericPeerInvoker::invoke(&*peer, "m", vec![9]);
        assert!(peer.pending.borrow().is_empty());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn detach_resumes_queueing() {
        let peer = ClientPeer::new();
        let (tx, _rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let session = Session::new(tx, HashMap::new(), "test".to_string());
        peer.attach(session);
        peer.detach();

        GenericPeerInvoker::invoke(&*peer, "m", vec![]);
        assert_eq!(peer.pending.borrow().len(), 1);
    }
}
