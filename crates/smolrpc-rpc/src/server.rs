use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use smolrpc_reflect::{DuplexImpl, PeerProxyInvoker, ProtocolDescriptor};
use tokio::io::split;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::address::{resolve_first, Address};
use crate::framed::{FramedReader, FramedWriter};
use crate::handshake::{decode_and_validate_client_hello, negotiate_server_side};
use crate::session::Session;
use crate::transport::Transport;

/// Builds the per-connection [`DuplexImpl`] for a server: one fresh
/// implementation state per client, wired to that client's `Session` as its
/// peer invoker. Analogous to the original's `server_impl_factory`
/// function pointer, expressed as a plain closure instead.
pub type ImplFactory = Rc<dyn Fn(PeerProxyInvoker) -> DuplexImpl>;

/// A monotonic id assigned to each accepted connection, for log lines.
pub type ClientId = u64;

/// Accepts connections on one or more addresses, negotiates the handshake,
/// and dispatches frames to a fresh implementation instance per client.
/// Must be driven from a `tokio::task::LocalSet`: every accepted connection
/// is handled by a `spawn_local` task so the per-connection `Rc`-based
/// state never needs to be `Send`.
pub struct Server {
    server_protocol: ProtocolDescriptor,
    required_client_protocol: ProtocolDescriptor,
    make_impl: ImplFactory,
    unix_socket_paths: RefCell<Vec<String>>,
    listener_tasks: RefCell<Vec<JoinHandle<()>>>,
    client_tasks: RefCell<HashMap<ClientId, JoinHandle<()>>>,
    next_client_id: RefCell<ClientId>,
}

impl Server {
    pub fn new(
        server_protocol: ProtocolDescriptor,
        required_client_protocol: ProtocolDescriptor,
        make_impl: ImplFactory,
    ) -> Rc<Self> {
        Rc::new(Server {
            server_protocol,
            required_client_protocol,
            make_impl,
            unix_socket_paths: RefCell::new(Vec::new()),
            listener_tasks: RefCell::new(Vec::new()),
            client_tasks: RefCell::new(HashMap::new()),
            next_client_id: RefCell::new(0),
        })
    }

    fn take_client_id(&self) -> ClientId {
        let mut id = self.next_client_id.borrow_mut();
        let current = *id;
        *id += 1;
        current
    }

    /// Bind and start accepting on `address`. Must run inside a
    /// `LocalSet`.
    pub async fn bind(self: &Rc<Self>, text_address: &str) -> std::io::Result<()> {
        let address = Address::parse(text_address)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
        tracing::info!(address = %text_address, "listening");
        match address {
            Address::Unix(path) => {
                if std::path::Path::new(&path).exists() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        format!("listener failure on {path}: file exists"),
                    ));
                }
                let listener = UnixListener::bind(&path)?;
                self.unix_socket_paths.borrow_mut().push(path.clone());
                let server = Rc::clone(self);
                let handle = tokio::task::spawn_local(async move {
                    loop {
                        match listener.accept().await {
                            Ok((stream, _)) => {
                                server.spawn_client(Transport::Unix(stream), path.clone());
                            }
                            Err(err) => {
                                tracing::warn!(address = %path, error = %err, "accept failed");
                            }
                        }
                    }
                });
                self.listener_tasks.borrow_mut().push(handle);
            }
            Address::Tcp { host, port } => {
                let resolved = resolve_first(&host, port).await?;
                let listener = TcpListener::bind(resolved).await?;
                let server = Rc::clone(self);
                let label = text_address.to_string();
                let handle = tokio::task::spawn_local(async move {
                    loop {
                        match listener.accept().await {
                            Ok((stream, peer_addr)) => {
                                server.spawn_client(Transport::Tcp(stream), peer_addr.to_string());
                            }
                            Err(err) => {
                                tracing::warn!(address = %label, error = %err, "accept failed");
                            }
                        }
                    }
                });
                self.listener_tasks.borrow_mut().push(handle);
            }
        }
        Ok(())
    }

    fn spawn_client(self: &Rc<Self>, transport: Transport, peer_label: String) {
        let client_id = self.take_client_id();
        let server = Rc::clone(self);
        let server_for_cleanup = Rc::clone(self);
        let handle = tokio::task::spawn_local(async move {
            if let Err(err) = server.run_client(transport, client_id, peer_label.clone()).await {
                tracing::warn!(client_id, peer = %peer_label, error = %err, "client connection ended");
            }
            server_for_cleanup.client_tasks.borrow_mut().remove(&client_id);
        });
        self.client_tasks.borrow_mut().insert(client_id, handle);
    }

    async fn run_client(
        self: Rc<Self>,
        transport: Transport,
        client_id: ClientId,
        peer_label: String,
    ) -> std::io::Result<()> {
        let (read_half, write_half) = split(transport);
        let mut reader = FramedReader::new(read_half);
        let mut writer = FramedWriter::new(write_half);

        let raw_hello = reader.read_hello().await?;
        let client_hello = decode_and_validate_client_hello(&raw_hello)?;

        let (reply, client_ids_of_methods) = match negotiate_server_side(
            &client_hello,
            &self.server_protocol,
            &self.required_client_protocol,
        ) {
            Ok(ok) => ok,
            Err(err) => {
                let reply = smolrpc_core::ServerHello::error(err.0.clone());
                writer.write_frame(&reply.encode_framed()).await?;
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, err.0));
            }
        };
        writer.write_frame(&reply.encode_framed()).await?;
        tracing::info!(client_id, peer = %peer_label, "handshake established");

        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        tokio::task::spawn_local(async move {
            while let Some(bytes) = write_rx.recv().await {
                if writer.write_frame(&bytes).await.is_err() {
                    break;
                }
            }
        });

        let session = Session::new(write_tx, client_ids_of_methods, peer_label.clone());
        let duplex = (self.make_impl)(PeerProxyInvoker::new(Rc::new(session.clone())));

        loop {
            let message = reader.read_message().await?;
            session.handle_incoming(message, &duplex);
        }
    }

    /// Unlink every unix socket this server bound, stop accepting new
    /// connections, and drop every live client record (aborting its task).
    pub fn stop(&self) {
        for path in self.unix_socket_paths.borrow_mut().drain(..) {
            let _ = std::fs::remove_file(&path);
        }
        for task in self.listener_tasks.borrow_mut().drain(..) {
            task.abort();
        }
        for (_, task) in self.client_tasks.borrow_mut().drain() {
            task.abort();
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}
