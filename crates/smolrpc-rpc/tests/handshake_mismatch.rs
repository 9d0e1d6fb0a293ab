mod common;

use std::cell::RefCell;
use std::rc::Rc;

use smolrpc_reflect::{DuplexImplBuilder, ProtocolDescriptor};
use smolrpc_rpc::{Client, Server};

/// Client requests `echo_protocol`; server only implements `registry_protocol`.
/// The server should send an error hello naming its actual protocol and
/// close, and the client should observe a failed connection attempt rather
/// than a crash or a silently-accepted mismatch.
#[tokio::test(flavor = "current_thread")]
async fn protocol_name_mismatch_is_rejected_and_does_not_crash_either_side() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let path = common::temp_socket_path("handshake-mismatch");

            let server = Server::new(
                ProtocolDescriptor::new("registry_protocol", vec![]),
                ProtocolDescriptor::none(),
                Rc::new(|peer| {
                    let state = Rc::new(RefCell::new(()));
                    DuplexImplBuilder::new("registry_protocol", state).build(peer)
                }),
            );
            server.bind(&path).await.unwrap();

            let client = Client::new(
                path,
                ProtocolDescriptor::new("echo_protocol", vec![]),
                ProtocolDescriptor::none(),
                Rc::new(|peer| {
                    let state = Rc::new(RefCell::new(()));
                    DuplexImplBuilder::new("none", state).build(peer)
                }),
            );

            // A single connection attempt: run() loops forever, so drive
            // one iteration via connect_once's effect by racing a timeout.
            let run = Rc::clone(&client);
            let handle = tokio::task::spawn_local(async move { run.run().await });

            // Give the failed handshake time to land, then confirm the
            // process is still alive and the client is still retrying
            // (not panicked, not stuck claiming success).
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            assert!(!handle.is_finished(), "client's retry loop must not exit on a handshake error");

            client.stop();
            handle.await.ok();
            server.stop();
        })
        .await;
}
