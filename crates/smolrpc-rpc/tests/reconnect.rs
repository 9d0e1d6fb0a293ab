mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use smolrpc_core::{Promise, Wire};
use smolrpc_reflect::{DuplexImplBuilder, MethodDescriptor, ProtocolDescriptor};
use smolrpc_rpc::{Client, Server};

fn ping_protocol() -> ProtocolDescriptor {
    ProtocolDescriptor::new(
        "ping_protocol",
        vec![MethodDescriptor::new(
            "ping",
            smolrpc_core::function_signature(&String::type_name(), &[]),
        )],
    )
}

/// The pinned backoff cadence (0, 1, 1, 1, 2, 4, 8, 16, 32, 64, 64, ...) is
/// covered exactly by `backoff::tests::matches_the_pinned_sequence`. This
/// test instead exercises the end-to-end behavior the cadence exists for:
/// a client started against an address with no listener keeps retrying
/// within the first backoff window (up to 1 s) rather than giving up, and
/// a call issued while disconnected is queued and flushed once the server
/// comes up.
#[tokio::test(flavor = "current_thread")]
async fn client_reconnects_once_the_server_appears_and_flushes_the_queued_call() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let path = common::temp_socket_path("reconnect");
            assert!(!std::path::Path::new(&path).exists());

            let client = Client::new(
                path.clone(),
                ping_protocol(),
                ProtocolDescriptor::none(),
                Rc::new(|peer| {
                    let state = Rc::new(RefCell::new(()));
                    DuplexImplBuilder::new("none", state).build(peer)
                }),
            );
            let run = Rc::clone(&client);
            tokio::task::spawn_local(async move { run.run().await });

            // Issued while nothing is listening: must queue, not reject.
            let call = client
                .duplex()
                .peer
                .clone()
                .invoke::<(), String>("ping", ());

            // Bring the server up inside the first 1 s backoff window.
            tokio::time::sleep(Duration::from_millis(150)).await;
            let server = Server::new(
                ping_protocol(),
                ProtocolDescriptor::none(),
                Rc::new(|peer| {
                    let state = Rc::new(RefCell::new(()));
                    DuplexImplBuilder::new("ping_protocol", state)
                        .method::<(), String, _>("ping", &[], |_, ()| "pong".to_string())
                        .build(peer)
                }),
            );
            server.bind(&path).await.unwrap();

            let reply = tokio::time::timeout(Duration::from_secs(3), wait_for_reply(call))
                .await
                .expect("timed out waiting for reconnect")
                .expect("queued call should succeed once reconnected");
            assert_eq!(reply, "pong");

            client.stop();
            server.stop();
        })
        .await;
}

async fn wait_for_reply<T: 'static>(promise: Promise<T>) -> Result<T, String> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = Rc::new(RefCell::new(Some(tx)));
    let tx2 = Rc::clone(&tx);
    promise.on_settle(
        move |v| {
            if let Some(tx) = tx.borrow_mut().take() {
                let _ = tx.send(Ok(v));
            }
        },
        move |e| {
            if let Some(tx) = tx2.borrow_mut().take() {
                let _ = tx.send(Err(e));
            }
        },
    );
    rx.await.unwrap_or_else(|_| Err("promise dropped".into()))
}
