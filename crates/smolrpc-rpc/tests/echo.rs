mod common;

use std::cell::RefCell;
use std::rc::Rc;

use smolrpc_core::Wire;
use smolrpc_reflect::{DuplexImplBuilder, MethodDescriptor, ProtocolDescriptor};
use smolrpc_rpc::{Client, Server};

fn echo_protocol() -> ProtocolDescriptor {
    ProtocolDescriptor::new(
        "echo_protocol",
        vec![MethodDescriptor::new(
            "echo_v1",
            smolrpc_core::function_signature(&String::type_name(), &[String::type_name()]),
        )],
    )
}

#[tokio::test(flavor = "current_thread")]
async fn b_calls_a_echo_v1_and_observes_the_bracketed_reply() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let path = common::temp_socket_path("echo");

            let server = Server::new(
                echo_protocol(),
                ProtocolDescriptor::none(),
                Rc::new(|peer| {
                    let state = Rc::new(RefCell::new(()));
                    DuplexImplBuilder::new("echo_protocol", state)
                        .method::<String, String, _>(
                            "echo_v1",
                            &[String::type_name()],
                            |_, s| format!("[{s}]"),
                        )
                        .build(peer)
                }),
            );
            server.bind(&path).await.unwrap();

            let client = Client::new(
                path,
                echo_protocol(),
                ProtocolDescriptor::none(),
                Rc::new(|peer| {
                    let state = Rc::new(RefCell::new(()));
                    DuplexImplBuilder::new("none", state).build(peer)
                }),
            );
            let run = Rc::clone(&client);
            tokio::task::spawn_local(async move { run.run().await });

            // The peer proxy queues calls made before the handshake lands,
            // so this can be issued immediately after spawning `run()`.
            let reply = tokio::time::timeout(
                std::time::Duration::from_secs(5),
                wait_for_reply(
                    client
                        .duplex()
                        .peer
                        .clone()
                        .invoke::<String, String>("echo_v1", "hi".to_string()),
                ),
            )
            .await
            .expect("timed out waiting for echo_v1")
            .expect("echo_v1 should succeed");
            assert_eq!(reply, "[hi]");

            client.stop();
            server.stop();
        })
        .await;
}

async fn wait_for_reply<T: 'static>(promise: smolrpc_core::Promise<T>) -> Result<T, String> {
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
