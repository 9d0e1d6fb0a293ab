use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use broker_protocol::{RequestJobArgs, RequestJobReturn};
use clap::Parser;
use invoker_protocol::{AssignJobArgs, AssignJobReturn, CancelJobArgs, CancelJobReturn};
use smolrpc_core::{Pair, Wire};
use smolrpc_reflect::{DuplexImplBuilder, PeerProxyInvoker};
use smolrpc_rpc::Client;
use smolrpc_support::{Config, EXIT_CONFIG_ERROR, EXIT_OK};

#[derive(Parser, Debug)]
#[command(name = "smolrpc-invoker")]
#[command(about = "Connects to a broker, serves invoker_protocol, and polls for work over broker_protocol")]
struct Args {
    /// Path to the service's JSON config file
    config: std::path::PathBuf,
}

fn main() {
    smolrpc_support::init_tracing();

    let args = Args::parse();

    let config_path = match std::fs::canonicalize(&args.config) {
        Ok(path) => path,
        Err(_) => {
            eprintln!("Could not open configuration file at {}", args.config.display());
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };
    let config_dir = config_path.parent().expect("canonical path has a parent");
    if std::env::set_current_dir(config_dir).is_err() {
        eprintln!("Could not open configuration file at {}", args.config.display());
        std::process::exit(EXIT_CONFIG_ERROR);
    }
    tracing::info!(dir = %config_dir.display(), "working directory");

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };
    let broker_address = match config.require_broker() {
        Ok(addr) => addr.to_string(),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to create runtime");
    let local = tokio::task::LocalSet::new();

    let exit_code = local.block_on(&rt, run(broker_address));
    std::process::exit(exit_code);
}

/// Awaits a `Promise` by bridging it onto a local oneshot channel. The
/// framework's `Promise` is callback-based (see `smolrpc-core`), so async
/// call sites that want to `.await` a reply go through this.
async fn await_promise<T: 'static>(promise: smolrpc_core::Promise<T>) -> Result<T, String> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = Rc::new(RefCell::new(Some(tx)));
    let tx_err = Rc::clone(&tx);
    promise.on_settle(
        move |value| {
            if let Some(tx) = tx.borrow_mut().take() {
                let _ = tx.send(Ok(value));
            }
        },
        move |message| {
            if let Some(tx) = tx_err.borrow_mut().take() {
                let _ = tx.send(Err(message));
            }
        },
    );
    rx.await.unwrap_or_else(|_| Err("promise dropped".to_string()))
}

async fn run(broker_address: String) -> i32 {
    let make_impl = Rc::new(|peer: PeerProxyInvoker| {
        let state = Rc::new(RefCell::new(()));
        DuplexImplBuilder::new(invoker_protocol::PROTOCOL_NAME, state)
            .method::<AssignJobArgs, AssignJobReturn, _>(
                invoker_protocol::ASSIGN_JOB,
                &[u64::type_name(), Vec::<smolrpc_core::Byte>::type_name()],
                |_, (job_id, _payload)| {
                    tracing::info!(job_id, "assigned a job (execution is out of scope)");
                },
            )
            .method::<CancelJobArgs, CancelJobReturn, _>(
                invoker_protocol::CANCEL_JOB,
                &[u64::type_name()],
                |_, job_id| {
                    tracing::info!(job_id, "job cancelled");
                },
            )
            .build(peer)
    });

    let client = Client::new(
        broker_address,
        broker_protocol::protocol(),
        invoker_protocol::protocol(),
        make_impl,
    );

    let run_client = Rc::clone(&client);
    tokio::task::spawn_local(async move {
        run_client.run().await;
    });

    let poll_client = Rc::clone(&client);
    tokio::task::spawn_local(async move {
        loop {
            let peer = poll_client.duplex().peer.clone();
            match await_promise(
                peer.invoke::<RequestJobArgs, RequestJobReturn>(broker_protocol::REQUEST_JOB, ()),
            )
            .await
            {
                Ok(Some(Pair(job_id, _payload))) => {
                    tracing::info!(job_id, "pulled a job from the broker");
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "request_job failed, will retry");
                }
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    });

    smolrpc_support::wait_for_shutdown_signal().await;
    client.stop();
    EXIT_OK
}
