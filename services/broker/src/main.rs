mod queue;

use std::cell::RefCell;
use std::rc::Rc;

use broker_protocol::{RequestJobArgs, RequestJobReturn, SubmitResultArgs, SubmitResultReturn};
use clap::Parser;
use queue::Queue;
use smolrpc_core::{Byte, Pair, Wire};
use smolrpc_reflect::DuplexImplBuilder;
use smolrpc_rpc::Server;
use smolrpc_support::{Config, EXIT_CONFIG_ERROR, EXIT_OK};

#[derive(Parser, Debug)]
#[command(name = "smolrpc-broker")]
#[command(about = "Job queue server that invokers pull work from over broker_protocol")]
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
    let listen = match config.require_listen() {
        Ok(addrs) => addrs.to_vec(),
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

    let exit_code = local.block_on(&rt, run(listen));
    std::process::exit(exit_code);
}

async fn run(listen: Vec<String>) -> i32 {
    let queue = Rc::new(RefCell::new(Queue::new()));
    // Mirrors the single demo submission the original seeds at startup.
    queue.borrow_mut().add_submission(1, vec![Byte(2)]);

    let make_impl = Rc::new(move |peer| {
        DuplexImplBuilder::new(broker_protocol::PROTOCOL_NAME, Rc::clone(&queue))
            .method::<RequestJobArgs, RequestJobReturn, _>(
                broker_protocol::REQUEST_JOB,
                &[],
                |queue, ()| {
                    queue
                        .borrow_mut()
                        .take_next()
                        .map(|job| Pair(job.job_id, job.payload))
                },
            )
            .method::<SubmitResultArgs, SubmitResultReturn, _>(
                broker_protocol::SUBMIT_RESULT,
                &[u64::type_name(), Vec::<Byte>::type_name()],
                |queue, (job_id, output)| {
                    queue.borrow_mut().record_result(job_id, output);
                },
            )
            .build(peer)
    });

    let server = Server::new(
        broker_protocol::protocol(),
        invoker_protocol::protocol(),
        make_impl,
    );
    for address in &listen {
        if let Err(err) = server.bind(address).await {
            eprintln!("Could not bind to {address}: {err}");
            return EXIT_CONFIG_ERROR;
        }
        tracing::info!(%address, "listening");
    }

    smolrpc_support::wait_for_shutdown_signal().await;
    server.stop();
    EXIT_OK
}
