mod blobstore;

use std::cell::RefCell;
use std::rc::Rc;

use blobstore::Registry;
use clap::Parser;
use registry_protocol::{RetrieveArgs, RetrieveReturn, StoreArgs, StoreReturn};
use smolrpc_core::Wire;
use smolrpc_reflect::{DuplexImplBuilder, ProtocolDescriptor};
use smolrpc_rpc::Server;
use smolrpc_support::{Config, EXIT_CONFIG_ERROR, EXIT_OK};

#[derive(Parser, Debug)]
#[command(name = "smolrpc-registry")]
#[command(about = "Content-addressed blob store exposed over registry_protocol")]
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
    let data_dir = match config.require_data_dir() {
        Ok(dir) => dir.to_path_buf(),
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

    let exit_code = local.block_on(&rt, run(listen, data_dir));
    std::process::exit(exit_code);
}

async fn run(listen: Vec<String>, data_dir: std::path::PathBuf) -> i32 {
    let registry = Registry::new(data_dir);

    let make_impl = Rc::new(move |peer| {
        let state = Rc::new(RefCell::new(registry.clone()));
        DuplexImplBuilder::new(registry_protocol::PROTOCOL_NAME, state)
            .method::<StoreArgs, StoreReturn, _>(
                registry_protocol::STORE,
                &[String::type_name(), u64::type_name(), Vec::<smolrpc_core::Byte>::type_name()],
                |state, (data_class, id, data)| state.borrow().store(&data_class, id, data),
            )
            .method::<RetrieveArgs, RetrieveReturn, _>(
                registry_protocol::RETRIEVE,
                &[String::type_name(), u64::type_name()],
                |state, (data_class, id)| state.borrow().retrieve(&data_class, id),
            )
            .build(peer)
    });

    let server = Server::new(registry_protocol::protocol(), ProtocolDescriptor::none(), make_impl);
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
