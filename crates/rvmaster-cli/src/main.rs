//! # RVMaster CLI Entry Point
//!
//! Queries the master from the command line.
//!
//! ## Usage
//!
//! ```bash
//! # Is the master up? (never waits; exit status 1 when it is not)
//! rvmaster check
//!
//! # Published topics, waiting at most 10 seconds for the master
//! rvmaster --timeout 10 topics
//!
//! # Live nodes on an explicit master
//! rvmaster --master http://10.0.0.2:11311 nodes
//!
//! # Any master method; the caller id is passed first automatically
//! rvmaster call lookupNode -a /talker
//! ```
//!
//! Without `--master` the master URI comes from `REAL_MASTER_URI`. Without
//! `--timeout` listings wait until the master answers or Ctrl-C is pressed.

use anyhow::Result;
use argh::FromArgs;
use rvmaster_cli::output::{format_nodes, format_topics, overrides, parse_call_args};
use rvmaster_client::{spawn_call, MasterClient, MasterConfig, ShutdownSignal};
use serde_json::json;
use std::sync::Arc;

/// Main CLI structure parsed from command-line arguments.
#[derive(FromArgs)]
/// RVMaster - query the master registry
struct Cli {
    /// master URI, e.g. http://localhost:11311
    ///
    /// Takes precedence over the REAL_MASTER_URI environment variable.
    #[argh(option, short = 'm')]
    master: Option<String>,

    /// seconds to wait for an unavailable master before giving up
    ///
    /// Zero (the default) waits until the master answers or the process is
    /// interrupted. Ignored by `check`, which never waits.
    #[argh(option, short = 't')]
    timeout: Option<f64>,

    /// caller id sent with every request
    #[argh(option, short = 'n')]
    name: Option<String>,

    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Check(CheckArgs),
    Topics(TopicsArgs),
    Nodes(NodesArgs),
    Call(CallArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "check")]
/// check whether the master answers right now
struct CheckArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "topics")]
/// list published topics and their types
struct TopicsArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "nodes")]
/// list the names of live nodes
struct NodesArgs {}

/// Arguments for calling an arbitrary master method.
///
/// The payload of a successful call is printed as raw JSON so it can be
/// piped into other tools (e.g., `jq`).
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call a master method and print its payload as JSON
struct CallArgs {
    /// name of the master method
    #[argh(positional)]
    method: String,

    /// argument to pass after the caller id, as JSON
    ///
    /// Repeat for several arguments. Bare words are sent as strings.
    #[argh(option, short = 'a', long = "arg")]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Default to INFO, RUST_LOG overrides. Logs go to stderr so stdout stays
    // clean for piping.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let client = Arc::new(build_client(&cli)?);
    watch_ctrl_c(client.shutdown_signal().clone());

    run(client, cli.command).await
}

fn build_client(cli: &Cli) -> Result<MasterClient> {
    let overrides = overrides(cli.master.as_deref(), cli.name.as_deref());
    let mut config = MasterConfig::from_overrides(&overrides)?;

    if let Some(seconds) = cli.timeout {
        config = config.with_retry_timeout_secs(seconds)?;
    }

    tracing::debug!(
        uri = config.endpoint().uri(),
        caller_id = config.caller_id(),
        "Resolved master"
    );

    Ok(MasterClient::new(config))
}

/// Raises the shutdown signal on Ctrl-C so a waiting call gives up.
fn watch_ctrl_c(signal: ShutdownSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            signal.request_shutdown();
        }
    });
}

async fn run(client: Arc<MasterClient>, command: Commands) -> Result<()> {
    match command {
        Commands::Check(_) => {
            let endpoint = client.endpoint().to_string();
            if spawn_call(client, |c| Ok(c.check())).await? {
                println!("master at {} is up", endpoint);
                Ok(())
            } else {
                Err(anyhow::anyhow!("master at {} is not reachable", endpoint))
            }
        }
        Commands::Topics(_) => {
            let topics = spawn_call(client, |c| c.get_topics()).await?;
            print!("{}", format_topics(&topics));
            Ok(())
        }
        Commands::Nodes(_) => {
            let nodes = spawn_call(client, |c| c.get_nodes()).await?;
            print!("{}", format_nodes(&nodes));
            Ok(())
        }
        Commands::Call(args) => {
            let mut params = vec![json!(client.caller_id())];
            params.extend(parse_call_args(&args.args)?);

            let outcome =
                spawn_call(client, move |c| c.execute(&args.method, params, true)).await?;
            println!("{}", serde_json::to_string(&outcome.payload)?);
            Ok(())
        }
    }
}
