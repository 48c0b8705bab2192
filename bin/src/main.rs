use anyhow::{Context as _, Result, anyhow};
use remote_subnet::{Context, LeaseAttrs, LeaseWatcher, RemoteManager};
use tokio::{runtime::Builder, signal};
use tokio_util::sync::CancellationToken;
use tracing::*;

mod cli;
mod hold;
mod trace;

use cli::{Command, Parser};

fn main() -> Result<()> {
    // load .env first so it can fill in flags not given on the cli
    let dotenv = dotenv::dotenv();
    // parses from cli or environment var
    let config = cli::Config::parse();
    let trace_config = trace::Config::parse(&config.subnetctl_log, config.log_format)?;
    debug!(?config, ?trace_config);
    if let Err(err) = dotenv {
        debug!(?err, ".env file not loaded");
    }

    let rt = Builder::new_multi_thread()
        .thread_name("subnetctl-worker")
        .enable_all()
        .build()?;

    rt.block_on(run(config))
}

async fn run(config: cli::Config) -> Result<()> {
    let mgr = RemoteManager::new(&config.server)
        .with_context(|| format!("invalid coordinator address {:?}", config.server))?;
    debug!(endpoint = %mgr.endpoint(), network = %config.network, "using coordinator");

    let root = Context::new();
    tokio::spawn(shutdown_signal(root.token().clone()));

    match config.command.clone() {
        Command::Config => {
            let ctx = root.child().with_timeout(config.timeout());
            let network = mgr
                .get_network_config(&ctx, &config.network)
                .await
                .context("failed to fetch network config")?;
            println!("{}", serde_json::to_string_pretty(&network)?);
        }
        Command::Acquire {
            public_ip,
            backend_type,
            hold: keep,
            renew_margin,
        } => {
            let mut attrs = LeaseAttrs::new(public_ip);
            attrs.backend_type = backend_type;

            let ctx = root.child().with_timeout(config.timeout());
            let mut lease = mgr
                .acquire_lease(&ctx, &config.network, &attrs)
                .await
                .context("failed to acquire lease")?;
            info!(subnet = %lease.subnet, expiration = %lease.expiration, "acquired lease");
            println!("{}", serde_json::to_string_pretty(&lease)?);

            if keep {
                hold::hold(
                    &mgr,
                    &root,
                    &config.network,
                    &mut lease,
                    std::time::Duration::from_secs(renew_margin),
                    config.timeout(),
                )
                .await?;
            }
        }
        Command::Watch { own_subnet } => {
            let mut watcher = LeaseWatcher::new(mgr, config.network.clone());
            if let Some(own) = own_subnet {
                watcher = watcher.with_own_subnet(own);
            }
            loop {
                match watcher.next_batch(&root).await {
                    Ok(batch) => {
                        for event in batch {
                            println!("{}", serde_json::to_string(&event)?);
                        }
                    }
                    Err(err) if err.is_cancellation() => {
                        info!(cursor = %watcher.cursor(), "lease watch stopped");
                        break;
                    }
                    Err(err) => return Err(anyhow!(err).context("lease watch failed")),
                }
            }
        }
    }
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) -> Result<()> {
    let ret = signal::ctrl_c().await.map_err(|err| anyhow!(err));
    debug!("caught ctrl-c, shutting down");
    token.cancel();
    ret
}
