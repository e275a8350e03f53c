use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use tokio::sync::watch;

use zion_audit_oracle::chain::rpc::AlloyChainAdapter;
use zion_audit_oracle::chain::ChainAdapter;
use zion_audit_oracle::config::Config;
use zion_audit_oracle::listener::Listener;
use zion_audit_oracle::store::StateStore;
use zion_audit_oracle::api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    zion_audit_common::logging::init(&config.log_config())?;

    info!("connecting to state store");
    let store = StateStore::connect(&config.database_url, config.db_max_connections).await?;

    info!("connecting to chain rpc at {}", config.rpc_url);
    let chain: Arc<dyn ChainAdapter> = Arc::new(AlloyChainAdapter::connect_http(
        &config.rpc_url,
        config.node_manager_contract,
    )?);

    let (api_handle, api_join) = api::spawn(store.clone(), &config.bind_address, config.http_workers)?;
    info!("query api listening on {}", config.bind_address);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener = Listener::new(
        chain,
        store,
        Duration::from_millis(config.poll_interval_ms),
        Duration::from_millis(config.retry_interval_ms),
        config.strict_duplicate_create_validator,
    );

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    });

    let listener_result = listener.run(shutdown_rx).await;

    api_handle.stop(true).await;
    let _ = api_join.await;

    if let Err(e) = listener_result {
        error!("listener exited with a fatal error: {e}");
        return Err(e.into());
    }

    Ok(())
}
