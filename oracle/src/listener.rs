//! Drives the indexing loop: poll the chain's tip, replay every block
//! between the cursor and the tip, advance the cursor past each one as it
//! durably commits.
//!
//! The retry-with-backoff shape here follows the same pattern the wallet's
//! network handler uses to keep a daemon connection alive: on a transient
//! failure, sleep and try the same unit of work again rather than moving
//! on or tearing the whole loop down.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use zion_audit_common::error::{Classify, Severity};

use crate::applier::{self, ApplierError};
use crate::chain::ChainAdapter;
use crate::cursor;
use crate::store::StateStore;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("fatal error applying block {height}: {source}")]
    Fatal { height: u64, source: ApplierError },
}

pub struct Listener {
    chain: Arc<dyn ChainAdapter>,
    store: StateStore,
    poll_interval: Duration,
    retry_interval: Duration,
    strict_duplicate_create_validator: bool,
}

impl Listener {
    pub fn new(
        chain: Arc<dyn ChainAdapter>,
        store: StateStore,
        poll_interval: Duration,
        retry_interval: Duration,
        strict_duplicate_create_validator: bool,
    ) -> Self {
        Self {
            chain,
            store,
            poll_interval,
            retry_interval,
            strict_duplicate_create_validator,
        }
    }

    /// Runs until `shutdown` reports `true`, or a fatal error is hit.
    ///
    /// A transient error applying a block sleeps for `retry_interval` and
    /// retries the same height; the cursor only ever advances past a
    /// height once that height's whole transaction has committed, so this
    /// loop can be interrupted and restarted at any point without ever
    /// reprocessing a block it already finished or skipping one it hadn't.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), ListenerError> {
        let mut next_height = cursor::load(&self.store)
            .await
            .map_err(|e| ListenerError::Fatal {
                height: 0,
                source: ApplierError::from(e),
            })?;
        info!("listener resuming from height {next_height}");

        let mut ticker = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("listener shutting down at height {next_height}");
                        return Ok(());
                    }
                }
                _ = ticker.tick() => {
                    let tip = match self.chain.tip().await {
                        Ok(tip) => tip,
                        Err(e) => {
                            warn!("fetching chain tip failed: {e}");
                            continue;
                        }
                    };

                    while next_height <= tip {
                        match applier::apply_block(
                            self.chain.as_ref(),
                            &self.store,
                            next_height,
                            self.strict_duplicate_create_validator,
                        )
                        .await
                        {
                            Ok(end_block_seen) => {
                                debug!("applied block {next_height} (end_block={end_block_seen})");
                                next_height += 1;
                            }
                            Err(e) if e.severity() == Severity::Transient => {
                                warn!(
                                    "transient error applying block {next_height}: {e}, retrying in {:?}",
                                    self.retry_interval
                                );
                                tokio::time::sleep(self.retry_interval).await;
                                break;
                            }
                            Err(source) => {
                                return Err(ListenerError::Fatal {
                                    height: next_height,
                                    source,
                                });
                            }
                        }
                    }
                }
            }
        }
    }
}
