mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use tracing::{debug, error, info, warn};

use slotlease_core::LeaseAllocator;
use slotlease_observe::init_logger;
use slotlease_prometheus::PrometheusMetrics;
use slotlease_redis::RedisBackend;

use crate::config::AgentConfig;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // 1) config
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg = AgentConfig::load(path.as_deref(), |key| std::env::var(key).ok())?;

    // 2) logger
    init_logger(&cfg.logger)?;
    info!(pool = %cfg.lease.pool_key, "logger initialized");

    // 3) redis
    let backend = RedisBackend::connect(&cfg.redis_url, cfg.lock.clone())
        .await
        .context("connecting to redis")?;

    // 4) allocator
    let metrics = PrometheusMetrics::new()?;
    let mut allocator = LeaseAllocator::new(
        cfg.lease.clone(),
        Arc::new(backend.store()),
        Arc::new(backend.locks()),
    )
    .with_metrics(Arc::new(metrics.clone()));

    let slot = allocator.run().await.context("acquiring slot id")?;
    println!("{slot}");

    // 5) hold the lease until ctrl-c or until the heartbeat gives up
    if let Some(heartbeat) = allocator.heartbeat() {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("waiting for ctrl-c")?;
                info!(slot = %slot, "shutdown requested");
            }
            _ = heartbeat.stopped() => {
                warn!(slot = %slot, "heartbeat stopped; lease is lapsing");
            }
        }
    }

    let stopped = allocator.shutdown().await;
    match metrics.encode_text() {
        Ok(text) => debug!("final metrics:\n{text}"),
        Err(e) => warn!(error = %e, "failed to encode metrics"),
    }
    if let Err(e) = &stopped {
        error!(slot = %slot, error = %e, "lease lost");
    }
    stopped.context("heartbeat failed")?;

    info!(slot = %slot, "stopped");
    Ok(())
}
