//! Per-IP rate limiting via `tower_governor`.
//!
//! Clients are keyed with [`SmartIpKeyExtractor`]: `X-Forwarded-For`,
//! `X-Real-Ip` and `Forwarded` are read first and the peer address is the
//! fallback.  Behind the reverse proxy the peer is always the proxy itself.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::GovernorLayer;

use emdr_domain::config::RateLimitConfig;

const RETAIN_INTERVAL: Duration = Duration::from_secs(60);

/// Time between two replenished requests, in nanoseconds.
fn replenish_interval_nanos(requests_per_second: u64) -> anyhow::Result<u64> {
    1_000_000_000u64
        .checked_div(requests_per_second)
        .filter(|nanos| *nanos > 0)
        .with_context(|| {
            format!("rate_limit: requests_per_second must be in 1..=1000000000, got {requests_per_second}")
        })
}

/// Wrap `router` in the per-IP limiter when `rate_limit` is configured.
///
/// Must be called inside a Tokio runtime: stale per-IP buckets are pruned
/// by a background task.
pub fn with_rate_limit<S>(router: Router<S>, rate_limit: Option<&RateLimitConfig>) -> anyhow::Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    let Some(rl) = rate_limit else {
        tracing::info!("per-IP rate limiting disabled (no [server.rate_limit] in config)");
        return Ok(router);
    };

    let gov_config = GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .per_nanosecond(replenish_interval_nanos(rl.requests_per_second)?)
        .burst_size(rl.burst_size)
        .finish()
        .context("rate_limit: requests_per_second and burst_size must be > 0")?;
    let gov_config = Arc::new(gov_config);

    let limiter = gov_config.limiter().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RETAIN_INTERVAL);
        loop {
            interval.tick().await;
            limiter.retain_recent();
        }
    });

    tracing::info!(
        requests_per_second = rl.requests_per_second,
        burst_size = rl.burst_size,
        "per-IP rate limiting enabled"
    );

    Ok(router.layer(GovernorLayer { config: gov_config }))
}
