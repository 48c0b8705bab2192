//! Keeps an acquired lease alive until shutdown.
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use remote_subnet::{Context, Lease, SubnetManager};
use tracing::{debug, info};

/// How long to wait before renewing `lease`.
///
/// Renews one `margin` before expiry, but never sooner than halfway through
/// the remaining time, so short leases are not renewed in a tight loop.
pub fn renew_delay(lease: &Lease, now: DateTime<Utc>, margin: Duration) -> Duration {
    let remaining = lease.remaining_at(now);
    remaining.saturating_sub(margin).max(remaining / 2)
}

/// Renew `lease` in place until `root` is cancelled. The first failed renewal
/// ends the loop with an error.
pub async fn hold<M: SubnetManager>(
    mgr: &M,
    root: &Context,
    network: &str,
    lease: &mut Lease,
    margin: Duration,
    timeout: Duration,
) -> Result<()> {
    loop {
        let wait = renew_delay(lease, Utc::now(), margin);
        debug!(subnet = %lease.subnet, ?wait, "waiting to renew lease");
        tokio::select! {
            biased;
            _ = root.done() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        let ctx = root.child().with_timeout(timeout);
        match mgr.renew_lease(&ctx, network, lease).await {
            Ok(()) => {
                info!(subnet = %lease.subnet, expiration = %lease.expiration, "renewed lease");
            }
            // interrupted by shutdown, not a renewal failure
            Err(_) if root.err().is_some() => break,
            Err(err) => {
                return Err(anyhow!(err).context(format!("failed to renew lease {}", lease.key())));
            }
        }
    }
    info!(subnet = %lease.subnet, "stopped renewing lease");
    Ok(())
}
