//! Delayed fallback refresh of the processed-file listing.
//!
//! Push notifications can be missed (channel down, event lost while
//! reconnecting), so once the listing settles into a clean state the
//! coordinator schedules one extra refresh. The refresh is armed on the
//! rising edge of the `armed` signal, fires at most once per edge, and is
//! abandoned if the signal drops before the delay elapses.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn the safety-net task.
///
/// `fire` is called once per rising edge of `armed` that survives
/// `delay`. The task exits when `cancel` fires or the sender side of
/// `armed` is dropped.
pub fn start_safety_net<F>(
    delay: Duration,
    armed: watch::Receiver<bool>,
    cancel: CancellationToken,
    fire: F,
) -> JoinHandle<()>
where
    F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    tokio::spawn(async move {
        run(delay, armed, &cancel, fire).await;
        tracing::debug!("Safety-net task exited");
    })
}

async fn run<F>(
    delay: Duration,
    mut armed: watch::Receiver<bool>,
    cancel: &CancellationToken,
    fire: F,
) where
    F: Fn() -> BoxFuture<'static, ()>,
{
    loop {
        if !wait_until(&mut armed, true, cancel).await {
            return;
        }

        let elapsed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            still_armed = wait_until(&mut armed, false, cancel) => {
                if !still_armed {
                    return;
                }
                false
            }
            _ = tokio::time::sleep(delay) => true,
        };

        if !elapsed {
            tracing::debug!("Safety-net refresh cancelled before it fired");
            continue;
        }

        tracing::debug!(delay_ms = delay.as_millis() as u64, "Safety-net refresh firing");
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = fire() => {}
        }

        // Fire once per edge: wait for the condition to drop first.
        if !wait_until(&mut armed, false, cancel).await {
            return;
        }
    }
}

/// Wait until `armed` equals `wanted`. Returns `false` when cancelled or
/// when the sender is gone.
async fn wait_until(
    armed: &mut watch::Receiver<bool>,
    wanted: bool,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        reached = async { armed.wait_for(|a| *a == wanted).await.is_ok() } => reached,
    }
}
