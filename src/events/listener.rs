use std::{sync::Arc, time::Duration};

use tokio::{
    sync::broadcast::{Receiver, error::RecvError},
    task::JoinHandle,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{EventBus, PolicyEvent};
use crate::{authz::PolicyEnforcer, observability::metrics};

/// Reloads the enforcer when policy events arrive.
///
/// Events within one debounce window collapse into a single reload. The
/// window starts at the first event and is not extended by later ones, so a
/// steady stream of events still triggers a reload at least once per window.
/// A lagged receiver has lost events it cannot name, so lag counts as an
/// event too.
pub struct PolicyInvalidationListener {
    rx: Receiver<PolicyEvent>,
    enforcer: Arc<PolicyEnforcer>,
    debounce: Duration,
    cancel: CancellationToken,
}

enum Wake {
    Event,
    Closed,
    Cancelled,
}

impl PolicyInvalidationListener {
    /// Subscribe to `bus` and run the listener on `tracker`.
    ///
    /// The subscription is taken before this returns, so events published
    /// afterwards are never missed.
    pub fn spawn(
        bus: &EventBus,
        enforcer: Arc<PolicyEnforcer>,
        debounce: Duration,
        cancel: CancellationToken,
        tracker: &TaskTracker,
    ) -> JoinHandle<()> {
        let listener = Self {
            rx: bus.subscribe(),
            enforcer,
            debounce,
            cancel,
        };
        tracker.spawn(listener.run())
    }

    async fn run(mut self) {
        tracing::info!(
            debounce_ms = self.debounce.as_millis() as u64,
            "Policy invalidation listener started"
        );

        loop {
            match self.next().await {
                Wake::Event => {}
                Wake::Closed | Wake::Cancelled => break,
            }

            // Coalesce whatever else arrives during the window
            let window = tokio::time::sleep(self.debounce);
            tokio::pin!(window);
            let mut coalesced = 0u64;
            let mut stop = false;
            loop {
                tokio::select! {
                    _ = &mut window => break,
                    wake = self.next() => match wake {
                        Wake::Event => coalesced += 1,
                        // Still reload for the event already in hand
                        Wake::Closed => { stop = true; break; }
                        Wake::Cancelled => return,
                    }
                }
            }

            if coalesced > 0 {
                tracing::debug!(coalesced, "Coalesced policy events into one reload");
            }

            // Errors are already logged by the enforcer; the previous policy
            // keeps serving.
            let _ = self.enforcer.reload().await;

            if stop {
                break;
            }
        }

        tracing::info!("Policy invalidation listener stopped");
    }

    async fn next(&mut self) -> Wake {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Wake::Cancelled,
            result = self.rx.recv() => match result {
                Ok(event) => {
                    tracing::debug!(
                        topic = %event.topic,
                        entity = ?event.entity,
                        id = event.id,
                        "Received policy event"
                    );
                    Wake::Event
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Policy listener lagged, forcing reload");
                    metrics::record_event_lag("policy_listener", skipped);
                    Wake::Event
                }
                Err(RecvError::Closed) => Wake::Closed,
            },
        }
    }
}
