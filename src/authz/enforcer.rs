use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use super::{AuthzError, Decision, PolicyAdapter, PolicySnapshot};
use crate::observability::metrics;

/// Summary of a successful reload.
#[derive(Debug, Clone, Copy)]
pub struct ReloadStats {
    pub generation: u64,
    pub facts: usize,
    pub duration: Duration,
}

/// Serves authorization decisions from the current [`PolicySnapshot`].
///
/// Readers load the snapshot through an [`ArcSwap`] and never take a lock.
/// Reloads build a complete new snapshot and publish it with a single store,
/// so an in-flight `enforce` sees either the old fact set or the new one.
pub struct PolicyEnforcer {
    current: ArcSwap<PolicySnapshot>,
    adapter: Arc<dyn PolicyAdapter>,
    /// Serializes reloads so generations increase monotonically.
    reload_lock: Mutex<()>,
}

impl PolicyEnforcer {
    /// Create an enforcer with an empty policy. Call [`reload`](Self::reload)
    /// before serving traffic.
    pub fn new(adapter: Arc<dyn PolicyAdapter>) -> Self {
        Self {
            current: ArcSwap::from_pointee(PolicySnapshot::empty()),
            adapter,
            reload_lock: Mutex::new(()),
        }
    }

    /// The snapshot currently serving requests.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    /// Generation of the serving snapshot. Zero until the first load succeeds.
    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    pub fn is_ready(&self) -> bool {
        self.generation() > 0
    }

    /// Rebuild the fact set from the adapter and swap it in.
    ///
    /// On failure the previous snapshot keeps serving.
    pub async fn reload(&self) -> Result<ReloadStats, AuthzError> {
        let _guard = self.reload_lock.lock().await;
        let start = Instant::now();

        let facts = match self.adapter.load().await {
            Ok(facts) => facts,
            Err(e) => {
                let current = self.current.load();
                tracing::error!(
                    error = %e,
                    generation = current.generation(),
                    "Policy reload failed, keeping previous policy"
                );
                metrics::record_policy_reload(
                    false,
                    start.elapsed().as_secs_f64(),
                    current.generation(),
                    current.fact_count(),
                );
                return Err(e);
            }
        };

        let generation = self.current.load().generation() + 1;
        let snapshot = PolicySnapshot::build(facts, generation);
        let fact_count = snapshot.fact_count();
        self.current.store(Arc::new(snapshot));

        let duration = start.elapsed();
        tracing::info!(
            generation,
            facts = fact_count,
            duration_ms = duration.as_millis() as u64,
            "Policy reloaded"
        );
        metrics::record_policy_reload(true, duration.as_secs_f64(), generation, fact_count);

        Ok(ReloadStats {
            generation,
            facts: fact_count,
            duration,
        })
    }

    /// Decide whether `subject` may perform `action` on `object` of
    /// `resource` within `tenant`.
    pub fn enforce(
        &self,
        subject: &str,
        tenant: &str,
        resource: &str,
        action: &str,
        object: &str,
    ) -> Result<Decision, AuthzError> {
        for (field, value) in [
            ("subject", subject),
            ("tenant", tenant),
            ("resource", resource),
            ("action", action),
            ("object", object),
        ] {
            if value.is_empty() {
                return Err(AuthzError::InvalidRequest(format!("{field} is empty")));
            }
        }

        let snapshot = self.current.load();
        if snapshot.generation() == 0 {
            return Err(AuthzError::NotReady);
        }

        let decision = snapshot.decide(subject, tenant, resource, action, object);
        tracing::debug!(
            subject,
            tenant,
            resource,
            action,
            object,
            decision = decision.as_str(),
            generation = snapshot.generation(),
            "Authorization decision"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::{
        authz::{GroupFact, PermissionFact, PolicyFacts},
        db::DbError,
        models::Effect,
    };

    fn facts_for(action: &str) -> PolicyFacts {
        PolicyFacts {
            groups: vec![GroupFact {
                subject: "alice".into(),
                role: "reader".into(),
                tenant: "acme".into(),
            }],
            permissions: vec![PermissionFact {
                role: "reader".into(),
                tenant: "acme".into(),
                resource: "orders".into(),
                action: action.into(),
                object: "*".into(),
                effect: Effect::Allow,
            }],
        }
    }

    /// Returns a scripted sequence of results, optionally waiting on a gate
    /// before answering.
    struct ScriptedAdapter {
        calls: AtomicUsize,
        script: Vec<Option<PolicyFacts>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedAdapter {
        fn new(script: Vec<Option<PolicyFacts>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                script,
                gate: None,
            }
        }
    }

    #[async_trait]
    impl PolicyAdapter for ScriptedAdapter {
        async fn load(&self) -> Result<PolicyFacts, AuthzError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call > 0
                && let Some(gate) = &self.gate
            {
                gate.notified().await;
            }
            match self.script.get(call).cloned().flatten() {
                Some(facts) => Ok(facts),
                None => Err(AuthzError::Load(DbError::Internal("store down".into()))),
            }
        }
    }

    #[tokio::test]
    async fn test_not_ready_before_first_load() {
        let enforcer = PolicyEnforcer::new(Arc::new(ScriptedAdapter::new(vec![])));
        assert!(!enforcer.is_ready());
        assert!(matches!(
            enforcer.enforce("alice", "acme", "orders", "GET", "*"),
            Err(AuthzError::NotReady)
        ));
    }

    #[tokio::test]
    async fn test_empty_fields_are_rejected() {
        let enforcer =
            PolicyEnforcer::new(Arc::new(ScriptedAdapter::new(vec![Some(facts_for("GET"))])));
        enforcer.reload().await.unwrap();

        assert!(matches!(
            enforcer.enforce("", "acme", "orders", "GET", "*"),
            Err(AuthzError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_increments_generation() {
        let enforcer = PolicyEnforcer::new(Arc::new(ScriptedAdapter::new(vec![
            Some(facts_for("GET")),
            Some(facts_for("POST")),
        ])));

        let first = enforcer.reload().await.unwrap();
        assert_eq!(first.generation, 1);
        assert_eq!(first.facts, 2);
        assert!(
            enforcer
                .enforce("alice", "acme", "orders", "GET", "*")
                .unwrap()
                .is_allowed()
        );

        let second = enforcer.reload().await.unwrap();
        assert_eq!(second.generation, 2);
        assert!(
            !enforcer
                .enforce("alice", "acme", "orders", "GET", "*")
                .unwrap()
                .is_allowed()
        );
        assert!(
            enforcer
                .enforce("alice", "acme", "orders", "POST", "*")
                .unwrap()
                .is_allowed()
        );
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_policy() {
        let enforcer = PolicyEnforcer::new(Arc::new(ScriptedAdapter::new(vec![
            Some(facts_for("GET")),
            None,
        ])));

        enforcer.reload().await.unwrap();
        assert!(enforcer.reload().await.is_err());

        assert_eq!(enforcer.generation(), 1);
        assert!(
            enforcer
                .enforce("alice", "acme", "orders", "GET", "*")
                .unwrap()
                .is_allowed()
        );
    }

    #[tokio::test]
    async fn test_slow_reload_serves_old_policy_until_swap() {
        let gate = Arc::new(Notify::new());
        let adapter = ScriptedAdapter {
            calls: AtomicUsize::new(0),
            script: vec![Some(facts_for("GET")), Some(facts_for("POST"))],
            gate: Some(Arc::clone(&gate)),
        };
        let enforcer = Arc::new(PolicyEnforcer::new(Arc::new(adapter)));
        enforcer.reload().await.unwrap();

        let pending = tokio::spawn({
            let enforcer = Arc::clone(&enforcer);
            async move { enforcer.reload().await }
        });

        // While the load is blocked every decision comes from generation 1
        for _ in 0..50 {
            tokio::task::yield_now().await;
            let snapshot = enforcer.snapshot();
            assert_eq!(snapshot.generation(), 1);
            assert!(
                snapshot
                    .decide("alice", "acme", "orders", "GET", "*")
                    .is_allowed()
            );
            assert!(
                !snapshot
                    .decide("alice", "acme", "orders", "POST", "*")
                    .is_allowed()
            );
        }

        gate.notify_one();
        let stats = pending.await.unwrap().unwrap();
        assert_eq!(stats.generation, 2);

        // A snapshot is either entirely old or entirely new
        let snapshot = enforcer.snapshot();
        assert!(
            snapshot
                .decide("alice", "acme", "orders", "POST", "*")
                .is_allowed()
        );
        assert!(
            !snapshot
                .decide("alice", "acme", "orders", "GET", "*")
                .is_allowed()
        );
    }
}
