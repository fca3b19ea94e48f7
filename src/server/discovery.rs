use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::common::config::JobConfig;
use crate::common::error::SlurmError;
use crate::common::target::{JobTargets, TargetGroup, build_targets};
use crate::traits::node_source::NodeSource;

/// Latest complete set of targets.
///
/// Readers take a cheap `Arc` clone of the current snapshot and release the lock before
/// doing anything with it. Writers swap in a fully built snapshot, so a reader sees either
/// the old or the new document and never a mix of both.
#[derive(Debug, Default)]
pub struct TargetCache {
    current: RwLock<Arc<JobTargets>>,
    generation: AtomicU64,
}

impl TargetCache {
    pub fn snapshot(&self) -> Arc<JobTargets> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Number of successful replacements since startup.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn get_targets(&self, job: &str) -> Option<Vec<TargetGroup>> {
        self.snapshot().get(job).cloned()
    }

    /// All groups, job after job in configuration order.
    pub fn get_all_targets(&self) -> Vec<TargetGroup> {
        self.snapshot().values().flatten().cloned().collect()
    }

    pub(crate) fn replace(&self, targets: JobTargets) {
        let next = Arc::new(targets);
        let previous = {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            self.generation.fetch_add(1, Ordering::AcqRel);
            std::mem::replace(&mut *guard, next)
        };
        // the old snapshot may be the last reference; free it outside the lock
        drop(previous);
    }
}

/// Polls a [`NodeSource`] and keeps the resulting targets in a [`TargetCache`].
pub struct DiscoveryService<S> {
    source: S,
    jobs: Vec<JobConfig>,
    interval: Duration,
    cache: Arc<TargetCache>,
}

impl<S> DiscoveryService<S>
where
    S: NodeSource + Sync,
{
    pub fn new(source: S, jobs: Vec<JobConfig>, interval: Duration) -> Self {
        DiscoveryService {
            source,
            jobs,
            interval,
            cache: Arc::new(TargetCache::default()),
        }
    }

    /// Read-only handle to the targets, shared with the HTTP layer.
    pub fn cache(&self) -> Arc<TargetCache> {
        Arc::clone(&self.cache)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn get_targets(&self, job: &str) -> Option<Vec<TargetGroup>> {
        self.cache.get_targets(job)
    }

    pub fn get_all_targets(&self) -> Vec<TargetGroup> {
        self.cache.get_all_targets()
    }

    /// Fetches the inventory and replaces the cache. On error the cache is left as it was.
    pub async fn update_targets(&self) -> Result<(), SlurmError> {
        let node_info = self.source.get_nodes(Some(self.interval)).await?;
        let targets = build_targets(&node_info.nodes, &self.jobs);
        let groups: usize = targets.values().map(Vec::len).sum();

        self.cache.replace(targets);
        log::info!(
            "Updated targets cache: {} jobs, {} nodes, {} target groups",
            self.jobs.len(),
            node_info.nodes.len(),
            groups
        );
        Ok(())
    }

    pub async fn refresh(&self) {
        if let Err(e) = self.update_targets().await {
            log::error!("Failed to update targets: {}", e);
        }
    }

    /// Refreshes once right away, then on every tick until `shutdown` fires. A refresh still
    /// in flight at that point is dropped.
    pub async fn run(&self, shutdown: CancellationToken) {
        log::info!("Starting target discovery, update interval {:?}", self.interval);

        tokio::select! {
            _ = shutdown.cancelled() => {
                log::info!("Target discovery stopped");
                return;
            }
            _ = self.refresh() => {}
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = self.refresh() => {}
                    }
                }
            }
        }

        log::info!("Target discovery stopped");
    }
}
