//! Polling cadence and the single in-flight fetch.

use std::{
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::Local;
use log::{debug, error, info, warn};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::ErrorKind,
    model::{AppConfig, FetchTarget},
    provider::WeatherClient,
    snapshot::{RequestId, SnapshotStore},
    status::SyncStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    Failed(ErrorKind),
    /// A newer request was issued while this one ran; its result was dropped.
    Stale,
    /// Another fetch was already in flight.
    Skipped,
    NotConfigured,
    /// Scheduled polling is paused after an auth failure.
    Suspended,
}

struct Inner {
    client: Arc<dyn WeatherClient>,
    store: Arc<SnapshotStore>,
    target: RwLock<Option<FetchTarget>>,
    in_flight: AtomicBool,
    suspended: AtomicBool,
    status: watch::Sender<SyncStatus>,
    interval: Duration,
}

/// Clears the in-flight flag when the fetch finishes, however it finishes.
struct InFlightGuard(Arc<Inner>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::SeqCst);
    }
}

struct InFlight {
    id: RequestId,
    target: FetchTarget,
    trigger: Trigger,
    _guard: InFlightGuard,
}

/// Drives weather fetches and publishes their results.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl RefreshScheduler {
    pub fn new(
        client: Arc<dyn WeatherClient>,
        store: Arc<SnapshotStore>,
        interval: Duration,
        config: Option<&AppConfig>,
    ) -> Self {
        let initial = if config.is_some() { SyncStatus::Starting } else { SyncStatus::NotConfigured };
        let (status, _) = watch::channel(initial);

        Self {
            inner: Arc::new(Inner {
                client,
                store,
                target: RwLock::new(config.map(AppConfig::fetch_target)),
                in_flight: AtomicBool::new(false),
                suspended: AtomicBool::new(false),
                status,
                interval,
            }),
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.inner.store
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Point future fetches at a new configuration.
    ///
    /// Any fetch still running for the old configuration becomes stale, and
    /// polling resumes if it was suspended by an auth failure.
    pub fn reconfigure(&self, config: &AppConfig) {
        {
            let mut target = self.inner.target.write().unwrap_or_else(PoisonError::into_inner);
            *target = Some(config.fetch_target());
        }
        self.inner.store.invalidate();
        self.inner.suspended.store(false, Ordering::SeqCst);
        self.inner.status.send_if_modified(|status| {
            if status.needs_setup() {
                *status = SyncStatus::Starting;
                true
            } else {
                false
            }
        });

        info!("Scheduler reconfigured for {}", config.location_label());
    }

    /// Start one fetch right away, outside the normal cadence.
    ///
    /// Returns the reason instead of a handle when the fetch cannot start,
    /// e.g. [`RefreshOutcome::Skipped`] while another fetch is in flight.
    pub fn sync_now(&self) -> Result<JoinHandle<RefreshOutcome>, RefreshOutcome> {
        let flight = self.begin(Trigger::Manual)?;
        let this = self.clone();
        Ok(tokio::spawn(async move { this.complete(flight).await }))
    }

    /// Run one fetch to completion on the current task.
    pub async fn refresh(&self, trigger: Trigger) -> RefreshOutcome {
        match self.begin(trigger) {
            Ok(flight) => self.complete(flight).await,
            Err(outcome) => outcome,
        }
    }

    /// Poll every `interval` until cancelled, starting immediately.
    ///
    /// Each fetch runs on its own task, so a slow request never delays the
    /// timer; ticks that land while a fetch is in flight are skipped.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = time::interval(self.inner.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Refresh scheduler started, polling every {:?}", self.inner.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.begin(Trigger::Scheduled) {
                        Ok(flight) => {
                            let this = self.clone();
                            tokio::spawn(async move {
                                this.complete(flight).await;
                            });
                        }
                        Err(outcome) => debug!("Scheduled refresh not started: {outcome:?}"),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("Refresh scheduler shutting down");
                    break;
                }
            }
        }
    }

    fn begin(&self, trigger: Trigger) -> Result<InFlight, RefreshOutcome> {
        if trigger == Trigger::Scheduled && self.inner.suspended.load(Ordering::SeqCst) {
            return Err(RefreshOutcome::Suspended);
        }

        let target = self.inner.target.read().unwrap_or_else(PoisonError::into_inner).clone();
        let Some(target) = target else {
            return Err(RefreshOutcome::NotConfigured);
        };

        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("{trigger:?} refresh skipped: fetch already in flight");
            return Err(RefreshOutcome::Skipped);
        }

        let id = self.inner.store.begin_request();
        Ok(InFlight { id, target, trigger, _guard: InFlightGuard(Arc::clone(&self.inner)) })
    }

    /// Run `flight` to completion.
    ///
    /// A stale result means the configuration changed mid-fetch, and the
    /// manual sync that came with the change was skipped; fetch again for
    /// the new target right away.
    async fn complete(&self, flight: InFlight) -> RefreshOutcome {
        let mut flight = flight;
        loop {
            let outcome = self.fetch_and_apply(flight).await;
            if outcome != RefreshOutcome::Stale {
                return outcome;
            }

            match self.begin(Trigger::Manual) {
                Ok(next) => {
                    info!("Configuration changed during fetch; refetching (request {})", next.id);
                    flight = next;
                }
                Err(other) => {
                    debug!("Follow-up fetch not started: {other:?}");
                    return outcome;
                }
            }
        }
    }

    async fn fetch_and_apply(&self, flight: InFlight) -> RefreshOutcome {
        info!("Fetching weather (request {}, {:?})", flight.id, flight.trigger);

        let outcome = match self.inner.client.fetch(&flight.target).await {
            Ok(snapshot) => {
                if self.inner.store.apply(flight.id, snapshot) {
                    self.inner.status.send_replace(SyncStatus::Synced { at: Local::now() });
                    info!("Weather updated (request {})", flight.id);
                    RefreshOutcome::Applied
                } else {
                    info!("Discarding stale result for request {}", flight.id);
                    RefreshOutcome::Stale
                }
            }
            Err(err) if !self.inner.store.is_latest(flight.id) => {
                info!("Ignoring failure of stale request {}: {err}", flight.id);
                RefreshOutcome::Stale
            }
            Err(err) => {
                let kind = err.kind();
                if kind == ErrorKind::Auth {
                    error!("Weather fetch failed ({kind}): {err}; polling suspended until setup");
                    self.inner.suspended.store(true, Ordering::SeqCst);
                } else {
                    warn!("Weather fetch failed ({kind}): {err}");
                }
                self.inner.status.send_modify(|status| {
                    *status = SyncStatus::failed(kind, status);
                });
                RefreshOutcome::Failed(kind)
            }
        };

        drop(flight);
        outcome
    }
}
