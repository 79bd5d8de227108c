//! Single-flight health probing of the admin-auth service.
//!
//! The host environment may initialize the sign-in surface more than once in
//! rapid succession, so the in-flight slot is claimed synchronously, inside
//! the state mutex and strictly before the first suspension point. Concurrent
//! callers subscribe to the pending probe instead of issuing a second request,
//! and a safety-net timeout releases the slot if the request never resolves.
//!
//! A probe never fails: an unreachable or not-ready service is a valid,
//! cacheable status, not an error. The probe result only informs UI-level
//! decisions and never gates a ceremony attempt.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::transport::Transport;

/// Liveness of the admin-auth service as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// Service answered the health endpoint with `status: ok`
    Ok,
    /// Service was reachable but not ready, or unreachable
    Down,
    /// The probe itself failed at the transport level
    Unknown,
}

/// A probe outcome: tri-state health, when it was observed, and optional
/// error detail for the non-`Ok` states.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub health: Health,
    pub checked_at: DateTime<Utc>,
    pub detail: Option<String>,
}

impl HealthStatus {
    fn now(health: Health, detail: Option<String>) -> Self {
        Self {
            health,
            checked_at: Utc::now(),
            detail,
        }
    }
}

struct InflightProbe {
    /// Distinguishes this probe from any later probe that claims the slot
    /// after a forced refresh or safety-net release.
    generation: u64,
    done: broadcast::Sender<HealthStatus>,
}

#[derive(Default)]
struct ProbeState {
    cached: Option<HealthStatus>,
    inflight: Option<InflightProbe>,
    next_generation: u64,
}

/// Single-flight health probe coordinator with a shared result cache.
///
/// The cache has no expiry: a status is held until a newer probe supersedes it
/// or a forced refresh discards it. That is the observed contract of the
/// sign-in surface this agent serves.
pub struct HealthProbe {
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<ProbeState>>,
    request_timeout: Duration,
    lock_timeout: Duration,
}

impl HealthProbe {
    /// Create a coordinator probing through `transport`.
    ///
    /// `request_timeout` bounds a single probe request; `lock_timeout` is the
    /// safety net after which the in-flight slot is released even though the
    /// underlying request may still be pending in the background.
    pub fn new(
        transport: Arc<dyn Transport>,
        request_timeout: Duration,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            state: Arc::new(Mutex::new(ProbeState::default())),
            request_timeout,
            lock_timeout,
        }
    }

    /// Probe the service, or return the cached/pending result.
    ///
    /// With `force_refresh` the cache and any in-flight probe are discarded
    /// before a fresh request is issued. Without it, a cached status is
    /// returned with no network access, and a pending probe is shared with
    /// every concurrent caller (exactly one request on the wire).
    pub async fn probe(&self, force_refresh: bool) -> HealthStatus {
        let (generation, mut done_rx) = {
            // Synchronous critical section: claim or join the in-flight slot
            // before the first suspension point.
            let mut state = lock_state(&self.state);

            if force_refresh {
                state.cached = None;
                if state.inflight.take().is_some() {
                    debug!("Forced refresh detached an in-flight probe");
                }
            }

            if let Some(cached) = &state.cached {
                debug!(health = ?cached.health, "Returning cached health status");
                return cached.clone();
            }

            if let Some(inflight) = &state.inflight {
                debug!("Joining in-flight health probe");
                (inflight.generation, inflight.done.subscribe())
            } else {
                let generation = state.next_generation;
                state.next_generation += 1;

                let (done_tx, done_rx) = broadcast::channel(1);
                state.inflight = Some(InflightProbe {
                    generation,
                    done: done_tx.clone(),
                });
                drop(state);

                info!("Starting health probe of admin-auth service");
                let transport = Arc::clone(&self.transport);
                let shared_state = Arc::clone(&self.state);
                let request_timeout = self.request_timeout;
                tokio::spawn(async move {
                    let status = perform_probe(transport.as_ref(), request_timeout).await;

                    let mut state = lock_state(&shared_state);
                    // A forced refresh or safety-net release may have handed
                    // the slot to a newer probe; a stale completion must not
                    // clobber it.
                    let current = state
                        .inflight
                        .as_ref()
                        .is_some_and(|p| p.generation == generation);
                    if current {
                        state.cached = Some(status.clone());
                        state.inflight = None;
                    }
                    drop(state);

                    if current {
                        let _ = done_tx.send(status);
                    }
                });

                (generation, done_rx)
            }
        };

        match tokio::time::timeout(self.lock_timeout, done_rx.recv()).await {
            Ok(Ok(status)) => status,
            Ok(Err(_)) => {
                // Sender dropped without a result; treat like a timeout.
                self.release_if_current(generation);
                HealthStatus::now(
                    Health::Unknown,
                    Some("health probe was abandoned".to_string()),
                )
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.lock_timeout.as_secs(),
                    "Health probe did not resolve in time; releasing in-flight slot"
                );
                self.release_if_current(generation);
                HealthStatus::now(
                    Health::Unknown,
                    Some(format!(
                        "health probe did not resolve within {}s",
                        self.lock_timeout.as_secs()
                    )),
                )
            }
        }
    }

    /// Last cached status, if any, with no network access.
    pub fn cached(&self) -> Option<HealthStatus> {
        lock_state(&self.state).cached.clone()
    }

    /// Discard the cached status so the next `probe` hits the network.
    pub fn invalidate(&self) {
        lock_state(&self.state).cached = None;
        debug!("Health status cache invalidated");
    }

    fn release_if_current(&self, generation: u64) {
        let mut state = lock_state(&self.state);
        if state
            .inflight
            .as_ref()
            .is_some_and(|p| p.generation == generation)
        {
            state.inflight = None;
        }
    }
}

fn lock_state(state: &Mutex<ProbeState>) -> MutexGuard<'_, ProbeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn perform_probe(transport: &dyn Transport, request_timeout: Duration) -> HealthStatus {
    let response = match tokio::time::timeout(request_timeout, transport.get("health", None)).await
    {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            warn!(error = %e, "Health probe request failed");
            return HealthStatus::now(Health::Unknown, Some(e.to_string()));
        }
        Err(_) => {
            warn!(
                timeout_secs = request_timeout.as_secs(),
                "Health probe request timed out"
            );
            return HealthStatus::now(
                Health::Unknown,
                Some(format!(
                    "health request timed out after {}s",
                    request_timeout.as_secs()
                )),
            );
        }
    };

    if !response.is_success() {
        debug!(status = response.status, "Health endpoint returned non-success");
        return HealthStatus::now(Health::Down, Some(format!("HTTP {}", response.status)));
    }

    // Tolerate empty or malformed bodies; anything but `status: ok` is down.
    let status_field = response.body.get("status").and_then(|v| v.as_str());
    if status_field.is_some_and(|s| s.eq_ignore_ascii_case("ok")) {
        debug!("Admin-auth service is healthy");
        HealthStatus::now(Health::Ok, None)
    } else {
        HealthStatus::now(
            Health::Down,
            Some(format!(
                "service returned status: {}",
                status_field.unwrap_or("unknown")
            )),
        )
    }
}
