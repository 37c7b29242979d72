//! Node Status
//!
//! Tracks where the serve loop is in its lifecycle and derives the liveness
//! and readiness reports from it.
//!
//! | Lifecycle  | `/healthz` | `/readyz` |
//! |------------|------------|-----------|
//! | `starting` | 200        | 503       |
//! | `serving`  | 200        | 200 *     |
//! | `stopped`  | 503        | 503       |
//!
//! \* degraded while no namespace is registered or the ring is empty

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::adapters::HttpPool;
use crate::namespace::Registry;

/// Where the serve loop is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Lifecycle {
    /// Built, not accepting connections yet
    Starting = 0,
    /// Accept loop running
    Serving = 1,
    /// Accept loop exited or was cancelled
    Stopped = 2,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Lifecycle::Starting,
            1 => Lifecycle::Serving,
            _ => Lifecycle::Stopped,
        }
    }
}

/// Outcome of one check, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Degraded,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Check {
    fn new(name: &'static str, status: Status, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: Some(detail.into()),
        }
    }
}

/// Body of `/healthz` and `/readyz`
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Worst status among the checks
    pub status: Status,
    pub lifecycle: Lifecycle,
    pub uptime_seconds: u64,
    pub version: &'static str,
    pub checks: Vec<Check>,
}

impl StatusReport {
    fn new(lifecycle: Lifecycle, uptime: Duration, checks: Vec<Check>) -> Self {
        Self {
            status: checks.iter().map(|c| c.status).max().unwrap_or(Status::Ok),
            lifecycle,
            uptime_seconds: uptime.as_secs(),
            version: env!("CARGO_PKG_VERSION"),
            checks,
        }
    }

    /// Anything short of `Down` is answered with 200
    pub fn is_available(&self) -> bool {
        self.status != Status::Down
    }
}

/// Lifecycle of one node
#[derive(Debug)]
pub struct NodeHealth {
    started: Instant,
    lifecycle: AtomicU8,
}

impl NodeHealth {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            lifecycle: AtomicU8::new(Lifecycle::Starting as u8),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Only a starting node can begin serving; a stopped node stays stopped.
    pub(crate) fn mark_serving(&self) {
        let _ = self.lifecycle.compare_exchange(
            Lifecycle::Starting as u8,
            Lifecycle::Serving as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub(crate) fn mark_stopped(&self) {
        self.lifecycle
            .store(Lifecycle::Stopped as u8, Ordering::Release);
    }

    /// Down once the accept loop has stopped
    pub fn liveness(&self) -> StatusReport {
        let lifecycle = self.lifecycle();
        let check = match lifecycle {
            Lifecycle::Stopped => Check::new("serve_loop", Status::Down, "accept loop stopped"),
            _ => Check::new("serve_loop", Status::Ok, "running"),
        };
        StatusReport::new(lifecycle, self.uptime(), vec![check])
    }

    /// Serving, with at least one namespace, and with peers if a pool is
    /// configured
    pub fn readiness(&self, registry: &Registry, pool: Option<&HttpPool>) -> StatusReport {
        let lifecycle = self.lifecycle();
        let mut checks = Vec::with_capacity(3);

        checks.push(match lifecycle {
            Lifecycle::Serving => Check::new("serve_loop", Status::Ok, "accepting connections"),
            Lifecycle::Starting => Check::new("serve_loop", Status::Down, "not accepting yet"),
            Lifecycle::Stopped => Check::new("serve_loop", Status::Down, "accept loop stopped"),
        });

        checks.push(match registry.len() {
            0 => Check::new("namespaces", Status::Degraded, "none registered"),
            n => Check::new("namespaces", Status::Ok, format!("{} registered", n)),
        });

        if let Some(pool) = pool {
            checks.push(match pool.peers().len() {
                0 => Check::new("peers", Status::Degraded, "ring is empty"),
                n => Check::new("peers", Status::Ok, format!("{} on the ring", n)),
            });
        }

        StatusReport::new(lifecycle, self.uptime(), checks)
    }
}

impl Default for NodeHealth {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
