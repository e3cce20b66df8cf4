//! Metrics for IKE SA management
//!
//! Counters and a gauge describing registry traffic. All metrics use atomic
//! operations so they can be updated from any worker thread without taking
//! the registry lock.
//!
//! # Example
//!
//! ```
//! use keyward_ike::metrics::ManagerMetrics;
//!
//! let metrics = ManagerMetrics::new();
//!
//! metrics.record_checkout(false);
//! metrics.record_wait();
//! metrics.record_checkin();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.checkouts_total, 1);
//! assert_eq!(snapshot.wait_ratio(), 1.0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// IKE SA manager metrics
///
/// Cloning shares the underlying counters.
#[derive(Debug, Clone)]
pub struct ManagerMetrics {
    /// Successful checkouts, including those that created an SA
    pub checkouts_total: Arc<AtomicU64>,

    /// Checkouts that created a responder SA
    pub checkouts_created: Arc<AtomicU64>,

    /// SAs created by `create_and_checkout`
    pub initiated_total: Arc<AtomicU64>,

    /// Lookups (checkout, checkin, delete) that matched nothing
    pub not_found_total: Arc<AtomicU64>,

    /// Times a caller had to wait for an SA held elsewhere
    pub waits_total: Arc<AtomicU64>,

    /// Checkouts abandoned after the configured timeout
    pub timeouts_total: Arc<AtomicU64>,

    /// Checkins
    pub checkins_total: Arc<AtomicU64>,

    /// SAs removed from the registry
    pub deleted_total: Arc<AtomicU64>,

    /// Generated SPIs discarded because they were in use
    pub spi_collisions: Arc<AtomicU64>,

    /// SAs currently registered
    pub sa_active: Arc<AtomicU64>,
}

impl ManagerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self {
            checkouts_total: Arc::new(AtomicU64::new(0)),
            checkouts_created: Arc::new(AtomicU64::new(0)),
            initiated_total: Arc::new(AtomicU64::new(0)),
            not_found_total: Arc::new(AtomicU64::new(0)),
            waits_total: Arc::new(AtomicU64::new(0)),
            timeouts_total: Arc::new(AtomicU64::new(0)),
            checkins_total: Arc::new(AtomicU64::new(0)),
            deleted_total: Arc::new(AtomicU64::new(0)),
            spi_collisions: Arc::new(AtomicU64::new(0)),
            sa_active: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record successful checkout
    ///
    /// # Arguments
    ///
    /// * `created` - Whether the checkout registered a new SA
    pub fn record_checkout(&self, created: bool) {
        self.checkouts_total.fetch_add(1, Ordering::Relaxed);
        if created {
            self.checkouts_created.fetch_add(1, Ordering::Relaxed);
            self.sa_active.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record SA created by `create_and_checkout`
    pub fn record_initiated(&self) {
        self.initiated_total.fetch_add(1, Ordering::Relaxed);
        self.sa_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record lookup that matched nothing
    pub fn record_not_found(&self) {
        self.not_found_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record caller blocking on a held SA
    pub fn record_wait(&self) {
        self.waits_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record checkout timeout
    pub fn record_timeout(&self) {
        self.timeouts_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record checkin
    pub fn record_checkin(&self) {
        self.checkins_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record SA removal
    pub fn record_deleted(&self) {
        self.deleted_total.fetch_add(1, Ordering::Relaxed);
        // saturating, never wraps below zero
        let _ = self
            .sa_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    /// Record SPI collision
    pub fn record_spi_collision(&self) {
        self.spi_collisions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            checkouts_total: self.checkouts_total.load(Ordering::Relaxed),
            checkouts_created: self.checkouts_created.load(Ordering::Relaxed),
            initiated_total: self.initiated_total.load(Ordering::Relaxed),
            not_found_total: self.not_found_total.load(Ordering::Relaxed),
            waits_total: self.waits_total.load(Ordering::Relaxed),
            timeouts_total: self.timeouts_total.load(Ordering::Relaxed),
            checkins_total: self.checkins_total.load(Ordering::Relaxed),
            deleted_total: self.deleted_total.load(Ordering::Relaxed),
            spi_collisions: self.spi_collisions.load(Ordering::Relaxed),
            sa_active: self.sa_active.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero
    ///
    /// The `sa_active` gauge is left alone since it mirrors registry size.
    pub fn reset(&self) {
        self.checkouts_total.store(0, Ordering::Relaxed);
        self.checkouts_created.store(0, Ordering::Relaxed);
        self.initiated_total.store(0, Ordering::Relaxed);
        self.not_found_total.store(0, Ordering::Relaxed);
        self.waits_total.store(0, Ordering::Relaxed);
        self.timeouts_total.store(0, Ordering::Relaxed);
        self.checkins_total.store(0, Ordering::Relaxed);
        self.deleted_total.store(0, Ordering::Relaxed);
        self.spi_collisions.store(0, Ordering::Relaxed);
    }
}

impl Default for ManagerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ManagerMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Successful checkouts
    pub checkouts_total: u64,
    /// Checkouts that created a responder SA
    pub checkouts_created: u64,
    /// SAs created by `create_and_checkout`
    pub initiated_total: u64,
    /// Lookups that matched nothing
    pub not_found_total: u64,
    /// Waits on held SAs
    pub waits_total: u64,
    /// Checkout timeouts
    pub timeouts_total: u64,
    /// Checkins
    pub checkins_total: u64,
    /// SAs removed
    pub deleted_total: u64,
    /// SPI collisions
    pub spi_collisions: u64,
    /// SAs currently registered
    pub sa_active: u64,
}

impl MetricsSnapshot {
    /// Fraction of checkouts that had to wait (0.0 without checkouts)
    pub fn wait_ratio(&self) -> f64 {
        if self.checkouts_total == 0 {
            return 0.0;
        }
        self.waits_total as f64 / self.checkouts_total as f64
    }
}
