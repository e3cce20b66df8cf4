//! IKE SA manager
//!
//! Registry of every live IKE SA plus the checkout protocol that gives worker
//! threads exclusive access to one SA at a time.
//!
//! # Checkout protocol
//!
//! ```text
//! checkout(id) ──> find ──┬─ free ──────> lend, return guard
//!                         ├─ held ──────> wait on entry condition, retry
//!                         └─ none ──┬─ responder SPI unset ─> register, lend (Created)
//!                                   └─ responder SPI set ───> NotFound
//!
//! guard.checkin() ─────────> restore, wake waiters
//! guard.checkin_and_delete() ─> remove, wake waiters, destroy
//! ```
//!
//! All registry state lives behind one mutex; each entry carries its own
//! condition variable so a checkin only wakes threads waiting for that SA.
//!
//! A worker must check an SA in before checking it (or any SA it might
//! alias) out again: a second checkout of an SA the same worker holds waits
//! forever. [`IkeSaManager::delete`] has the same hazard.
//!
//! # Example
//!
//! ```
//! use keyward_ike::{IkeSa, IkeSaManager, ManagerConfig, SaId};
//!
//! # fn main() -> keyward_ike::Result<()> {
//! let manager: IkeSaManager<IkeSa> = IkeSaManager::new(ManagerConfig::default(), IkeSa::create)?;
//!
//! // IKE_SA_INIT request from a peer: responder SPI unknown
//! let mut id = SaId::half_open(0x1122334455667788, false);
//! let sa = manager.checkout(&mut id)?;
//! assert!(sa.is_created());
//! assert!(id.is_complete());
//! sa.checkin()?;
//!
//! // IKE_AUTH request carries both SPIs
//! let sa = manager.checkout(&mut id)?;
//! assert_eq!(sa.id(), id);
//! manager.checkin_and_delete(sa)?;
//! assert!(manager.is_empty());
//! # Ok(())
//! # }
//! ```

mod guard;
mod spi;
mod table;

pub use guard::{CheckedOut, CheckoutStatus};
pub use spi::{RandomSpiGenerator, SpiGenerator};

use crate::{
    config::ManagerConfig,
    logging,
    metrics::ManagerMetrics,
    sa::{SaFactory, SaHandle, SaId},
    Error, Result,
};
use keyward_platform::{PlatformResult, SecurityModule};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::time::Instant;
use table::{EntryKey, SaTable, Slot};

/// Operations the daemon performs on its IKE SA registry
pub trait SaManager<H: SaHandle> {
    /// Check out the SA matching `id`, registering one for a fresh
    /// IKE_SA_INIT. `id` is completed in place when a responder SPI is
    /// assigned. Blocks while another worker holds the SA.
    fn checkout(&self, id: &mut SaId) -> Result<CheckedOut<'_, H>>;

    /// Register a new SA as original initiator and check it out
    fn create_and_checkout(&self) -> Result<CheckedOut<'_, H>>;

    /// Return a checked out SA
    fn checkin(&self, sa: CheckedOut<'_, H>) -> Result<()>;

    /// Delete an SA the caller does not hold
    fn delete(&self, id: &SaId) -> Result<()>;

    /// Return and delete a checked out SA atomically
    fn checkin_and_delete(&self, sa: CheckedOut<'_, H>) -> Result<()>;

    /// Drain all holders and destroy every SA
    fn destroy(&self);
}

struct Registry<H> {
    table: SaTable<H>,
    closing: bool,
}

/// Registry and exclusive checkout broker for IKE SAs
pub struct IkeSaManager<H: SaHandle> {
    config: ManagerConfig,
    registry: Mutex<Registry<H>>,
    factory: Box<dyn SaFactory<H>>,
    spi_generator: Box<dyn SpiGenerator>,
    metrics: ManagerMetrics,
}

impl<H: SaHandle> IkeSaManager<H> {
    /// Create an empty manager
    ///
    /// `factory` builds new SA objects. It runs under the registry lock and
    /// must not call back into the manager.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the configuration does not validate.
    pub fn new(config: ManagerConfig, factory: impl SaFactory<H> + 'static) -> Result<Self> {
        config.validate()?;

        Ok(IkeSaManager {
            config,
            registry: Mutex::new(Registry {
                table: SaTable::new(),
                closing: false,
            }),
            factory: Box::new(factory),
            spi_generator: Box::new(RandomSpiGenerator),
            metrics: ManagerMetrics::new(),
        })
    }

    /// Replace the SPI source
    pub fn with_spi_generator(mut self, generator: impl SpiGenerator + 'static) -> Self {
        self.spi_generator = Box::new(generator);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Registry metrics
    pub fn metrics(&self) -> &ManagerMetrics {
        &self.metrics
    }

    /// Number of registered SAs
    pub fn len(&self) -> usize {
        self.registry.lock().table.len()
    }

    /// Whether no SA is registered
    pub fn is_empty(&self) -> bool {
        self.registry.lock().table.is_empty()
    }

    /// Number of SAs currently checked out
    pub fn held_count(&self) -> usize {
        self.registry.lock().table.held_count()
    }

    /// Whether [`destroy`](Self::destroy) has been called
    pub fn is_closing(&self) -> bool {
        self.registry.lock().closing
    }

    /// Check out the SA matching `id`
    ///
    /// Blocks while another worker holds the SA. If no SA matches and `id`
    /// has no responder SPI (an IKE_SA_INIT request from a peer), a new SA
    /// is registered with a freshly allocated responder SPI, which is also
    /// written back into `id`.
    ///
    /// A half-open SA is returned for any query carrying its initiator SPI
    /// and role, but the responder SPI of the query is not recorded. The
    /// holder validates the message and stores the responder SPI on the SA
    /// object, which [`checkin`](Self::checkin) then picks up.
    ///
    /// The create path does not look at the role of `id`: a query in the
    /// original initiator role with an unknown initiator SPI also registers
    /// a new SA. Such a query cannot come from a well-behaved peer and is
    /// logged as a warning.
    ///
    /// Checking out an SA this caller already holds blocks forever.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no SA matches and `id` carries a responder SPI
    /// - `TimedOut` if a checkout timeout is configured and elapsed
    /// - `ShuttingDown` once [`destroy`](Self::destroy) was called
    /// - `SpiExhausted` / `Allocation` if registering a new SA failed
    pub fn checkout(&self, id: &mut SaId) -> Result<CheckedOut<'_, H>> {
        let started = Instant::now();
        let deadline = self.config.checkout_timeout.map(|timeout| started + timeout);
        let mut registry = self.registry.lock();

        loop {
            if registry.closing {
                return Err(Error::ShuttingDown);
            }

            let Some(key) = registry.table.find(id) else {
                break;
            };

            match registry.table.lend(key) {
                Some(Slot::Free(sa)) => {
                    drop(registry);

                    self.metrics.record_checkout(false);
                    logging::log_sa_checked_out(id, false);
                    return Ok(CheckedOut::new(self, key, CheckoutStatus::Success, sa));
                }
                Some(Slot::Held(waiters)) => {
                    self.metrics.record_wait();
                    logging::log_checkout_wait(id);
                    if wait(&mut registry, &waiters, deadline) {
                        self.metrics.record_timeout();
                        logging::log_checkout_timeout(id, started.elapsed());
                        return Err(Error::TimedOut(*id));
                    }
                }
                None => return Err(Error::Internal(format!("entry for {} vanished", id))),
            }
        }

        if id.is_complete() {
            drop(registry);
            self.metrics.record_not_found();
            logging::log_sa_not_found("checkout", id);
            return Err(Error::NotFound(*id));
        }

        let spi = self.allocate_spi(&registry)?;
        let new_id = SaId::new(id.initiator_spi(), Some(spi), id.is_initiator());
        let (key, sa) = self.register(&mut registry, new_id)?;
        drop(registry);

        *id = new_id;
        if new_id.is_initiator() {
            logging::log_unsolicited_initiator_sa(&new_id);
        }
        logging::log_spi_allocated(spi, "responder");
        logging::log_sa_registered(&new_id, "checkout");
        logging::log_sa_checked_out(&new_id, true);
        self.metrics.record_checkout(true);
        Ok(CheckedOut::new(self, key, CheckoutStatus::Created, sa))
    }

    /// Register a new SA as original initiator and check it out
    ///
    /// The SA gets an initiator SPI no live SA uses. Never blocks on other
    /// holders.
    ///
    /// # Errors
    ///
    /// - `ShuttingDown` once [`destroy`](Self::destroy) was called
    /// - `SpiExhausted` if no free SPI was found
    /// - `Allocation` if the factory failed; nothing is registered then
    pub fn create_and_checkout(&self) -> Result<CheckedOut<'_, H>> {
        let mut registry = self.registry.lock();
        if registry.closing {
            return Err(Error::ShuttingDown);
        }

        let spi = self.allocate_spi(&registry)?;
        let id = SaId::half_open(spi, true);
        let (key, sa) = self.register(&mut registry, id)?;
        drop(registry);

        logging::log_spi_allocated(spi, "initiator");
        logging::log_sa_registered(&id, "initiate");
        self.metrics.record_initiated();
        Ok(CheckedOut::new(self, key, CheckoutStatus::Created, sa))
    }

    /// Return a checked out SA
    ///
    /// The entry is checked against the SA's current identifier, and a
    /// responder SPI the holder stored on the SA is recorded here. This is
    /// the only place a half-open entry gets completed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the guard belongs to another manager, or if
    /// the holder changed the identifier into one that no longer describes
    /// the registered SA. In the latter case the SA is destroyed and its
    /// entry dropped.
    pub fn checkin(&self, sa: CheckedOut<'_, H>) -> Result<()> {
        if !std::ptr::eq(sa.manager(), self) {
            let id = sa.id();
            self.metrics.record_not_found();
            logging::log_checkin_not_found(&id);
            return Err(Error::NotFound(id));
        }

        let (key, sa) = sa.into_parts();
        self.return_sa(key, sa, false)
    }

    /// Delete an SA that the caller does not hold
    ///
    /// Waits while another worker holds the SA. Deleting an SA the caller
    /// holds itself blocks forever; use
    /// [`checkin_and_delete`](Self::checkin_and_delete) for that.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no SA matches `id`
    /// - `TimedOut` if a checkout timeout is configured and elapsed
    pub fn delete(&self, id: &SaId) -> Result<()> {
        let started = Instant::now();
        let deadline = self.config.checkout_timeout.map(|timeout| started + timeout);
        let mut registry = self.registry.lock();

        loop {
            let Some(key) = registry.table.find(id) else {
                drop(registry);
                self.metrics.record_not_found();
                logging::log_sa_not_found("delete", id);
                return Err(Error::NotFound(*id));
            };

            match registry.table.remove_free(key) {
                Some(Slot::Free(entry)) => {
                    entry.waiters().notify_all();
                    drop(registry);

                    let removed = *entry.id();
                    self.finish_delete(&removed, entry.into_handle());
                    return Ok(());
                }
                Some(Slot::Held(waiters)) => {
                    self.metrics.record_wait();
                    logging::log_checkout_wait(id);
                    if wait(&mut registry, &waiters, deadline) {
                        self.metrics.record_timeout();
                        logging::log_checkout_timeout(id, started.elapsed());
                        return Err(Error::TimedOut(*id));
                    }
                }
                None => return Err(Error::Internal(format!("entry for {} vanished", id))),
            }
        }
    }

    /// Return a checked out SA and delete it under one lock acquisition
    ///
    /// No other worker can check the SA out between the two steps. The SA
    /// is destroyed whether or not it could be located.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the SA could not be located (see
    /// [`checkin`](Self::checkin)).
    pub fn checkin_and_delete(&self, sa: CheckedOut<'_, H>) -> Result<()> {
        if !std::ptr::eq(sa.manager(), self) {
            let id = sa.id();
            self.metrics.record_not_found();
            logging::log_checkin_not_found(&id);
            // the guard returns to its own manager, so delete it there
            let owner = sa.manager();
            return owner.checkin_and_delete(sa).and(Err(Error::NotFound(id)));
        }

        let (key, sa) = sa.into_parts();
        self.return_sa(key, sa, true)
    }

    /// Shut the manager down
    ///
    /// New checkouts fail with `ShuttingDown` from now on, and threads
    /// waiting in checkout are woken to fail as well. Blocks until every
    /// checked out SA has been checked in, then destroys all SAs. Calling
    /// this while holding an SA blocks forever.
    pub fn destroy(&self) {
        let mut registry = self.registry.lock();
        registry.closing = true;
        logging::log_shutdown_started(registry.table.len(), registry.table.held_count());
        registry.table.notify_all();

        while let Some(waiters) = registry.table.any_held() {
            waiters.wait(&mut registry);
        }

        let entries = registry.table.drain();
        drop(registry);

        let destroyed = entries.len();
        for entry in entries {
            if let Some(sa) = entry.into_handle() {
                sa.destroy();
            }
            self.metrics.record_deleted();
        }
        logging::log_shutdown_complete(destroyed);
    }

    fn allocate_spi(&self, registry: &Registry<H>) -> Result<u64> {
        spi::allocate_spi(
            self.spi_generator.as_ref(),
            self.config.max_spi_attempts,
            &self.metrics,
            |spi| registry.table.spi_in_use(spi),
        )
    }

    /// Build, insert and lend a new SA
    fn register(&self, registry: &mut Registry<H>, id: SaId) -> Result<(EntryKey, H)> {
        let sa = self.factory.create(id)?;
        let key = registry.table.insert(id, sa);
        match registry.table.lend(key) {
            Some(Slot::Free(sa)) => Ok((key, sa)),
            _ => {
                registry.table.remove(key);
                Err(Error::Internal(format!("fresh entry for {} not lendable", id)))
            }
        }
    }

    /// Give a lent SA back to its entry, optionally deleting it
    pub(crate) fn return_sa(&self, key: EntryKey, sa: H, delete: bool) -> Result<()> {
        let current = sa.id();
        let mut registry = self.registry.lock();

        let located = registry.table.get(key).map_or(false, |entry| {
            entry.is_held() && (entry.id().matches(&current) || current.matches(entry.id()))
        });

        if !located {
            // the entry can only be held by us, drop it so its waiters move on
            let orphan = registry.table.get(key).map_or(false, |entry| entry.is_held());
            if orphan {
                if let Some(entry) = registry.table.remove(key) {
                    entry.waiters().notify_all();
                    self.metrics.record_deleted();
                }
            }
            drop(registry);

            self.metrics.record_not_found();
            logging::log_checkin_not_found(&current);
            sa.destroy();
            return Err(Error::NotFound(current));
        }

        registry.table.complete(key, &current);

        if delete {
            let entry = registry.table.remove(key);
            if let Some(entry) = &entry {
                entry.waiters().notify_all();
            }
            drop(registry);

            let id = entry.map_or(current, |entry| *entry.id());
            self.finish_delete(&id, Some(sa));
            return Ok(());
        }

        if let Err(sa) = registry.table.restore(key, sa) {
            drop(registry);
            sa.destroy();
            return Err(Error::Internal(format!("entry for {} not held", current)));
        }
        if let Some(entry) = registry.table.get(key) {
            entry.waiters().notify_all();
        }
        drop(registry);

        self.metrics.record_checkin();
        logging::log_sa_checked_in(&current);
        Ok(())
    }

    fn finish_delete(&self, id: &SaId, sa: Option<H>) {
        self.metrics.record_deleted();
        logging::log_sa_deleted(id);
        if let Some(sa) = sa {
            sa.destroy();
        }
    }
}

/// Wait on `waiters`, returning `true` if `deadline` passed
fn wait<H>(
    registry: &mut MutexGuard<'_, Registry<H>>,
    waiters: &Condvar,
    deadline: Option<Instant>,
) -> bool {
    match deadline {
        Some(deadline) => waiters.wait_until(registry, deadline).timed_out(),
        None => {
            waiters.wait(registry);
            false
        }
    }
}

impl<H: SaHandle> SaManager<H> for IkeSaManager<H> {
    fn checkout(&self, id: &mut SaId) -> Result<CheckedOut<'_, H>> {
        IkeSaManager::checkout(self, id)
    }

    fn create_and_checkout(&self) -> Result<CheckedOut<'_, H>> {
        IkeSaManager::create_and_checkout(self)
    }

    fn checkin(&self, sa: CheckedOut<'_, H>) -> Result<()> {
        IkeSaManager::checkin(self, sa)
    }

    fn delete(&self, id: &SaId) -> Result<()> {
        IkeSaManager::delete(self, id)
    }

    fn checkin_and_delete(&self, sa: CheckedOut<'_, H>) -> Result<()> {
        IkeSaManager::checkin_and_delete(self, sa)
    }

    fn destroy(&self) {
        IkeSaManager::destroy(self)
    }
}

impl<H: SaHandle> SecurityModule for IkeSaManager<H> {
    fn id(&self) -> &'static str {
        "ike_sa_manager"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &'static str {
        "IKE SA registry and exclusive checkout broker"
    }

    fn shutdown(&mut self) -> PlatformResult<()> {
        self.destroy();
        Ok(())
    }
}

impl<H: SaHandle> Drop for IkeSaManager<H> {
    fn drop(&mut self) {
        for entry in self.registry.get_mut().table.drain() {
            if let Some(sa) = entry.into_handle() {
                sa.destroy();
            }
        }
    }
}
