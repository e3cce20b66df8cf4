//! Exclusive checkout guard

use super::{table::EntryKey, IkeSaManager};
use crate::{
    logging,
    sa::{SaHandle, SaId},
    Result,
};
use std::ops::{Deref, DerefMut};

/// How a checkout was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutStatus {
    /// An existing SA was checked out
    Success,
    /// A new SA was registered; the caller drives its first exchange
    Created,
}

/// Exclusively held IKE SA
///
/// Dereferences to the SA object. Hand it back with
/// [`IkeSaManager::checkin`] or [`IkeSaManager::checkin_and_delete`]; both
/// consume the guard, so the SA cannot be touched after it was returned.
/// A guard that is dropped instead is checked in automatically.
#[must_use = "a checked out IKE SA blocks other workers until it is checked in"]
pub struct CheckedOut<'a, H: SaHandle> {
    manager: &'a IkeSaManager<H>,
    key: EntryKey,
    status: CheckoutStatus,
    sa: Option<H>,
}

impl<'a, H: SaHandle> CheckedOut<'a, H> {
    pub(crate) fn new(
        manager: &'a IkeSaManager<H>,
        key: EntryKey,
        status: CheckoutStatus,
        sa: H,
    ) -> Self {
        CheckedOut {
            manager,
            key,
            status,
            sa: Some(sa),
        }
    }

    /// How the checkout was satisfied
    pub fn status(&self) -> CheckoutStatus {
        self.status
    }

    /// Whether the checkout registered a new SA
    pub fn is_created(&self) -> bool {
        self.status == CheckoutStatus::Created
    }

    /// Current identifier of the held SA
    pub fn id(&self) -> SaId {
        self.deref().id()
    }

    /// Check the SA back in
    pub fn checkin(self) -> Result<()> {
        let manager = self.manager;
        manager.checkin(self)
    }

    /// Check the SA in and delete it in one step
    pub fn checkin_and_delete(self) -> Result<()> {
        let manager = self.manager;
        manager.checkin_and_delete(self)
    }

    pub(crate) fn manager(&self) -> &'a IkeSaManager<H> {
        self.manager
    }

    pub(crate) fn into_parts(mut self) -> (EntryKey, H) {
        match self.sa.take() {
            Some(sa) => (self.key, sa),
            None => unreachable!("IKE SA guard emptied before being consumed"),
        }
    }
}

impl<H: SaHandle> Deref for CheckedOut<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        match &self.sa {
            Some(sa) => sa,
            None => unreachable!("IKE SA guard used after checkin"),
        }
    }
}

impl<H: SaHandle> DerefMut for CheckedOut<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        match &mut self.sa {
            Some(sa) => sa,
            None => unreachable!("IKE SA guard used after checkin"),
        }
    }
}

impl<H: SaHandle> Drop for CheckedOut<'_, H> {
    fn drop(&mut self) {
        if let Some(sa) = self.sa.take() {
            logging::log_guard_dropped(&sa.id());
            // failures are logged by the manager
            let _ = self.manager.return_sa(self.key, sa, false);
        }
    }
}

impl<H: SaHandle + std::fmt::Debug> std::fmt::Debug for CheckedOut<'_, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckedOut")
            .field("status", &self.status)
            .field("sa", &self.sa)
            .finish()
    }
}
