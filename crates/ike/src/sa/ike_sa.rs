//! Reference IKE SA object
//!
//! `IkeSa` is the lightweight SA record the daemon registers with the
//! manager: its identifier, a negotiation state and bookkeeping the
//! dispatcher needs. Protocol processing lives elsewhere and drives the
//! state through [`IkeSa::transition`] while the SA is checked out.
//!
//! # State Transitions
//!
//! ```text
//! Idle ──(send IKE_SA_INIT)──> InitSent ──(recv response)──> InitDone
//! Idle ──(recv IKE_SA_INIT)──────────────────────────────────> InitDone
//! InitDone ──(send IKE_AUTH)──> AuthSent ──(recv response)──> Established
//! InitDone ──(recv IKE_AUTH)─────────────────────────────────> Established
//! Established <──> Rekeying
//! any ──> Deleting ──> Deleted
//! ```

use super::{SaHandle, SaId};
use crate::{logging, Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// IKE SA negotiation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IkeState {
    /// Nothing exchanged yet
    Idle,

    /// IKE_SA_INIT request sent, waiting for response
    InitSent,

    /// IKE_SA_INIT completed
    InitDone,

    /// IKE_AUTH request sent, waiting for response
    AuthSent,

    /// IKE SA established
    Established,

    /// Rekeying in progress
    Rekeying,

    /// Deletion in progress
    Deleting,

    /// IKE SA deleted
    Deleted,
}

impl IkeState {
    /// Check if `next` is a valid successor
    pub fn can_transition_to(&self, next: IkeState) -> bool {
        use IkeState::*;

        match (*self, next) {
            (s1, s2) if s1 == s2 => !s1.is_terminal(),
            (Idle, InitSent) | (InitSent, InitDone) | (Idle, InitDone) => true,
            (InitDone, AuthSent) | (AuthSent, Established) | (InitDone, Established) => true,
            (Established, Rekeying) | (Rekeying, Established) => true,
            (Deleting, Deleted) => true,
            (s, Deleting) => !s.is_terminal(),
            _ => false,
        }
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, IkeState::Deleted)
    }

    /// Check if the IKE SA is usable for CHILD_SA traffic
    pub fn is_established(&self) -> bool {
        matches!(self, IkeState::Established | IkeState::Rekeying)
    }
}

/// IKE SA record stored in the manager
#[derive(Debug)]
pub struct IkeSa {
    id: SaId,
    serial: u64,
    state: IkeState,
    created_at: Instant,
}

impl IkeSa {
    /// Create SA in `Idle` state
    pub fn new(id: SaId) -> Self {
        IkeSa {
            id,
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            state: IkeState::Idle,
            created_at: Instant::now(),
        }
    }

    /// Constructor usable as an [`SaFactory`](super::SaFactory)
    pub fn create(id: SaId) -> Result<Self> {
        Ok(Self::new(id))
    }

    /// Process-wide unique serial number, stable across identifier updates
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Current state
    pub fn state(&self) -> IkeState {
        self.state
    }

    /// Time since creation
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Record the responder SPI learned from the peer
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if a different responder SPI is already known.
    pub fn set_responder_spi(&mut self, spi: u64) -> Result<()> {
        self.id.set_responder_spi(spi)
    }

    /// Move to a new state
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if `next` is not a valid successor.
    pub fn transition(&mut self, next: IkeState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidStateTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", next),
            });
        }

        if self.state != next {
            logging::log_ike_state_transition(&self.id, self.state, next);
        }
        self.state = next;
        Ok(())
    }
}

impl SaHandle for IkeSa {
    fn id(&self) -> SaId {
        self.id
    }

    fn destroy(self) {
        logging::log_ike_sa_destroyed(&self.id, self.serial, self.state, self.age());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use IkeState::*;

        assert!(Idle.can_transition_to(InitSent));
        assert!(Idle.can_transition_to(InitDone));
        assert!(InitDone.can_transition_to(AuthSent));
        assert!(InitDone.can_transition_to(Established));
        assert!(Established.can_transition_to(Rekeying));
        assert!(Rekeying.can_transition_to(Established));
        assert!(Established.can_transition_to(Deleting));
        assert!(Deleting.can_transition_to(Deleted));

        assert!(!Idle.can_transition_to(Established));
        assert!(!AuthSent.can_transition_to(InitDone));
        assert!(!Deleted.can_transition_to(Deleting));
        assert!(!Deleted.can_transition_to(Deleted));
    }

    #[test]
    fn test_initiator_walk() {
        let mut sa = IkeSa::new(SaId::half_open(0x10, true));
        assert_eq!(sa.state(), IkeState::Idle);

        sa.transition(IkeState::InitSent).unwrap();
        sa.set_responder_spi(0x20).unwrap();
        sa.transition(IkeState::InitDone).unwrap();
        sa.transition(IkeState::AuthSent).unwrap();
        sa.transition(IkeState::Established).unwrap();

        assert!(sa.state().is_established());
        assert_eq!(sa.id(), SaId::new(0x10, Some(0x20), true));
    }

    #[test]
    fn test_invalid_transition() {
        let mut sa = IkeSa::new(SaId::new(1, Some(2), false));
        let result = sa.transition(IkeState::AuthSent);
        assert!(matches!(result, Err(Error::InvalidStateTransition { .. })));
        assert_eq!(sa.state(), IkeState::Idle);
    }

    #[test]
    fn test_responder_spi_cannot_change() {
        let mut sa = IkeSa::new(SaId::new(1, Some(2), false));
        assert!(sa.set_responder_spi(2).is_ok());
        assert!(matches!(sa.set_responder_spi(3), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_serials_are_unique() {
        let a = IkeSa::new(SaId::half_open(1, true));
        let b = IkeSa::new(SaId::half_open(1, true));
        assert_ne!(a.serial(), b.serial());
    }

    #[test]
    fn test_create_as_factory() {
        use crate::sa::SaFactory;

        let factory = IkeSa::create;
        let sa = factory.create(SaId::half_open(3, false)).unwrap();
        assert_eq!(sa.id().initiator_spi(), 3);
        sa.destroy();
    }
}
