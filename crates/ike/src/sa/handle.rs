//! Contract between the manager and the IKE SA objects it stores
//!
//! The manager never looks inside an IKE SA. It needs to read the current
//! identifier (which the holder may complete while the SA is checked out),
//! and it needs to tear the object down exactly once.

use super::SaId;
use crate::Result;

/// Object managed by the IKE SA manager
pub trait SaHandle: Send {
    /// Current identifier of this SA
    fn id(&self) -> SaId;

    /// Tear the SA down
    ///
    /// Called exactly once, either when the SA is deleted or when the
    /// manager is destroyed. The default simply drops the object.
    fn destroy(self)
    where
        Self: Sized,
    {
    }
}

/// Constructor for new IKE SA objects
///
/// Invoked under the manager lock with the identifier the new SA starts
/// with. Returning an error aborts the checkout without leaving an entry
/// behind.
pub trait SaFactory<H>: Send + Sync {
    /// Create a new SA with the given identifier
    fn create(&self, id: SaId) -> Result<H>;
}

impl<H, F> SaFactory<H> for F
where
    F: Fn(SaId) -> Result<H> + Send + Sync,
{
    fn create(&self, id: SaId) -> Result<H> {
        self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct Bare(SaId);

    impl SaHandle for Bare {
        fn id(&self) -> SaId {
            self.0
        }
    }

    #[test]
    fn test_closure_factory() {
        let factory = |id: SaId| -> Result<Bare> { Ok(Bare(id)) };
        let sa = factory.create(SaId::half_open(5, true)).unwrap();
        assert_eq!(sa.id().initiator_spi(), 5);
        sa.destroy();
    }

    #[test]
    fn test_failing_factory() {
        let factory =
            |_id: SaId| -> Result<Bare> { Err(Error::Allocation("out of memory".into())) };
        let result = factory.create(SaId::half_open(5, true));
        assert!(matches!(result, Err(Error::Allocation(_))));
    }
}
