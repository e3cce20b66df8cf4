//! IKE SA identifier
//!
//! An IKE SA is identified by the initiator SPI, the responder SPI and the
//! role this end played when the SA was set up (RFC 7296 Section 2.6). The
//! responder SPI is unknown until the first IKE_SA_INIT response, so an
//! identifier starts out half-open and is completed exactly once.

use crate::{Error, Result};
use std::fmt;

/// IKE SA identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaId {
    initiator_spi: u64,
    responder_spi: Option<u64>,
    is_initiator: bool,
}

impl SaId {
    /// Create identifier from its parts
    pub fn new(initiator_spi: u64, responder_spi: Option<u64>, is_initiator: bool) -> Self {
        SaId {
            initiator_spi,
            responder_spi,
            is_initiator,
        }
    }

    /// Create half-open identifier (responder SPI not yet known)
    pub fn half_open(initiator_spi: u64, is_initiator: bool) -> Self {
        Self::new(initiator_spi, None, is_initiator)
    }

    /// Build identifier from raw IKE header SPIs
    ///
    /// A zero responder SPI is how IKE_SA_INIT requests encode "not yet
    /// assigned", so it maps to `None`.
    pub fn from_header_spis(
        initiator_spi: [u8; 8],
        responder_spi: [u8; 8],
        is_initiator: bool,
    ) -> Self {
        let spi_r = u64::from_be_bytes(responder_spi);
        Self::new(
            u64::from_be_bytes(initiator_spi),
            (spi_r != 0).then_some(spi_r),
            is_initiator,
        )
    }

    /// Initiator SPI
    pub fn initiator_spi(&self) -> u64 {
        self.initiator_spi
    }

    /// Responder SPI, if assigned
    pub fn responder_spi(&self) -> Option<u64> {
        self.responder_spi
    }

    /// Whether this end is the original initiator
    pub fn is_initiator(&self) -> bool {
        self.is_initiator
    }

    /// Whether both SPIs are known
    pub fn is_complete(&self) -> bool {
        self.responder_spi.is_some()
    }

    /// SPI allocated by this end (initiator SPI for initiators, responder SPI
    /// for responders)
    pub fn local_spi(&self) -> Option<u64> {
        if self.is_initiator {
            Some(self.initiator_spi)
        } else {
            self.responder_spi
        }
    }

    /// Role as a log-friendly string
    pub fn role(&self) -> &'static str {
        if self.is_initiator {
            "initiator"
        } else {
            "responder"
        }
    }

    /// Complete the identifier with the responder SPI
    ///
    /// Setting the same value again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if a different responder SPI is already set.
    pub fn set_responder_spi(&mut self, spi: u64) -> Result<()> {
        match self.responder_spi {
            None => {
                self.responder_spi = Some(spi);
                Ok(())
            }
            Some(current) if current == spi => Ok(()),
            Some(current) => Err(Error::InvalidState(format!(
                "responder SPI already assigned ({:016x}), refusing {:016x}",
                current, spi
            ))),
        }
    }

    /// Check whether a stored identifier answers a lookup for `query`
    ///
    /// Initiator SPI and role must be equal. The responder SPI must be equal
    /// unless `self` is still half-open, in which case it stands in for any
    /// responder SPI the query carries. A query without a responder SPI never
    /// matches a completed identifier.
    pub fn matches(&self, query: &SaId) -> bool {
        if self.initiator_spi != query.initiator_spi || self.is_initiator != query.is_initiator {
            return false;
        }
        match (self.responder_spi, query.responder_spi) {
            (None, _) => true,
            (Some(ours), Some(theirs)) => ours == theirs,
            (Some(_), None) => false,
        }
    }
}

impl fmt::Display for SaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}_i ", self.initiator_spi)?;
        match self.responder_spi {
            Some(spi) => write!(f, "{:016x}_r", spi)?,
            None => write!(f, "{:->16}_r", "")?,
        }
        if self.is_initiator {
            write!(f, " (orig)")?;
        }
        Ok(())
    }
}
