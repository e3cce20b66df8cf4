//! SPI allocation
//!
//! IKEv2 reserves SPI value zero for "responder SPI not yet known"
//! (RFC 7296 Section 3.1), so zero is never handed out.

use crate::{logging, metrics::ManagerMetrics, Error, Result};
use rand::RngCore;

/// Source of SPI candidates
pub trait SpiGenerator: Send + Sync {
    /// Produce the next candidate
    fn next_spi(&self) -> u64;
}

/// Generator drawing SPIs from the thread-local CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSpiGenerator;

impl SpiGenerator for RandomSpiGenerator {
    fn next_spi(&self) -> u64 {
        rand::thread_rng().next_u64()
    }
}

/// Draw candidates until one is non-zero and not `in_use`
pub(crate) fn allocate_spi<F>(
    generator: &dyn SpiGenerator,
    max_attempts: u32,
    metrics: &ManagerMetrics,
    in_use: F,
) -> Result<u64>
where
    F: Fn(u64) -> bool,
{
    for attempt in 1..=max_attempts {
        let spi = generator.next_spi();
        if spi == 0 {
            continue;
        }
        if in_use(spi) {
            metrics.record_spi_collision();
            logging::log_spi_collision(spi, attempt);
            continue;
        }
        return Ok(spi);
    }

    Err(Error::SpiExhausted {
        attempts: max_attempts,
    })
}
