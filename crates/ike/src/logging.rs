//! Structured logging for IKE SA management
//!
//! Provides structured, contextual logging using the `tracing` framework.
//! Every event carrying an SA identifier logs both SPIs as hex fields
//! (`ike_spi_i`, `ike_spi_r`) and the local role.
//!
//! # Log Levels
//!
//! - **TRACE**: SPI allocation
//! - **DEBUG**: Checkout, checkin, waits, lookups that found nothing
//! - **INFO**: SA registration and deletion, manager shutdown
//! - **WARN**: Timeouts, SPI collisions, guards dropped without checkin,
//!   initiator-role SAs registered by a checkout
//! - **ERROR**: Checkin of an SA the manager does not know
//!
//! # Example
//!
//! ```no_run
//! use keyward_ike::{logging, SaId};
//!
//! tracing_subscriber::fmt()
//!     .with_env_filter("keyward_ike=debug")
//!     .init();
//!
//! let id = SaId::new(0x0102030405060708, Some(0x1112131415161718), false);
//! logging::log_sa_checked_in(&id);
//! ```

use crate::sa::{IkeState, SaId};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

fn spi_hex(spi: u64) -> String {
    hex::encode(spi.to_be_bytes())
}

fn spi_r_hex(id: &SaId) -> String {
    spi_hex(id.responder_spi().unwrap_or(0))
}

/// Log IKE SA state transition
pub fn log_ike_state_transition(id: &SaId, old_state: IkeState, new_state: IkeState) {
    info!(
        ike_spi_i = %spi_hex(id.initiator_spi()),
        ike_spi_r = %spi_r_hex(id),
        state_from = ?old_state,
        state_to = ?new_state,
        "IKE SA state transition"
    );
}

/// Log a new SA entering the registry
///
/// # Arguments
///
/// * `id` - Identifier the SA was registered with
/// * `origin` - "checkout" (peer-initiated) or "initiate" (locally initiated)
pub fn log_sa_registered(id: &SaId, origin: &str) {
    info!(
        ike_spi_i = %spi_hex(id.initiator_spi()),
        ike_spi_r = %spi_r_hex(id),
        role = id.role(),
        origin = origin,
        "IKE SA registered"
    );
}

/// Log an SA registered in the original initiator role by a checkout
///
/// Peers never send messages for an SA this end initiated but does not
/// know, so this usually means a stale or forged message.
pub fn log_unsolicited_initiator_sa(id: &SaId) {
    warn!(
        ike_spi_i = %spi_hex(id.initiator_spi()),
        ike_spi_r = %spi_r_hex(id),
        "Checkout registered unknown SA in initiator role"
    );
}

/// Log successful checkout
pub fn log_sa_checked_out(id: &SaId, created: bool) {
    debug!(
        ike_spi_i = %spi_hex(id.initiator_spi()),
        ike_spi_r = %spi_r_hex(id),
        role = id.role(),
        created = created,
        "IKE SA checked out"
    );
}

/// Log checkin
pub fn log_sa_checked_in(id: &SaId) {
    debug!(
        ike_spi_i = %spi_hex(id.initiator_spi()),
        ike_spi_r = %spi_r_hex(id),
        role = id.role(),
        "IKE SA checked in"
    );
}

/// Log a caller blocking on an SA held by another thread
pub fn log_checkout_wait(id: &SaId) {
    debug!(
        ike_spi_i = %spi_hex(id.initiator_spi()),
        ike_spi_r = %spi_r_hex(id),
        "IKE SA busy, waiting for checkin"
    );
}

/// Log checkout giving up after the configured timeout
pub fn log_checkout_timeout(id: &SaId, waited: Duration) {
    warn!(
        ike_spi_i = %spi_hex(id.initiator_spi()),
        ike_spi_r = %spi_r_hex(id),
        waited_ms = waited.as_millis() as u64,
        "Timed out waiting for IKE SA"
    );
}

/// Log a lookup that matched no SA
///
/// # Arguments
///
/// * `operation` - Manager operation that performed the lookup
/// * `id` - Identifier that was looked up
pub fn log_sa_not_found(operation: &str, id: &SaId) {
    debug!(
        operation = operation,
        ike_spi_i = %spi_hex(id.initiator_spi()),
        ike_spi_r = %spi_r_hex(id),
        role = id.role(),
        "No IKE SA matches identifier"
    );
}

/// Log checkin of an SA the registry cannot locate
pub fn log_checkin_not_found(id: &SaId) {
    error!(
        ike_spi_i = %spi_hex(id.initiator_spi()),
        ike_spi_r = %spi_r_hex(id),
        role = id.role(),
        "Checked in IKE SA not registered with this manager"
    );
}

/// Log removal of an SA from the registry
pub fn log_sa_deleted(id: &SaId) {
    info!(
        ike_spi_i = %spi_hex(id.initiator_spi()),
        ike_spi_r = %spi_r_hex(id),
        role = id.role(),
        "IKE SA deleted"
    );
}

/// Log teardown of an SA object
pub fn log_ike_sa_destroyed(id: &SaId, serial: u64, state: IkeState, age: Duration) {
    debug!(
        ike_spi_i = %spi_hex(id.initiator_spi()),
        ike_spi_r = %spi_r_hex(id),
        serial = serial,
        state = ?state,
        age_ms = age.as_millis() as u64,
        "IKE SA destroyed"
    );
}

/// Log SPI allocation
///
/// # Arguments
///
/// * `spi` - Allocated SPI
/// * `slot` - "initiator" or "responder"
pub fn log_spi_allocated(spi: u64, slot: &str) {
    trace!(spi = %spi_hex(spi), slot = slot, "SPI allocated");
}

/// Log a generated SPI that was already in use
pub fn log_spi_collision(spi: u64, attempt: u32) {
    warn!(
        spi = %spi_hex(spi),
        attempt = attempt,
        "Generated SPI already in use, retrying"
    );
}

/// Log a checkout guard released by drop instead of explicit checkin
pub fn log_guard_dropped(id: &SaId) {
    warn!(
        ike_spi_i = %spi_hex(id.initiator_spi()),
        ike_spi_r = %spi_r_hex(id),
        "IKE SA guard dropped without checkin, checking in"
    );
}

/// Log start of manager shutdown
///
/// # Arguments
///
/// * `entries` - Number of registered SAs
/// * `held` - Number of SAs currently checked out
pub fn log_shutdown_started(entries: usize, held: usize) {
    info!(
        entries = entries,
        held = held,
        "IKE SA manager shutting down, draining checked out SAs"
    );
}

/// Log completion of manager shutdown
pub fn log_shutdown_complete(destroyed: usize) {
    info!(destroyed = destroyed, "IKE SA manager destroyed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_functions() {
        // Only checks the helpers run; output needs a subscriber
        let half = SaId::half_open(0x0102030405060708, true);
        let full = SaId::new(0x0102030405060708, Some(0x1112131415161718), false);

        log_ike_state_transition(&full, IkeState::Idle, IkeState::InitDone);
        log_sa_registered(&half, "initiate");
        log_unsolicited_initiator_sa(&half);
        log_sa_checked_out(&full, true);
        log_sa_checked_in(&full);
        log_checkout_wait(&full);
        log_checkout_timeout(&full, Duration::from_millis(250));
        log_sa_not_found("checkout", &full);
        log_checkin_not_found(&half);
        log_sa_deleted(&full);
        log_ike_sa_destroyed(&full, 7, IkeState::Established, Duration::from_secs(3));
        log_spi_allocated(0xdead_beef, "responder");
        log_spi_collision(0xdead_beef, 2);
        log_guard_dropped(&full);
        log_shutdown_started(4, 1);
        log_shutdown_complete(4);
    }

    #[test]
    fn test_spi_hex() {
        assert_eq!(spi_hex(0x0102030405060708), "0102030405060708");
        assert_eq!(spi_r_hex(&SaId::half_open(1, true)), "0000000000000000");
    }
}
