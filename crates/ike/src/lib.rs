//! IKE SA management for the keyward key-negotiation daemon.
//!
//! Worker threads process IKEv2 messages in parallel, but a single IKE SA
//! must only ever be touched by one of them at a time. This crate keeps the
//! registry of live IKE SAs and brokers exclusive access to them:
//!
//! - **Identifiers** ([`SaId`]) - initiator SPI, responder SPI (learned
//!   during IKE_SA_INIT) and the local role
//! - **Checkout/checkin** ([`IkeSaManager`]) - blocking exclusive leases with
//!   create-on-demand for fresh IKE_SA_INIT requests
//! - **Deletion and shutdown** - deletion that never races a holder, and a
//!   shutdown that drains every holder before destroying state
//!
//! # Architecture
//!
//! ```text
//! message dispatch (UDP 500/4500)
//!   └── SaId from IKE header
//!        ↓
//! IkeSaManager
//!   ├── registry table (entries bucketed by initiator SPI + role)
//!   ├── per-entry condition variables (waiters)
//!   └── SPI allocation (random, collision checked)
//!        ↓
//! CheckedOut<H> guard ── exclusive &mut access to the IKE SA object
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use keyward_ike::{IkeSa, IkeSaManager, IkeState, ManagerConfig};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ManagerConfig::builder()
//!     .with_checkout_timeout(Duration::from_secs(10))
//!     .build()?;
//! let manager: IkeSaManager<IkeSa> = IkeSaManager::new(config, IkeSa::create)?;
//!
//! // Initiate a new IKE SA
//! let mut sa = manager.create_and_checkout()?;
//! sa.transition(IkeState::InitSent)?;
//! let mut id = sa.id();
//! sa.checkin()?;
//!
//! // IKE_SA_INIT response arrives with the peer's responder SPI
//! id.set_responder_spi(0x5555_6666_7777_8888)?;
//! let mut sa = manager.checkout(&mut id)?;
//! sa.set_responder_spi(0x5555_6666_7777_8888)?;
//! sa.transition(IkeState::InitDone)?;
//! sa.checkin()?;
//!
//! manager.destroy();
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - [RFC 7296](https://datatracker.ietf.org/doc/html/rfc7296) - IKEv2 Protocol

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod metrics;
pub mod sa;

// Re-export commonly used types
pub use config::ManagerConfig;
pub use error::{Error, Result};
pub use manager::{CheckedOut, CheckoutStatus, IkeSaManager, SaManager};
pub use sa::{IkeSa, IkeState, SaFactory, SaHandle, SaId};
