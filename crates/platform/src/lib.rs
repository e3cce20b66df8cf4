//! # Keyward Platform
//!
//! Types shared by every component of the keyward key-negotiation daemon.
//!
//! This crate provides:
//! - A daemon-wide error type (`PlatformError`, `PlatformResult`)
//! - The `SecurityModule` lifecycle trait that components implement so the
//!   daemon can initialize and shut them down uniformly
//!
//! # Examples
//!
//! ```
//! use keyward_platform::{PlatformError, PlatformResult};
//!
//! fn load_policy(name: &str) -> PlatformResult<String> {
//!     if name.is_empty() {
//!         return Err(PlatformError::Config("empty policy name".to_string()));
//!     }
//!     Ok(format!("policy:{}", name))
//! }
//!
//! # fn main() -> PlatformResult<()> {
//! assert_eq!(load_policy("road-warrior")?, "policy:road-warrior");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod error;
pub mod traits;

pub use error::{PlatformError, PlatformResult};
pub use traits::SecurityModule;

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
