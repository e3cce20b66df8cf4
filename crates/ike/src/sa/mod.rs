//! IKE SA identifiers and the objects the manager stores

mod handle;
mod id;
mod ike_sa;

pub use handle::{SaFactory, SaHandle};
pub use id::SaId;
pub use ike_sa::{IkeSa, IkeState};
