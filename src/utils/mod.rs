pub mod expiry;
pub mod identity;

pub use expiry::{compute_expiry, parse_time_zone, to_local};
pub use identity::{IdentityField, IdentityKey, IdentityResolver};
