pub mod campaign_service;
pub mod participation_guard;
pub mod participation_service;

pub use campaign_service::*;
pub use participation_service::*;
