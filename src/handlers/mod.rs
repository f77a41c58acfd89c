pub mod campaign;
pub mod participation;

pub use campaign::campaign_config;
pub use participation::participation_config;
