pub mod campaign_prizes;
pub mod campaigns;
pub mod participations;

pub use campaign_prizes as campaign_prize_entity;
pub use campaigns as campaign_entity;
pub use participations as participation_entity;
