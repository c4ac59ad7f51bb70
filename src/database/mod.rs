//! Database module exports.

mod models;
mod mongo;
mod repository;
mod users;

pub use models::*;
pub use mongo::Database;
pub use repository::{
    BoostRepository, CampaignRepository, DeliveryRepository, SettingsRepository,
    SubscriptionRepository,
};
pub use users::{UserRepo, UserStatistics};
