//! Repository module - decentralized data access layer.

mod boost_repository;
mod campaign_repository;
mod delivery_repository;
mod settings_repository;
mod subscription_repository;

pub use boost_repository::BoostRepository;
pub use campaign_repository::CampaignRepository;
pub use delivery_repository::DeliveryRepository;
pub use settings_repository::SettingsRepository;
pub use subscription_repository::SubscriptionRepository;
