//! Cache module - typed Moka caches.
//!
//! Repositories keep hot rows here (user profiles), and the flood guard uses
//! TTL caches as its sliding windows: an entry that is still alive means the
//! user acted within the window.
//!
//! ```ignore
//! let window: TypedCache<u64, ()> =
//!     TypedCache::new("throttle_default", CacheConfig::throttle_window(Duration::from_secs(2)));
//! window.insert(user_id, ());
//! assert!(window.contains(&user_id));
//! ```

mod config;
mod typed;

pub use config::CacheConfig;
pub use typed::TypedCache;
