//! Broadcast pipeline.
//!
//! Confirmed campaigns go onto an mpsc queue drained by a small pool of
//! worker tasks, so update handling never waits on a fan-out. Each worker
//! walks the audience with an adaptive delay and records every recipient's
//! outcome in the `messages` collection.

mod pacer;
mod sender;
mod store;
mod worker;

pub use pacer::Pacer;
pub use sender::{BroadcastSender, SendError, TelegramSender};
pub use store::DeliveryStore;
pub use worker::{BroadcastContext, BroadcastQueue};
