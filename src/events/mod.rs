//! Event handlers: the private-chat flood gate and chat boost tracking.

pub mod antiflood;
pub mod boost;

pub use antiflood::{FloodGuard, flood_gate};
