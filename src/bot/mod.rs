//! Bot module - Core bot functionality.

pub mod dispatcher;
mod runtime;
pub mod update;
mod webhook;

pub use dispatcher::{AppState, ThrottledBot, build_dispatcher};
pub use runtime::run;
pub use update::Incoming;
