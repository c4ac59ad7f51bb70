//! Domain services: the task engine and the referral flow.
//!
//! Both depend on storage and Telegram only through the `Ledger` and
//! `MembershipChecker` traits.

mod ledger;
mod membership;
mod referral;
mod tasks;

pub use ledger::Ledger;
pub use membership::{MembershipChecker, TelegramMembership};
pub use referral::ReferralService;
pub use tasks::{INVITE_THRESHOLD, TaskEngine, TaskOutcome, TaskRules};
