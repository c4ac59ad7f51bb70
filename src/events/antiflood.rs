//! Private-chat flood guard.
//!
//! Two TTL windows per user (commands and everything else). A message that
//! lands in a live window first earns a warning, then a block. Blocks double
//! per repeat offence up to an hour, and the offence level decays after an
//! hour without blocks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use teloxide::prelude::*;
use tracing::{debug, info, warn};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::cache::{CacheConfig, TypedCache};
use crate::config::ThrottleConfig;
use crate::database::Language;
use crate::i18n::t;

/// Longest block a repeat offender can get.
const MAX_BLOCK: Duration = Duration::from_secs(3600);
/// Quiet time after which the offence level resets.
const ESCALATION_DECAY: Duration = Duration::from_secs(3600);

/// Which window a message is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThrottleKey {
    /// Bot commands.
    Fast,
    /// Everything else.
    Default,
}

impl ThrottleKey {
    pub fn for_text(text: Option<&str>) -> Self {
        match text {
            Some(t) if t.starts_with('/') => Self::Fast,
            _ => Self::Default,
        }
    }
}

/// Decision for one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodVerdict {
    Pass,
    Warn,
    Block(Duration),
    Blocked,
}

#[derive(Debug, Clone, Copy)]
struct Escalation {
    level: u32,
    last_block: Instant,
}

/// In-memory throttle state, cheap to clone.
#[derive(Clone)]
pub struct FloodGuard {
    fast: TypedCache<u64, ()>,
    default: TypedCache<u64, ()>,
    warned: Arc<DashMap<u64, ()>>,
    /// user -> blocked until
    blocks: Arc<DashMap<u64, Instant>>,
    escalation: Arc<DashMap<u64, Escalation>>,
    base_block: Duration,
}

impl FloodGuard {
    pub fn new(config: &ThrottleConfig) -> Self {
        Self {
            fast: TypedCache::new("throttle_fast", CacheConfig::throttle_window(config.fast_window)),
            default: TypedCache::new(
                "throttle_default",
                CacheConfig::throttle_window(config.default_window),
            ),
            warned: Arc::new(DashMap::new()),
            blocks: Arc::new(DashMap::new()),
            escalation: Arc::new(DashMap::new()),
            base_block: config.base_block,
        }
    }

    pub fn check(&self, user_id: u64, key: ThrottleKey) -> FloodVerdict {
        self.check_at(user_id, key, Instant::now())
    }

    /// Same as `check`, with an explicit clock for block bookkeeping.
    pub fn check_at(&self, user_id: u64, key: ThrottleKey, now: Instant) -> FloodVerdict {
        let until = self.blocks.get(&user_id).map(|entry| *entry);
        if let Some(until) = until {
            if now < until {
                return FloodVerdict::Blocked;
            }
            // Expired but never released.
            self.release(user_id);
        }

        let window = self.window(key);
        if !window.contains(&user_id) {
            window.insert(user_id, ());
            return FloodVerdict::Pass;
        }

        if self.warned.insert(user_id, ()).is_none() {
            return FloodVerdict::Warn;
        }

        let duration = self.next_block(user_id, now);
        self.blocks.insert(user_id, now + duration);
        window.invalidate(&user_id);
        window.insert(user_id, ());

        FloodVerdict::Block(duration)
    }

    /// Lift the block and the warning state.
    pub fn release(&self, user_id: u64) {
        self.blocks.remove(&user_id);
        self.warned.remove(&user_id);
    }

    /// Keep the block for `duration`, then lift it.
    pub async fn hold(&self, user_id: u64, duration: Duration) {
        tokio::time::sleep(duration).await;
        self.release(user_id);
        debug!("Released flood block for user {}", user_id);
    }

    fn window(&self, key: ThrottleKey) -> &TypedCache<u64, ()> {
        match key {
            ThrottleKey::Fast => &self.fast,
            ThrottleKey::Default => &self.default,
        }
    }

    fn next_block(&self, user_id: u64, now: Instant) -> Duration {
        let mut entry = self.escalation.entry(user_id).or_insert(Escalation {
            level: 0,
            last_block: now,
        });

        if now.saturating_duration_since(entry.last_block) >= ESCALATION_DECAY {
            entry.level = 0;
        }

        let factor = 2u32.saturating_pow(entry.level + 1);
        let duration = self.base_block.saturating_mul(factor).min(MAX_BLOCK);

        entry.level = (entry.level + 1).min(16);
        entry.last_block = now;
        duration
    }
}

/// Gate for private messages. Returns `false` when the update must be dropped.
pub async fn flood_gate(bot: ThrottledBot, msg: Message, guard: FloodGuard, state: AppState) -> bool {
    let Some(user) = msg.from.as_ref() else {
        return true;
    };

    // Admins are never throttled.
    if state.is_admin(user.id.0) {
        return true;
    }

    let user_id = user.id.0;
    let verdict = guard.check(user_id, ThrottleKey::for_text(msg.text()));
    if verdict == FloodVerdict::Pass {
        return true;
    }

    let lang = state.user_language(user_id).await.unwrap_or(Language::Ru);
    let notice = match verdict {
        FloodVerdict::Pass => return true,
        FloodVerdict::Warn => {
            debug!("Flood warning for user {}", user_id);
            t(lang, "flood.warning", &[])
        }
        FloodVerdict::Blocked => t(lang, "flood.still_blocked", &[]),
        FloodVerdict::Block(duration) => {
            info!("Blocking user {} for {:?}", user_id, duration);
            t(lang, "flood.blocked", &[("seconds", &duration.as_secs().to_string())])
        }
    };

    if let Err(e) = bot.send_message(msg.chat.id, notice).await {
        warn!("Failed to send flood notice to {}: {}", user_id, e);
    }

    // The offending update stays suspended until the block is over.
    if let FloodVerdict::Block(duration) = verdict {
        guard.hold(user_id, duration).await;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> FloodGuard {
        FloodGuard::new(&ThrottleConfig::default())
    }

    #[test]
    fn pass_warn_block_then_blocked() {
        let guard = guard();
        let now = Instant::now();

        assert_eq!(guard.check_at(1, ThrottleKey::Default, now), FloodVerdict::Pass);
        assert_eq!(guard.check_at(1, ThrottleKey::Default, now), FloodVerdict::Warn);
        assert_eq!(
            guard.check_at(1, ThrottleKey::Default, now),
            FloodVerdict::Block(Duration::from_secs(20))
        );
        assert_eq!(guard.check_at(1, ThrottleKey::Default, now), FloodVerdict::Blocked);
    }

    #[test]
    fn users_and_windows_are_independent() {
        let guard = guard();
        let now = Instant::now();

        assert_eq!(guard.check_at(1, ThrottleKey::Default, now), FloodVerdict::Pass);
        assert_eq!(guard.check_at(2, ThrottleKey::Default, now), FloodVerdict::Pass);
        assert_eq!(guard.check_at(1, ThrottleKey::Fast, now), FloodVerdict::Pass);
    }

    #[test]
    fn expired_block_is_ignored_without_release() {
        let guard = guard();
        let now = Instant::now();
        for _ in 0..3 {
            guard.check_at(1, ThrottleKey::Default, now);
        }

        let later = now + Duration::from_secs(21);
        assert_ne!(guard.check_at(1, ThrottleKey::Default, later), FloodVerdict::Blocked);
    }

    /// Release, then flood until the next block verdict.
    fn next_block_at(guard: &FloodGuard, at: Instant) -> Option<FloodVerdict> {
        guard.release(1);
        (0..3)
            .map(|_| guard.check_at(1, ThrottleKey::Default, at))
            .find(|v| matches!(v, FloodVerdict::Block(_)))
    }

    #[test]
    fn repeat_offenders_escalate_and_decay() {
        let guard = guard();
        let start = Instant::now();
        let secs = |s| Some(FloodVerdict::Block(Duration::from_secs(s)));

        assert_eq!(next_block_at(&guard, start), secs(20));
        let second = start + Duration::from_secs(30);
        assert_eq!(next_block_at(&guard, second), secs(40));
        let third = second + Duration::from_secs(60);
        assert_eq!(next_block_at(&guard, third), secs(80));

        let quiet = third + ESCALATION_DECAY;
        assert_eq!(next_block_at(&guard, quiet), secs(20));
    }

    #[test]
    fn block_duration_is_capped() {
        let guard = guard();
        let mut at = Instant::now();
        let mut last = None;
        for _ in 0..12 {
            last = next_block_at(&guard, at);
            at += Duration::from_secs(1);
        }
        assert_eq!(last, Some(FloodVerdict::Block(MAX_BLOCK)));
    }

    #[test]
    fn window_expiry_passes_again() {
        let guard = FloodGuard::new(&ThrottleConfig {
            default_window: Duration::from_millis(50),
            ..ThrottleConfig::default()
        });

        assert_eq!(guard.check(1, ThrottleKey::Default), FloodVerdict::Pass);
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(guard.check(1, ThrottleKey::Default), FloodVerdict::Pass);
    }

    #[tokio::test(start_paused = true)]
    async fn hold_lifts_block_after_duration() {
        let guard = guard();
        let verdicts: Vec<_> = (0..3).map(|_| guard.check(1, ThrottleKey::Default)).collect();
        let FloodVerdict::Block(duration) = verdicts[2] else {
            panic!("third message was not blocked: {:?}", verdicts);
        };

        let held = tokio::spawn({
            let guard = guard.clone();
            async move { guard.hold(1, duration).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(guard.check(1, ThrottleKey::Default), FloodVerdict::Blocked);

        held.await.unwrap();
        assert_ne!(guard.check(1, ThrottleKey::Default), FloodVerdict::Blocked);
    }

    #[test]
    fn commands_use_fast_window() {
        assert_eq!(ThrottleKey::for_text(Some("/start abc")), ThrottleKey::Fast);
        assert_eq!(ThrottleKey::for_text(Some("hello")), ThrottleKey::Default);
        assert_eq!(ThrottleKey::for_text(None), ThrottleKey::Default);
    }
}
