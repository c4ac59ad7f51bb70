//! Adaptive delay between campaign sends.

use std::time::Duration;

/// Halves on success, doubles on rate limit, always within `[min, max]`.
#[derive(Debug, Clone)]
pub struct Pacer {
    delay: Duration,
    min: Duration,
    max: Duration,
}

impl Pacer {
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self { delay: min, min, max }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn on_success(&mut self) {
        self.delay = (self.delay / 2).max(self.min);
    }

    pub fn on_rate_limit(&mut self) {
        self.delay = (self.delay * 2).min(self.max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn starts_at_floor_and_stays_clamped() {
        let mut pacer = Pacer::new(ms(50), ms(1000));
        assert_eq!(pacer.delay(), ms(50));

        pacer.on_success();
        assert_eq!(pacer.delay(), ms(50));

        for _ in 0..10 {
            pacer.on_rate_limit();
        }
        assert_eq!(pacer.delay(), ms(1000));
    }

    #[test]
    fn doubles_then_halves() {
        let mut pacer = Pacer::new(ms(50), ms(1000));
        pacer.on_rate_limit();
        pacer.on_rate_limit();
        assert_eq!(pacer.delay(), ms(200));
        pacer.on_success();
        assert_eq!(pacer.delay(), ms(100));
    }

    #[test]
    fn inverted_bounds_collapse_to_min() {
        let mut pacer = Pacer::new(ms(500), ms(100));
        pacer.on_rate_limit();
        assert_eq!(pacer.delay(), ms(500));
    }
}
