use std::fmt;
use std::time::Duration;

/// Source of a random factor in `[0, 1]` scaling the spawn probability.
pub type RandomSource = Box<dyn FnMut() -> f64 + Send>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LootGenConfig {
    pub period: Duration,
    pub probability: f64,
}

/// Leaky-bucket loot spawner.
///
/// The longer a session goes without new loot, the likelier it is that loot appears,
/// but never more than one item per dog is outstanding.
pub struct LootGenerator {
    base_interval: Duration,
    probability: f64,
    time_without_loot: Duration,
    random: RandomSource,
}

impl LootGenerator {
    /// Creates a generator whose random factor is always 1, making spawns deterministic.
    pub fn new(config: LootGenConfig) -> Self {
        Self::with_random(config, Box::new(|| 1.0))
    }

    pub fn with_random(config: LootGenConfig, random: RandomSource) -> Self {
        Self {
            base_interval: config.period,
            probability: config.probability,
            time_without_loot: Duration::ZERO,
            random,
        }
    }

    /// Returns how many items to spawn after `time_delta` has passed.
    pub fn generate(&mut self, time_delta: Duration, loot_count: usize, looter_count: usize) -> usize {
        self.time_without_loot += time_delta;

        let loot_shortage = looter_count.saturating_sub(loot_count);
        let ratio = self.time_without_loot.as_secs_f64() / self.base_interval.as_secs_f64();
        let probability = ((1.0 - (1.0 - self.probability).powf(ratio)) * (self.random)())
            .clamp(0.0, 1.0);
        let generated = (loot_shortage as f64 * probability).round() as usize;

        if generated > 0 {
            self.time_without_loot = Duration::ZERO;
        }
        generated
    }
}

impl fmt::Debug for LootGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LootGenerator")
            .field("base_interval", &self.base_interval)
            .field("probability", &self.probability)
            .field("time_without_loot", &self.time_without_loot)
            .finish_non_exhaustive()
    }
}
