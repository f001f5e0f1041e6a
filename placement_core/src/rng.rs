//! Label-keyed random streams.
//!
//! Every draw names the stream it comes from. Each label owns an independent
//! `ChaCha8Rng` seeded from `(run seed, label)`, so reordering stages or grid
//! sweeps only changes the draws of the streams involved.

use std::collections::HashMap;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::hashing::StreamSeeder;

#[derive(Debug, Clone)]
pub struct LabelRng {
    seed: u64,
    seeder: StreamSeeder,
    streams: HashMap<String, ChaCha8Rng>,
}

impl LabelRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            seeder: StreamSeeder::for_run(seed),
            streams: HashMap::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw a value in `[0, max)` from the stream named `label`.
    ///
    /// A `max` of zero yields zero without advancing the stream.
    pub fn roll(&mut self, label: &str, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.stream(label).gen_range(0..max)
    }

    /// Roll a percentage; succeeds when the draw is below `chance`.
    pub fn roll_percent(&mut self, label: &str, chance: u32) -> bool {
        if chance == 0 {
            return false;
        }
        self.roll(label, 100) < chance
    }

    fn stream(&mut self, label: &str) -> &mut ChaCha8Rng {
        let seeder = self.seeder;
        self.streams
            .entry(label.to_string())
            .or_insert_with(|| ChaCha8Rng::seed_from_u64(seeder.stream_seed(label)))
    }
}
