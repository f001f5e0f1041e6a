use std::hash::Hasher;

/// FNV-1a 64-bit, primed with a run seed so each label hashes to the seed of
/// its own RNG stream.
///
/// `DefaultHasher` is randomized per process, so it cannot key streams that
/// must reproduce across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSeeder {
    state: u64,
}

impl StreamSeeder {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    /// Keeps `(seed, "ab")` apart from a seed whose bytes end in `a`.
    const LABEL_SEPARATOR: u8 = 0xff;

    pub fn for_run(seed: u64) -> Self {
        let mut seeder = Self {
            state: Self::OFFSET_BASIS,
        };
        seeder.write(&seed.to_le_bytes());
        seeder.write(&[Self::LABEL_SEPARATOR]);
        seeder
    }

    /// Seed for the stream named `label`. The primed state is left untouched.
    pub fn stream_seed(self, label: &str) -> u64 {
        let mut hasher = self;
        hasher.write(label.as_bytes());
        hasher.finish()
    }
}

impl Hasher for StreamSeeder {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u64;
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }
}
