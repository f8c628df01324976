//! Key and value generation for the hot loop.
//!
//! Each worker owns one generator; the only state carried across calls is
//! the per-worker counter (and the RNG for the random mode).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::KeyMode;

/// Per-worker key source.
#[derive(Debug)]
pub enum KeyGenerator {
    Fixed {
        worker_id: usize,
        counter: u64,
    },
    Random {
        keyspace: u64,
        offset: u64,
        rng: StdRng,
    },
    Sequential {
        keyspace: u64,
        offset: u64,
        counter: u64,
    },
}

impl KeyGenerator {
    pub fn new(mode: KeyMode, worker_id: usize) -> KeyGenerator {
        match mode {
            KeyMode::FixedPerWorker => KeyGenerator::Fixed {
                worker_id,
                counter: 0,
            },
            KeyMode::Random { keyspace, offset } => KeyGenerator::Random {
                keyspace,
                offset,
                rng: StdRng::from_os_rng(),
            },
            KeyMode::Sequential {
                keyspace,
                offset,
                random_start,
            } => {
                let counter = if random_start {
                    rand::rng().random_range(0..keyspace)
                } else {
                    0
                };
                KeyGenerator::Sequential {
                    keyspace,
                    offset,
                    counter,
                }
            }
        }
    }

    pub fn next_key(&mut self) -> String {
        match self {
            KeyGenerator::Fixed { worker_id, counter } => {
                let key = format!("key:{worker_id}:{counter}");
                *counter += 1;
                key
            }
            KeyGenerator::Random {
                keyspace,
                offset,
                rng,
            } => {
                let n = *offset + rng.random_range(0..*keyspace);
                format!("key:{n}")
            }
            KeyGenerator::Sequential {
                keyspace,
                offset,
                counter,
            } => {
                let key = format!("key:{}", (*counter % *keyspace) + *offset);
                *counter += 1;
                key
            }
        }
    }
}

/// Seeded linear-congruential generator (MMIX constants) used to fill
/// value buffers without touching the thread RNG in the hot path.
#[derive(Debug, Clone)]
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Lcg {
        Lcg { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }
}

/// Build a value buffer of `size` uppercase-alphabet bytes. The buffer is
/// generated once per worker and reused across calls.
pub fn value_buffer(size: usize, seed: u64) -> Vec<u8> {
    let mut lcg = Lcg::new(seed);
    (0..size).map(|_| b'A' + (lcg.next() >> 33) as u8 % 26).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_keys_carry_worker_and_counter() {
        let mut generator = KeyGenerator::new(KeyMode::FixedPerWorker, 3);
        assert_eq!(generator.next_key(), "key:3:0");
        assert_eq!(generator.next_key(), "key:3:1");
        assert_eq!(generator.next_key(), "key:3:2");
    }

    #[test]
    fn sequential_keys_wrap_modulo_keyspace() {
        let mut generator = KeyGenerator::new(
            KeyMode::Sequential {
                keyspace: 3,
                offset: 10,
                random_start: false,
            },
            0,
        );
        let keys: Vec<String> = (0..5).map(|_| generator.next_key()).collect();
        assert_eq!(keys, ["key:10", "key:11", "key:12", "key:10", "key:11"]);
    }

    #[test]
    fn sequential_random_start_stays_in_keyspace() {
        for _ in 0..20 {
            let mut generator = KeyGenerator::new(
                KeyMode::Sequential {
                    keyspace: 8,
                    offset: 100,
                    random_start: true,
                },
                0,
            );
            let key = generator.next_key();
            let n: u64 = key.strip_prefix("key:").unwrap().parse().unwrap();
            assert!((100..108).contains(&n), "{key} outside keyspace");
        }
    }

    #[test]
    fn random_keys_respect_offset_and_bound() {
        let mut generator = KeyGenerator::new(
            KeyMode::Random {
                keyspace: 16,
                offset: 1000,
            },
            0,
        );
        for _ in 0..200 {
            let key = generator.next_key();
            let n: u64 = key.strip_prefix("key:").unwrap().parse().unwrap();
            assert!((1000..1016).contains(&n), "{key} outside keyspace");
        }
    }

    #[test]
    fn value_buffer_is_uppercase_and_deterministic() {
        let a = value_buffer(64, 7);
        let b = value_buffer(64, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.iter().all(|b| b.is_ascii_uppercase()));
        assert_ne!(value_buffer(64, 8), a);
    }
}
