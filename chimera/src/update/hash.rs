use std::time::Instant;

use crate::context::HashFactors;
use crate::error::UpdateError;
use crate::key::ClassKey;
use crate::policy::Policy;
use crate::utilities::SplitMix64;

/// Bucket counts double at most this many times before the search gives up;
/// the policy deadline usually fires first.
const MAX_WIDENINGS: usize = 12;

pub(crate) struct HashSolution {
	pub factors: HashFactors,
	pub buckets: usize,
}

impl HashSolution {
	fn trivial() -> Self {
		Self {
			factors: HashFactors { mult: 0, shift: usize::BITS - 1 },
			buckets: 0,
		}
	}
}

/// Finds `(mult, shift)` such that `(mult * key) >> shift` is injective over
/// the live keys, drawing odd multipliers from a seeded deterministic
/// sequence.
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub(crate) fn search(keys: &[ClassKey], policy: &Policy) -> Result<HashSolution, UpdateError> {
	if keys.is_empty() {
		return Ok(HashSolution::trivial());
	}

	let started = Instant::now();
	let mut rng = SplitMix64(policy.hash_seed);
	let mut attempts = 0usize;

	// Initial bucket count: next power of two past 1.5x the key count.
	let mut buckets = (keys.len() + keys.len() / 2).next_power_of_two().max(2);
	let budget = policy.hash_attempt_budget.min(u32::MAX as usize - 1) as u32;
	let mut stamps: Vec<u32> = Vec::new();

	for _ in 0..MAX_WIDENINGS {
		let shift = usize::BITS - buckets.trailing_zeros();
		stamps.clear();
		stamps.resize(buckets, u32::MAX);

		for stamp in 0..budget {
			if started.elapsed() >= policy.hash_deadline {
				return Err(UpdateError::HashSearch {
					attempts,
					duration: started.elapsed(),
					buckets,
				});
			}

			attempts += 1;
			let factors = HashFactors { mult: rng.next() as usize | 1, shift };

			let mut injective = true;
			for key in keys {
				let index = factors.apply(*key);
				if stamps[index] == stamp {
					injective = false;
					break;
				}
				stamps[index] = stamp;
			}

			if injective {
				return Ok(HashSolution { factors, buckets });
			}
		}

		buckets <<= 1;
	}

	Err(UpdateError::HashSearch {
		attempts,
		duration: started.elapsed(),
		buckets: buckets >> 1,
	})
}
