use std::time::Duration;

use bitflags::bitflags;

bitflags! {
	/// Run-time trace gates. Only honored when the crate is built with the
	/// `trace` feature; without it every trace site compiles to nothing.
	#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
	pub struct TraceFlags: u32 {
		/// Log the update pipeline stages.
		const RUNTIME = 1;
		/// Log every call resolution.
		const CALLS = 2;
	}
}

/// Where the published hash factors live.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum HashPlacement {
	/// One table in the engine context.
	#[default]
	Global,
	/// The bucket table is replicated into each method record. Costs memory,
	/// keeps the factors on the same cache lines as the method's slots.
	PerMethod,
}

/// Engine configuration, fixed for the lifetime of an [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct Policy {
	/// Publish method tables behind one extra indirection so holders created
	/// before an `update` stay valid after it (cost: one extra load).
	pub indirect_method_pointers: bool,
	/// Validate hash lookups against a control array and method-table
	/// pointers against the pool range.
	pub runtime_checks: bool,
	pub trace: TraceFlags,
	pub hash_placement: HashPlacement,
	/// Seed of the deterministic multiplier sequence. Fix it to make pool
	/// contents reproducible across runs.
	pub hash_seed: u64,
	/// Multiplier draws per bucket-count before the table is widened.
	pub hash_attempt_budget: usize,
	/// Overall wall-clock budget of the hash search.
	pub hash_deadline: Duration,
}

impl Default for Policy {
	fn default() -> Self {
		Self {
			indirect_method_pointers: false,
			runtime_checks: cfg!(debug_assertions),
			trace: TraceFlags::empty(),
			hash_placement: HashPlacement::default(),
			hash_seed: 0x79E1_5E75,
			hash_attempt_budget: 100_000,
			hash_deadline: Duration::from_secs(2),
		}
	}
}

impl Policy {
	/// Default policy with the indirection layer enabled.
	pub fn indirect() -> Self {
		Self { indirect_method_pointers: true, ..Self::default() }
	}

	pub fn with_seed(mut self, seed: u64) -> Self {
		self.hash_seed = seed;
		self
	}

	pub fn with_runtime_checks(mut self, enabled: bool) -> Self {
		self.runtime_checks = enabled;
		self
	}
}
