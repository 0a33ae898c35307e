use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use derivative::Derivative;

use crate::catalog::MethodId;
use crate::error::{report_call_error, DispatchError, UnknownClassContext};
use crate::key::ClassKey;
use crate::word::Word;

/// Per-class method-table slot.
///
/// Holders may read it on every call (indirect mode) or snapshot it once
/// (direct mode). The emitter rewrites it with a single release store per
/// class, which keeps indirect holders valid across `update`.
#[derive(Debug)]
pub struct MtabCell {
	ptr: AtomicPtr<Word>,
}

impl MtabCell {
	pub fn new() -> Arc<Self> {
		Arc::new(Self { ptr: AtomicPtr::new(std::ptr::null_mut()) })
	}

	#[inline]
	pub fn load(&self) -> *const Word {
		self.ptr.load(Ordering::Acquire)
	}

	pub(crate) fn store(&self, mtab: *const Word) {
		self.ptr.store(mtab as *mut Word, Ordering::Release);
	}
}

/// The published perfect-hash factors: `h(key) = (mult * key) >> shift`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HashFactors {
	pub mult: usize,
	pub shift: u32,
}

impl HashFactors {
	#[inline]
	pub fn apply(&self, key: ClassKey) -> usize {
		self.mult.wrapping_mul(key.raw()) >> self.shift
	}
}

/// Hash factors plus the bucket arrays they index.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct HashTable {
	pub(crate) factors: HashFactors,
	/// `h(key)` -> method table of the class registered under `key`.
	#[derivative(Debug = "ignore")]
	pub(crate) buckets: Box<[*const Word]>,
	/// Parallel key array used by runtime checks. Empty buckets keep the
	/// zero key, which no registered class may use when checks are on.
	#[derivative(Debug = "ignore")]
	pub(crate) control: Box<[ClassKey]>,
}

impl HashTable {
	pub(crate) fn empty() -> Self {
		Self {
			factors: HashFactors { mult: 0, shift: usize::BITS - 1 },
			buckets: Box::new([]),
			control: Box::new([]),
		}
	}

	pub fn factors(&self) -> HashFactors {
		self.factors
	}

	pub fn buckets(&self) -> usize {
		self.buckets.len()
	}
}

/// State published by the last successful `update`.
///
/// Everything here is immutable until the next `update`, which replaces the
/// whole value; call sites read it without synchronization.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Context {
	#[derivative(Debug = "ignore")]
	pub(crate) pool: Box<[Word]>,
	pub(crate) hash: HashTable,
	/// Per-method hash replicas, indexed by method id. Populated only under
	/// `HashPlacement::PerMethod`.
	#[derivative(Debug = "ignore")]
	pub(crate) method_hash: Box<[Option<HashTable>]>,
	/// `h(key)` -> the class's published cell, for building indirect holders.
	#[derivative(Debug = "ignore")]
	pub(crate) cells: Box<[Option<Arc<MtabCell>>]>,
	pub(crate) runtime_checks: bool,
	pub(crate) trace: crate::policy::TraceFlags,
}

// The pool and the pointers into it are only written inside `update`, which
// holds the engine exclusively; shared readers see a frozen value.
unsafe impl Send for Context {}
unsafe impl Sync for Context {}

impl Context {
	pub(crate) fn empty() -> Self {
		Self {
			pool: Box::new([]),
			hash: HashTable::empty(),
			method_hash: Box::new([]),
			cells: Box::new([]),
			runtime_checks: false,
			trace: crate::policy::TraceFlags::empty(),
		}
	}

	/// Looks up the method table of a class identity through a hash table.
	///
	/// With runtime checks enabled an unregistered key is reported as
	/// `UnknownClass`; without them the returned pointer is null and any
	/// later dereference is the caller's contract violation.
	#[inline]
	pub fn mtab_in(&self, hash: &HashTable, key: ClassKey) -> *const Word {
		let index = hash.factors.apply(key);

		if self.runtime_checks {
			match hash.control.get(index) {
				Some(control) if *control == key => {},
				_ => report_call_error(DispatchError::UnknownClass {
					context: UnknownClassContext::Call,
					key,
				}),
			}
		}

		match hash.buckets.get(index) {
			Some(mtab) => *mtab,
			None => std::ptr::null(),
		}
	}

	/// Perfect-hash lookup through the global table.
	#[inline]
	pub fn mtab_of(&self, key: ClassKey) -> *const Word {
		self.mtab_in(&self.hash, key)
	}

	/// Hash table a given method dispatches through.
	#[inline]
	pub fn method_hash(&self, method: MethodId) -> &HashTable {
		match self.method_hash.get(method.0 as usize) {
			Some(Some(hash)) => hash,
			_ => &self.hash,
		}
	}

	/// The published cell of a class, for indirect holders.
	pub fn mtab_cell_of(&self, key: ClassKey) -> Option<Arc<MtabCell>> {
		let index = self.hash.factors.apply(key);
		match self.hash.control.get(index) {
			Some(control) if *control == key => self.cells.get(index)?.clone(),
			_ => None,
		}
	}

	#[inline]
	pub fn pool_contains(&self, ptr: *const Word) -> bool {
		let start = self.pool.as_ptr();
		let end = unsafe { start.add(self.pool.len()) };
		ptr >= start && ptr < end
	}

	pub fn pool_words(&self) -> &[Word] {
		&self.pool
	}

	#[inline]
	pub fn hash_factors(&self) -> HashFactors {
		self.hash.factors
	}

	/// Bucket count of the published hash table; grows only with the live
	/// key count.
	#[inline]
	pub fn hash_buckets(&self) -> usize {
		self.hash.buckets.len()
	}

	/// Cross-checks a holder-carried method-table pointer, when runtime
	/// checks are enabled.
	#[inline]
	pub fn check_method_pointer(&self, mtab: *const Word, key: ClassKey) -> *const Word {
		if self.runtime_checks {
			if self.pool.is_empty() && mtab.is_null() {
				// No methods were declared; nothing to validate against.
				return mtab;
			}

			if !self.pool_contains(mtab) {
				report_call_error(DispatchError::MethodTable { key });
			}

			let index = self.hash.factors.apply(key);
			match self.hash.buckets.get(index) {
				Some(expected) if *expected == mtab => {},
				_ => report_call_error(DispatchError::MethodTable { key }),
			}
		}

		mtab
	}
}
