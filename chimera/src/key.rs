use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};

/// Stable identity of a registered class.
///
/// Keys are opaque pointer-sized tokens; the engine only ever compares,
/// hashes, and multiplies them. Any process-unique value works: the address
/// of a per-type static (see [`KeyAnchor`]), a pointer to reflection data, an
/// interned id.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct ClassKey(usize);

impl ClassKey {
	#[inline]
	pub const fn new(raw: usize) -> Self {
		Self(raw)
	}

	#[inline]
	pub const fn raw(self) -> usize {
		self.0
	}
}

impl Hash for ClassKey {
	#[inline]
	fn hash<H: Hasher>(&self, state: &mut H) {
		state.write_usize(self.0);
	}
}

impl nohash_hasher::IsEnabled for ClassKey {}

impl Debug for ClassKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "ClassKey({:#x})", self.0)
	}
}

/// Yields a process-unique [`ClassKey`] from its own address.
///
/// Declare one `static` anchor per class and share it between registration
/// and the [`ClassIdent`] impl of the class.
#[repr(transparent)]
pub struct KeyAnchor(u8);

impl KeyAnchor {
	pub const fn new() -> Self {
		Self(0)
	}

	#[inline]
	pub fn key(&'static self) -> ClassKey {
		ClassKey(self as *const Self as usize)
	}
}

impl Default for KeyAnchor {
	fn default() -> Self {
		Self::new()
	}
}

/// Dynamic class identity of a value.
///
/// The returned key must be the key the value's *concrete* class was
/// registered under, not the key of the static type of the reference; this
/// is the analogue of reading a vtable pointer.
pub trait ClassIdent {
	fn class_key(&self) -> ClassKey;
}
