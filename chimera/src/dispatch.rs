use std::marker::PhantomData;
use std::sync::Arc;

use paste::paste;

use crate::catalog::{MethodId, SlotsStrides};
use crate::context::{Context, HashTable, MtabCell};
use crate::engine::Engine;
use crate::key::{ClassIdent, ClassKey};
use crate::trace::call_trace;
use crate::word::{EntryPoint, Word};

/// A virtual argument at a call site: anything that can produce the method
/// table of its dynamic class.
///
/// Three shapes funnel into the same table arithmetic: plain references
/// (perfect-hash lookup through [`ClassIdent`]), [`VirtualRef`] holders
/// (pointer carried next to the reference), and intrusive objects that
/// implement this trait themselves over an embedded cell.
pub trait Receiver {
	fn key(&self) -> ClassKey;

	#[inline]
	fn mtab(&self, ctx: &Context, hash: &HashTable) -> *const Word {
		ctx.mtab_in(hash, self.key())
	}
}

impl<T: ClassIdent + ?Sized> Receiver for &T {
	#[inline]
	fn key(&self) -> ClassKey {
		self.class_key()
	}
}

enum Holder {
	/// Snapshot of the method table. Invalidated by `update`; the direct
	/// policy forbids updating while such holders live.
	Direct(*const Word),
	/// The class's published cell; follows `update` transparently.
	Indirect(Arc<MtabCell>),
}

/// Fat pointer: a reference paired with its class's method-table location.
///
/// Resolution through a holder skips the hash multiply entirely.
pub struct VirtualRef<'l, T: ?Sized> {
	object: &'l T,
	key: ClassKey,
	holder: Holder,
}

// Safe to share for the same reason `&T` is: the pointer targets the
// engine-owned pool and is only dereferenced for reads.
unsafe impl<T: Sync + ?Sized> Sync for VirtualRef<'_, T> {}
unsafe impl<T: Sync + ?Sized> Send for VirtualRef<'_, T> {}

impl<'l, T: ClassIdent + ?Sized> VirtualRef<'l, T> {
	/// Fixes the method-table location of `object`'s dynamic class.
	///
	/// Returns `None` when the class is not live in the current tables.
	pub fn new(engine: &Engine, object: &'l T) -> Option<Self> {
		let key = object.class_key();
		let ctx = engine.context();

		let holder = match engine.policy().indirect_method_pointers {
			true => Holder::Indirect(ctx.mtab_cell_of(key)?),
			false => {
				let mtab = ctx.mtab_of(key);
				match mtab.is_null() {
					true => return None,
					false => Holder::Direct(mtab),
				}
			},
		};

		Some(Self { object, key, holder })
	}
}

impl<T: ?Sized> VirtualRef<'_, T> {
	#[inline]
	pub fn object(&self) -> &T {
		self.object
	}
}

impl<T: ?Sized> Receiver for VirtualRef<'_, T> {
	#[inline]
	fn key(&self) -> ClassKey {
		self.key
	}

	#[inline]
	fn mtab(&self, ctx: &Context, _: &HashTable) -> *const Word {
		let mtab = match &self.holder {
			Holder::Direct(mtab) => *mtab,
			Holder::Indirect(cell) => cell.load(),
		};
		ctx.check_method_pointer(mtab, self.key)
	}
}

impl<T: ?Sized> std::ops::Deref for VirtualRef<'_, T> {
	type Target = T;

	fn deref(&self) -> &T {
		self.object
	}
}

/// Walks the emitted tables for one call: `O(arity)` dependent loads.
///
/// # Safety
///
/// Every entry of `mtabs` must be a method table published by the engine
/// that owns `slots`, and `mtabs` must have exactly the method's arity.
#[inline]
pub unsafe fn resolve_erased(slots: &SlotsStrides, mtabs: &[*const Word]) -> EntryPoint {
	if slots.len() == 1 {
		return (*mtabs[0].add(slots.slot(0))).fun;
	}

	// The first dimension's cell is already a pointer to the right row of
	// the dispatch table; later dimensions add group index times stride.
	let mut cell = (*mtabs[0].add(slots.slot(0))).cell;
	for dim in 1..mtabs.len() {
		let index = (*mtabs[dim].add(slots.slot(dim))).index;
		cell = cell.add(index * slots.stride(dim));
	}
	(*cell).fun
}

/// Monomorphized call entry of one method signature.
///
/// `F` is the method's uniform function-pointer type; every definition
/// wrapper and both fallbacks must share it. The entry reads the shared
/// slots/strides vector, so it stays valid across `update`.
pub struct MethodEntry<F> {
	method: MethodId,
	name: &'static str,
	slots: Arc<SlotsStrides>,
	_signature: PhantomData<F>,
}

impl<F> Clone for MethodEntry<F> {
	fn clone(&self) -> Self {
		Self {
			method: self.method,
			name: self.name,
			slots: self.slots.clone(),
			_signature: PhantomData,
		}
	}
}

macro_rules! impl_resolve {
	($($arity: literal: ($($arg: ident),+)),*) => {paste! {$(
		/// Resolves the entry point for the given virtual arguments.
		///
		/// # Safety
		///
		/// `F` must be the uniform function-pointer type the method's
		/// definitions were registered with, the receivers must identify
		/// classes known to the engine's published tables, and the method's
		/// arity must match the receiver count.
		#[inline]
		pub unsafe fn [<resolve $arity>](
			&self,
			ctx: &Context,
			$($arg: &impl Receiver),+
		) -> F {
			let hash = ctx.method_hash(self.method);
			let mtabs = [$($arg.mtab(ctx, hash)),+];
			call_trace!(ctx.trace, "resolving {}/{}", self.name, $arity);
			self.from_tables(&mtabs)
		}
	)*}};
}

impl<F: Copy> MethodEntry<F> {
	/// Builds the typed entry of a registered method.
	pub fn new(engine: &Engine, method: MethodId) -> Option<Self> {
		debug_assert_eq!(
			std::mem::size_of::<F>(),
			std::mem::size_of::<EntryPoint>(),
			"the signature type must be a function pointer",
		);

		let (name, slots) = engine.method_record(method)?;
		Some(Self { method, name, slots, _signature: PhantomData })
	}

	#[inline]
	pub fn name(&self) -> &'static str {
		self.name
	}

	impl_resolve! {
		1: (a),
		2: (a, b),
		3: (a, b, c),
		4: (a, b, c, d)
	}

	#[inline]
	unsafe fn from_tables(&self, mtabs: &[*const Word]) -> F {
		let fun = resolve_erased(&self.slots, mtabs);
		std::mem::transmute_copy::<EntryPoint, F>(&fun)
	}
}
