use std::fmt::{Debug, Formatter};

/// Erased entry point of a definition, fallback, or next-definition chain.
///
/// Always produced by casting a `fn` pointer whose signature matches the
/// owning method's uniform signature; the typed call layer casts it back.
pub type EntryPoint = *const ();

/// A cell of a method table or dispatch table.
///
/// Each cell holds either the entry point selected for a tuple, a pointer to
/// the dispatch-table row for a first virtual argument, or the group index of
/// an argument along one dispatch dimension. Which member is live at a given
/// slot is fixed by the emitter; readers pick the member the slot was
/// assigned.
#[derive(Copy, Clone)]
pub union Word {
	/// Erased entry point of a definition or fallback.
	pub fun: *const (),
	/// Pointer to a cell inside a dispatch table.
	pub cell: *const Word,
	/// Group index along one dispatch dimension.
	pub index: usize,
}

impl Word {
	pub const ZERO: Word = Word { index: 0 };

	#[inline]
	pub fn from_fun(fun: *const ()) -> Self {
		Word { fun }
	}

	#[inline]
	pub fn from_cell(cell: *const Word) -> Self {
		Word { cell }
	}

	#[inline]
	pub fn from_index(index: usize) -> Self {
		Word { index }
	}
}

impl Default for Word {
	fn default() -> Self {
		Self::ZERO
	}
}

impl Debug for Word {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		// All members share a representation; print the raw value.
		write!(f, "Word({:#x})", unsafe { self.index })
	}
}
