use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;

use super::graph::ClassGraph;
use super::BuildMethod;
use crate::utilities::BitSet;
use crate::word::EntryPoint;

/// What a tuple of argument classes resolves to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Outcome {
	/// Index into the method's definition list.
	Definition(usize),
	Ambiguous,
	NotImplemented,
}

impl Outcome {
	pub fn entry(self, method: &BuildMethod) -> EntryPoint {
		match self {
			Self::Definition(at) => method.defs[at].info.entry,
			Self::Ambiguous => method.info.ambiguous,
			Self::NotImplemented => method.info.not_implemented,
		}
	}
}

/// Mask of the definitions applicable along `dim` when that argument's
/// dynamic class is `class`: those whose specialization at `dim` is an
/// ancestor of (or is) the class.
pub(crate) fn applicable_mask(
	graph: &ClassGraph,
	method: &BuildMethod,
	dim: usize,
	class: u32,
) -> BitSet {
	let ancestors = &graph.classes[class as usize].ancestors;
	let mut mask = BitSet::new(method.defs.len());
	for (at, def) in method.defs.iter().enumerate() {
		if ancestors.contains(def.spec[dim] as usize) {
			mask.insert(at);
		}
	}
	mask
}

/// Picks the winner among an applicable set: the unique most specific
/// definition, or `Ambiguous` when several are Pareto-minimal, or
/// `NotImplemented` when the set is empty.
pub(crate) fn select(
	graph: &ClassGraph,
	method: &BuildMethod,
	applicable: &BitSet,
	bump: &Bump,
) -> Outcome {
	let mut candidates = BumpVec::new_in(bump);
	candidates.extend(applicable.iter());

	match &candidates[..] {
		[] => Outcome::NotImplemented,
		[only] => Outcome::Definition(*only),
		all => {
			let mut minimal = BumpVec::new_in(bump);
			minimal.extend(
				all.iter()
					.copied()
					.filter(|d| !all.iter().any(|o| *o != *d && supersedes(graph, method, *o, *d))),
			);
			match &minimal[..] {
				[winner] => Outcome::Definition(*winner),
				_ => Outcome::Ambiguous,
			}
		},
	}
}

/// Whether definition `a` strictly supersedes `b`: at least as specific in
/// every dimension and different somewhere. Two definitions with equal
/// tuples never supersede each other, so duplicates surface as ambiguous.
fn supersedes(graph: &ClassGraph, method: &BuildMethod, a: usize, b: usize) -> bool {
	let spec_a = &method.defs[a].spec;
	let spec_b = &method.defs[b].spec;
	spec_a != spec_b
		&& spec_a
			.iter()
			.zip(spec_b.iter())
			.all(|(x, y)| graph.classes[*y as usize].descendants.contains(*x as usize))
}

/// Entry each definition chains to: the selection over the definitions that
/// also cover this definition's own tuple, the definition itself excluded.
/// Abstract specializations take part here even though they never appear in
/// dispatch cells.
pub(crate) fn next_entries(
	graph: &ClassGraph,
	method: &BuildMethod,
	bump: &Bump,
) -> Vec<EntryPoint> {
	method
		.defs
		.iter()
		.enumerate()
		.map(|(at, def)| {
			let mut mask = BitSet::new(method.defs.len());
			for (other_at, other) in method.defs.iter().enumerate() {
				if other_at != at && covers(graph, &other.spec, &def.spec) {
					mask.insert(other_at);
				}
			}
			select(graph, method, &mask, bump).entry(method)
		})
		.collect()
}

/// Whether `spec` is applicable to the tuple `tuple` componentwise.
fn covers(graph: &ClassGraph, spec: &[u32], tuple: &[u32]) -> bool {
	spec.iter()
		.zip(tuple.iter())
		.all(|(s, t)| graph.classes[*t as usize].ancestors.contains(*s as usize))
}
