use super::graph::ClassGraph;
use super::BuildMethod;

/// Result of the greedy slot assignment.
pub(crate) struct SlotAllocation {
	/// Per method, per virtual parameter: the reserved method-table offset.
	pub slots: Vec<Vec<usize>>,
	/// Claimed width of each class's method table (0 when nothing landed
	/// in it).
	pub widths: Vec<usize>,
}

/// Assigns method-table offsets, reusing an offset wherever the conforming
/// sets that claim it do not intersect.
///
/// Methods are processed in catalog order and parameters in declaration
/// order, so the assignment is stable for a given registration sequence.
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub(crate) fn allocate(graph: &ClassGraph, methods: &[BuildMethod]) -> SlotAllocation {
	let mut claimed: Vec<Vec<u64>> = vec![Vec::new(); graph.classes.len()];
	let mut slots = Vec::with_capacity(methods.len());

	for method in methods {
		let mut method_slots = Vec::with_capacity(method.vparams.len());
		for param in &method.vparams {
			let conforming = &graph.classes[*param as usize].conforming;

			let mut slot = 0;
			while conforming.iter().any(|at| is_claimed(&claimed[*at as usize], slot)) {
				slot += 1;
			}
			for at in conforming {
				claim(&mut claimed[*at as usize], slot);
			}
			method_slots.push(slot);
		}
		slots.push(method_slots);
	}

	let widths = claimed.iter().map(|mask| width_of(mask)).collect();
	SlotAllocation { slots, widths }
}

#[inline]
fn is_claimed(mask: &[u64], slot: usize) -> bool {
	match mask.get(slot / 64) {
		Some(word) => word & (1u64 << (slot % 64)) != 0,
		None => false,
	}
}

fn claim(mask: &mut Vec<u64>, slot: usize) {
	let word = slot / 64;
	if word >= mask.len() {
		mask.resize(word + 1, 0);
	}
	mask[word] |= 1u64 << (slot % 64);
}

fn width_of(mask: &[u64]) -> usize {
	for (idx, word) in mask.iter().enumerate().rev() {
		if *word != 0 {
			return idx * 64 + (64 - word.leading_zeros() as usize);
		}
	}
	0
}
