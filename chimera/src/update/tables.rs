use bumpalo::Bump;
use fxhash::FxHashMap;

use super::graph::ClassGraph;
use super::{select, BuildMethod};
use crate::utilities::BitSet;
use crate::word::EntryPoint;

/// Logical dispatch layout of one method, before pool placement.
pub(crate) enum MethodLayout {
	Uni {
		/// Winning entry per class, parallel to the first parameter's
		/// conforming set.
		winners: Vec<EntryPoint>,
	},
	Multi {
		/// Per non-first dimension: group index of each class, parallel to
		/// that dimension's conforming set.
		group_of: Vec<Vec<usize>>,
		/// Per non-first dimension.
		group_counts: Vec<usize>,
		/// Per non-first dimension; the first entry is always 1.
		strides: Vec<usize>,
		/// Row-major cells: `row * row_size + sum(group_d * stride_d)`.
		cells: Vec<EntryPoint>,
		row_size: usize,
	},
}

pub(crate) struct MethodTables {
	pub layout: MethodLayout,
	/// Chained entry per definition.
	pub next: Vec<EntryPoint>,
}

/// Compresses one method's compatible tuples into its dispatch layout.
///
/// Classes of a non-first dimension collapse into one group when they accept
/// exactly the same definitions along that dimension; such classes produce
/// identical columns whatever the other arguments are.
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub(crate) fn build(graph: &ClassGraph, method: &BuildMethod, bump: &Bump) -> MethodTables {
	let next = select::next_entries(graph, method, bump);
	let arity = method.vparams.len();

	let first = method.vparams[0] as usize;
	let first_conforming = &graph.classes[first].conforming;
	let row_masks: Vec<BitSet> = first_conforming
		.iter()
		.map(|class| select::applicable_mask(graph, method, 0, *class))
		.collect();

	if arity == 1 {
		let winners = row_masks
			.iter()
			.map(|mask| select::select(graph, method, mask, bump).entry(method))
			.collect();
		return MethodTables { layout: MethodLayout::Uni { winners }, next };
	}

	let mut group_of = Vec::with_capacity(arity - 1);
	let mut group_counts = Vec::with_capacity(arity - 1);
	let mut group_masks_by_dim = Vec::with_capacity(arity - 1);

	for dim in 1..arity {
		let conforming = &graph.classes[method.vparams[dim] as usize].conforming;
		let mut index: FxHashMap<BitSet, usize> = FxHashMap::default();
		let mut masks: Vec<BitSet> = Vec::new();
		let mut groups = Vec::with_capacity(conforming.len());

		for class in conforming {
			let mask = select::applicable_mask(graph, method, dim, *class);
			let group = match index.get(&mask) {
				Some(group) => *group,
				None => {
					let group = masks.len();
					index.insert(mask.clone(), group);
					masks.push(mask);
					group
				},
			};
			groups.push(group);
		}

		group_of.push(groups);
		group_counts.push(masks.len());
		group_masks_by_dim.push(masks);
	}

	let mut strides = Vec::with_capacity(arity - 1);
	let mut row_size = 1usize;
	for count in &group_counts {
		strides.push(row_size);
		row_size *= count;
	}

	let mut cells = vec![std::ptr::null::<()>() as EntryPoint; row_masks.len() * row_size];
	for (row, row_mask) in row_masks.iter().enumerate() {
		for linear in 0..row_size {
			let mut applicable = row_mask.clone();
			for dim in 1..arity {
				let group = (linear / strides[dim - 1]) % group_counts[dim - 1];
				applicable.intersect_with(&group_masks_by_dim[dim - 1][group]);
			}
			cells[row * row_size + linear] =
				select::select(graph, method, &applicable, bump).entry(method);
		}
	}

	MethodTables {
		layout: MethodLayout::Multi { group_of, group_counts, strides, cells, row_size },
		next,
	}
}
