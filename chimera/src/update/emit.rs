use std::sync::Arc;

use crate::context::{Context, HashTable, MtabCell};
use crate::key::ClassKey;
use crate::policy::{HashPlacement, Policy};
use crate::word::Word;

use super::graph::ClassGraph;
use super::hash::HashSolution;
use super::slots::SlotAllocation;
use super::tables::{MethodLayout, MethodTables};
use super::BuildMethod;

pub(crate) struct EmitInputs<'a, 'c> {
	pub graph: &'a ClassGraph,
	pub methods: &'a [BuildMethod<'c>],
	pub allocation: SlotAllocation,
	pub layouts: Vec<MethodTables>,
	pub hash: HashSolution,
	pub policy: &'a Policy,
}

/// Lays the method tables and dispatch tables out in one contiguous pool,
/// fills the hash arrays, stores every method's slots and strides, chains
/// the definitions, and finally publishes one pointer per class cell.
///
/// Everything before the cell stores is invisible to call sites; the store
/// per class is the single word-sized write holders can observe.
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub(crate) fn emit(inputs: EmitInputs) -> Context {
	let EmitInputs { graph, methods, allocation, layouts, hash, policy } = inputs;

	// Method tables first, then the dispatch tables. Every live class owns
	// at least one word so its published pointer stays inside the pool even
	// when no method claims a cell in it.
	let mut mtab_offset = vec![usize::MAX; graph.classes.len()];
	let mut total = 0usize;
	for (at, _) in graph.live_classes() {
		mtab_offset[at as usize] = total;
		total += allocation.widths[at as usize].max(1);
	}

	let mut dispatch_offset = vec![0usize; methods.len()];
	for (at, tables) in layouts.iter().enumerate() {
		if let MethodLayout::Multi { cells, .. } = &tables.layout {
			dispatch_offset[at] = total;
			total += cells.len();
		}
	}

	let mut pool = vec![Word::ZERO; total].into_boxed_slice();
	let base = pool.as_mut_ptr();

	for (at, (method, tables)) in methods.iter().zip(&layouts).enumerate() {
		let slots = &allocation.slots[at];
		let strides_out = &method.info.slots_strides;
		strides_out.set_slot(0, slots[0]);

		let first_conforming = &graph.classes[method.vparams[0] as usize].conforming;

		match &tables.layout {
			MethodLayout::Uni { winners } => {
				for (row, class) in first_conforming.iter().enumerate() {
					let offset = mtab_offset[*class as usize] + slots[0];
					unsafe { base.add(offset).write(Word::from_fun(winners[row])) };
				}
			},
			MethodLayout::Multi { group_of, strides, cells, row_size, .. } => {
				for (dim, stride) in strides.iter().enumerate() {
					strides_out.set_slot(dim + 1, slots[dim + 1]);
					strides_out.set_stride(dim + 1, *stride);
				}

				for (cell, entry) in cells.iter().enumerate() {
					unsafe { base.add(dispatch_offset[at] + cell).write(Word::from_fun(*entry)) };
				}

				for (row, class) in first_conforming.iter().enumerate() {
					let row_cell = unsafe { base.add(dispatch_offset[at] + row * row_size) };
					let offset = mtab_offset[*class as usize] + slots[0];
					unsafe { base.add(offset).write(Word::from_cell(row_cell)) };
				}

				for dim in 1..method.vparams.len() {
					let conforming = &graph.classes[method.vparams[dim] as usize].conforming;
					for (position, class) in conforming.iter().enumerate() {
						let offset = mtab_offset[*class as usize] + slots[dim];
						let group = group_of[dim - 1][position];
						unsafe { base.add(offset).write(Word::from_index(group)) };
					}
				}
			},
		}

		for (def, entry) in method.defs.iter().zip(&tables.next) {
			def.info.next.set(*entry);
		}
	}

	// Hash arrays: method-table pointer per bucket, key per bucket for the
	// control checks, published cell per bucket for indirect holders.
	let mut buckets = vec![std::ptr::null::<Word>(); hash.buckets].into_boxed_slice();
	let mut control = vec![ClassKey::new(0); hash.buckets].into_boxed_slice();
	let mut cells: Box<[Option<Arc<MtabCell>>]> = vec![None; hash.buckets].into_boxed_slice();

	for (at, class) in graph.live_classes() {
		let index = hash.factors.apply(class.key);
		buckets[index] = unsafe { base.add(mtab_offset[at as usize]) };
		control[index] = class.key;
		cells[index] = Some(class.cells[0].clone());
	}

	let hash_table = HashTable { factors: hash.factors, buckets, control };

	let method_hash: Box<[Option<HashTable>]> = match policy.hash_placement {
		HashPlacement::Global => Vec::new().into_boxed_slice(),
		HashPlacement::PerMethod => {
			let len = methods.iter().map(|m| m.id.0 as usize + 1).max().unwrap_or(0);
			let mut replicas: Vec<Option<HashTable>> = (0..len).map(|_| None).collect();
			for method in methods {
				replicas[method.id.0 as usize] = Some(HashTable {
					factors: hash_table.factors,
					buckets: hash_table.buckets.clone(),
					control: hash_table.control.clone(),
				});
			}
			replicas.into_boxed_slice()
		},
	};

	// Publication point: one release store per registration record.
	for (at, class) in graph.classes.iter().enumerate() {
		let mtab = match class.is_abstract {
			true => std::ptr::null(),
			false => unsafe { base.add(mtab_offset[at]) as *const Word },
		};
		for cell in &class.cells {
			cell.store(mtab);
		}
	}

	Context {
		pool,
		hash: hash_table,
		method_hash,
		cells,
		runtime_checks: policy.runtime_checks,
		trace: policy.trace,
	}
}
