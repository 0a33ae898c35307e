use std::collections::HashMap;
use std::sync::Arc;

use nohash_hasher::BuildNoHashHasher;

use crate::catalog::Catalog;
use crate::context::MtabCell;
use crate::error::UpdateError;
use crate::key::ClassKey;
use crate::utilities::BitSet;

/// One class after folding duplicate registrations.
pub(crate) struct GraphClass {
	pub key: ClassKey,
	pub name: &'static str,
	pub is_abstract: bool,
	/// Published slots of every registration record carrying this key.
	pub cells: Vec<Arc<MtabCell>>,
	pub bases: Vec<u32>,
	/// Transitive base closure, including the class itself.
	pub ancestors: BitSet,
	/// Transitive derived closure, including the class itself.
	pub descendants: BitSet,
	/// Non-abstract descendants (the classes a parameter of this static
	/// type can carry at run time), ascending.
	pub conforming: Vec<u32>,
}

/// Canonical inheritance DAG over the registered classes.
pub(crate) struct ClassGraph {
	pub classes: Vec<GraphClass>,
	pub index: HashMap<ClassKey, u32, BuildNoHashHasher<ClassKey>>,
}

impl ClassGraph {
	#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
	pub fn resolve(catalog: &Catalog) -> Result<Self, UpdateError> {
		let mut classes: Vec<GraphClass> = Vec::new();
		let mut index = HashMap::default();

		// Duplicate registrations of one key are folded by taking the union
		// of their base lists.
		for info in catalog.classes() {
			match index.get(&info.key) {
				Some(at) => {
					let class: &mut GraphClass = &mut classes[*at as usize];
					class.is_abstract |= info.is_abstract;
					class.cells.push(info.mtab_cell.clone());
				},
				None => {
					index.insert(info.key, classes.len() as u32);
					classes.push(GraphClass {
						key: info.key,
						name: info.name,
						is_abstract: info.is_abstract,
						cells: vec![info.mtab_cell.clone()],
						bases: Vec::new(),
						ancestors: BitSet::new(0),
						descendants: BitSet::new(0),
						conforming: Vec::new(),
					});
				},
			}
		}

		// Base edges resolve against the folded set; a key that was never
		// registered fails the whole update.
		let mut edges: Vec<Vec<u32>> = vec![Vec::new(); classes.len()];
		for info in catalog.classes() {
			let at = index[&info.key] as usize;
			for base in &info.bases {
				let base_at = *index.get(base).ok_or(UpdateError::UnknownClass(*base))?;
				if !edges[at].contains(&base_at) {
					edges[at].push(base_at);
				}
			}
		}
		for (class, bases) in classes.iter_mut().zip(edges) {
			class.bases = bases;
		}

		Self::close(&mut classes)?;

		let count = classes.len();
		for at in 0..count {
			let mut descendants = BitSet::new(count);
			for other in 0..count {
				if classes[other].ancestors.contains(at) {
					descendants.insert(other);
				}
			}
			let conforming = descendants
				.iter()
				.filter(|idx| !classes[*idx].is_abstract)
				.map(|idx| idx as u32)
				.collect();
			let class = &mut classes[at];
			class.conforming = conforming;
			class.descendants = descendants;
		}

		Ok(Self { classes, index })
	}

	/// Computes ancestor closures, rejecting cyclic hierarchies.
	fn close(classes: &mut [GraphClass]) -> Result<(), UpdateError> {
		const UNVISITED: u8 = 0;
		const OPEN: u8 = 1;
		const CLOSED: u8 = 2;

		let count = classes.len();
		let mut state = vec![UNVISITED; count];
		let mut closures: Vec<Option<BitSet>> = (0..count).map(|_| None).collect();

		for root in 0..count {
			if state[root] != UNVISITED {
				continue;
			}

			// Explicit stack: (class, next base edge to follow).
			let mut stack = vec![(root, 0usize)];
			state[root] = OPEN;

			while let Some((at, edge)) = stack.pop() {
				match classes[at].bases.get(edge) {
					Some(base) => {
						let base = *base as usize;
						stack.push((at, edge + 1));
						match state[base] {
							UNVISITED => {
								state[base] = OPEN;
								stack.push((base, 0));
							},
							OPEN => return Err(UpdateError::InheritanceCycle(classes[base].key)),
							_ => {},
						}
					},
					None => {
						let mut ancestors = BitSet::new(count);
						ancestors.insert(at);
						for base in &classes[at].bases {
							// Bases are CLOSED once we get here.
							ancestors.union_with(closures[*base as usize].as_ref().unwrap());
						}
						closures[at] = Some(ancestors);
						state[at] = CLOSED;
					},
				}
			}
		}

		for (class, closure) in classes.iter_mut().zip(closures) {
			class.ancestors = closure.unwrap();
		}

		Ok(())
	}

	#[inline]
	pub fn class_at(&self, key: ClassKey) -> Result<u32, UpdateError> {
		self.index.get(&key).copied().ok_or(UpdateError::UnknownClass(key))
	}

	/// Non-abstract classes, in graph order; the domain of the perfect hash.
	pub fn live_classes(&self) -> impl Iterator<Item=(u32, &GraphClass)> {
		self.classes
			.iter()
			.enumerate()
			.filter(|(_, class)| !class.is_abstract)
			.map(|(at, class)| (at as u32, class))
	}
}
