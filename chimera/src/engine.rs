use std::sync::Arc;

use derivative::Derivative;

use crate::catalog::{
	Catalog, ClassDecl, ClassId, ClassInfo, DefinitionDecl, DefinitionId, DefinitionInfo,
	MethodDecl, MethodId, MethodInfo, NextCell, ParamSpec, SlotsStrides,
};
use crate::context::{Context, MtabCell};
use crate::error::UpdateError;
use crate::policy::Policy;
use crate::update;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum EngineState {
	/// Nothing published; calls are not allowed.
	Idle,
	/// An `update` is in flight. Unreachable from other threads because
	/// `update` holds the engine exclusively.
	Building,
	/// Tables are published and calls may proceed.
	Ready,
}

/// The dispatch engine: catalog, policy, and the last published context.
///
/// One process-wide instance is the normal setup; tests create private
/// engines to stay isolated. All catalog mutation and `update` go through
/// `&mut self`, so the borrow checker serializes them against calls, which
/// only need `&self`.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Engine {
	policy: Policy,
	#[derivative(Debug = "ignore")]
	catalog: Catalog,
	context: Context,
	state: EngineState,
}

// Entry points in the catalog are plain `fn` pointers and the context is
// frozen between updates; sharing across threads is sound.
unsafe impl Send for Engine {}
unsafe impl Sync for Engine {}

impl Default for Engine {
	fn default() -> Self {
		Self::new(Policy::default())
	}
}

impl Engine {
	pub fn new(policy: Policy) -> Self {
		Self {
			policy,
			catalog: Catalog::default(),
			context: Context::empty(),
			state: EngineState::Idle,
		}
	}

	#[inline]
	pub fn policy(&self) -> &Policy {
		&self.policy
	}

	/// Policy changes take effect at the next `update`.
	#[inline]
	pub fn policy_mut(&mut self) -> &mut Policy {
		&mut self.policy
	}

	#[inline]
	pub fn state(&self) -> EngineState {
		self.state
	}

	/// Readiness guard: whether a published context exists.
	#[inline]
	pub fn is_ready(&self) -> bool {
		self.state == EngineState::Ready
	}

	/// The published dispatch state. Before the first successful `update`
	/// this is an empty context whose lookups all miss.
	#[inline]
	pub fn context(&self) -> &Context {
		&self.context
	}

	pub fn register_class(&mut self, decl: ClassDecl) -> ClassId {
		let ClassDecl { key, name, bases, is_abstract, mtab_cell } = decl;
		self.catalog.insert_class(ClassInfo {
			key,
			name,
			bases,
			is_abstract,
			mtab_cell: mtab_cell.unwrap_or_else(MtabCell::new),
		})
	}

	pub fn unregister_class(&mut self, id: ClassId) {
		self.catalog.remove_class(id);
	}

	/// The slot published for a class registration, for intrusive objects
	/// that embed their own method-table pointer.
	pub fn class_cell(&self, id: ClassId) -> Option<Arc<MtabCell>> {
		self.catalog.class(id).map(|info| info.mtab_cell.clone())
	}

	/// Registers a method and returns its id together with the shared
	/// slots/strides vector its entry points read.
	pub fn register_method(&mut self, decl: MethodDecl) -> (MethodId, Arc<SlotsStrides>) {
		let MethodDecl { name, params, not_implemented, ambiguous } = decl;
		let arity = params.iter().filter(|p| matches!(p, ParamSpec::Virtual(_))).count();
		let slots_strides = SlotsStrides::for_arity(arity);

		let id = self.catalog.insert_method(MethodInfo {
			name,
			params,
			arity,
			not_implemented,
			ambiguous,
			slots_strides: slots_strides.clone(),
		});
		(id, slots_strides)
	}

	pub fn unregister_method(&mut self, id: MethodId) {
		self.catalog.remove_method(id);
	}

	/// Registers a definition and returns its id together with the shared
	/// cell through which next-definition chaining is read.
	pub fn register_definition(&mut self, decl: DefinitionDecl) -> (DefinitionId, Arc<NextCell>) {
		let DefinitionDecl { method, spec, entry } = decl;
		let arity = self
			.catalog
			.method(method)
			.expect("definition registered for an unknown method")
			.arity;
		assert_eq!(
			spec.len(),
			arity,
			"specialization tuple length must match the method arity",
		);

		let next = NextCell::new();
		let id = self.catalog.insert_definition(DefinitionInfo {
			method,
			spec,
			entry,
			next: next.clone(),
		});
		(id, next)
	}

	pub fn unregister_definition(&mut self, id: DefinitionId) {
		self.catalog.remove_definition(id);
	}

	pub(crate) fn method_record(&self, id: MethodId) -> Option<(&'static str, Arc<SlotsStrides>)> {
		let info = self.catalog.method(id)?;
		Some((info.name, info.slots_strides.clone()))
	}

	/// Recompiles every table from the current catalog.
	///
	/// On success the new state is fully published before this returns; on
	/// error the previously published state is untouched and still live.
	pub fn update(&mut self) -> Result<(), UpdateError> {
		let prior = self.state;
		self.state = EngineState::Building;

		match update::run(&self.catalog, &self.policy) {
			Ok(context) => {
				self.context = context;
				self.state = EngineState::Ready;
				Ok(())
			},
			Err(error) => {
				self.state = prior;
				Err(error)
			},
		}
	}

	/// Unpublishes all tables and nulls every class cell.
	pub fn teardown(&mut self) {
		for info in self.catalog.classes() {
			info.mtab_cell.store(std::ptr::null());
		}
		self.context = Context::empty();
		self.state = EngineState::Idle;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::key::ClassKey;
	use crate::word::EntryPoint;

	const NOT_IMPLEMENTED: EntryPoint = 0x10 as EntryPoint;
	const AMBIGUOUS: EntryPoint = 0x20 as EntryPoint;

	fn animals(engine: &mut Engine) -> (ClassId, ClassId, ClassId) {
		let animal = engine.register_class(ClassDecl::new(ClassKey::new(1), "Animal"));
		let dog = engine.register_class(
			ClassDecl::new(ClassKey::new(2), "Dog").with_bases([ClassKey::new(1)]),
		);
		let cat = engine.register_class(
			ClassDecl::new(ClassKey::new(3), "Cat").with_bases([ClassKey::new(1)]),
		);
		(animal, dog, cat)
	}

	fn uni_method(engine: &mut Engine) -> (MethodId, Arc<SlotsStrides>) {
		engine.register_method(MethodDecl {
			name: "kick",
			params: vec![ParamSpec::Virtual(ClassKey::new(1))],
			not_implemented: NOT_IMPLEMENTED,
			ambiguous: AMBIGUOUS,
		})
	}

	#[test]
	fn update_publishes_cells_and_slots() {
		let mut engine = Engine::new(Policy::default().with_runtime_checks(false));
		let (animal, dog, _) = animals(&mut engine);
		let (kick, slots) = uni_method(&mut engine);
		engine.register_definition(DefinitionDecl {
			method: kick,
			spec: vec![ClassKey::new(2)],
			entry: 0x200 as EntryPoint,
		});

		assert_eq!(engine.state(), EngineState::Idle);
		engine.update().unwrap();
		assert!(engine.is_ready());

		let animal_cell = engine.class_cell(animal).unwrap();
		let dog_cell = engine.class_cell(dog).unwrap();
		assert!(engine.context().pool_contains(animal_cell.load()));
		assert!(engine.context().pool_contains(dog_cell.load()));
		assert_ne!(animal_cell.load(), dog_cell.load());

		let mtab = engine.context().mtab_of(ClassKey::new(2));
		assert_eq!(mtab, dog_cell.load());
		let cell = unsafe { *mtab.add(slots.slot(0)) };
		assert_eq!(unsafe { cell.fun }, 0x200 as EntryPoint);

		let animal_winner = unsafe { *animal_cell.load().add(slots.slot(0)) };
		assert_eq!(unsafe { animal_winner.fun }, NOT_IMPLEMENTED);
	}

	#[test]
	fn failed_update_keeps_prior_state() {
		let mut engine = Engine::new(Policy::default());
		animals(&mut engine);
		engine.update().unwrap();
		let published = engine.context().mtab_of(ClassKey::new(2));

		// A class with an unregistered base poisons the next update.
		let bad = engine.register_class(
			ClassDecl::new(ClassKey::new(9), "Orphan").with_bases([ClassKey::new(99)]),
		);
		assert!(matches!(engine.update(), Err(UpdateError::UnknownClass(_))));
		assert!(engine.is_ready());
		assert_eq!(engine.context().mtab_of(ClassKey::new(2)), published);

		engine.unregister_class(bad);
		engine.update().unwrap();
	}

	#[test]
	fn teardown_nulls_cells() {
		let mut engine = Engine::new(Policy::default());
		let (animal, ..) = animals(&mut engine);
		engine.update().unwrap();

		let cell = engine.class_cell(animal).unwrap();
		assert!(!cell.load().is_null());

		engine.teardown();
		assert_eq!(engine.state(), EngineState::Idle);
		assert!(cell.load().is_null());
		assert!(engine.context().pool_words().is_empty());
	}

	#[test]
	fn definition_arity_is_checked() {
		let mut engine = Engine::new(Policy::default());
		animals(&mut engine);
		let (kick, _) = uni_method(&mut engine);

		let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
			engine.register_definition(DefinitionDecl {
				method: kick,
				spec: vec![ClassKey::new(2), ClassKey::new(3)],
				entry: 0x200 as EntryPoint,
			});
		}));
		assert!(result.is_err());
	}
}
