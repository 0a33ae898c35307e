use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use chimera::{
	ClassDecl, ClassIdent, ClassKey, DefinitionDecl, Engine, EntryPoint, KeyAnchor, MethodDecl,
	MethodEntry, MethodId, ParamSpec, Policy, VirtualRef,
};

static ANIMAL: KeyAnchor = KeyAnchor::new();
static DOG: KeyAnchor = KeyAnchor::new();
static CAT: KeyAnchor = KeyAnchor::new();

struct Dog;
struct Cat;

impl ClassIdent for Dog {
	fn class_key(&self) -> ClassKey {
		DOG.key()
	}
}

impl ClassIdent for Cat {
	fn class_key(&self) -> ClassKey {
		CAT.key()
	}
}

// Native virtual dispatch, the baseline the engine is measured against.
trait Kickable {
	fn kick(&self) -> u32;
}

impl Kickable for Dog {
	fn kick(&self) -> u32 {
		2
	}
}

impl Kickable for Cat {
	fn kick(&self) -> u32 {
		3
	}
}

type UniFn = fn(&dyn ClassIdent) -> u32;
type PairFn = fn(&dyn ClassIdent, &dyn ClassIdent) -> u32;

fn kick_dog(_: &dyn ClassIdent) -> u32 {
	2
}

fn kick_cat(_: &dyn ClassIdent) -> u32 {
	3
}

fn kick_missing(_: &dyn ClassIdent) -> u32 {
	unreachable!("benchmark classes always have a definition")
}

fn meet_any(_: &dyn ClassIdent, _: &dyn ClassIdent) -> u32 {
	5
}

fn meet_missing(_: &dyn ClassIdent, _: &dyn ClassIdent) -> u32 {
	unreachable!("benchmark classes always have a definition")
}

struct Fixture {
	engine: Engine,
	kick: MethodId,
	meet: MethodId,
}

fn fixture(policy: Policy) -> Fixture {
	let mut engine = Engine::new(policy);
	engine.register_class(ClassDecl::new(ANIMAL.key(), "Animal"));
	engine.register_class(ClassDecl::new(DOG.key(), "Dog").with_bases([ANIMAL.key()]));
	engine.register_class(ClassDecl::new(CAT.key(), "Cat").with_bases([ANIMAL.key()]));

	let (kick, _) = engine.register_method(MethodDecl {
		name: "kick",
		params: vec![ParamSpec::Virtual(ANIMAL.key())],
		not_implemented: kick_missing as UniFn as EntryPoint,
		ambiguous: kick_missing as UniFn as EntryPoint,
	});
	engine.register_definition(DefinitionDecl {
		method: kick,
		spec: vec![DOG.key()],
		entry: kick_dog as UniFn as EntryPoint,
	});
	engine.register_definition(DefinitionDecl {
		method: kick,
		spec: vec![CAT.key()],
		entry: kick_cat as UniFn as EntryPoint,
	});

	let (meet, _) = engine.register_method(MethodDecl {
		name: "meet",
		params: vec![ParamSpec::Virtual(ANIMAL.key()), ParamSpec::Virtual(ANIMAL.key())],
		not_implemented: meet_missing as PairFn as EntryPoint,
		ambiguous: meet_missing as PairFn as EntryPoint,
	});
	engine.register_definition(DefinitionDecl {
		method: meet,
		spec: vec![DOG.key(), CAT.key()],
		entry: meet_any as PairFn as EntryPoint,
	});
	engine.register_definition(DefinitionDecl {
		method: meet,
		spec: vec![CAT.key(), DOG.key()],
		entry: meet_any as PairFn as EntryPoint,
	});
	engine.register_definition(DefinitionDecl {
		method: meet,
		spec: vec![DOG.key(), DOG.key()],
		entry: meet_any as PairFn as EntryPoint,
	});
	engine.register_definition(DefinitionDecl {
		method: meet,
		spec: vec![CAT.key(), CAT.key()],
		entry: meet_any as PairFn as EntryPoint,
	});

	engine.update().unwrap();
	Fixture { engine, kick, meet }
}

fn bench_dispatch(c: &mut Criterion) {
	let dog = Dog;
	let cat = Cat;

	c.bench_function("native virtual call", |b| {
		let animals: [&dyn Kickable; 2] = [&dog, &cat];
		let mut at = 0usize;
		b.iter(|| {
			at = (at + 1) % animals.len();
			black_box(animals[at].kick())
		});
	});

	let f = fixture(Policy::default().with_runtime_checks(false));
	let kick = MethodEntry::<UniFn>::new(&f.engine, f.kick).unwrap();
	let meet = MethodEntry::<PairFn>::new(&f.engine, f.meet).unwrap();

	c.bench_function("uni-method, hash lookup", |b| {
		let ctx = f.engine.context();
		let animals: [&dyn ClassIdent; 2] = [&dog, &cat];
		let mut at = 0usize;
		b.iter(|| {
			at = (at + 1) % animals.len();
			let target = unsafe { kick.resolve1(ctx, &animals[at]) };
			black_box(target(animals[at]))
		});
	});

	c.bench_function("uni-method, fat pointer", |b| {
		let ctx = f.engine.context();
		let holders = [
			VirtualRef::new(&f.engine, &dog as &dyn ClassIdent).unwrap(),
			VirtualRef::new(&f.engine, &cat as &dyn ClassIdent).unwrap(),
		];
		let animals: [&dyn ClassIdent; 2] = [&dog, &cat];
		let mut at = 0usize;
		b.iter(|| {
			at = (at + 1) % holders.len();
			let target = unsafe { kick.resolve1(ctx, &holders[at]) };
			black_box(target(animals[at]))
		});
	});

	c.bench_function("pair method, hash lookup", |b| {
		let ctx = f.engine.context();
		let animals: [&dyn ClassIdent; 2] = [&dog, &cat];
		let mut at = 0usize;
		b.iter(|| {
			at = (at + 1) % animals.len();
			let target = unsafe { meet.resolve2(ctx, &animals[at], &animals[1 - at]) };
			black_box(target(animals[at], animals[1 - at]))
		});
	});

	let indirect = fixture(Policy::indirect().with_runtime_checks(false));
	let kick_indirect = MethodEntry::<UniFn>::new(&indirect.engine, indirect.kick).unwrap();

	c.bench_function("uni-method, indirect fat pointer", |b| {
		let ctx = indirect.engine.context();
		let holders = [
			VirtualRef::new(&indirect.engine, &dog as &dyn ClassIdent).unwrap(),
			VirtualRef::new(&indirect.engine, &cat as &dyn ClassIdent).unwrap(),
		];
		let animals: [&dyn ClassIdent; 2] = [&dog, &cat];
		let mut at = 0usize;
		b.iter(|| {
			at = (at + 1) % holders.len();
			let target = unsafe { kick_indirect.resolve1(ctx, &holders[at]) };
			black_box(target(animals[at]))
		});
	});
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
