use std::time::SystemTime;

use tracing_subscriber::EnvFilter;

use chimera::{
	ClassDecl, ClassIdent, ClassKey, DefinitionDecl, Engine, EntryPoint, KeyAnchor, MethodDecl,
	MethodEntry, ParamSpec, Policy, TraceFlags, VirtualRef,
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

type UniFn = fn(&dyn ClassIdent) -> &'static str;
type PairFn = fn(&dyn ClassIdent, &dyn ClassIdent) -> &'static str;

fn kick_dog(_: &dyn ClassIdent) -> &'static str {
	"bark"
}

fn kick_cat(_: &dyn ClassIdent) -> &'static str {
	"meow"
}

fn kick_missing(_: &dyn ClassIdent) -> &'static str {
	chimera::report_resolution_error(chimera::ResolutionStatus::NoDefinition, "kick", &[])
}

fn meet_dog_cat(_: &dyn ClassIdent, _: &dyn ClassIdent) -> &'static str {
	"chase"
}

fn meet_missing(_: &dyn ClassIdent, _: &dyn ClassIdent) -> &'static str {
	chimera::report_resolution_error(chimera::ResolutionStatus::NoDefinition, "meet", &[])
}

fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.init();

	let mut policy = Policy::default();
	policy.trace = TraceFlags::RUNTIME | TraceFlags::CALLS;

	let start = SystemTime::now();
	let mut engine = Engine::new(policy);

	engine.register_class(ClassDecl::new(ANIMAL.key(), "Animal"));
	engine.register_class(ClassDecl::new(DOG.key(), "Dog").with_bases([ANIMAL.key()]));
	engine.register_class(ClassDecl::new(CAT.key(), "Cat").with_bases([ANIMAL.key()]));

	let (kick_id, _) = engine.register_method(MethodDecl {
		name: "kick",
		params: vec![ParamSpec::Virtual(ANIMAL.key())],
		not_implemented: kick_missing as UniFn as EntryPoint,
		ambiguous: kick_missing as UniFn as EntryPoint,
	});
	engine.register_definition(DefinitionDecl {
		method: kick_id,
		spec: vec![DOG.key()],
		entry: kick_dog as UniFn as EntryPoint,
	});
	engine.register_definition(DefinitionDecl {
		method: kick_id,
		spec: vec![CAT.key()],
		entry: kick_cat as UniFn as EntryPoint,
	});

	let (meet_id, _) = engine.register_method(MethodDecl {
		name: "meet",
		params: vec![ParamSpec::Virtual(ANIMAL.key()), ParamSpec::Virtual(ANIMAL.key())],
		not_implemented: meet_missing as PairFn as EntryPoint,
		ambiguous: meet_missing as PairFn as EntryPoint,
	});
	engine.register_definition(DefinitionDecl {
		method: meet_id,
		spec: vec![DOG.key(), CAT.key()],
		entry: meet_dog_cat as PairFn as EntryPoint,
	});

	engine.update().unwrap();

	println!(
		"update time: {:?}, pool: {} words, hash buckets: {}",
		start.elapsed().unwrap(),
		engine.context().pool_words().len(),
		engine.context().hash_buckets(),
	);

	let dog = Dog;
	let cat = Cat;
	let kick = MethodEntry::<UniFn>::new(&engine, kick_id).unwrap();
	let meet = MethodEntry::<PairFn>::new(&engine, meet_id).unwrap();

	let ctx = engine.context();
	println!("kick(Dog) = {}", unsafe { kick.resolve1(ctx, &&dog) }(&dog));
	println!("kick(Cat) = {}", unsafe { kick.resolve1(ctx, &&cat) }(&cat));
	println!("meet(Dog, Cat) = {}", unsafe { meet.resolve2(ctx, &&dog, &&cat) }(&dog, &cat));

	let holder = VirtualRef::new(&engine, &dog as &dyn ClassIdent).unwrap();
	println!("kick(holder) = {}", unsafe { kick.resolve1(ctx, &holder) }(&dog));
}
