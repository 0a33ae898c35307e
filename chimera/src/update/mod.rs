pub(crate) mod graph;
pub(crate) mod slots;
pub(crate) mod select;
pub(crate) mod tables;
pub(crate) mod hash;
pub(crate) mod emit;

use bumpalo::Bump;

use crate::catalog::{Catalog, DefinitionInfo, MethodId, MethodInfo, ParamSpec};
use crate::context::Context;
use crate::error::UpdateError;
use crate::policy::Policy;
use crate::trace::rt_trace;
use graph::ClassGraph;

/// One method as seen by the pipeline: virtual parameters and definitions
/// resolved to graph indices.
pub(crate) struct BuildMethod<'c> {
	pub id: MethodId,
	pub info: &'c MethodInfo,
	/// Graph index of each virtual parameter's declared class, in order.
	pub vparams: Vec<u32>,
	pub defs: Vec<BuildDef<'c>>,
}

pub(crate) struct BuildDef<'c> {
	pub spec: Vec<u32>,
	pub info: &'c DefinitionInfo,
}

/// Runs the whole offline pipeline over a catalog snapshot.
///
/// On error nothing has been published and the previously emitted state is
/// untouched.
pub(crate) fn run(catalog: &Catalog, policy: &Policy) -> Result<Context, UpdateError> {
	let graph = ClassGraph::resolve(catalog)?;
	rt_trace!(policy, "resolved {} classes", graph.classes.len());

	let methods = collect_methods(catalog, &graph)?;
	rt_trace!(policy, "collected {} methods", methods.len());

	let allocation = slots::allocate(&graph, &methods);

	let bump = Bump::new();
	let layouts = methods
		.iter()
		.map(|method| tables::build(&graph, method, &bump))
		.collect::<Vec<_>>();

	let keys: Vec<_> = graph.live_classes().map(|(_, class)| class.key).collect();
	let hash = hash::search(&keys, policy)?;
	rt_trace!(policy, "hash factors found: {} buckets", hash.buckets);

	Ok(emit::emit(emit::EmitInputs {
		graph: &graph,
		methods: &methods,
		allocation,
		layouts,
		hash,
		policy,
	}))
}

fn collect_methods<'c>(
	catalog: &'c Catalog,
	graph: &ClassGraph,
) -> Result<Vec<BuildMethod<'c>>, UpdateError> {
	let mut methods = Vec::new();

	for (id, info) in catalog.methods() {
		let mut vparams = Vec::with_capacity(info.arity);
		for param in &info.params {
			if let ParamSpec::Virtual(key) = param {
				vparams.push(graph.class_at(*key)?);
			}
		}

		methods.push(BuildMethod { id, info, vparams, defs: Vec::new() });
	}

	for (_, info) in catalog.definitions() {
		let Some(method) = methods.iter_mut().find(|m| m.id == info.method) else {
			// The parent method was deregistered; the definition is inert.
			continue;
		};

		let mut spec = Vec::with_capacity(info.spec.len());
		for key in &info.spec {
			spec.push(graph.class_at(*key)?);
		}
		method.defs.push(BuildDef { spec, info });
	}

	Ok(methods)
}
