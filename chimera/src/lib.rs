//! Open multi-method dispatch over registered class hierarchies.
//!
//! Classes, methods, and definitions are registered into an [`Engine`];
//! [`Engine::update`] compiles them into per-class method tables, dense
//! dispatch tables, and a perfect hash over class identities, all packed in
//! one contiguous word pool. A call then resolves in a handful of dependent
//! loads, whatever the arity, through [`dispatch::MethodEntry`].

pub mod catalog;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod key;
pub mod policy;
pub mod word;

mod engine;
mod trace;
mod update;
mod utilities;

pub use catalog::{
	ClassDecl, ClassId, DefinitionDecl, DefinitionId, MethodDecl, MethodId, NextCell, ParamSpec,
	SlotsStrides,
};
pub use context::{Context, HashFactors, HashTable, MtabCell};
pub use dispatch::{MethodEntry, Receiver, VirtualRef};
pub use engine::{Engine, EngineState};
pub use error::{
	report_resolution_error, set_error_handler, DispatchError, ErrorHandler, ResolutionStatus,
	UnknownClassContext, UpdateError,
};
pub use key::{ClassIdent, ClassKey, KeyAnchor};
pub use policy::{HashPlacement, Policy, TraceFlags};
pub use word::{EntryPoint, Word};
