use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::key::ClassKey;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResolutionStatus {
	NoDefinition,
	Ambiguous,
}

/// Where an unknown class key was encountered.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UnknownClassContext {
	Update,
	Call,
}

/// Call-time error surfaced to the process-global handler.
#[derive(Debug, Clone)]
pub enum DispatchError {
	Resolution {
		status: ResolutionStatus,
		method: Box<str>,
		arity: usize,
		keys: Vec<ClassKey>,
	},
	UnknownClass {
		context: UnknownClassContext,
		key: ClassKey,
	},
	HashSearch {
		attempts: usize,
		duration: Duration,
		buckets: usize,
	},
	MethodTable {
		key: ClassKey,
	},
}

impl Display for DispatchError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Resolution { status, method, arity, keys } => {
				let what = match status {
					ResolutionStatus::NoDefinition => "no applicable definition",
					ResolutionStatus::Ambiguous => "ambiguous call",
				};
				write!(f, "{what} for {method}/{arity}(")?;
				let mut comma = "";
				for key in keys {
					write!(f, "{comma}{key:?}")?;
					comma = ", ";
				}
				write!(f, ")")
			},
			Self::UnknownClass { context, key } => {
				let when = match context {
					UnknownClassContext::Update => "update",
					UnknownClassContext::Call => "call",
				};
				write!(f, "unknown class {key:?} during {when}")
			},
			Self::HashSearch { attempts, duration, buckets } => write!(
				f,
				"could not find hash factors after {attempts} attempts in {duration:?} using {buckets} buckets",
			),
			Self::MethodTable { key } => write!(f, "invalid method table for {key:?}"),
		}
	}
}

/// Failure returned by [`Engine::update`](crate::Engine::update).
///
/// The previously published state is left intact.
#[derive(Debug, Clone)]
pub enum UpdateError {
	/// A class key referenced as a base or in a specialization tuple was
	/// never registered.
	UnknownClass(ClassKey),
	/// A class appears in its own proper ancestor set.
	InheritanceCycle(ClassKey),
	HashSearch {
		attempts: usize,
		duration: Duration,
		buckets: usize,
	},
}

impl Display for UpdateError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::UnknownClass(key) => write!(f, "unknown class {key:?}"),
			Self::InheritanceCycle(key) => write!(f, "inheritance cycle through {key:?}"),
			Self::HashSearch { attempts, duration, buckets } => write!(
				f,
				"could not find hash factors after {attempts} attempts in {duration:?} using {buckets} buckets",
			),
		}
	}
}

impl std::error::Error for UpdateError {}

pub type ErrorHandler = fn(&DispatchError);

// 0 stands for the default handler so the static has a const initializer.
static ERROR_HANDLER: AtomicUsize = AtomicUsize::new(0);

fn default_error_handler(error: &DispatchError) {
	eprintln!("chimera: {error}");
}

/// Installs the process-global error handler and returns the previous one.
///
/// The handler is invoked for call-time errors. For resolution errors it is
/// expected not to return (panic, abort); the reporting entry points call
/// `abort` if it does.
pub fn set_error_handler(handler: ErrorHandler) -> ErrorHandler {
	match ERROR_HANDLER.swap(handler as usize, Ordering::AcqRel) {
		0 => default_error_handler,
		prev => unsafe { std::mem::transmute::<usize, ErrorHandler>(prev) },
	}
}

pub(crate) fn error_handler() -> ErrorHandler {
	match ERROR_HANDLER.load(Ordering::Acquire) {
		0 => default_error_handler,
		handler => unsafe { std::mem::transmute::<usize, ErrorHandler>(handler) },
	}
}

/// Reports a resolution failure through the installed handler.
///
/// Never returns: if the handler comes back anyway, the process is aborted,
/// since the caller has no function to invoke.
pub fn report_resolution_error(
	status: ResolutionStatus,
	method: &str,
	keys: &[ClassKey],
) -> ! {
	error_handler()(&DispatchError::Resolution {
		status,
		method: method.into(),
		arity: keys.len(),
		keys: keys.to_vec(),
	});
	std::process::abort();
}

pub(crate) fn report_call_error(error: DispatchError) -> ! {
	error_handler()(&error);
	std::process::abort();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_formats() {
		let err = DispatchError::Resolution {
			status: ResolutionStatus::Ambiguous,
			method: "meet".into(),
			arity: 2,
			keys: vec![ClassKey::new(1), ClassKey::new(2)],
		};
		let text = err.to_string();
		assert!(text.starts_with("ambiguous call for meet/2("));

		let err = UpdateError::InheritanceCycle(ClassKey::new(3));
		assert!(err.to_string().contains("cycle"));
	}

	#[test]
	fn handler_swap_returns_previous() {
		fn h1(_: &DispatchError) {}
		fn h2(_: &DispatchError) {}

		let original = set_error_handler(h1);
		assert_eq!(set_error_handler(h2) as usize, h1 as usize);
		assert_eq!(error_handler() as usize, h2 as usize);
		set_error_handler(original);
	}
}
