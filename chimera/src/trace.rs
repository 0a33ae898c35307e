//! Compile-time gated trace shim. Without the `trace` feature every site
//! expands to nothing; with it, emission is still gated by the policy flags.

macro_rules! rt_trace {
	($policy:expr, $($arg:tt)*) => {
		#[cfg(feature = "trace")]
		{
			if $policy.trace.contains($crate::policy::TraceFlags::RUNTIME) {
				tracing::debug!($($arg)*);
			}
		}
		#[cfg(not(feature = "trace"))]
		{
			let _ = &$policy;
		}
	};
}

macro_rules! call_trace {
	($flags:expr, $($arg:tt)*) => {
		#[cfg(feature = "trace")]
		{
			if $flags.contains($crate::policy::TraceFlags::CALLS) {
				tracing::trace!($($arg)*);
			}
		}
		#[cfg(not(feature = "trace"))]
		{
			let _ = &$flags;
		}
	};
}

pub(crate) use {call_trace, rt_trace};
