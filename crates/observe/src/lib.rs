//! Process-wide observability: structured logging, panic reporting and the
//! global metrics registry. Initialized once at startup, before any other
//! component runs.

pub mod metrics;
pub mod panic_hook;
pub mod tracing;
