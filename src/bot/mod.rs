//! Bot module - engine and connection runtime.

pub mod dispatcher;
mod runtime;
mod webhook;

pub use runtime::run;
