//! Core library for SFlowG: the build pipeline that packages a flow project
//! into a binary, and the flow runtime that executes it.

pub mod build;
pub mod runtime;

pub use build::error::BuildError;
pub use runtime::error::{FlowError, FlowErrorKind, RuntimeError};
