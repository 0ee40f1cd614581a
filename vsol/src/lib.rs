//! vsol: Solidity verifier front-end
//!
//! Builds an inheritance-aware symbol model of a Solidity program, lowers
//! its declarations to Boogie, and drives Boogie (proof) and Corral
//! (bounded counterexample search) over the result.

pub mod ast;
pub mod boogie;
pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod translate;

pub use ast::{NodeId, Program, Span};
pub use context::{ContextBuilder, ResolutionContext};
pub use error::{Defect, Result, TranslateError, VerifyError};
pub use pipeline::{Pipeline, PipelineOutcome, VerifyConfig};
