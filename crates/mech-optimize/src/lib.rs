// mech-optimize: analysis and transform passes over the mechanism AST
//
// Architecture:
// - pass: pass names, disciplines and the OptimizePass trait
// - passes: one module per analysis or transform pass
// - pipeline: the fixed, documented pass order for one compilation unit
// - symbolic: owned expression algebra used by the solver lowerings

pub mod error;
pub mod pass;
pub mod passes;
pub mod pipeline;
pub mod symbolic;

pub use pass::{OptimizePass, PassDiscipline, PassName};
pub use passes::*;
pub use pipeline::{PassPipeline, PipelineStatus};
