mod consts;
mod errors;
mod recompiler;
mod settings;
mod tracer;

pub mod compiler;
pub mod solidity;

pub use errors::Error;
pub use recompiler::Recompiler;
pub use settings::{CompilersSettings, Settings, TracingFormat, TracingSettings};
pub use solidity::{
    bytecode::{compare, probably_immutables, strip_metadata, BytecodeError, MatchType},
    RecompilationResult,
};
pub use tracer::init_logs;
