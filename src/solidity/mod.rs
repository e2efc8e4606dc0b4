pub mod bytecode;
mod input;
mod invoker;
mod output;

pub use input::{CompilationInput, FormattedInput, InputFormatter, MetadataFormatter, Source};
pub use invoker::CompilerInvoker;
pub use output::{extract, RecompilationResult};
