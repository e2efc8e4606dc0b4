mod download_cache;
mod fetcher;
mod handle;
mod locator;
pub mod resolvers;
mod version;

pub use fetcher::{FetchError, Fetcher};
pub use handle::{CompilerHandle, CompilerModule, ModuleLoader, NodeModuleLoader};
pub use locator::CompilerLocator;
pub use version::{CompilerVersion, ParseError};
