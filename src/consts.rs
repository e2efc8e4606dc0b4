// Native binaries are always the linux-amd64 builds, whatever the host is.
pub const DEFAULT_NATIVE_ARCHIVE: &str = "https://binaries.soliditylang.org/linux-amd64/";
pub const DEFAULT_MODULE_REGISTRY: &str = "https://binaries.soliditylang.org/bin/";

pub const NATIVE_FILE_PREFIX: &str = "solc-linux-amd64-";
pub const MODULE_FILE_PREFIX: &str = "soljson-";
pub const MODULE_FILE_EXTENSION: &str = ".js";

pub const DEFAULT_JS_RUNTIME: &str = "node";
pub const DOWNLOAD_DIR_NAME: &str = "solc-recompiler";
