pub mod astutil;
pub mod classify;
pub mod diagnostics;
pub mod generate;
pub mod harness_emit;
pub mod introspect;
pub mod loader;
pub mod plan;
pub mod proto_emit;

pub const NGFUZZ_VERSION: &str = env!("CARGO_PKG_VERSION");
