//! Driver: load, plan, emit, write. The only file system writes of the
//! whole pipeline happen here.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};

use crate::diagnostics::{Diagnostic, DiagnosticCode, Phase};
use crate::harness_emit::{self, HarnessOptions};
use crate::loader;
use crate::plan;
use crate::proto_emit;

/// Generate `ngolofuzz.proto` and `fuzz_ng.rs` for the package at `spec`
/// into `outdir`.
pub fn package_to_fuzzer(spec: &Path, outdir: &Path, exclude: &str, limits: &str) -> Result<()> {
    let pkg = loader::load_package(spec)?;
    if let Some(first) = pkg.paths.first() {
        eprintln!(
            "Found package {} in {}",
            pkg.name,
            first.parent().unwrap_or(Path::new(".")).display()
        );
    }

    let descr = plan::describe_files(&pkg.asts, exclude)?;

    std::fs::create_dir_all(outdir).map_err(|e| {
        anyhow::anyhow!(
            "{}",
            Diagnostic::error(
                DiagnosticCode::NGF0201CreateOutput,
                Phase::Emit,
                format!("{}: {}", outdir.display(), e),
            )
        )
    })?;

    let proto = proto_emit::render_proto(&descr, &pkg.source_sha256);
    let proto_path = outdir.join("ngolofuzz.proto");
    std::fs::write(&proto_path, proto.as_bytes())
        .with_context(|| format!("write output: {}", proto_path.display()))?;

    let opts = HarnessOptions {
        pkg: pkg.name.clone(),
        limits: parse_limits(limits),
        source_digest: pkg.source_sha256.clone(),
    };
    let harness = harness_emit::render_harness(&descr, &opts);
    let harness_path = outdir.join("fuzz_ng.rs");
    std::fs::write(&harness_path, harness.as_bytes())
        .with_context(|| format!("write output: {}", harness_path.display()))?;

    Ok(())
}

fn parse_limits(limits: &str) -> BTreeSet<String> {
    if limits.is_empty() {
        return BTreeSet::new();
    }
    limits.split(',').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_both_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("target");
        std::fs::create_dir(&target).expect("mkdir");
        std::fs::write(target.join("lib.rs"), "pub fn compute(n: u32) {}\n").expect("write");
        let out = dir.path().join("out");
        package_to_fuzzer(&target, &out, "", "").expect("generate");
        let proto = std::fs::read_to_string(out.join("ngolofuzz.proto")).expect("proto");
        let harness = std::fs::read_to_string(out.join("fuzz_ng.rs")).expect("harness");
        assert!(proto.contains("message ComputeArgs"));
        assert!(harness.contains("target::compute"));
    }

    #[test]
    fn generation_is_deterministic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("t");
        std::fs::create_dir(&target).expect("mkdir");
        std::fs::write(target.join("lib.rs"), "pub fn a(x: u32) {}\npub fn b(s: &str) {}\n")
            .expect("write");
        let out1 = dir.path().join("out1");
        let out2 = dir.path().join("out2");
        package_to_fuzzer(&target, &out1, "", "").expect("generate");
        package_to_fuzzer(&target, &out2, "", "").expect("generate");
        for f in ["ngolofuzz.proto", "fuzz_ng.rs"] {
            let a = std::fs::read(out1.join(f)).expect("read");
            let b = std::fs::read(out2.join(f)).expect("read");
            assert_eq!(a, b, "{f} differs between runs");
        }
    }
}
