//! Package loader: resolves a package spec to exactly one set of Rust
//! sources, parses them and stamps the content digest. The rest of the
//! pipeline is pure over the parsed trees.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::diagnostics::{Diagnostic, DiagnosticCode, Phase};

#[derive(Debug)]
pub struct LoadedPackage {
    /// Crate identifier used to reference the package from generated code.
    pub name: String,
    /// Source paths, sorted; parallel to `asts`.
    pub paths: Vec<PathBuf>,
    pub asts: Vec<syn::File>,
    /// Hex SHA-256 over the concatenated source bytes, stamped into both
    /// output files.
    pub source_sha256: String,
}

/// Load a package from a crate directory (preferring its `src/`), a bare
/// directory of `.rs` files, or a single file.
pub fn load_package(spec: &Path) -> Result<LoadedPackage> {
    let (name, paths) = resolve_sources(spec)?;
    if paths.is_empty() {
        anyhow::bail!(
            "{}",
            Diagnostic::error(
                DiagnosticCode::NGF0002EmptyPackage,
                Phase::Load,
                format!("no Rust sources under {}", spec.display()),
            )
        );
    }

    let mut asts = Vec::with_capacity(paths.len());
    let mut hasher = Sha256::new();
    for path in &paths {
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("read source: {}", path.display()))?;
        hasher.update(src.as_bytes());
        let ast = syn::parse_file(&src).map_err(|e| {
            anyhow::anyhow!(
                "{}",
                Diagnostic::error(
                    DiagnosticCode::NGF0001ParseError,
                    Phase::Load,
                    format!("{}: {}", path.display(), e),
                )
            )
        })?;
        asts.push(ast);
    }

    let digest = hasher.finalize();
    let mut source_sha256 = String::with_capacity(digest.len() * 2);
    for b in digest {
        source_sha256.push_str(&format!("{:02x}", b));
    }

    Ok(LoadedPackage {
        name,
        paths,
        asts,
        source_sha256,
    })
}

fn resolve_sources(spec: &Path) -> Result<(String, Vec<PathBuf>)> {
    if spec.is_file() {
        let name = crate_ident(spec);
        return Ok((name, vec![spec.to_path_buf()]));
    }
    if !spec.is_dir() {
        anyhow::bail!(
            "{}",
            Diagnostic::error(
                DiagnosticCode::NGF0002EmptyPackage,
                Phase::Load,
                format!("{} is not a file or directory", spec.display()),
            )
        );
    }
    let src = spec.join("src");
    let root = if src.is_dir() { src } else { spec.to_path_buf() };
    let mut paths = rs_files(&root);
    if paths.is_empty() {
        // A workspace root with member crates is more than one package.
        let candidates = WalkDir::new(spec)
            .min_depth(1)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir() && e.path().join("src").is_dir())
            .count();
        if candidates > 0 {
            anyhow::bail!(
                "{}",
                Diagnostic::error(
                    DiagnosticCode::NGF0003AmbiguousPackage,
                    Phase::Load,
                    format!(
                        "{} has no sources but {} candidate member crate(s)",
                        spec.display(),
                        candidates
                    ),
                )
            );
        }
    }
    paths.sort();
    Ok((crate_ident(spec), paths))
}

fn rs_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map(|x| x == "rs").unwrap_or(false))
        .map(|e| e.into_path())
        .collect()
}

fn crate_ident(spec: &Path) -> String {
    spec.file_stem()
        .map(|s| s.to_string_lossy().replace('-', "_"))
        .unwrap_or_else(|| "pkg".to_string())
}
