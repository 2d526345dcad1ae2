//! Manifest discovery with gitignore-aware filtering
//!
//! Walks a directory tree and collects the files matching a set of glob
//! patterns, respecting `.gitignore` files along the way. The Cargo
//! workspace provider uses it to find every `Cargo.toml` below a root.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::warn;

/// File name of a Cargo package manifest
pub const CARGO_MANIFEST: &str = "Cargo.toml";

/// Discover files matching glob patterns below `root`
///
/// # Arguments
/// * `root` - Root directory to search
/// * `patterns` - Glob patterns relative to `root` (e.g., `&["**/Cargo.toml"]`)
///
/// # Returns
/// Absolute paths of matching files, sorted, excluding anything matched by
/// `.gitignore` and anything below a `target/` build directory.
///
/// # Errors
/// Fails when `root` cannot be canonicalized or a pattern is not a valid glob.
pub fn discover_files(root: &Path, patterns: &[&str]) -> Result<Vec<PathBuf>> {
    let canonical_root = root
        .canonicalize()
        .with_context(|| format!("Cannot resolve search root {}", root.display()))?;
    let matcher = build_glob_matcher(patterns)?;

    let mut files = Vec::new();
    for result in build_walker(&canonical_root) {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                // Unreadable entries are skipped, the rest of the walk goes on
                warn!(error = %err, "error walking directory");
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let Ok(rel_path) = entry.path().strip_prefix(&canonical_root) else {
            continue;
        };
        if rel_path.components().any(|c| c.as_os_str() == "target") {
            continue;
        }
        if matcher.is_match(rel_path) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Discover every Cargo manifest below `root`, including the root's own
pub fn discover_manifests(root: &Path) -> Result<Vec<PathBuf>> {
    discover_files(root, &[CARGO_MANIFEST, "**/Cargo.toml"])
}

fn build_glob_matcher(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob `{}`", pattern))?);
    }
    Ok(builder.build()?)
}

fn build_walker(root: &Path) -> ignore::Walk {
    let mut builder = WalkBuilder::new(root);
    builder
        .git_ignore(true)
        .git_exclude(true)
        .hidden(false)
        .parents(true);

    // WalkBuilder only honours .gitignore inside a git repository unless it
    // is registered explicitly
    let gitignore_path = root.join(".gitignore");
    if gitignore_path.exists() {
        if let Some(err) = builder.add_ignore(&gitignore_path) {
            warn!(error = %err, path = %gitignore_path.display(), "ignoring unreadable .gitignore");
        }
    }

    builder.build()
}
