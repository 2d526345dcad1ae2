//! Dependency providers
//!
//! The graph builder never looks at projects directly; it asks a
//! [`DependencyProvider`] for the ordered dependency list of one project at
//! a time. Two providers ship with the crate:
//!
//! - [`StaticProvider`]: an adjacency map, built in code or loaded from a
//!   TOML dependency file.
//! - [`CargoWorkspaceProvider`]: the path dependencies between the Cargo
//!   packages found below a directory.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::discovery;

/// Source of project dependency information
pub trait DependencyProvider {
    /// Handle identifying one project
    type Project: Clone + Eq + Hash + Debug;

    /// Display name of `project`; becomes the graph node identity
    fn name(&self, project: &Self::Project) -> String;

    /// Projects `project` depends on, in the provider's reporting order
    ///
    /// # Errors
    /// Any provider-specific failure. It aborts the running build.
    fn dependencies(&self, project: &Self::Project) -> Result<Vec<Self::Project>>;
}

/// In-memory adjacency map keyed by project name
///
/// Projects without an entry have no dependencies.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    projects: HashMap<String, Vec<String>>,
}

/// On-disk form of a [`StaticProvider`]
///
/// ```toml
/// [projects]
/// app = ["core", "util"]
/// core = ["util"]
/// ```
#[derive(Debug, Deserialize)]
struct DependencyFile {
    #[serde(default)]
    projects: BTreeMap<String, Vec<String>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`StaticProvider::insert`]
    pub fn with_project(mut self, name: &str, dependencies: &[&str]) -> Self {
        self.insert(name, dependencies.iter().map(|d| d.to_string()).collect());
        self
    }

    /// Set the dependency list of `name`, replacing any previous one
    pub fn insert(&mut self, name: &str, dependencies: Vec<String>) {
        self.projects.insert(name.to_string(), dependencies);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }

    /// Load a TOML dependency file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: DependencyFile = toml::from_str(content)?;
        Ok(Self {
            projects: file.projects.into_iter().collect(),
        })
    }
}

impl DependencyProvider for StaticProvider {
    type Project = String;

    fn name(&self, project: &String) -> String {
        project.clone()
    }

    fn dependencies(&self, project: &String) -> Result<Vec<String>> {
        Ok(self.projects.get(project).cloned().unwrap_or_default())
    }
}

/// Dependency tables that can carry path dependencies
const DEPENDENCY_TABLES: [&str; 3] = ["dependencies", "dev-dependencies", "build-dependencies"];

/// Path dependencies between the Cargo packages below a directory
///
/// Packages are discovered once, up front. Each dependency lookup re-reads
/// the package manifest, so a manifest that became unreadable or invalid
/// surfaces as a provider error for that package. Path dependencies that
/// point outside the discovered set are ignored, and so are registry and
/// git dependencies.
#[derive(Debug, Clone)]
pub struct CargoWorkspaceProvider {
    /// Package name -> manifest path
    packages: BTreeMap<String, PathBuf>,
    /// Canonical package directory -> package name
    by_dir: HashMap<PathBuf, String>,
    /// `[workspace.dependencies]` key -> canonical directory, for
    /// `{ workspace = true }` entries
    workspace_paths: HashMap<String, PathBuf>,
    /// Package defined by the manifest directly at the search root
    root_package: Option<String>,
}

impl CargoWorkspaceProvider {
    /// Discover every package below `root`
    ///
    /// Manifests that cannot be parsed are logged and skipped.
    pub fn discover(root: &Path) -> Result<Self> {
        let canonical_root = root
            .canonicalize()
            .with_context(|| format!("Cannot resolve workspace root {}", root.display()))?;
        let manifests = discovery::discover_manifests(&canonical_root)?;

        let mut provider = Self {
            packages: BTreeMap::new(),
            by_dir: HashMap::new(),
            workspace_paths: HashMap::new(),
            root_package: None,
        };

        for manifest_path in manifests {
            let manifest = match read_manifest(&manifest_path) {
                Ok(manifest) => manifest,
                Err(err) => {
                    warn!(path = %manifest_path.display(), error = %format!("{:#}", err), "skipping manifest");
                    continue;
                }
            };
            let Some(dir) = manifest_path.parent().map(Path::to_path_buf) else {
                continue;
            };

            provider.collect_workspace_paths(&manifest, &dir);

            let Some(name) = package_name(&manifest) else {
                debug!(path = %manifest_path.display(), "virtual manifest");
                continue;
            };
            if dir == canonical_root {
                provider.root_package = Some(name.clone());
            }
            if let Some(previous) = provider.packages.get(&name) {
                warn!(package = %name, kept = %previous.display(), ignored = %manifest_path.display(), "duplicate package name");
                continue;
            }
            provider.by_dir.insert(dir, name.clone());
            provider.packages.insert(name, manifest_path);
        }

        Ok(provider)
    }

    /// Names of every discovered package, sorted
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Package whose manifest sits directly in the search root, if any
    pub fn root_package(&self) -> Option<&str> {
        self.root_package.as_deref()
    }

    fn collect_workspace_paths(&mut self, manifest: &toml::Table, dir: &Path) {
        let Some(deps) = manifest
            .get("workspace")
            .and_then(|w| w.get("dependencies"))
            .and_then(toml::Value::as_table)
        else {
            return;
        };

        for (key, spec) in deps {
            if let Some(path) = spec.get("path").and_then(toml::Value::as_str) {
                if let Ok(resolved) = dir.join(path).canonicalize() {
                    self.workspace_paths.insert(key.clone(), resolved);
                }
            }
        }
    }

    /// Resolve one dependency entry to a discovered package
    fn resolve(&self, dir: &Path, key: &str, spec: &toml::Value) -> Option<String> {
        let target = if let Some(path) = spec.get("path").and_then(toml::Value::as_str) {
            match dir.join(path).canonicalize() {
                Ok(resolved) => resolved,
                Err(err) => {
                    debug!(dependency = key, path, error = %err, "unresolvable path dependency");
                    return None;
                }
            }
        } else if spec.get("workspace").and_then(toml::Value::as_bool) == Some(true) {
            self.workspace_paths.get(key)?.clone()
        } else {
            return None;
        };

        self.by_dir.get(&target).cloned()
    }
}

impl DependencyProvider for CargoWorkspaceProvider {
    type Project = String;

    fn name(&self, project: &String) -> String {
        project.clone()
    }

    fn dependencies(&self, project: &String) -> Result<Vec<String>> {
        let Some(manifest_path) = self.packages.get(project) else {
            return Ok(Vec::new());
        };
        let manifest = read_manifest(manifest_path)?;
        let dir = manifest_path
            .parent()
            .with_context(|| format!("Manifest {} has no parent directory", manifest_path.display()))?;

        let mut dependencies: Vec<String> = Vec::new();
        for table in DEPENDENCY_TABLES {
            let Some(entries) = manifest.get(table).and_then(toml::Value::as_table) else {
                continue;
            };
            for (key, spec) in entries {
                if let Some(name) = self.resolve(dir, key, spec) {
                    if !dependencies.contains(&name) {
                        dependencies.push(name);
                    }
                }
            }
        }

        Ok(dependencies)
    }
}

fn read_manifest(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .parse::<toml::Table>()
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn package_name(manifest: &toml::Table) -> Option<String> {
    manifest
        .get("package")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}
