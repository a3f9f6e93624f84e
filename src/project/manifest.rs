//! `Ferroc.toml` manifest parsing.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Project manifest (`Ferroc.toml`).
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub package: Package,
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_edition")]
    pub edition: String,
    /// Crate root, relative to the manifest.
    #[serde(default = "default_entry")]
    pub entry: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_edition() -> String {
    "2015".to_string()
}

fn default_entry() -> String {
    "src/lib.rs".to_string()
}

/// Dependency specification: a bare version string, or a table with a
/// local `path`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Simple(String),
    Detailed {
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        path: Option<String>,
    },
}

impl DependencySpec {
    pub fn path(&self) -> Option<&str> {
        match self {
            DependencySpec::Simple(_) => None,
            DependencySpec::Detailed { path, .. } => path.as_deref(),
        }
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Manifest, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("unable to read {}: {}", path.display(), e))?;
        toml::from_str(&text).map_err(|e| format!("invalid manifest {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_manifest() {
        let m: Manifest = toml::from_str(
            r#"
            [package]
            name = "demo"
            "#,
        )
        .unwrap();
        assert_eq!(m.package.name, "demo");
        assert_eq!(m.package.edition, "2015");
        assert_eq!(m.package.entry, "src/lib.rs");
    }

    #[test]
    fn parses_dependency_forms() {
        let m: Manifest = toml::from_str(
            r#"
            [package]
            name = "demo"
            edition = "2018"

            [dependencies]
            alpha = "1.0"
            beta = { path = "../beta" }
            "#,
        )
        .unwrap();
        assert_eq!(m.dependencies.len(), 2);
        assert_eq!(m.dependencies["beta"].path(), Some("../beta"));
        assert_eq!(m.dependencies["alpha"].path(), None);
    }
}
