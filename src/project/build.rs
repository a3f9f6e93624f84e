//! Package graph resolution and the per-package front-end run.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::ast::{Attribute, Item};
use crate::error::ParseError;
use crate::expand::expand_crate;
use crate::parser::{ItemParsing, Parser};
use crate::token::Edition;

use super::manifest::Manifest;

#[derive(Debug)]
pub enum BuildError {
    Manifest(String),
    Io(String),
    CyclicDependency(String),
    Parse { file: String, error: ParseError },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Manifest(msg) | BuildError::Io(msg) => write!(f, "{}", msg),
            BuildError::CyclicDependency(name) => {
                write!(f, "cyclic dependency involving `{}`", name)
            }
            BuildError::Parse { file, error } => write!(f, "{}: {}", file, error),
        }
    }
}

impl std::error::Error for BuildError {}

/// Walk upwards from `start` looking for a `Ferroc.toml`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start.to_path_buf());
    while let Some(d) = dir {
        if d.join("Ferroc.toml").exists() {
            return Some(d);
        }
        dir = d.parent().map(|p| p.to_path_buf());
    }
    None
}

/// Resolve the dependency build order for the project at `root`:
/// dependencies first, the root package last. Only `path` dependencies are
/// followed; bare version requirements are out of scope for the driver.
pub fn build_order(root: &Path) -> Result<Vec<(PathBuf, Manifest)>, BuildError> {
    let mut order = Vec::new();
    let mut visiting = HashSet::new();
    let mut done = HashSet::new();
    visit(root, &mut order, &mut visiting, &mut done)?;
    Ok(order)
}

fn visit(
    dir: &Path,
    order: &mut Vec<(PathBuf, Manifest)>,
    visiting: &mut HashSet<PathBuf>,
    done: &mut HashSet<PathBuf>,
) -> Result<(), BuildError> {
    let key = dir.to_path_buf();
    if done.contains(&key) {
        return Ok(());
    }
    let manifest =
        Manifest::load(&dir.join("Ferroc.toml")).map_err(BuildError::Manifest)?;
    if !visiting.insert(key.clone()) {
        return Err(BuildError::CyclicDependency(manifest.package.name));
    }
    // BTreeMap keeps the visit order deterministic.
    let deps: BTreeMap<_, _> = manifest.dependencies.clone().into_iter().collect();
    for (_name, spec) in deps {
        if let Some(rel) = spec.path() {
            visit(&dir.join(rel), order, visiting, done)?;
        }
    }
    visiting.remove(&key);
    done.insert(key.clone());
    order.push((key, manifest));
    Ok(())
}

/// A front-end-processed crate: parsed items after macro expansion.
pub struct ParsedCrate {
    pub name: String,
    pub edition: Edition,
    pub inner_attrs: Vec<Attribute>,
    pub items: Vec<Item>,
}

/// Lex, parse, and macro-expand one crate root.
pub fn run_front_end(
    name: &str,
    entry: &Path,
    edition: Edition,
) -> Result<ParsedCrate, BuildError> {
    let source = std::fs::read_to_string(entry)
        .map_err(|e| BuildError::Io(format!("unable to read {}: {}", entry.display(), e)))?;
    let mut parser = Parser::for_source(&entry.display().to_string(), &source, edition);
    let (inner_attrs, mut items) =
        parser
            .parse_mod_items(true)
            .map_err(|error| BuildError::Parse {
                file: entry.display().to_string(),
                error,
            })?;
    expand_crate(&mut items, name).map_err(|error| BuildError::Parse {
        file: entry.display().to_string(),
        error,
    })?;
    Ok(ParsedCrate {
        name: name.to_string(),
        edition,
        inner_attrs,
        items,
    })
}
