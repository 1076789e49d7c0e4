//! On-disk artifact locations.
//!
//! Every file the server reads or writes is resolved once from the base
//! installation directory. Nothing here touches file contents.

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

use crate::error::NavError;

/// Fixed mapping of logical artifact names to absolute paths.
#[derive(Debug, Clone)]
pub struct Paths {
    pub root: PathBuf,
    /// Public dataset copy consumed by the static front end.
    pub db: PathBuf,
    /// Server-side dataset copy. Authoritative when the two copies disagree.
    pub server_db: PathBuf,
    pub settings: PathBuf,
    pub tags: PathBuf,
    pub search: PathBuf,
    pub collect: PathBuf,
    pub component: PathBuf,
    /// Root served statically; uploads live in `upload` beneath it.
    pub upload_root: PathBuf,
    pub upload: PathBuf,
    pub dist: PathBuf,
    pub index_html: PathBuf,
    pub config: PathBuf,
}

impl Paths {
    /// Resolves the registry for `root`. Fails if the directory cannot be resolved.
    pub fn new(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve base directory: {}", root.display()))?;
        Ok(Self::from_root(root))
    }

    fn from_root(root: PathBuf) -> Self {
        let data = root.join("data");
        let upload_root = root.join("_upload");
        let dist = root.join("dist").join("browser");
        Self {
            db: data.join("db.json"),
            server_db: data.join("server_db.json"),
            settings: data.join("settings.json"),
            tags: data.join("tag.json"),
            search: data.join("search.json"),
            collect: data.join("collect.json"),
            component: data.join("component.json"),
            upload: upload_root.join("images"),
            upload_root,
            index_html: dist.join("index.html"),
            dist,
            config: root.join("nav.config.yaml"),
            root,
        }
    }

    /// Maps a client-supplied relative path into the base directory.
    ///
    /// Absolute paths and `..` components are rejected so a request can never
    /// write outside the installation.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, NavError> {
        resolve_under(&self.root, relative)
    }

    /// Like [`resolve`](Self::resolve), but rooted at the upload directory.
    pub fn resolve_upload(&self, relative: &str) -> Result<PathBuf, NavError> {
        resolve_under(&self.upload, relative)
    }
}

fn resolve_under(base: &Path, relative: &str) -> Result<PathBuf, NavError> {
    let rel = Path::new(relative.trim_start_matches("./"));
    if relative.trim().is_empty() {
        return Err(NavError::validation("path must not be empty"));
    }
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(NavError::validation(format!(
                    "path must stay inside the installation: {}",
                    relative
                )))
            }
        }
    }
    Ok(base.join(rel))
}
