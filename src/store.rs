//! Read-through access to the on-disk stores.
//!
//! [`NavStore`] holds nothing but the [`Paths`]: every call reads the file
//! fresh and every mutation rewrites it wholesale. There is no cache to
//! invalidate, and no cross-request locking either; concurrent writers race
//! at the file level and the last rename wins.
//!
//! Primary stores (dataset, settings, tags, search aliases) propagate read
//! and parse failures. Auxiliary stores (collected items, component layout)
//! fall back to an empty default, since users can rebuild them.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{self, Config};
use crate::error::{NavError, Result};
use crate::files;
use crate::models::{ComponentLayout, Dataset, Tag, Web};
use crate::paths::Paths;
use crate::settings::Settings;
use crate::transform::filter_login_data;

/// Whether to apply login-based visibility filtering on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Drop login-only data for anonymous callers.
    Filtered { is_login: bool },
    /// Everything, for internal pipelines that rewrite the dataset.
    Unfiltered,
}

#[derive(Debug, Clone)]
pub struct NavStore {
    paths: Paths,
}

impl NavStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub async fn load_config(&self) -> Result<Config> {
        config::load_config(&self.paths.config).await
    }

    /// Loads `settings.json`. Never substitutes an empty document.
    pub async fn load_settings(&self) -> Result<Settings> {
        let path = &self.paths.settings;
        files::read_json(path)
            .await
            .map_err(|e| NavError::SettingsRead {
                path: path.clone(),
                details: e.to_string(),
            })
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        files::write_json(&self.paths.settings, settings).await
    }

    /// Reads the server-side dataset copy.
    pub async fn read_dataset(&self, visibility: Visibility) -> Result<Dataset> {
        let dataset: Dataset = files::read_json(&self.paths.server_db).await?;
        Ok(match visibility {
            Visibility::Filtered { is_login } => filter_login_data(dataset, is_login),
            Visibility::Unfiltered => dataset,
        })
    }

    pub async fn read_tags(&self) -> Result<Vec<Tag>> {
        files::read_json(&self.paths.tags).await
    }

    pub async fn read_search_aliases(&self) -> Result<Vec<Value>> {
        files::read_json(&self.paths.search).await
    }

    /// Collected items, newest first. Missing or corrupt files read as empty.
    pub async fn read_collected(&self) -> Vec<Web> {
        match files::read_json::<Value>(&self.paths.collect).await {
            Ok(value @ Value::Array(_)) => match serde_json::from_value(value) {
                Ok(items) => items,
                Err(e) => {
                    warn!(error = %e, "collected items unreadable, treating as empty");
                    Vec::new()
                }
            },
            Ok(_) => Vec::new(),
            Err(e) => {
                debug!(error = %e, "no collected items");
                Vec::new()
            }
        }
    }

    pub async fn save_collected(&self, items: &[Web]) -> Result<()> {
        files::write_json(&self.paths.collect, items).await
    }

    /// Creates an empty collected-items list if none exists.
    pub async fn ensure_collect_file(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.paths.collect)
            .await
            .unwrap_or(false)
        {
            return Ok(());
        }
        self.save_collected(&[]).await
    }

    /// Component layout. Missing or corrupt files read as the default.
    pub async fn read_component_layout(&self) -> ComponentLayout {
        match files::read_json(&self.paths.component).await {
            Ok(layout) => layout,
            Err(e) => {
                debug!(error = %e, "component layout unavailable, using default");
                ComponentLayout::default()
            }
        }
    }

    /// Dual write: server copy first, then the public copy.
    ///
    /// Both writes are attempted even if the first fails. There is no
    /// two-phase commit: on a partial failure the copies may disagree, and
    /// the server copy is the one read back by [`read_dataset`](Self::read_dataset).
    pub async fn write_dataset(&self, dataset: &Dataset) -> Result<()> {
        let server = files::write_json(&self.paths.server_db, dataset).await;
        let public = files::write_json(&self.paths.db, dataset).await;
        if let Err(e) = &server {
            warn!(error = %e, "server dataset copy not written");
        }
        if let Err(e) = &public {
            warn!(error = %e, "public dataset copy not written");
        }
        server.and(public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, WebTag};
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, NavStore) {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::new(tmp.path()).unwrap();
        (tmp, NavStore::new(paths))
    }

    fn dataset(n: usize) -> Dataset {
        let webs = (0..n)
            .map(|i| Web {
                id: i as u64 + 1,
                name: format!("站点 {} ✓", i),
                url: format!("https://{}.example.com", i),
                own_visible: i % 2 == 1,
                tags: if i == 0 {
                    vec![]
                } else {
                    vec![WebTag {
                        id: 1,
                        ..Default::default()
                    }]
                },
                ..Default::default()
            })
            .collect();
        vec![Category {
            id: 1,
            title: "分类".into(),
            web: webs,
            ..Default::default()
        }]
    }

    #[tokio::test]
    async fn test_round_trip_sizes() {
        let (_tmp, store) = store();
        for n in [0, 1, 5] {
            let data = if n == 0 { Vec::new() } else { dataset(n) };
            store.write_dataset(&data).await.unwrap();
            let back = store.read_dataset(Visibility::Unfiltered).await.unwrap();
            assert_eq!(back, data, "round trip failed for {} entries", n);
        }
    }

    #[tokio::test]
    async fn test_both_copies_written() {
        let (_tmp, store) = store();
        let data = dataset(3);
        store.write_dataset(&data).await.unwrap();
        let public = std::fs::read_to_string(&store.paths().db).unwrap();
        let server = std::fs::read_to_string(&store.paths().server_db).unwrap();
        assert_eq!(public, server);
    }

    #[tokio::test]
    async fn test_public_copy_failure_still_writes_server_copy() {
        let (_tmp, store) = store();
        // A directory where the public copy belongs makes its rename fail.
        std::fs::create_dir_all(store.paths().db.join("blocker")).unwrap();

        let data = dataset(2);
        let err = store.write_dataset(&data).await.unwrap_err();
        assert!(matches!(err, NavError::Write { .. }));

        let back = store.read_dataset(Visibility::Unfiltered).await.unwrap();
        assert_eq!(back, data);
    }

    #[tokio::test]
    async fn test_server_copy_failure_still_writes_public_copy() {
        let (_tmp, store) = store();
        std::fs::create_dir_all(store.paths().server_db.join("blocker")).unwrap();

        let data = dataset(2);
        assert!(store.write_dataset(&data).await.is_err());

        let public: Dataset =
            serde_json::from_str(&std::fs::read_to_string(&store.paths().db).unwrap()).unwrap();
        assert_eq!(public, data);
    }

    #[tokio::test]
    async fn test_login_filtering_on_read() {
        let (_tmp, store) = store();
        store.write_dataset(&dataset(4)).await.unwrap();

        let anon = store
            .read_dataset(Visibility::Filtered { is_login: false })
            .await
            .unwrap();
        assert!(anon[0].web.iter().all(|w| !w.own_visible));
        assert_eq!(anon[0].web.len(), 2);

        let authed = store
            .read_dataset(Visibility::Filtered { is_login: true })
            .await
            .unwrap();
        assert_eq!(authed[0].web.len(), 4);
    }

    #[tokio::test]
    async fn test_corrupt_primary_dataset_propagates() {
        let (_tmp, store) = store();
        std::fs::create_dir_all(store.paths().server_db.parent().unwrap()).unwrap();
        std::fs::write(&store.paths().server_db, "[{").unwrap();
        let err = store.read_dataset(Visibility::Unfiltered).await.unwrap_err();
        assert!(matches!(err, NavError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_missing_settings_is_an_error() {
        let (_tmp, store) = store();
        let err = store.load_settings().await.unwrap_err();
        assert!(matches!(err, NavError::SettingsRead { .. }));
    }

    #[tokio::test]
    async fn test_auxiliary_stores_tolerate_corruption() {
        let (_tmp, store) = store();
        assert!(store.read_collected().await.is_empty());
        assert_eq!(store.read_component_layout().await, ComponentLayout::default());

        std::fs::create_dir_all(store.paths().collect.parent().unwrap()).unwrap();
        std::fs::write(&store.paths().collect, "{\"not\":\"a list\"}").unwrap();
        std::fs::write(&store.paths().component, "garbage").unwrap();
        assert!(store.read_collected().await.is_empty());
        assert_eq!(store.read_component_layout().await.zoom, 1.0);
    }

    #[tokio::test]
    async fn test_ensure_collect_file_keeps_existing() {
        let (_tmp, store) = store();
        store.ensure_collect_file().await.unwrap();
        assert_eq!(std::fs::read_to_string(&store.paths().collect).unwrap(), "[]");

        let item = Web {
            extra: json!({"uuid": 5}).as_object().unwrap().clone(),
            ..Default::default()
        };
        store.save_collected(&[item]).await.unwrap();
        store.ensure_collect_file().await.unwrap();
        assert_eq!(store.read_collected().await.len(), 1);
    }
}
