//! Rewrites of the rendered `index.html`.
//!
//! Two paths touch the document: a settings update re-renders the SEO region,
//! and a config update re-renders the runtime-config region (and rewrites the
//! YAML config). Both render the complete new document in memory first, so a
//! missing marker never leaves a half-written file. For a config update a
//! missing marker rejects the operation; for a settings update it only skips
//! the SEO refresh.

use serde_json::Value;
use tracing::{info, warn};

use crate::config::{self, Config};
use crate::error::{NavError, Result};
use crate::files;
use crate::settings::Settings;
use crate::store::{NavStore, Visibility};
use crate::template::{render_const_script, render_seo, CONST_REGION, SEO_REGION};
use crate::transform::set_webs;

impl NavStore {
    async fn index_html_exists(&self) -> bool {
        tokio::fs::try_exists(&self.paths().index_html)
            .await
            .unwrap_or(false)
    }

    /// Re-renders the SEO region from the public view of the dataset.
    ///
    /// Returns `Ok(false)` without touching anything when no rendered HTML
    /// exists yet or it has no SEO region.
    pub async fn regenerate_index_html(&self, settings: &Settings) -> Result<bool> {
        if !self.index_html_exists().await {
            return Ok(false);
        }
        let path = &self.paths().index_html;
        let html = files::read_text(path).await?;
        let webs = self
            .read_dataset(Visibility::Filtered { is_login: false })
            .await?;
        let tags = self.read_tags().await?;
        let webs = set_webs(webs, settings, &tags);

        let html = match SEO_REGION.replace(&html, &render_seo(&webs, settings), path) {
            Ok(html) => html,
            Err(NavError::TemplateMarkerMissing { marker, .. }) => {
                warn!(path = %path.display(), %marker, "no SEO region, index.html left unchanged");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        files::atomic_write(path, html.as_bytes()).await?;
        info!(path = %path.display(), "index.html SEO block regenerated");
        Ok(true)
    }

    /// Shallow-merges `patch` onto the config, persists it as YAML, and
    /// rewrites the runtime-config region of `index.html`.
    ///
    /// Rejected with [`NavError::MissingIndexHtml`] before setup has produced
    /// the HTML, and with [`NavError::TemplateMarkerMissing`] when the markers
    /// are absent; in both cases neither file is modified.
    pub async fn update_config(&self, patch: &Value) -> Result<Config> {
        if !self.index_html_exists().await {
            return Err(NavError::MissingIndexHtml);
        }
        let paths = self.paths();

        let merged = config::merge_config(&self.load_config().await?, patch)?;
        let yaml = config::to_yaml(&paths.config, &merged)?;

        let html = files::read_text(&paths.index_html).await?;
        let html = CONST_REGION.replace(&html, &render_const_script(&merged), &paths.index_html)?;

        files::atomic_write(&paths.config, yaml.as_bytes()).await?;
        files::atomic_write(&paths.index_html, html.as_bytes()).await?;
        info!("config updated");
        Ok(merged)
    }
}
