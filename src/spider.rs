//! Liveness crawl over every entry URL.
//!
//! Probes run concurrently, bounded by `settings.spider_qty`, each with its
//! own timeout. Completed results are handed to the progress callback in
//! small ready batches so a caller can stream them while the crawl is still
//! running. A failing probe is recorded on its entry as a [`Health`] value
//! and never aborts the crawl.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{Category, Dataset, Health};
use crate::settings::Settings;
use crate::store::NavStore;

/// Entries whose URL starts with this marker point at the site itself.
pub const SELF_SYMBOL: char = '!';

/// Upper bound on results delivered in one progress batch.
const PROGRESS_BATCH: usize = 16;

/// Checks whether a URL responds.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str) -> Health;
}

/// Probe backed by a shared `reqwest` client.
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("nav-server/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &str) -> Health {
        let request = self.client.get(url).send();
        match tokio::time::timeout(self.timeout, request).await {
            Err(_) => Health::Timeout,
            Ok(Err(e)) if e.is_timeout() => Health::Timeout,
            Ok(Err(e)) => Health::Failed {
                reason: e.to_string(),
            },
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_success() {
                    Health::Ok {
                        code: status.as_u16(),
                    }
                } else {
                    Health::Failed {
                        reason: format!("HTTP {}", status.as_u16()),
                    }
                }
            }
        }
    }
}

/// One completed probe, as streamed to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub id: u64,
    pub name: String,
    pub url: String,
    pub health: Health,
    /// The entry or one of its categories requires login.
    #[serde(skip)]
    pub login_only: bool,
}

/// Result of a full crawl.
#[derive(Debug)]
pub struct SpiderOutcome {
    pub elapsed: Duration,
    /// The input dataset with every probed entry's `health` updated.
    pub webs: Dataset,
    pub error_url_count: u64,
}

struct Target {
    slot: usize,
    id: u64,
    name: String,
    url: String,
    login_only: bool,
}

/// Probes every entry with a URL exactly once.
///
/// `on_progress` is called once per ready batch as probes complete; order
/// across entries is unspecified.
pub async fn spider_webs<F>(
    mut webs: Dataset,
    settings: &Settings,
    probe: Arc<dyn Probe>,
    mut on_progress: F,
) -> SpiderOutcome
where
    F: FnMut(Vec<ProbeReport>),
{
    let started = Instant::now();
    let mut targets = Vec::new();
    let mut slots = 0;
    collect_targets(&webs, false, &mut slots, &mut targets);

    let limit = settings.spider_qty.max(1);
    info!(targets = targets.len(), concurrency = limit, "spider started");

    let mut results: Vec<Option<Health>> = vec![None; slots];
    let mut reports = stream::iter(targets)
        .map(|target| {
            let probe = probe.clone();
            async move {
                let health = probe.probe(target.url.trim_start_matches(SELF_SYMBOL)).await;
                debug!(url = %target.url, ?health, "probed");
                (
                    target.slot,
                    ProbeReport {
                        id: target.id,
                        name: target.name,
                        url: target.url,
                        health,
                        login_only: target.login_only,
                    },
                )
            }
        })
        .buffer_unordered(limit)
        .ready_chunks(PROGRESS_BATCH);

    while let Some(batch) = reports.next().await {
        let mut out = Vec::with_capacity(batch.len());
        for (slot, report) in batch {
            results[slot] = Some(report.health.clone());
            out.push(report);
        }
        on_progress(out);
    }

    let mut error_url_count = 0;
    let mut slot = 0;
    apply_results(&mut webs, &mut results, &mut slot, &mut error_url_count);

    let elapsed = started.elapsed();
    info!(
        elapsed_ms = elapsed.as_millis() as u64,
        errors = error_url_count,
        "spider finished"
    );
    SpiderOutcome {
        elapsed,
        webs,
        error_url_count,
    }
}

impl NavStore {
    /// Persists a finished crawl: the updated dataset (dual write) and the
    /// failure count in settings.
    pub async fn record_crawl(&self, outcome: &SpiderOutcome, settings: &mut Settings) -> Result<()> {
        settings.error_url_count = outcome.error_url_count;
        self.write_dataset(&outcome.webs).await?;
        self.save_settings(settings).await
    }
}

// Slots number every entry in traversal order; both walks below must agree.
fn collect_targets(
    categories: &[Category],
    hidden: bool,
    slot: &mut usize,
    targets: &mut Vec<Target>,
) {
    for category in categories {
        let hidden = hidden || category.own_visible;
        for web in &category.web {
            if !web.url.trim().is_empty() {
                targets.push(Target {
                    slot: *slot,
                    id: web.id,
                    name: web.name.clone(),
                    url: web.url.trim().to_string(),
                    login_only: hidden || web.own_visible,
                });
            }
            *slot += 1;
        }
        collect_targets(&category.nav, hidden, slot, targets);
    }
}

fn apply_results(
    categories: &mut [Category],
    results: &mut [Option<Health>],
    slot: &mut usize,
    errors: &mut u64,
) {
    for category in categories {
        for web in &mut category.web {
            if let Some(health) = results[*slot].take() {
                if health.is_failure() {
                    *errors += 1;
                }
                web.health = health;
            }
            *slot += 1;
        }
        apply_results(&mut category.nav, results, slot, errors);
    }
}
