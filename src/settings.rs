//! Display and behavior preferences (`settings.json`).
//!
//! Only the keys the server itself acts on are typed; everything else the
//! front end stores is carried through untouched in `rest`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: String,
    /// Contact address; also the notification recipient for collected items.
    #[serde(default)]
    pub email: String,
    /// Number of entries that failed the last liveness crawl.
    #[serde(default)]
    pub error_url_count: u64,
    /// Per-probe timeout in seconds.
    #[serde(default = "default_spider_timeout")]
    pub spider_timeout: u64,
    /// Maximum probes in flight.
    #[serde(default = "default_spider_qty")]
    pub spider_qty: usize,
    #[serde(default)]
    pub web_sort: WebSort,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

fn default_spider_timeout() -> u64 {
    6
}

fn default_spider_qty() -> usize {
    20
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            keywords: String::new(),
            email: String::new(),
            error_url_count: 0,
            spider_timeout: default_spider_timeout(),
            spider_qty: default_spider_qty(),
            web_sort: WebSort::default(),
            rest: Map::new(),
        }
    }
}

/// Ordering policy for entries within a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebSort {
    /// Keep input order.
    #[default]
    None,
    /// Ascending `index`.
    Index,
    /// Case-insensitive name.
    Name,
    /// Most viewed first.
    Views,
}
