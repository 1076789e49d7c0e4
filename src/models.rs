//! Core data models for the navigation dataset.
//!
//! The dataset is an ordered tree: top-level [`Category`] values hold
//! sub-categories and [`Web`] entries. Every struct keeps keys it does not
//! know about in a flattened `rest` map, so the front end can extend the
//! documents without the server dropping fields on rewrite.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Full ordered dataset.
pub type Dataset = Vec<Category>;

/// A category node. Sub-categories live in `nav`, entries in `web`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub icon: String,
    /// Login required to see this category and everything under it.
    #[serde(default)]
    pub own_visible: bool,
    #[serde(default)]
    pub nav: Vec<Category>,
    #[serde(default)]
    pub web: Vec<Web>,
    /// Entries in this category and all descendants.
    #[serde(default)]
    pub web_count: u64,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A single navigation bookmark.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Web {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub tags: Vec<WebTag>,
    /// Login required to see this entry.
    #[serde(default)]
    pub own_visible: bool,
    #[serde(default)]
    pub user_view_count: u64,
    #[serde(default)]
    pub login_view_count: u64,
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub top: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub extra: Map<String, Value>,
    #[serde(default)]
    pub breadcrumb: Vec<String>,
    #[serde(default, skip_serializing_if = "Health::is_unknown")]
    pub health: Health,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Web {
    pub fn total_views(&self) -> u64 {
        self.user_view_count.saturating_add(self.login_view_count)
    }

    /// The collected-item token stored in `extra.uuid`, if any.
    pub fn uuid(&self) -> Option<u64> {
        self.extra.get("uuid").and_then(Value::as_u64)
    }
}

/// A tag reference held by an entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebTag {
    pub id: u64,
    /// Optional tag-specific link for this entry.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A tag definition from the ordered tag list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub sort: i64,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Last liveness-probe result for an entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Health {
    #[default]
    Unknown,
    Ok {
        code: u16,
    },
    Failed {
        reason: String,
    },
    Timeout,
}

impl Health {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Health::Unknown)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Health::Failed { .. } | Health::Timeout)
    }
}

/// Zoom factor plus widget placements. Opaque beyond passthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentLayout {
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default)]
    pub components: Vec<Value>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

fn default_zoom() -> f64 {
    1.0
}

impl Default for ComponentLayout {
    fn default() -> Self {
        Self {
            zoom: default_zoom(),
            components: Vec::new(),
            rest: Map::new(),
        }
    }
}

/// Aggregate view counters across a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewCounts {
    pub user_view_count: u64,
    pub login_view_count: u64,
}

/// Visits every entry in traversal order (category order, own entries
/// before sub-categories).
pub fn for_each_web<'a>(dataset: &'a [Category], f: &mut impl FnMut(&'a Web)) {
    for category in dataset {
        for web in &category.web {
            f(web);
        }
        for_each_web(&category.nav, f);
    }
}

/// Mutable counterpart of [`for_each_web`]; same traversal order.
pub fn for_each_web_mut(dataset: &mut [Category], f: &mut impl FnMut(&mut Web)) {
    for category in dataset {
        for web in &mut category.web {
            f(web);
        }
        for_each_web_mut(&mut category.nav, f);
    }
}
