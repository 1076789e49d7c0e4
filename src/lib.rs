//! # nav-server
//!
//! A self-hosted bookmark and navigation-site server. All state lives in
//! flat files: the navigation dataset, tags, settings, search aliases,
//! collected items, and component layout as JSON; server configuration as
//! YAML; and a rendered `index.html` with injectable marker regions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌─────────────┐   ┌───────────────┐
//! │   HTTP   │──▶│  NavStore  │──▶│  transform  │──▶│   response    │
//! │ (server) │   │  (read)    │   │  set_webs   │   └───────────────┘
//! └────┬─────┘   └────────────┘   └─────────────┘
//!      │ body    ┌────────────┐   ┌─────────────┐   ┌───────────────┐
//!      └────────▶│ validation │──▶│ dual write  │──▶│ index.html    │
//!                └────────────┘   │ server→pub  │   │ marker rewrite│
//!                                 └─────────────┘   └───────────────┘
//!      spider ──▶ bounded probes ──▶ streamed batches ──▶ dual write
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`paths`] | On-disk artifact locations |
//! | [`config`] | YAML server configuration |
//! | [`settings`] | Display/behavior preferences |
//! | [`models`] | Dataset, tag, and layout types |
//! | [`store`] | Read-through stores and dual write |
//! | [`publish`] | `index.html` regeneration and config update |
//! | [`template`] | Marker regions and HTML rendering |
//! | [`transform`] | `set_webs`, login filtering, view counts |
//! | [`spider`] | Liveness crawl |
//! | [`collect`] | Collected items |
//! | [`notify`] | Collect notifications |
//! | [`remote`] | Metadata, translation, screenshot collaborators |
//! | [`server`] | HTTP API |

pub mod collect;
pub mod config;
pub mod error;
pub mod files;
pub mod models;
pub mod notify;
pub mod paths;
pub mod publish;
pub mod remote;
pub mod server;
pub mod settings;
pub mod spider;
pub mod store;
pub mod template;
pub mod transform;
