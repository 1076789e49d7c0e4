//! "Save for later" items submitted by visitors.
//!
//! Items are stored newest first. Each saved item receives a creation token
//! in `extra.uuid`: the current epoch milliseconds, bumped past every token
//! already in the list so two saves in the same millisecond stay distinct.

use chrono::{Local, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::models::Web;
use crate::store::NavStore;

/// Next creation token: `now_ms`, or one past the largest existing token.
pub fn next_token(existing: &[Web], now_ms: u64) -> u64 {
    let max = existing.iter().filter_map(Web::uuid).max().unwrap_or(0);
    now_ms.max(max.saturating_add(1))
}

/// Stamps `item` and inserts it at the front of `items`. Returns the token.
pub fn insert_collected(items: &mut Vec<Web>, mut item: Web, now_ms: u64, created_at: String) -> u64 {
    let token = next_token(items, now_ms);
    item.extra.insert("uuid".to_string(), Value::from(token));
    item.created_at = created_at;
    items.insert(0, item);
    token
}

/// Drops every item whose token matches one of `removed`.
pub fn remove_collected(items: Vec<Web>, removed: &[Web]) -> Vec<Web> {
    let tokens: Vec<u64> = removed.iter().filter_map(Web::uuid).collect();
    items
        .into_iter()
        .filter(|item| match item.uuid() {
            Some(token) => !tokens.contains(&token),
            None => true,
        })
        .collect()
}

impl NavStore {
    /// Saves a new collected item and returns the updated list.
    pub async fn save_collected_item(&self, item: Web) -> Result<Vec<Web>> {
        let mut items = self.read_collected().await;
        let now_ms = Utc::now().timestamp_millis().max(0) as u64;
        let created_at = Local::now().format("%Y-%m-%d %H:%M").to_string();
        insert_collected(&mut items, item, now_ms, created_at);
        self.save_collected(&items).await?;
        Ok(items)
    }

    /// Deletes collected items by token and returns what remains.
    pub async fn delete_collected_items(&self, removed: &[Web]) -> Result<Vec<Web>> {
        let items = remove_collected(self.read_collected().await, removed);
        self.save_collected(&items).await?;
        Ok(items)
    }
}
