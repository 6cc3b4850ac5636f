//! Document library backed by a JSON export
//!
//! The file holds `items` and `collections`; every field except `key` is
//! optional. A missing file yields an empty library.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default = "default_creator_type")]
    pub creator_type: String,
}

fn default_creator_type() -> String {
    "author".to_string()
}

impl Creator {
    pub fn display_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (true, _) => self.last_name.clone(),
            (false, true) => self.first_name.clone(),
            (false, false) => format!("{}, {}", self.last_name, self.first_name),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content_type: String,
    /// Extracted full text
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub key: String,
    #[serde(default)]
    pub item_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub creators: Vec<Creator>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub abstract_note: String,
    #[serde(default)]
    pub publication_title: String,
    #[serde(default)]
    pub doi: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Item {
    /// Four-digit year pulled from the free-form date
    pub fn year(&self) -> Option<&str> {
        self.date
            .as_bytes()
            .windows(4)
            .position(|w| w.iter().all(|b| b.is_ascii_digit()))
            .map(|i| &self.date[i..i + 4])
    }

    pub fn creator_summary(&self) -> String {
        match self.creators.len() {
            0 => String::new(),
            1 => self.creators[0].display_name(),
            2 => format!(
                "{} and {}",
                self.creators[0].display_name(),
                self.creators[1].display_name()
            ),
            _ => format!("{} et al.", self.creators[0].display_name()),
        }
    }

    fn matches(&self, needle: &str) -> bool {
        let contains = |haystack: &str| haystack.to_lowercase().contains(needle);
        contains(&self.title)
            || contains(&self.abstract_note)
            || contains(&self.publication_title)
            || self.tags.iter().any(|t| contains(t))
            || self
                .creators
                .iter()
                .any(|c| contains(&c.first_name) || contains(&c.last_name))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub parent_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    collections: Vec<Collection>,
}

/// Compact search hit
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub key: String,
    pub title: String,
    pub creators: String,
    pub year: Option<String>,
    pub item_type: String,
}

impl From<&Item> for ItemSummary {
    fn from(item: &Item) -> Self {
        Self {
            key: item.key.clone(),
            title: item.title.clone(),
            creators: item.creator_summary(),
            year: item.year().map(|y| y.to_string()),
            item_type: item.item_type.clone(),
        }
    }
}

/// Text returned by a content lookup
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    pub item_key: String,
    pub attachment_key: String,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct Library {
    items: Vec<Item>,
    collections: Vec<Collection>,
    item_index: HashMap<String, usize>,
    attachment_index: HashMap<String, (usize, usize)>,
}

impl Library {
    pub fn new(items: Vec<Item>, collections: Vec<Collection>) -> Self {
        let mut item_index = HashMap::new();
        let mut attachment_index = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            if item_index.insert(item.key.clone(), i).is_some() {
                warn!("Duplicate item key in library: {}", item.key);
            }
            for (a, attachment) in item.attachments.iter().enumerate() {
                attachment_index.insert(attachment.key.clone(), (i, a));
            }
        }
        Self {
            items,
            collections,
            item_index,
            attachment_index,
        }
    }

    /// Load a library export; an absent file gives an empty library
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Library file {} not found, starting empty", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read library file {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("Failed to parse library file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: LibraryFile = serde_json::from_str(raw)?;
        let library = Self::new(file.items, file.collections);
        info!(
            "Library loaded: {} items, {} collections",
            library.items.len(),
            library.collections.len()
        );
        Ok(library)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn item(&self, key: &str) -> Option<&Item> {
        self.item_index.get(key).map(|&i| &self.items[i])
    }

    /// Case-insensitive match over title, abstract, venue, tags and creators
    pub fn search(&self, query: &str, limit: usize) -> Vec<ItemSummary> {
        let needle = query.trim().to_lowercase();
        self.items
            .iter()
            .filter(|item| item.matches(&needle))
            .take(limit)
            .map(ItemSummary::from)
            .collect()
    }

    pub fn items_with_tag(&self, tag: &str) -> Vec<ItemSummary> {
        self.items
            .iter()
            .filter(|item| item.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            .map(ItemSummary::from)
            .collect()
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn collection(&self, key: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.key == key)
    }

    pub fn search_collections(&self, query: &str) -> Vec<&Collection> {
        let needle = query.trim().to_lowercase();
        self.collections
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn collection_items(&self, collection_key: &str) -> Vec<ItemSummary> {
        self.items
            .iter()
            .filter(|item| item.collections.iter().any(|c| c == collection_key))
            .map(ItemSummary::from)
            .collect()
    }

    /// Text of one attachment, or of every attachment of an item
    pub fn content(
        &self,
        item_key: Option<&str>,
        attachment_key: Option<&str>,
    ) -> Option<Vec<ContentBlock>> {
        if let Some(key) = attachment_key.filter(|k| !k.trim().is_empty()) {
            let &(i, a) = self.attachment_index.get(key)?;
            let item = &self.items[i];
            return Some(vec![content_block(item, &item.attachments[a])]);
        }
        let item = self.item(item_key?)?;
        Some(
            item.attachments
                .iter()
                .filter(|a| !a.text.is_empty())
                .map(|a| content_block(item, a))
                .collect(),
        )
    }
}

fn content_block(item: &Item, attachment: &Attachment) -> ContentBlock {
    ContentBlock {
        item_key: item.key.clone(),
        attachment_key: attachment.key.clone(),
        title: attachment.title.clone(),
        text: attachment.text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_extraction() {
        let item = Item {
            key: "K".to_string(),
            date: "March 2019".to_string(),
            ..Default::default()
        };
        assert_eq!(item.year(), Some("2019"));

        let undated = Item::default();
        assert_eq!(undated.year(), None);
    }

    #[test]
    fn test_creator_display_name() {
        let c = Creator {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            creator_type: "author".to_string(),
        };
        assert_eq!(c.display_name(), "Lovelace, Ada");
    }
}
