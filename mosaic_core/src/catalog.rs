//! Content providers.

use mosaic_env::{CatalogItem, Category};
use std::collections::HashMap;
use std::sync::Arc;

/// Source of the items shown on a wall.
pub trait CatalogProvider: Send + Sync + 'static {
    /// All items of `category`, in display order.
    fn items(&self, category: Category) -> Vec<Arc<CatalogItem>>;
}

/// A catalog held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    by_category: HashMap<Category, Vec<Arc<CatalogItem>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let mut catalog = Self::new();
        for item in items {
            catalog.insert(item);
        }
        catalog
    }

    /// Loads a JSON array of items.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let items: Vec<CatalogItem> = serde_json::from_str(json)?;
        Ok(Self::from_items(items))
    }

    pub fn insert(&mut self, item: CatalogItem) {
        self.by_category.entry(item.category).or_default().push(Arc::new(item));
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CatalogProvider for InMemoryCatalog {
    fn items(&self, category: Category) -> Vec<Arc<CatalogItem>> {
        self.by_category.get(&category).cloned().unwrap_or_default()
    }
}
