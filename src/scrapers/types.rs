use crate::models::Category;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a discovered category within its supplier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CategoryKey {
    /// Flat key, e.g. `salle_de_bain`
    Named(String),
    /// Menu path from primary to tertiary
    Path {
        primary: String,
        secondary: String,
        tertiary: Option<String>,
    },
}

impl CategoryKey {
    /// Key used to look up the selector set in the supplier config
    pub fn selector_key(&self) -> &str {
        match self {
            CategoryKey::Named(name) => name,
            CategoryKey::Path { .. } => "tiles",
        }
    }

    pub fn to_category(&self) -> Category {
        match self {
            CategoryKey::Named(name) => Category::One(name.clone()),
            CategoryKey::Path {
                primary,
                secondary,
                tertiary,
            } => Category::Many(vec![
                Some(primary.clone()),
                Some(secondary.clone()),
                tertiary.clone(),
            ]),
        }
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKey::Named(name) => write!(f, "{}", name),
            CategoryKey::Path {
                primary,
                secondary,
                tertiary: Some(tertiary),
            } => write!(f, "{} > {} > {}", primary, secondary, tertiary),
            CategoryKey::Path {
                primary, secondary, ..
            } => write!(f, "{} > {}", primary, secondary),
        }
    }
}

/// A category listing page found on the supplier site
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveredCategory {
    pub key: CategoryKey,
    pub url: String,
}

impl DiscoveredCategory {
    pub fn named(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: CategoryKey::Named(key.into()),
            url: url.into(),
        }
    }
}

/// One page to load
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub url: String,
    /// Selector that must be present before the HTML is captured
    pub wait_for: Option<String>,
}

impl PageRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            wait_for: None,
        }
    }

    pub fn waiting_for(mut self, selector: impl Into<String>) -> Self {
        self.wait_for = Some(selector.into());
        self
    }
}
