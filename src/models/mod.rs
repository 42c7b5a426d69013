use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Category key attached to a product record.
///
/// Suppliers discovered through a flat link list write a single key, the
/// menu-walking discovery writes the `[primary, secondary, tertiary]` path
/// where the last element may be `null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Category {
    One(String),
    Many(Vec<Option<String>>),
}

impl Category {
    /// Non-null labels, in order.
    pub fn labels(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Category::One(label) => Box::new(std::iter::once(label.as_str())),
            Category::Many(labels) => Box::new(labels.iter().filter_map(|l| l.as_deref())),
        }
    }

    pub fn display(&self) -> String {
        self.labels().collect::<Vec<_>>().join(" > ")
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::One(String::new())
    }
}

/// One scraped product listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: Category,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub supplier: String,
    #[serde(default)]
    pub category_primary: Option<String>,
    #[serde(default)]
    pub category_secondary: Option<String>,
    #[serde(default)]
    pub category_tertiary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Category path fields that are set, primary first.
    pub fn path_fields(&self) -> impl Iterator<Item = &str> {
        [
            &self.category_primary,
            &self.category_secondary,
            &self.category_tertiary,
        ]
        .into_iter()
        .filter_map(|field| field.as_deref())
    }

    /// Fields shown beneath the title on a product card, skipping empty ones.
    pub fn detail_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        let category = self.category.display();
        if !category.is_empty() {
            fields.push(("category", category));
        }
        let optional = [
            ("url", Some(&self.url)),
            ("brand", self.brand.as_ref()),
            ("unit", self.unit.as_ref()),
            ("category_primary", self.category_primary.as_ref()),
            ("category_secondary", self.category_secondary.as_ref()),
            ("category_tertiary", self.category_tertiary.as_ref()),
        ];
        for (key, value) in optional {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                fields.push((key, value.clone()));
            }
        }
        fields
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::{Category, Product};

    pub fn product(name: &str, supplier: &str, url: &str) -> Product {
        Product {
            name: name.to_string(),
            category: Category::One("tiles".to_string()),
            price: Some("12,90 €".to_string()),
            url: url.to_string(),
            brand: None,
            unit: None,
            image_url: None,
            supplier: supplier.to_string(),
            category_primary: None,
            category_secondary: None,
            category_tertiary: None,
            scraped_at: None,
        }
    }
}
