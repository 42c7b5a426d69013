//! Flat JSON file holding every scraped product.

use crate::models::Product;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed data file {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of [`JsonStore::merge_save`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub existing: usize,
    pub added: usize,
    pub skipped: usize,
}

pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<Product>, StoreError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound(self.path.clone())
            } else {
                StoreError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        serde_json::from_str(&raw).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Append records whose url is not stored yet and rewrite the file.
    ///
    /// An unreadable existing file is treated as empty.
    pub fn merge_save(&self, records: Vec<Product>) -> Result<MergeReport, StoreError> {
        let mut all = match self.load() {
            Ok(existing) => existing,
            Err(StoreError::NotFound(_)) => Vec::new(),
            Err(e) => {
                warn!("Starting from an empty store: {}", e);
                Vec::new()
            }
        };
        let existing = all.len();

        let mut seen: HashSet<String> = all.iter().map(|p| p.url.clone()).collect();
        let mut skipped = 0;
        for record in records {
            if seen.insert(record.url.clone()) {
                all.push(record);
            } else {
                skipped += 1;
            }
        }
        let added = all.len() - existing;
        debug!("Merged {} new records, skipped {} duplicates", added, skipped);

        self.write(&all)?;
        info!("Saved {} products to {}", all.len(), self.path.display());

        Ok(MergeReport {
            existing,
            added,
            skipped,
        })
    }

    fn write(&self, products: &[Product]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(products).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::product;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("materials.json"));
        assert!(matches!(store.load(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn saving_same_url_twice_keeps_one_copy() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("data").join("materials.json"));
        let record = product("Vasque", "ManoMano", "https://www.manomano.fr/p/1");

        let first = store.merge_save(vec![record.clone()]).unwrap();
        assert_eq!(first, MergeReport { existing: 0, added: 1, skipped: 0 });

        let second = store.merge_save(vec![record.clone()]).unwrap();
        assert_eq!(second, MergeReport { existing: 1, added: 0, skipped: 1 });

        let stored = store.load().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].url, record.url);
    }

    #[test]
    fn duplicates_within_a_batch_are_dropped() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("materials.json"));
        let a = product("Vasque", "ManoMano", "u1");
        let b = product("Vasque bis", "ManoMano", "u1");
        let c = product("Lavabo", "Castorama", "u2");

        let report = store.merge_save(vec![a, b, c]).unwrap();
        assert_eq!(report.added, 2);
        let names: Vec<_> = store.load().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Vasque", "Lavabo"]);
    }

    #[test]
    fn existing_records_stay_first_and_unchanged() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("materials.json"));
        store.merge_save(vec![product("Old", "Castorama", "u1")]).unwrap();

        let mut updated = product("New name", "Castorama", "u1");
        updated.price = Some("1 €".to_string());
        store
            .merge_save(vec![updated, product("Other", "ManoMano", "u2")])
            .unwrap();

        let stored = store.load().unwrap();
        assert_eq!(stored[0].name, "Old");
        assert_eq!(stored[1].name, "Other");
    }

    #[test]
    fn malformed_file_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("materials.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonStore::new(&path);

        let report = store.merge_save(vec![product("Vasque", "ManoMano", "u1")]).unwrap();
        assert_eq!(report.existing, 0);
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn writes_utf8_without_escaping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("materials.json");
        let store = JsonStore::new(&path);
        store.merge_save(vec![product("Évier céramique", "Castorama", "u1")]).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Évier céramique"));
        assert!(raw.starts_with("[\n"));
    }
}
