//! Sector index: ordering, depth and id-to-name lookup.
//!
//! Sectors arrive from the store unordered. The index sorts them by their
//! nesting path so that a flat listing reads as a hierarchy, and keeps a map
//! from sector id to display name for resolving chosen ids.
//!
//! Depth is inferred purely from the number of delimiter-separated segments
//! in the nesting path; there are no parent pointers.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SectorsConfig;
use crate::error::{Error, Result};
use crate::model::{Sector, SECTORS_COLLECTION};
use crate::store::DocumentStore;

/// How nesting paths are compared when ordering sectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestingOrder {
    /// Plain string comparison of the whole path; `10` sorts before `2`.
    #[default]
    Lexicographic,
    /// Segment-by-segment comparison, numeric where both segments are
    /// integers; a path sorts directly before its own descendants.
    NumericSegments,
}

impl NestingOrder {
    /// Compare two nesting paths.
    #[must_use]
    pub fn compare(self, a: &str, b: &str, delimiter: &str) -> Ordering {
        match self {
            Self::Lexicographic => a.cmp(b),
            Self::NumericSegments => compare_segments(a, b, delimiter),
        }
    }
}

impl std::fmt::Display for NestingOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexicographic => write!(f, "lexicographic"),
            Self::NumericSegments => write!(f, "numeric_segments"),
        }
    }
}

fn compare_segments(a: &str, b: &str, delimiter: &str) -> Ordering {
    let mut left = a.split(delimiter);
    let mut right = b.split(delimiter);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => x.cmp(y),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// Number of delimiter-separated segments in a nesting path.
///
/// `1` is depth 1, `1-19` depth 2, `1-19-342` depth 3. An empty path is a
/// single empty segment and therefore depth 1.
#[must_use]
pub fn depth(nesting: &str, delimiter: &str) -> usize {
    if delimiter.is_empty() {
        return 1;
    }
    nesting.split(delimiter).count()
}

/// Sectors in display order plus an id-to-name lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectorIndex {
    sectors: Vec<Sector>,
    names: HashMap<String, String>,
    delimiter: String,
}

impl SectorIndex {
    /// Build an index with one of the built-in orderings.
    #[must_use]
    pub fn build(sectors: Vec<Sector>, delimiter: &str, order: NestingOrder) -> Self {
        Self::build_with(sectors, delimiter, |a, b| order.compare(a, b, delimiter))
    }

    /// Build an index with a caller-supplied nesting comparator.
    ///
    /// The sort is stable: sectors whose paths compare equal keep their
    /// input order. When two sectors share an id, the later one in display
    /// order provides the name.
    #[must_use]
    pub fn build_with<F>(mut sectors: Vec<Sector>, delimiter: &str, compare: F) -> Self
    where
        F: Fn(&str, &str) -> Ordering,
    {
        sectors.sort_by(|a, b| compare(&a.nesting, &b.nesting));

        let names = sectors
            .iter()
            .map(|s| (s.id.clone(), s.name.clone()))
            .collect();

        Self {
            sectors,
            names,
            delimiter: delimiter.to_string(),
        }
    }

    /// Sectors in display order.
    #[must_use]
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    /// Sectors in display order, each with its depth.
    pub fn entries(&self) -> impl Iterator<Item = (&Sector, usize)> + '_ {
        self.sectors
            .iter()
            .map(|s| (s, depth(&s.nesting, &self.delimiter)))
    }

    /// Display name of a sector id; empty when the id is unknown.
    #[must_use]
    pub fn name_of(&self, id: &str) -> &str {
        self.names.get(id).map_or("", String::as_str)
    }

    /// Display names of several ids, in the given order.
    #[must_use]
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Vec<&str> {
        ids.iter().map(|id| self.name_of(id.as_ref())).collect()
    }

    /// Whether the id names a known sector.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.names.contains_key(id)
    }

    /// Depth of a sector's nesting path.
    #[must_use]
    pub fn depth_of(&self, sector: &Sector) -> usize {
        depth(&sector.nesting, &self.delimiter)
    }

    /// Number of sectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    /// Whether the index holds no sectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}

/// A sector as supplied by the taxonomy owner for import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorSeed {
    /// Fixed identifier; the store assigns one when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Display label.
    pub name: String,
    /// Nesting path.
    pub nesting: String,
}

/// Loads the sector collection and builds a [`SectorIndex`] from it.
#[derive(Debug, Clone)]
pub struct SectorIndexBuilder {
    store: Arc<dyn DocumentStore>,
    delimiter: String,
    order: NestingOrder,
}

impl SectorIndexBuilder {
    /// Create a builder with the default delimiter and ordering.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::from_config(store, &SectorsConfig::default())
    }

    /// Create a builder from the sectors configuration section.
    #[must_use]
    pub fn from_config(store: Arc<dyn DocumentStore>, config: &SectorsConfig) -> Self {
        Self {
            store,
            delimiter: config.delimiter.clone(),
            order: config.order,
        }
    }

    /// Fetch every sector and build the index.
    ///
    /// Documents whose fields have the wrong type are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the store call fails.
    pub async fn load(&self) -> Result<SectorIndex> {
        let documents = self.store.list(SECTORS_COLLECTION).await?;
        let mut sectors = Vec::with_capacity(documents.len());
        for doc in documents {
            match Sector::from_document(doc) {
                Ok(sector) => {
                    if sector.nesting.is_empty() {
                        debug!("Sector {} has no nesting path", sector.id);
                    }
                    sectors.push(sector);
                }
                Err(e) => warn!("Skipping sector: {}", e),
            }
        }

        let index = SectorIndex::build(sectors, &self.delimiter, self.order);
        debug!("Built sector index with {} entries", index.len());
        Ok(index)
    }

    /// Write sectors into the store on behalf of the taxonomy owner.
    ///
    /// Seeds with an id replace that document; seeds without one are created.
    /// Returns the number of sectors written.
    ///
    /// # Errors
    ///
    /// Returns an error on the first failed store call; earlier writes stay.
    pub async fn import(&self, seeds: Vec<SectorSeed>) -> Result<usize> {
        let mut written = 0;
        for seed in seeds {
            let sector = Sector::new(seed.id.clone().unwrap_or_default(), seed.name, seed.nesting);
            let fields = sector.to_fields()?;
            match seed.id {
                Some(id) if !id.is_empty() => {
                    self.store
                        .upsert_by_id(SECTORS_COLLECTION, &id, fields)
                        .await?;
                }
                _ => {
                    self.store.create(SECTORS_COLLECTION, fields).await?;
                }
            }
            written += 1;
        }
        info!("Imported {} sectors", written);
        Ok(written)
    }

    /// Parse a JSON array of sector seeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON array of `{name, nesting}`
    /// objects.
    pub fn parse_seeds(json: &str) -> Result<Vec<SectorSeed>> {
        serde_json::from_str(json).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, MemoryStore, StoreOp};
    use serde_json::json;

    fn sector(id: &str, name: &str, nesting: &str) -> Sector {
        Sector::new(id, name, nesting)
    }

    fn nestings(index: &SectorIndex) -> Vec<&str> {
        index.sectors().iter().map(|s| s.nesting.as_str()).collect()
    }

    fn seed_store(store: &MemoryStore, sectors: &[(&str, &str, &str)]) {
        for (id, name, nesting) in sectors {
            let serde_json::Value::Object(fields) = json!({"name": name, "nesting": nesting})
            else {
                unreachable!()
            };
            store
                .insert(SECTORS_COLLECTION, Document::new(*id, fields))
                .unwrap();
        }
    }

    #[test]
    fn test_depth_counts_segments() {
        assert_eq!(depth("1", "-"), 1);
        assert_eq!(depth("1-19", "-"), 2);
        assert_eq!(depth("1-19-342", "-"), 3);
        assert_eq!(depth("1-19-342-7", "-"), 4);
    }

    #[test]
    fn test_depth_of_empty_and_malformed_paths() {
        assert_eq!(depth("", "-"), 1);
        assert_eq!(depth("1--2", "-"), 3);
        assert_eq!(depth("1-", "-"), 2);
    }

    #[test]
    fn test_depth_custom_delimiter() {
        assert_eq!(depth("1.19.342", "."), 3);
        assert_eq!(depth("1-19", "."), 1);
    }

    #[test]
    fn test_lexicographic_order_keeps_string_quirk() {
        let index = SectorIndex::build(
            vec![
                sector("a", "Two", "2"),
                sector("b", "Ten", "10"),
                sector("c", "One", "1"),
            ],
            "-",
            NestingOrder::Lexicographic,
        );

        assert_eq!(nestings(&index), vec!["1", "10", "2"]);
    }

    #[test]
    fn test_lexicographic_groups_children_under_parent() {
        let index = SectorIndex::build(
            vec![
                sector("342", "Food", "1-19-342"),
                sector("1", "Manufacturing", "1"),
                sector("3", "Service", "3"),
                sector("19", "Food and Beverage", "1-19"),
            ],
            "-",
            NestingOrder::Lexicographic,
        );

        assert_eq!(nestings(&index), vec!["1", "1-19", "1-19-342", "3"]);
    }

    #[test]
    fn test_numeric_segments_order() {
        let index = SectorIndex::build(
            vec![
                sector("a", "", "2"),
                sector("b", "", "10"),
                sector("c", "", "1-10"),
                sector("d", "", "1-9"),
                sector("e", "", "1"),
            ],
            "-",
            NestingOrder::NumericSegments,
        );

        assert_eq!(nestings(&index), vec!["1", "1-9", "1-10", "2", "10"]);
    }

    #[test]
    fn test_numeric_segments_falls_back_to_strings() {
        assert_eq!(
            NestingOrder::NumericSegments.compare("a-2", "a-10", "-"),
            Ordering::Less
        );
        assert_eq!(
            NestingOrder::NumericSegments.compare("b", "a", "-"),
            Ordering::Greater
        );
        assert_eq!(
            NestingOrder::NumericSegments.compare("3-x", "3-x", "-"),
            Ordering::Equal
        );
    }

    #[test]
    fn test_sort_is_stable_for_equal_paths() {
        let input = vec![
            sector("first", "A", "5"),
            sector("second", "B", "5"),
            sector("third", "C", "5"),
        ];
        let index = SectorIndex::build(input.clone(), "-", NestingOrder::Lexicographic);
        let again = SectorIndex::build(input, "-", NestingOrder::Lexicographic);

        let ids: Vec<&str> = index.sectors().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
        assert_eq!(index, again);
    }

    #[test]
    fn test_empty_nesting_sorts_first_without_error() {
        let index = SectorIndex::build(
            vec![sector("a", "A", "1"), sector("b", "B", "")],
            "-",
            NestingOrder::Lexicographic,
        );
        assert_eq!(index.sectors()[0].id, "b");
    }

    #[test]
    fn test_custom_comparator() {
        let index = SectorIndex::build_with(
            vec![sector("a", "A", "1"), sector("b", "B", "2")],
            "-",
            |a, b| b.cmp(a),
        );
        assert_eq!(nestings(&index), vec!["2", "1"]);
    }

    #[test]
    fn test_name_lookup_and_unresolved_ids() {
        let index = SectorIndex::build(
            vec![sector("19", "Food and Beverage", "1-19")],
            "-",
            NestingOrder::default(),
        );

        assert_eq!(index.name_of("19"), "Food and Beverage");
        assert_eq!(index.name_of("404"), "");
        assert_eq!(index.resolve(&["19", "404"]), vec!["Food and Beverage", ""]);
        assert!(index.contains("19"));
        assert!(!index.contains("404"));
    }

    #[test]
    fn test_mapping_covers_every_sector() {
        let input = vec![
            sector("1", "Manufacturing", "1"),
            sector("19", "Food", "1-19"),
            sector("3", "Service", "3"),
        ];
        let index = SectorIndex::build(input.clone(), "-", NestingOrder::default());

        for s in &input {
            assert_eq!(index.name_of(&s.id), s.name);
        }
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_entries_carry_depth() {
        let index = SectorIndex::build(
            vec![sector("1", "A", "1"), sector("19", "B", "1-19")],
            "-",
            NestingOrder::default(),
        );
        let depths: Vec<usize> = index.entries().map(|(_, d)| d).collect();
        assert_eq!(depths, vec![1, 2]);
        assert_eq!(index.depth_of(&index.sectors()[1]), 2);
    }

    #[test]
    fn test_default_index_is_empty() {
        let index = SectorIndex::default();
        assert!(index.is_empty());
        assert_eq!(index.name_of("1"), "");
    }

    #[tokio::test]
    async fn test_load_sorts_store_documents() {
        let store = Arc::new(MemoryStore::new());
        seed_store(
            &store,
            &[
                ("342", "Food", "1-19-342"),
                ("1", "Manufacturing", "1"),
                ("19", "Food and Beverage", "1-19"),
            ],
        );

        let builder = SectorIndexBuilder::new(store.clone());
        let index = builder.load().await.unwrap();

        assert_eq!(nestings(&index), vec!["1", "1-19", "1-19-342"]);
        assert_eq!(store.calls(StoreOp::List), 1);
    }

    #[tokio::test]
    async fn test_load_skips_malformed_documents() {
        let store = Arc::new(MemoryStore::new());
        seed_store(&store, &[("1", "Manufacturing", "1")]);
        let serde_json::Value::Object(bad) = json!({"name": ["not", "a", "string"]}) else {
            unreachable!()
        };
        store
            .insert(SECTORS_COLLECTION, Document::new("bad", bad))
            .unwrap();

        let index = SectorIndexBuilder::new(store).load().await.unwrap();
        assert_eq!(index.len(), 1);
        assert!(!index.contains("bad"));
    }

    #[tokio::test]
    async fn test_load_propagates_store_error() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(1).unwrap();

        let err = SectorIndexBuilder::new(store).load().await.unwrap_err();
        assert!(err.is_store_error());
    }

    #[tokio::test]
    async fn test_load_uses_configured_order() {
        let store = Arc::new(MemoryStore::new());
        seed_store(&store, &[("a", "Ten", "10"), ("b", "Two", "2")]);

        let config = SectorsConfig {
            delimiter: "-".to_string(),
            order: NestingOrder::NumericSegments,
        };
        let index = SectorIndexBuilder::from_config(store, &config)
            .load()
            .await
            .unwrap();
        assert_eq!(nestings(&index), vec!["2", "10"]);
    }

    #[tokio::test]
    async fn test_import_creates_and_replaces() {
        let store = Arc::new(MemoryStore::new());
        seed_store(&store, &[("1", "Old name", "1")]);
        let builder = SectorIndexBuilder::new(store.clone());

        let seeds = SectorIndexBuilder::parse_seeds(
            r#"[
                {"id": "1", "name": "Manufacturing", "nesting": "1"},
                {"name": "Service", "nesting": "3"}
            ]"#,
        )
        .unwrap();
        assert_eq!(builder.import(seeds).await.unwrap(), 2);

        let index = builder.load().await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.name_of("1"), "Manufacturing");
        assert_eq!(store.calls(StoreOp::Upsert), 1);
        assert_eq!(store.calls(StoreOp::Create), 1);
    }

    #[test]
    fn test_parse_seeds_rejects_bad_json() {
        assert!(SectorIndexBuilder::parse_seeds(r#"{"name": "x"}"#).is_err());
        assert!(SectorIndexBuilder::parse_seeds(r#"[{"nesting": "1"}]"#).is_err());
    }

    #[test]
    fn test_nesting_order_display() {
        assert_eq!(NestingOrder::Lexicographic.to_string(), "lexicographic");
        assert_eq!(
            NestingOrder::NumericSegments.to_string(),
            "numeric_segments"
        );
    }
}
