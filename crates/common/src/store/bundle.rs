//! Tabular bundle export and import
//!
//! A bundle is a directory holding one JSON array per table plus a
//! `metadata.json` manifest with row counts and a SHA-256 checksum per file.
//! Importing verifies every checksum and the referential integrity of the
//! reassembled store before handing it out.

use super::models::*;
use super::FactStore;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bumped whenever a table layout changes incompatibly
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

const METADATA_FILE: &str = "metadata.json";

/// Fact tables every bundle must carry
pub const FACT_TABLES: &[&str] = &[
    "works",
    "authors",
    "author_aliases",
    "organizations",
    "venues",
    "keywords",
    "work_authors",
    "work_affiliations",
    "work_keywords",
    "merges",
];

/// Manifest written last, once every table is on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub format_version: u32,
    pub export_date: DateTime<Utc>,
    pub row_counts: BTreeMap<String, usize>,
    pub checksums: BTreeMap<String, String>,
}

/// Streams tables into a bundle directory
pub struct BundleWriter {
    dir: PathBuf,
    row_counts: BTreeMap<String, usize>,
    checksums: BTreeMap<String, String>,
}

fn table_file(table: &str) -> String {
    format!("{}.json", table)
}

fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl BundleWriter {
    /// Create the bundle directory if needed
    pub async fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            row_counts: BTreeMap::new(),
            checksums: BTreeMap::new(),
        })
    }

    /// Write one table as a JSON array
    pub async fn write_table<T: Serialize>(&mut self, table: &str, rows: &[T]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(rows)?;
        let file = table_file(table);

        tokio::fs::write(self.dir.join(&file), &bytes).await?;
        debug!(table, rows = rows.len(), "Bundle table written");

        self.row_counts.insert(table.to_string(), rows.len());
        self.checksums.insert(file, checksum(&bytes));
        Ok(())
    }

    /// Write the manifest and close the bundle
    pub async fn finish(self) -> Result<BundleMetadata> {
        let metadata = BundleMetadata {
            format_version: BUNDLE_FORMAT_VERSION,
            export_date: Utc::now(),
            row_counts: self.row_counts,
            checksums: self.checksums,
        };

        let bytes = serde_json::to_vec_pretty(&metadata)?;
        tokio::fs::write(self.dir.join(METADATA_FILE), bytes).await?;
        info!(dir = %self.dir.display(), tables = metadata.checksums.len(), "Bundle exported");
        Ok(metadata)
    }
}

/// Reads and verifies tables from a bundle directory
pub struct BundleReader {
    dir: PathBuf,
    metadata: BundleMetadata,
}

impl BundleReader {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let bytes = tokio::fs::read(dir.join(METADATA_FILE)).await?;
        let metadata: BundleMetadata = serde_json::from_slice(&bytes)?;

        if metadata.format_version != BUNDLE_FORMAT_VERSION {
            return Err(AppError::consistency(format!(
                "bundle format {} is not supported (expected {})",
                metadata.format_version, BUNDLE_FORMAT_VERSION
            )));
        }

        Ok(Self { dir, metadata })
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    /// Read one table, rejecting it if its checksum does not match
    pub async fn read_table<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let file = table_file(table);
        let expected = self.metadata.checksums.get(&file).ok_or_else(|| {
            AppError::consistency(format!("bundle manifest has no entry for {}", file))
        })?;

        let bytes = tokio::fs::read(self.dir.join(&file)).await?;
        if &checksum(&bytes) != expected {
            return Err(AppError::consistency(format!("checksum mismatch for {}", file)));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn keyed<T>(rows: Vec<T>, id: impl Fn(&T) -> EntityId) -> BTreeMap<EntityId, T> {
    rows.into_iter().map(|row| (id(&row), row)).collect()
}

impl FactStore {
    /// Write every fact table into the bundle
    pub async fn write_tables(&self, writer: &mut BundleWriter) -> Result<()> {
        let works: Vec<&Work> = self.works.values().collect();
        let authors: Vec<&Author> = self.authors.values().collect();
        let organizations: Vec<&Organization> = self.organizations.values().collect();
        let venues: Vec<&Venue> = self.venues.values().collect();
        let keywords: Vec<&Keyword> = self.keywords.values().collect();

        writer.write_table("works", &works).await?;
        writer.write_table("authors", &authors).await?;
        writer.write_table("author_aliases", &self.aliases).await?;
        writer.write_table("organizations", &organizations).await?;
        writer.write_table("venues", &venues).await?;
        writer.write_table("keywords", &keywords).await?;
        writer.write_table("work_authors", &self.work_authors).await?;
        writer.write_table("work_affiliations", &self.work_affiliations).await?;
        writer.write_table("work_keywords", &self.work_keywords).await?;
        writer.write_table("merges", &self.merges).await?;
        Ok(())
    }

    /// Rebuild a store from a bundle. Tables beyond the fact tables, such as
    /// exported edge sets, are ignored since they are derived.
    pub async fn read_tables(reader: &BundleReader) -> Result<FactStore> {
        let mut store = FactStore {
            works: keyed(reader.read_table("works").await?, |w: &Work| w.id),
            authors: keyed(reader.read_table("authors").await?, |a: &Author| a.id),
            aliases: reader.read_table("author_aliases").await?,
            organizations: keyed(reader.read_table("organizations").await?, |o: &Organization| o.id),
            venues: keyed(reader.read_table("venues").await?, |v: &Venue| v.id),
            keywords: keyed(reader.read_table("keywords").await?, |k: &Keyword| k.id),
            work_authors: reader.read_table("work_authors").await?,
            work_affiliations: reader.read_table("work_affiliations").await?,
            work_keywords: reader.read_table("work_keywords").await?,
            merges: reader.read_table("merges").await?,
            ..FactStore::default()
        };

        store.reseed_ids();
        store.check_integrity()?;
        info!(
            works = store.works.len(),
            authors = store.authors.len(),
            "Bundle imported"
        );
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AuthorshipRecord, InstitutionRecord, KeywordRecord, WorkRecord};
    use tokio_test::assert_ok;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("bibnet-{}-{}", tag, uuid::Uuid::new_v4()))
    }

    fn sample_store() -> FactStore {
        let mut store = FactStore::new();
        store
            .upsert_work(&WorkRecord {
                doi: Some("10.1/a".into()),
                title: "Graphs".into(),
                year: Some(2021),
                authorships: vec![
                    AuthorshipRecord {
                        display_name: "Ada".into(),
                        institutions: vec![InstitutionRecord {
                            name: Some("MIT".into()),
                            country_code: Some("US".into()),
                            city: None,
                        }],
                        ..Default::default()
                    },
                    AuthorshipRecord { display_name: "Bob".into(), ..Default::default() },
                ],
                keywords: vec![KeywordRecord { term: "graphs".into(), ..Default::default() }],
                ..Default::default()
            })
            .unwrap();
        store.append_merge(MergeRecord::new(EntityKind::Author, 2, 9, Some("dup".into())));
        store
    }

    #[tokio::test]
    async fn test_bundle_round_trip() {
        let dir = scratch_dir("roundtrip");
        let store = sample_store();

        let mut writer = BundleWriter::create(&dir).await.unwrap();
        store.write_tables(&mut writer).await.unwrap();
        let metadata = assert_ok!(writer.finish().await);
        assert_eq!(metadata.row_counts["works"], 1);
        assert_eq!(metadata.checksums.len(), FACT_TABLES.len());

        let reader = BundleReader::open(&dir).await.unwrap();
        let loaded = FactStore::read_tables(&reader).await.unwrap();

        assert_eq!(loaded.works, store.works);
        assert_eq!(loaded.authors, store.authors);
        assert_eq!(loaded.work_affiliations, store.work_affiliations);
        assert_eq!(loaded.merge_history(), store.merge_history());

        // Ids keep growing past the imported ones
        let mut loaded = loaded;
        let fresh = loaded.upsert_author("Cy", None);
        assert!(fresh > store.authors.keys().copied().max().unwrap());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn test_tampered_table_rejected() {
        let dir = scratch_dir("tamper");
        let store = sample_store();

        let mut writer = BundleWriter::create(&dir).await.unwrap();
        store.write_tables(&mut writer).await.unwrap();
        writer.finish().await.unwrap();

        tokio::fs::write(dir.join("works.json"), b"[]").await.unwrap();

        let reader = BundleReader::open(&dir).await.unwrap();
        let err = FactStore::read_tables(&reader).await.unwrap_err();
        assert!(matches!(err, AppError::Consistency { .. }));

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
