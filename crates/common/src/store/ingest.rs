//! Record ingestion
//!
//! Upserts source-agnostic work records into the fact store. Entities are
//! matched by natural key so repeated ingestion never creates duplicates.

use super::models::*;
use super::FactStore;
use crate::errors::Result;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use validator::{Validate, ValidationError};

/// One publication as delivered by an upstream source or import file
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct WorkRecord {
    pub doi: Option<String>,

    pub source_uid: Option<String>,

    #[validate(length(min = 1))]
    pub title: String,

    #[validate(range(min = 1000, max = 3000))]
    pub year: Option<i32>,

    pub venue: Option<VenueRecord>,

    pub work_type: Option<String>,

    pub language: Option<String>,

    pub url: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub authorships: Vec<AuthorshipRecord>,

    #[serde(default)]
    #[validate(nested)]
    pub keywords: Vec<KeywordRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AuthorshipRecord {
    #[validate(length(min = 1))]
    pub display_name: String,

    pub orcid: Option<String>,

    #[serde(default)]
    pub corresponding: bool,

    #[serde(default)]
    #[validate(nested)]
    pub institutions: Vec<InstitutionRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct InstitutionRecord {
    pub name: Option<String>,

    #[validate(custom(function = "validate_country"))]
    pub country_code: Option<String>,

    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct KeywordRecord {
    #[validate(length(min = 1))]
    pub term: String,

    pub display: Option<String>,

    pub score: Option<f32>,

    pub vocabulary: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueRecord {
    pub name: String,

    pub venue_type: Option<String>,

    pub issn: Option<String>,

    pub publisher: Option<String>,
}

/// Result of a single work upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub work_id: EntityId,
    pub created: bool,
}

/// Blank codes count as missing; anything else must be two letters
fn validate_country(code: &str) -> std::result::Result<(), ValidationError> {
    let code = code.trim();
    if code.is_empty() || (code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic())) {
        Ok(())
    } else {
        Err(ValidationError::new("country_code"))
    }
}

fn doi_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| {
        Regex::new(r"(?i)^\s*(https?://(dx\.)?doi\.org/|doi:\s*)").expect("DOI prefix pattern is valid")
    })
}

/// Deduplication key for names: trimmed, lowercased, single-spaced
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Bare lowercase DOI, with resolver prefixes stripped
pub fn normalize_doi(raw: &str) -> Option<String> {
    let doi = doi_prefix().replace(raw, "").trim().to_lowercase();
    (!doi.is_empty()).then_some(doi)
}

/// Upper-case two-letter code, or `None` when blank
pub fn normalize_country(raw: Option<&str>) -> Option<String> {
    let code = raw?.trim();
    (!code.is_empty()).then(|| code.to_ascii_uppercase())
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl FactStore {
    /// Find or create a venue by name
    pub fn upsert_venue(&mut self, record: &VenueRecord) -> Option<EntityId> {
        let name = record.name.trim();
        if name.is_empty() {
            return None;
        }
        if let Some(venue) = self.venues.values().find(|v| v.name == name) {
            return Some(venue.id);
        }

        let id = self.allocate_id();
        self.venues.insert(
            id,
            Venue {
                id,
                name: name.to_string(),
                venue_type: non_blank(record.venue_type.as_ref()),
                issn: non_blank(record.issn.as_ref()),
                publisher: non_blank(record.publisher.as_ref()),
            },
        );
        Some(id)
    }

    /// Find or create an author by ORCID, normalized name, then alias
    pub fn upsert_author(&mut self, display_name: &str, orcid: Option<&str>) -> EntityId {
        let orcid = orcid.map(str::trim).filter(|o| !o.is_empty());
        if let Some(orcid) = orcid {
            if let Some(author) = self.authors.values().find(|a| a.orcid.as_deref() == Some(orcid)) {
                return author.id;
            }
        }

        let display_name = display_name.trim();
        if let Some(id) = super::FactReader::resolve_author_alias(self, display_name) {
            return id;
        }

        let id = self.allocate_id();
        self.authors.insert(
            id,
            Author {
                id,
                display_name: display_name.to_string(),
                normalized_name: normalize_name(display_name),
                orcid: orcid.map(str::to_string),
            },
        );
        self.aliases.push(AuthorAlias {
            author_id: id,
            raw_name: display_name.to_string(),
            source: "ingest".to_string(),
            confidence: 0.9,
        });
        id
    }

    /// Find or create an organization by exact name
    pub fn upsert_organization(
        &mut self,
        name: &str,
        country_code: Option<String>,
        city: Option<String>,
    ) -> EntityId {
        let name = name.trim();
        if let Some(org) = self.organizations.values().find(|o| o.name == name) {
            return org.id;
        }

        let id = self.allocate_id();
        self.organizations.insert(
            id,
            Organization {
                id,
                name: name.to_string(),
                country_code,
                city,
            },
        );
        id
    }

    /// Find or create a keyword by normalized term
    pub fn upsert_keyword(
        &mut self,
        term: &str,
        display: Option<&str>,
        vocabulary: Option<&str>,
    ) -> Option<EntityId> {
        let term_norm = normalize_name(term);
        if term_norm.is_empty() {
            return None;
        }
        if let Some(keyword) = self.keywords.values().find(|k| k.term_norm == term_norm) {
            return Some(keyword.id);
        }

        let id = self.allocate_id();
        self.keywords.insert(
            id,
            Keyword {
                id,
                term_norm,
                term_display: display.unwrap_or(term).trim().to_string(),
                vocabulary: vocabulary.map(str::to_string),
            },
        );
        Some(id)
    }

    /// Insert or update a work by DOI, then source uid. An existing work has
    /// its fields replaced and all of its join rows rebuilt from the record.
    pub fn upsert_work(&mut self, record: &WorkRecord) -> Result<UpsertOutcome> {
        record.validate()?;

        let doi = record.doi.as_deref().and_then(normalize_doi);
        let source_uid = non_blank(record.source_uid.as_ref());

        let existing = doi
            .as_ref()
            .and_then(|doi| self.works.values().find(|w| w.doi.as_ref() == Some(doi)))
            .or_else(|| {
                source_uid
                    .as_ref()
                    .and_then(|uid| self.works.values().find(|w| w.source_uid.as_ref() == Some(uid)))
            })
            .map(|w| w.id);

        let venue_id = record.venue.as_ref().and_then(|v| self.upsert_venue(v));

        let (work_id, created) = match existing {
            Some(id) => {
                self.work_authors.retain(|row| row.work_id != id);
                self.work_affiliations.retain(|row| row.work_id != id);
                self.work_keywords.retain(|row| row.work_id != id);
                (id, false)
            }
            None => (self.allocate_id(), true),
        };

        self.works.insert(
            work_id,
            Work {
                id: work_id,
                title: record.title.trim().to_string(),
                doi,
                source_uid,
                year: record.year,
                venue_id,
                work_type: non_blank(record.work_type.as_ref()),
                language: non_blank(record.language.as_ref()),
                url: non_blank(record.url.as_ref()),
            },
        );

        for (position, authorship) in record.authorships.iter().enumerate() {
            let author_id = self.upsert_author(&authorship.display_name, authorship.orcid.as_deref());

            // Two name variants of one person on the same work
            if !self
                .work_authors
                .iter()
                .any(|row| row.work_id == work_id && row.author_id == author_id)
            {
                self.work_authors.push(WorkAuthor {
                    work_id,
                    author_id,
                    position: position as u32,
                    corresponding: authorship.corresponding,
                });
            }

            for institution in &authorship.institutions {
                let country_code = normalize_country(institution.country_code.as_deref());
                let label = non_blank(institution.name.as_ref());
                let org_id = label.as_deref().map(|name| {
                    self.upsert_organization(
                        name,
                        country_code.clone(),
                        non_blank(institution.city.as_ref()),
                    )
                });

                self.work_affiliations.push(WorkAffiliation {
                    work_id,
                    author_id: Some(author_id),
                    org_id,
                    org_label_raw: label,
                    country_code,
                });
            }
        }

        for keyword in &record.keywords {
            let Some(keyword_id) = self.upsert_keyword(
                &keyword.term,
                keyword.display.as_deref(),
                keyword.vocabulary.as_deref(),
            ) else {
                continue;
            };

            if !self
                .work_keywords
                .iter()
                .any(|row| row.work_id == work_id && row.keyword_id == keyword_id)
            {
                self.work_keywords.push(WorkKeyword {
                    work_id,
                    keyword_id,
                    weight: keyword.score.unwrap_or(1.0),
                    extractor: keyword.vocabulary.clone(),
                });
            }
        }

        Ok(UpsertOutcome { work_id, created })
    }
}
