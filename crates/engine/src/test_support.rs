//! Fixtures shared by the engine unit tests

use bibnet_common::store::{
    AffiliationFact, AuthorshipRecord, InstitutionRecord, KeywordRecord, WorkFacts, WorkRecord,
};
use bibnet_common::{EntityId, FactReader, FactStore};

/// Work record with one authorship per name and no affiliations
pub fn record(title: &str, year: i32, authors: &[&str]) -> WorkRecord {
    WorkRecord {
        title: title.to_string(),
        source_uid: Some(title.to_string()),
        year: Some(year),
        authorships: authors
            .iter()
            .map(|name| AuthorshipRecord {
                display_name: name.to_string(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

/// Authorship at a single institution
pub fn affiliated(name: &str, org: &str, country: &str) -> AuthorshipRecord {
    AuthorshipRecord {
        display_name: name.to_string(),
        institutions: vec![InstitutionRecord {
            name: Some(org.to_string()),
            country_code: Some(country.to_string()),
            city: None,
        }],
        ..Default::default()
    }
}

pub fn tagged(mut work: WorkRecord, terms: &[&str]) -> WorkRecord {
    work.keywords = terms
        .iter()
        .map(|term| KeywordRecord {
            term: term.to_string(),
            ..Default::default()
        })
        .collect();
    work
}

/// W1(2020, {A, B}), W2(2021, {A, C}), W3(2021, {B, C})
pub fn three_works() -> Vec<WorkRecord> {
    vec![
        record("W1", 2020, &["A", "B"]),
        record("W2", 2021, &["A", "C"]),
        record("W3", 2021, &["B", "C"]),
    ]
}

/// W1(2020): Ada@MIT/US, Bob@Stanford/US, Cy@ETH/CH
/// W2(2021): Di@ETH/CH, Eve@Oxford/GB
/// W3(2022): Fay@MIT/US, Gus@MIT/US
pub fn affiliated_works() -> Vec<WorkRecord> {
    vec![
        WorkRecord {
            authorships: vec![
                affiliated("Ada", "MIT", "US"),
                affiliated("Bob", "Stanford", "US"),
                affiliated("Cy", "ETH", "CH"),
            ],
            ..record("W1", 2020, &[])
        },
        WorkRecord {
            authorships: vec![affiliated("Di", "ETH", "CH"), affiliated("Eve", "Oxford", "GB")],
            ..record("W2", 2021, &[])
        },
        WorkRecord {
            authorships: vec![affiliated("Fay", "MIT", "US"), affiliated("Gus", "MIT", "US")],
            ..record("W3", 2022, &[])
        },
    ]
}

pub fn store_with(records: &[WorkRecord]) -> FactStore {
    let mut store = FactStore::new();
    store
        .transaction(|staged| {
            for record in records {
                staged.upsert_work(record)?;
            }
            Ok(())
        })
        .unwrap();
    store
}

/// Id of the author with this display name
pub fn author_id(store: &FactStore, name: &str) -> EntityId {
    store.resolve_author_alias(name).unwrap()
}

/// Id of the organization with this name
pub fn org_id(store: &FactStore, name: &str) -> EntityId {
    store.organizations().find(|org| org.name == name).unwrap().id
}

/// Bare work facts for aggregation tests
pub fn facts(work_id: EntityId, year: Option<i32>, authors: &[EntityId], keywords: &[EntityId]) -> WorkFacts {
    WorkFacts {
        work_id,
        year,
        authors: authors.to_vec(),
        affiliations: Vec::<AffiliationFact>::new(),
        keywords: keywords.to_vec(),
    }
}
