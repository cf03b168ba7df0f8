//! Store maintenance jobs.
//!
//! Each job runs the same way from `wordvault admin …` and from the
//! `/api/admin/*` endpoints. With `dry_run` a job reports what it would
//! change and writes nothing.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};
use wordvault_llm::{LlmError, WordEnricher};
use wordvault_model::{is_truncated_definition, CollectionKind};
use wordvault_storage::repo::{decode_word, CollectionRepo, WordRepo};
use wordvault_storage::{
    commit_chunked, DocumentStore, Query, StoreError, WriteOp, LEGACY_WORD_COLLECTIONS, WORDS_V3,
};

#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("{0}")]
    InvalidArgument(String),
}

pub type MaintenanceResult<T> = Result<T, MaintenanceError>;

// ============================================================================
// Truncated definitions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionFix {
    pub word_id: String,
    pub word: String,
    pub index: usize,
    pub before: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixDefinitionsReport {
    pub dry_run: bool,
    pub scanned: usize,
    pub truncated: usize,
    pub repaired: usize,
    pub failed: usize,
    pub fixes: Vec<DefinitionFix>,
}

/// Finds cut-off definitions in `words_v3` and asks the LLM to complete them.
///
/// `limit` caps the number of words handled. A failed repair leaves the
/// definition unchanged and is listed with its error.
pub async fn fix_definitions(
    store: &dyn DocumentStore,
    enricher: Option<&WordEnricher>,
    dry_run: bool,
    limit: Option<usize>,
) -> MaintenanceResult<FixDefinitionsReport> {
    let enricher = match (dry_run, enricher) {
        (true, _) => None,
        (false, Some(e)) => Some(e),
        (false, None) => {
            return Err(LlmError::NotConfigured(
                "repairing definitions needs an LLM backend".to_string(),
            )
            .into())
        }
    };

    let repo = WordRepo::new(store);
    let words = repo.list_all().await?;
    let mut report = FixDefinitionsReport {
        dry_run,
        scanned: words.len(),
        ..Default::default()
    };
    let mut handled = 0usize;

    for mut word in words {
        let broken: Vec<usize> = word
            .definitions
            .iter()
            .enumerate()
            .filter(|(_, d)| is_truncated_definition(&d.text))
            .map(|(i, _)| i)
            .collect();
        if broken.is_empty() {
            continue;
        }
        if limit.is_some_and(|l| handled >= l) {
            break;
        }
        handled += 1;

        let mut changed = false;
        for index in broken {
            report.truncated += 1;
            let before = word.definitions[index].text.clone();
            let mut fix = DefinitionFix {
                word_id: word.id.clone(),
                word: word.word.clone(),
                index,
                before: before.clone(),
                after: None,
                error: None,
            };
            if let Some(enricher) = enricher {
                match enricher.repair_definition(&word.word, &before).await {
                    Ok(repaired) => {
                        word.definitions[index].text = repaired.clone();
                        fix.after = Some(repaired);
                        report.repaired += 1;
                        changed = true;
                    }
                    Err(e) => {
                        warn!(word = %word.word, error = %e, "definition repair failed");
                        fix.error = Some(e.to_string());
                        report.failed += 1;
                    }
                }
            }
            report.fixes.push(fix);
        }
        if changed {
            word.touch();
            repo.update(&word).await?;
        }
    }

    info!(
        dry_run,
        scanned = report.scanned,
        truncated = report.truncated,
        repaired = report.repaired,
        failed = report.failed,
        "fix-definitions finished"
    );
    Ok(report)
}

// ============================================================================
// Field migration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateFieldReport {
    pub dry_run: bool,
    pub collection: String,
    pub from: String,
    pub to: String,
    pub scanned: usize,
    pub migrated: usize,
    /// Documents that already had `to`; left untouched.
    pub conflicts: Vec<String>,
}

fn check_field_name(name: &str) -> MaintenanceResult<()> {
    if name.trim().is_empty() || name.contains('.') || name.contains('/') {
        return Err(MaintenanceError::InvalidArgument(format!(
            "invalid top-level field name `{name}`"
        )));
    }
    Ok(())
}

/// Renames top-level field `from` to `to` in every document of `collection`.
pub async fn migrate_field(
    store: &dyn DocumentStore,
    collection: &str,
    from: &str,
    to: &str,
    dry_run: bool,
) -> MaintenanceResult<MigrateFieldReport> {
    if collection.trim().is_empty() {
        return Err(MaintenanceError::InvalidArgument(
            "collection must not be empty".to_string(),
        ));
    }
    check_field_name(from)?;
    check_field_name(to)?;
    if from == to {
        return Err(MaintenanceError::InvalidArgument(format!(
            "`from` and `to` are both `{from}`"
        )));
    }

    let docs = store.query(&Query::collection(collection)).await?;
    let mut report = MigrateFieldReport {
        dry_run,
        collection: collection.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        scanned: docs.len(),
        migrated: 0,
        conflicts: Vec::new(),
    };

    let mut ops = Vec::new();
    for doc in docs {
        if !doc.fields.contains_key(from) {
            continue;
        }
        if doc.fields.contains_key(to) {
            report.conflicts.push(doc.id);
            continue;
        }
        let mut fields = doc.fields;
        if let Some(value) = fields.remove(from) {
            fields.insert(to.to_string(), value);
        }
        ops.push(WriteOp::set(collection, &doc.id, fields));
    }
    report.migrated = ops.len();

    if !dry_run {
        commit_chunked(store, ops).await?;
    }
    info!(
        collection,
        from,
        to,
        dry_run,
        migrated = report.migrated,
        conflicts = report.conflicts.len(),
        "migrate-field finished"
    );
    Ok(report)
}

// ============================================================================
// Legacy normalization
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    pub dry_run: bool,
    pub scanned: usize,
    pub normalized: usize,
    /// Ids already present in `words_v3` (or in an earlier legacy collection).
    pub skipped: usize,
    pub failed: Vec<String>,
    pub by_collection: BTreeMap<String, usize>,
}

/// Copies legacy word documents into `words_v3` in the unified shape.
///
/// Legacy collections are read oldest first; the first document seen for an
/// id wins. Existing `words_v3` documents are never overwritten.
pub async fn normalize_words(
    store: &dyn DocumentStore,
    dry_run: bool,
) -> MaintenanceResult<NormalizeReport> {
    let repo = WordRepo::new(store);
    let mut seen: HashSet<String> = store
        .query(&Query::collection(WORDS_V3))
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();

    let mut report = NormalizeReport {
        dry_run,
        ..Default::default()
    };
    let mut out = Vec::new();

    for &collection in LEGACY_WORD_COLLECTIONS {
        let docs = repo.scan(collection).await?;
        report.scanned += docs.len();
        let mut count = 0usize;
        for doc in docs {
            if seen.contains(&doc.id) {
                report.skipped += 1;
                continue;
            }
            let word = decode_word(collection, &doc).and_then(|w| {
                w.validate().map(|_| w).map_err(|source| StoreError::InvalidWord {
                    id: doc.id.clone(),
                    source,
                })
            });
            match word {
                Ok(word) => {
                    seen.insert(doc.id.clone());
                    out.push(word);
                    count += 1;
                }
                Err(e) => {
                    warn!(collection, id = %doc.id, error = %e, "legacy document not normalized");
                    report.failed.push(format!("{collection}/{}", doc.id));
                }
            }
        }
        report.by_collection.insert(collection.to_string(), count);
    }

    report.normalized = out.len();
    if !dry_run {
        repo.save_all(&out).await?;
    }
    info!(
        dry_run,
        scanned = report.scanned,
        normalized = report.normalized,
        skipped = report.skipped,
        failed = report.failed.len(),
        "normalize finished"
    );
    Ok(report)
}

// ============================================================================
// Collection deletion
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCollectionReport {
    pub collection_id: String,
    pub kind: CollectionKind,
    pub documents_touched: usize,
}

/// Deletes a collection with its memberships, in batches of at most 500 writes.
pub async fn delete_collection(
    store: &dyn DocumentStore,
    id: &str,
) -> MaintenanceResult<DeleteCollectionReport> {
    let repo = CollectionRepo::new(store);
    let collection = repo.get(id).await?.ok_or_else(|| StoreError::NotFound {
        collection: wordvault_storage::VOCABULARY_COLLECTIONS.to_string(),
        id: id.to_string(),
    })?;
    let documents_touched = match collection.kind {
        CollectionKind::Official => repo.delete_official(id).await?,
        CollectionKind::Personal | CollectionKind::Photo => repo.delete_personal(id).await?,
    };
    info!(id, kind = ?collection.kind, documents_touched, "collection deleted");
    Ok(DeleteCollectionReport {
        collection_id: id.to_string(),
        kind: collection.kind,
        documents_touched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use wordvault_llm::MockProvider;
    use wordvault_model::{Category, UnifiedWord, VocabularyCollection, WordSource};
    use wordvault_storage::{MemoryStore, WORDS};

    fn fields(v: serde_json::Value) -> wordvault_storage::Fields {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_fix_definitions_dry_run_and_repair() {
        let store = MemoryStore::new();
        let repo = WordRepo::new(&store);
        repo.save(&UnifiedWord::new("w1", "abate", WordSource::Official).with_definition("to lessen in"))
            .await
            .unwrap();
        repo.save(&UnifiedWord::new("w2", "zeal", WordSource::Official).with_definition("great energy."))
            .await
            .unwrap();

        let dry = fix_definitions(&store, None, true, None).await.unwrap();
        assert_eq!(dry.truncated, 1);
        assert_eq!(dry.repaired, 0);
        assert_eq!(dry.fixes[0].word_id, "w1");

        assert!(matches!(
            fix_definitions(&store, None, false, None).await,
            Err(MaintenanceError::Llm(LlmError::NotConfigured(_)))
        ));

        let enricher = WordEnricher::new(Arc::new(MockProvider::always(
            r#"{"definition": "to lessen in intensity or amount."}"#,
        )));
        let fixed = fix_definitions(&store, Some(&enricher), false, None).await.unwrap();
        assert_eq!(fixed.repaired, 1);
        let w1 = repo.get("w1").await.unwrap().unwrap();
        assert_eq!(w1.primary_definition(), Some("to lessen in intensity or amount."));
    }

    #[tokio::test]
    async fn test_migrate_field_skips_conflicts() {
        let store = MemoryStore::new();
        store.set(WORDS, "a", fields(json!({"word": "abate", "meaning": "to lessen"}))).await.unwrap();
        store
            .set(WORDS, "b", fields(json!({"word": "zeal", "meaning": "x", "definition": "y"})))
            .await
            .unwrap();
        store.set(WORDS, "c", fields(json!({"word": "candid"}))).await.unwrap();

        let dry = migrate_field(&store, WORDS, "meaning", "definition", true).await.unwrap();
        assert_eq!(dry.migrated, 1);
        assert_eq!(dry.conflicts, vec!["b".to_string()]);
        assert!(store.get(WORDS, "a").await.unwrap().unwrap().fields.contains_key("meaning"));

        migrate_field(&store, WORDS, "meaning", "definition", false).await.unwrap();
        let a = store.get(WORDS, "a").await.unwrap().unwrap();
        assert_eq!(a.fields.get("definition"), Some(&json!("to lessen")));
        assert!(!a.fields.contains_key("meaning"));

        assert!(matches!(
            migrate_field(&store, WORDS, "x", "x", false).await,
            Err(MaintenanceError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_normalize_copies_legacy_once() {
        let store = MemoryStore::new();
        store
            .set(WORDS, "l1", fields(json!({"term": "Abate", "meaning": "to lessen", "synonyms": "wane, subside"})))
            .await
            .unwrap();
        store.set(WORDS, "l2", fields(json!({"definition": "no headword"}))).await.unwrap();
        WordRepo::new(&store)
            .save(&UnifiedWord::new("v1", "zeal", WordSource::Official))
            .await
            .unwrap();
        store.set(WORDS, "v1", fields(json!({"word": "zeal-old"}))).await.unwrap();

        let report = normalize_words(&store, false).await.unwrap();
        assert_eq!(report.normalized, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, vec![format!("{WORDS}/l2")]);

        let v3 = store.get(WORDS_V3, "l1").await.unwrap().unwrap();
        let word = decode_word(WORDS_V3, &v3).unwrap();
        assert_eq!(word.word, "Abate");
        assert_eq!(word.synonyms, vec!["wane".to_string(), "subside".to_string()]);

        let again = normalize_words(&store, false).await.unwrap();
        assert_eq!(again.normalized, 0);
    }

    #[tokio::test]
    async fn test_delete_collection_by_kind() {
        let store = MemoryStore::new();
        let collections = CollectionRepo::new(&store);
        let mut sat = VocabularyCollection::official("sat", "SAT core", Category::Sat);
        collections.save(&mut sat).await.unwrap();
        let mut w = UnifiedWord::new("w1", "abate", WordSource::Official);
        w.add_to_collection("sat");
        WordRepo::new(&store).save(&w).await.unwrap();

        let report = delete_collection(&store, "sat").await.unwrap();
        assert_eq!(report.kind, CollectionKind::Official);
        let w1 = WordRepo::new(&store).get("w1").await.unwrap().unwrap();
        assert!(!w1.in_collection("sat"));

        assert!(matches!(
            delete_collection(&store, "sat").await,
            Err(MaintenanceError::Store(StoreError::NotFound { .. }))
        ));
    }
}
