//! Vocabulary collections and membership documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::UserId;
use crate::word::WordId;

pub type CollectionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sat,
    Toefl,
    /// Korean college entrance exam lists.
    Suneung,
    #[default]
    General,
    Custom,
}

impl Category {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sat" => Some(Self::Sat),
            "toefl" => Some(Self::Toefl),
            "suneung" => Some(Self::Suneung),
            "general" => Some(Self::General),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sat => "sat",
            Self::Toefl => "toefl",
            Self::Suneung => "suneung",
            Self::General => "general",
            Self::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Shared list; membership recorded on the word (`collectionIds`).
    #[default]
    Official,
    /// User-curated list; membership in `personal_collection_words`.
    Personal,
    /// Words captured from a user's photo uploads.
    Photo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyCollection {
    #[serde(default)]
    pub id: CollectionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub kind: CollectionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
    #[serde(default)]
    pub word_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VocabularyCollection {
    pub fn official(id: impl Into<CollectionId>, name: impl Into<String>, category: Category) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category,
            kind: CollectionKind::Official,
            owner_id: None,
            word_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn personal(id: impl Into<CollectionId>, name: impl Into<String>, owner: impl Into<UserId>) -> Self {
        let mut c = Self::official(id, name, Category::Custom);
        c.kind = CollectionKind::Personal;
        c.owner_id = Some(owner.into());
        c
    }

    /// Collection holding the words captured from one photo upload.
    pub fn photo(id: impl Into<CollectionId>, name: impl Into<String>, owner: impl Into<UserId>) -> Self {
        let mut c = Self::personal(id, name, owner);
        c.kind = CollectionKind::Photo;
        c
    }

    /// Official collections are readable by everyone; the rest only by the owner.
    pub fn is_visible_to(&self, user: Option<&str>) -> bool {
        match self.kind {
            CollectionKind::Official => true,
            CollectionKind::Personal | CollectionKind::Photo => {
                matches!((self.owner_id.as_deref(), user), (Some(o), Some(u)) if o == u)
            }
        }
    }
}

/// Link document in `personal_collection_words`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalCollectionWord {
    pub collection_id: CollectionId,
    pub word_id: WordId,
    pub user_id: UserId,
    pub added_at: DateTime<Utc>,
}

/// Document id of a personal-collection link.
pub fn personal_link_id(collection_id: &str, word_id: &str) -> String {
    format!("{collection_id}_{word_id}")
}

/// Word captured from a photo upload, stored per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoVocabularyWord {
    #[serde(default)]
    pub id: String,
    pub user_id: UserId,
    pub session_id: String,
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    /// OCR line the word was read from.
    #[serde(default)]
    pub source_text: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn personal_collections_are_owner_only() {
        let c = VocabularyCollection::personal("p1", "My list", "alice");
        assert!(c.is_visible_to(Some("alice")));
        assert!(!c.is_visible_to(Some("bob")));
        assert!(!c.is_visible_to(None));

        let o = VocabularyCollection::official("sat", "SAT core", Category::Sat);
        assert!(o.is_visible_to(None));
    }

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(Category::parse(" TOEFL "), Some(Category::Toefl));
        assert_eq!(Category::parse("gre"), None);
    }
}
