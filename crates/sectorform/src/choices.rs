//! Choice repository.
//!
//! Reads and writes the `choices` collection and keeps an in-memory copy of
//! it. The copy is only ever updated after the store confirms a write, so the
//! cached list always reflects the latest successful write of this client.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ChoicesConfig;
use crate::error::{Error, Result};
use crate::model::{Choice, CHOICES_COLLECTION};
use crate::store::DocumentStore;

/// How the cached choice list is refreshed after a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStrategy {
    /// Re-fetch the whole collection after every write.
    #[default]
    FullReload,
    /// Insert, replace or remove only the affected record.
    Patch,
}

impl std::fmt::Display for RefreshStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FullReload => write!(f, "full_reload"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

/// Store-backed repository of choice records with a cached listing.
#[derive(Debug)]
pub struct ChoiceRepository {
    store: Arc<dyn DocumentStore>,
    refresh: RefreshStrategy,
    choices: Vec<Choice>,
}

impl ChoiceRepository {
    /// Create a repository that reloads the full collection after writes.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_refresh(store, RefreshStrategy::FullReload)
    }

    /// Create a repository with an explicit refresh strategy.
    #[must_use]
    pub fn with_refresh(store: Arc<dyn DocumentStore>, refresh: RefreshStrategy) -> Self {
        Self {
            store,
            refresh,
            choices: Vec::new(),
        }
    }

    /// Create a repository from the choices configuration section.
    #[must_use]
    pub fn from_config(store: Arc<dyn DocumentStore>, config: &ChoicesConfig) -> Self {
        Self::with_refresh(store, config.refresh)
    }

    /// The refresh strategy in use.
    #[must_use]
    pub fn refresh_strategy(&self) -> RefreshStrategy {
        self.refresh
    }

    /// The cached choice list, in store order.
    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    /// Look up a cached choice by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id.as_deref() == Some(id))
    }

    /// Fetch the whole `choices` collection.
    ///
    /// No filtering and no pagination. Documents that cannot be decoded are
    /// skipped. The cache is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the store call fails.
    pub async fn list_choices(&self) -> Result<Vec<Choice>> {
        let documents = self.store.list(CHOICES_COLLECTION).await?;
        let mut choices = Vec::with_capacity(documents.len());
        for doc in documents {
            match Choice::from_document(doc) {
                Ok(choice) => choices.push(choice),
                Err(e) => warn!("Skipping choice: {}", e),
            }
        }
        Ok(choices)
    }

    /// Fetch the whole collection and replace the cache with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store call fails; the cache is then unchanged.
    pub async fn reload(&mut self) -> Result<&[Choice]> {
        self.choices = self.list_choices().await?;
        debug!("Reloaded {} choices", self.choices.len());
        Ok(&self.choices)
    }

    /// Replace the cache with an already fetched listing.
    pub(crate) fn replace(&mut self, choices: Vec<Choice>) {
        self.choices = choices;
    }

    /// Persist a validated choice and refresh the cache.
    ///
    /// A choice with an id overwrites that whole document; a choice without
    /// one is created and receives a store-assigned id.
    ///
    /// Once the store confirms the write this returns `Ok`, even if the
    /// follow-up reload fails; see [`Written::refresh_error`].
    ///
    /// # Errors
    ///
    /// Returns an error if the write itself fails. The cache is then
    /// unchanged.
    pub async fn save_choice(&mut self, choice: Choice) -> Result<Written> {
        let fields = choice.to_fields()?;
        let id = match choice.id.as_deref() {
            Some(id) => {
                self.store
                    .upsert_by_id(CHOICES_COLLECTION, id, fields)
                    .await?;
                info!("Overwrote choice {}", id);
                id.to_string()
            }
            None => {
                let id = self.store.create(CHOICES_COLLECTION, fields).await?;
                info!("Created choice {}", id);
                id
            }
        };

        let saved = Choice {
            id: Some(id.clone()),
            ..choice
        };
        let refresh_error = self
            .refresh_after_write(|choices| {
                match choices.iter_mut().find(|c| c.id == saved.id) {
                    Some(existing) => *existing = saved,
                    None => choices.push(saved),
                }
            })
            .await;
        Ok(Written { id, refresh_error })
    }

    /// Delete a choice and refresh the cache.
    ///
    /// Once the store confirms the delete this returns `Ok`, even if the
    /// follow-up reload fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty or the delete itself fails.
    pub async fn delete_choice(&mut self, id: &str) -> Result<Written> {
        if id.is_empty() {
            return Err(Error::internal("cannot delete a choice without an id"));
        }

        self.store.delete_by_id(CHOICES_COLLECTION, id).await?;
        info!("Deleted choice {}", id);

        let refresh_error = self
            .refresh_after_write(|choices| choices.retain(|c| c.id.as_deref() != Some(id)))
            .await;
        Ok(Written {
            id: id.to_string(),
            refresh_error,
        })
    }

    /// Bring the cache in line with a confirmed write.
    ///
    /// Under [`RefreshStrategy::FullReload`] a failed reload falls back to
    /// `patch`, so the cache still reflects the write, and the error is
    /// handed back.
    async fn refresh_after_write<F>(&mut self, patch: F) -> Option<Error>
    where
        F: FnOnce(&mut Vec<Choice>),
    {
        if self.refresh == RefreshStrategy::FullReload {
            let reloaded = self.reload().await.map(|_| ());
            if let Err(e) = reloaded {
                warn!("Reload after write failed, patching cached choices: {}", e);
                patch(&mut self.choices);
                return Some(e);
            }
            return None;
        }
        patch(&mut self.choices);
        None
    }
}

/// A write the store confirmed.
#[derive(Debug)]
pub struct Written {
    /// Id of the written or deleted choice.
    pub id: String,
    /// Why the reload after the write failed, if it did. The cache was
    /// patched with the write instead, so it may miss other clients' changes.
    pub refresh_error: Option<Error>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, Fields, MemoryStore, SqliteStore, StoreOp};
    use serde_json::json;

    fn choice(user: &str, chosen: &[&str], agree: bool) -> Choice {
        Choice {
            id: None,
            user: user.to_string(),
            chosen_ids: chosen.iter().map(ToString::to_string).collect(),
            agree_to_terms: agree,
        }
    }

    fn seed(store: &MemoryStore, id: &str, user: &str, chosen: &[&str]) {
        let serde_json::Value::Object(fields) =
            json!({"user": user, "chosenIds": chosen, "agreeToTerms": true})
        else {
            unreachable!()
        };
        store
            .insert(CHOICES_COLLECTION, Document::new(id, fields))
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_choices_attaches_ids() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "abc123", "Acme", &["19"]);

        let repo = ChoiceRepository::new(store);
        let choices = repo.list_choices().await.unwrap();

        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].id.as_deref(), Some("abc123"));
        assert!(repo.choices().is_empty());
    }

    #[tokio::test]
    async fn test_list_choices_skips_malformed_documents() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "good", "Acme", &["19"]);
        store
            .insert(CHOICES_COLLECTION, Document::new("bad", Fields::new()))
            .unwrap();

        let choices = ChoiceRepository::new(store).list_choices().await.unwrap();
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].id.as_deref(), Some("good"));
    }

    #[tokio::test]
    async fn test_create_then_list_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let mut repo = ChoiceRepository::new(store.clone());

        let submitted = choice("Acme", &["19", "342"], true);
        let id = repo.save_choice(submitted.clone()).await.unwrap().id;

        let listed = repo.list_choices().await.unwrap();
        let found = listed
            .iter()
            .find(|c| c.id.as_deref() == Some(id.as_str()))
            .unwrap();
        assert_eq!(found.user, submitted.user);
        assert_eq!(found.chosen_ids, submitted.chosen_ids);
        assert_eq!(found.agree_to_terms, submitted.agree_to_terms);
    }

    #[tokio::test]
    async fn test_save_reloads_full_collection() {
        let store = Arc::new(MemoryStore::new());
        let mut repo = ChoiceRepository::new(store.clone());

        // Written by another client; the reload must pick it up.
        seed(&store, "other", "Globex", &["3"]);
        repo.save_choice(choice("Acme", &["19"], true))
            .await
            .unwrap();

        assert_eq!(repo.choices().len(), 2);
        assert_eq!(store.calls(StoreOp::Create), 1);
        assert_eq!(store.calls(StoreOp::List), 1);
    }

    #[tokio::test]
    async fn test_save_with_id_overwrites_whole_document() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "abc123", "Acme", &["19", "342"]);
        let mut repo = ChoiceRepository::new(store.clone());

        let mut edited = choice("Acme", &["6"], true);
        edited.id = Some("abc123".to_string());
        let written = repo.save_choice(edited).await.unwrap();

        assert_eq!(written.id, "abc123");
        assert!(written.refresh_error.is_none());
        let docs = store.documents(CHOICES_COLLECTION).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].fields.get("chosenIds"), Some(&json!(["6"])));
        assert_eq!(store.calls(StoreOp::Upsert), 1);
        assert_eq!(store.calls(StoreOp::Create), 0);
        assert_eq!(repo.find("abc123").unwrap().chosen_ids, vec!["6"]);
    }

    #[tokio::test]
    async fn test_delete_removes_from_listing() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "abc123", "Acme", &["19"]);
        seed(&store, "def456", "Globex", &["3"]);
        let mut repo = ChoiceRepository::new(store);
        repo.reload().await.unwrap();

        repo.delete_choice("abc123").await.unwrap();

        assert!(repo.find("abc123").is_none());
        assert!(repo
            .list_choices()
            .await
            .unwrap()
            .iter()
            .all(|c| c.id.as_deref() != Some("abc123")));
        assert_eq!(repo.choices().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_empty_id_rejected_without_store_call() {
        let store = Arc::new(MemoryStore::new());
        let mut repo = ChoiceRepository::new(store.clone());

        assert!(repo.delete_choice("").await.is_err());
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_cache_unchanged() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "abc123", "Acme", &["19"]);
        let mut repo = ChoiceRepository::new(store.clone());
        repo.reload().await.unwrap();

        store.fail_next_op(StoreOp::Create, 1).unwrap();
        let err = repo
            .save_choice(choice("Globex", &["3"], true))
            .await
            .unwrap_err();

        assert!(err.is_store_error());
        assert_eq!(repo.choices().len(), 1);
        assert_eq!(store.calls(StoreOp::List), 1);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_cache() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "abc123", "Acme", &["19"]);
        let mut repo = ChoiceRepository::new(store.clone());
        repo.reload().await.unwrap();

        store.fail_next_op(StoreOp::List, 1).unwrap();
        assert!(repo.reload().await.is_err());
        assert_eq!(repo.choices().len(), 1);
    }

    #[tokio::test]
    async fn test_create_confirmed_when_reload_fails() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "abc123", "Acme", &["19"]);
        let mut repo = ChoiceRepository::new(store.clone());
        repo.reload().await.unwrap();

        store.fail_next_op(StoreOp::List, 1).unwrap();
        let written = repo
            .save_choice(choice("Globex", &["3"], true))
            .await
            .unwrap();

        assert!(written.refresh_error.unwrap().is_store_error());
        assert_eq!(store.documents(CHOICES_COLLECTION).unwrap().len(), 2);
        // The cache is patched with the confirmed write.
        let cached = repo.find(&written.id).unwrap();
        assert_eq!(cached.user, "Globex");
        assert_eq!(repo.choices().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_confirmed_when_reload_fails() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "abc123", "Acme", &["19"]);
        seed(&store, "def456", "Globex", &["3"]);
        let mut repo = ChoiceRepository::new(store.clone());
        repo.reload().await.unwrap();

        store.fail_next_op(StoreOp::List, 1).unwrap();
        let written = repo.delete_choice("abc123").await.unwrap();

        assert_eq!(written.id, "abc123");
        assert!(written.refresh_error.is_some());
        assert!(repo.find("abc123").is_none());
        assert_eq!(repo.choices().len(), 1);
    }

    #[tokio::test]
    async fn test_patch_strategy_skips_reload() {
        let store = Arc::new(MemoryStore::new());
        let mut repo = ChoiceRepository::with_refresh(store.clone(), RefreshStrategy::Patch);

        let id = repo
            .save_choice(choice("Acme", &["19"], true))
            .await
            .unwrap()
            .id;
        assert_eq!(repo.choices().len(), 1);
        assert_eq!(repo.choices()[0].id.as_deref(), Some(id.as_str()));

        let mut edited = choice("Acme", &["6"], true);
        edited.id = Some(id.clone());
        repo.save_choice(edited).await.unwrap();
        assert_eq!(repo.choices().len(), 1);
        assert_eq!(repo.choices()[0].chosen_ids, vec!["6"]);

        repo.delete_choice(&id).await.unwrap();
        assert!(repo.choices().is_empty());
        assert_eq!(store.calls(StoreOp::List), 0);
    }

    #[tokio::test]
    async fn test_patch_and_full_reload_agree() {
        let patched_store = Arc::new(MemoryStore::new());
        let reloaded_store = Arc::new(MemoryStore::new());
        let mut patched =
            ChoiceRepository::with_refresh(patched_store.clone(), RefreshStrategy::Patch);
        let mut reloaded = ChoiceRepository::new(reloaded_store);

        for repo in [&mut patched, &mut reloaded] {
            let a = repo.save_choice(choice("A", &["1"], true)).await.unwrap().id;
            repo.save_choice(choice("B", &["2"], true)).await.unwrap();
            repo.delete_choice(&a).await.unwrap();
        }

        let strip = |choices: &[Choice]| -> Vec<(String, Vec<String>)> {
            choices
                .iter()
                .map(|c| (c.user.clone(), c.chosen_ids.clone()))
                .collect()
        };
        assert_eq!(strip(patched.choices()), strip(reloaded.choices()));
        assert_eq!(
            patched.list_choices().await.unwrap().len(),
            patched.choices().len()
        );
    }

    #[tokio::test]
    async fn test_against_sqlite_store() {
        let store = Arc::new(SqliteStore::open_in_memory("test").unwrap());
        let mut repo = ChoiceRepository::new(store);

        let id = repo
            .save_choice(choice("Acme", &["19", "342"], true))
            .await
            .unwrap()
            .id;
        assert_eq!(repo.choices().len(), 1);

        repo.delete_choice(&id).await.unwrap();
        assert!(repo.choices().is_empty());
    }

    #[test]
    fn test_refresh_strategy_display_and_default() {
        assert_eq!(RefreshStrategy::default(), RefreshStrategy::FullReload);
        assert_eq!(RefreshStrategy::FullReload.to_string(), "full_reload");
        assert_eq!(RefreshStrategy::Patch.to_string(), "patch");
    }

    #[test]
    fn test_from_config() {
        let config = ChoicesConfig {
            refresh: RefreshStrategy::Patch,
        };
        let repo = ChoiceRepository::from_config(Arc::new(MemoryStore::new()), &config);
        assert_eq!(repo.refresh_strategy(), RefreshStrategy::Patch);
    }
}
