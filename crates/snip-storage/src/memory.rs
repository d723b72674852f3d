use crate::error::{Result, StorageError};
use async_trait::async_trait;
use dashmap::DashMap;
use snip_core::{BatchRequest, BatchResponse, ShortToken, Storage, UserUrl};
use tracing::{debug, trace};

/// One owner's claim on a token.
#[derive(Debug, Clone)]
struct Association {
    owner: String,
    deleted: bool,
}

/// In-memory storage entry for a token.
///
/// The original URL is stored once because it is a function of the token.
/// Owners are kept as a set: writing the same URL twice as the same owner
/// leaves a single association.
#[derive(Debug, Clone)]
struct Entry {
    original_url: String,
    owners: Vec<Association>,
}

impl Entry {
    fn new(original_url: &str, owner: &str) -> Self {
        Self {
            original_url: original_url.to_owned(),
            owners: vec![Association {
                owner: owner.to_owned(),
                deleted: false,
            }],
        }
    }

    /// Records `owner` as live on this entry, reviving a deleted association.
    fn associate(&mut self, owner: &str) {
        match self.owners.iter_mut().find(|a| a.owner == owner) {
            Some(association) => association.deleted = false,
            None => self.owners.push(Association {
                owner: owner.to_owned(),
                deleted: false,
            }),
        }
    }

    /// Returns `true` if `owner` had a live association that is now deleted.
    fn tombstone(&mut self, owner: &str) -> bool {
        match self
            .owners
            .iter_mut()
            .find(|a| a.owner == owner && !a.deleted)
        {
            Some(association) => {
                association.deleted = true;
                true
            }
            None => false,
        }
    }

    fn is_live(&self) -> bool {
        self.owners.iter().any(|a| !a.deleted)
    }

    fn is_live_for(&self, owner: &str) -> bool {
        self.owners.iter().any(|a| a.owner == owner && !a.deleted)
    }
}

/// In-memory implementation of the [`Storage`] trait using DashMap.
///
/// Writes go through DashMap's entry API, which holds the shard lock for the
/// whole read-modify-write, so concurrent writers of the same token never
/// lose an owner. Unrelated tokens live in other shards and do not block each
/// other. Nothing survives a restart.
#[derive(Debug)]
pub struct InMemoryStorage {
    base_url: String,
    storage: DashMap<String, Entry>,
}

impl InMemoryStorage {
    /// Creates an empty store issuing short URLs under `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            storage: DashMap::new(),
        }
    }

    fn insert(&self, original_url: &str, owner: &str) -> ShortToken {
        let token = ShortToken::from_url(original_url);

        self.storage
            .entry(token.as_str().to_owned())
            .and_modify(|entry| entry.associate(owner))
            .or_insert_with(|| Entry::new(original_url, owner));

        token
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn write(&self, original_url: &str, owner: &str) -> Result<String> {
        if original_url.is_empty() {
            return Err(StorageError::EmptyInput);
        }

        let token = self.insert(original_url, owner);
        trace!(token = %token, owner, "stored url in memory");

        Ok(token.to_url(&self.base_url))
    }

    async fn read(&self, token: &ShortToken) -> Result<String> {
        let Some(entry) = self.storage.get(token.as_str()) else {
            return Err(StorageError::NotFound(token.to_string()));
        };

        if !entry.is_live() {
            return Err(StorageError::Gone(token.to_string()));
        }

        Ok(entry.original_url.clone())
    }

    async fn read_all(&self, owner: &str) -> Result<Vec<UserUrl>> {
        let urls: Vec<UserUrl> = self
            .storage
            .iter()
            .filter(|item| item.value().is_live_for(owner))
            .map(|item| UserUrl {
                short_url: ShortToken::new_unchecked(item.key().as_str()).to_url(&self.base_url),
                original_url: item.value().original_url.clone(),
            })
            .collect();

        if urls.is_empty() {
            return Err(StorageError::NotFound(format!("no urls for owner {owner}")));
        }

        Ok(urls)
    }

    async fn batch(&self, entries: Vec<BatchRequest>, owner: &str) -> Result<Vec<BatchResponse>> {
        // Validate everything up front; past this point inserts cannot fail,
        // so the batch is applied either entirely or not at all.
        if entries.is_empty() || entries.iter().any(|e| e.original_url.is_empty()) {
            return Err(StorageError::EmptyInput);
        }

        let responses = entries
            .into_iter()
            .map(|entry| {
                let token = self.insert(&entry.original_url, owner);
                BatchResponse {
                    correlation_id: entry.correlation_id,
                    short_url: token.to_url(&self.base_url),
                }
            })
            .collect::<Vec<_>>();

        debug!(owner, count = responses.len(), "stored batch in memory");
        Ok(responses)
    }

    async fn delete(&self, owner: &str, tokens: &[ShortToken]) -> Result<()> {
        let mut deleted = 0usize;

        for token in tokens {
            if let Some(mut entry) = self.storage.get_mut(token.as_str()) {
                if entry.tombstone(owner) {
                    deleted += 1;
                }
            }
        }

        debug!(owner, requested = tokens.len(), deleted, "soft-deleted urls");
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
