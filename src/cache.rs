//! クエリキャッシュモジュール
//!
//! (リソース, シリアライズ済みパラメータ) をキーにレスポンスを保持する。
//! - 更新系の成功時は該当リソースのエントリを stale にし、再取得を促す
//! - stale でも値は返す（stale-while-revalidate）
//! - キーごとにリクエスト世代を振り、新しいリクエストより後に届いた古い応答は捨てる
//! - 無効化より前に発行したリクエストの応答は stale として保存する
//! - エントリ数が上限を超えたら stale なもの、次に古いものから捨てる
//! - 失敗時の再試行は1回だけ

use crate::error::Result;
use leadlab_common::{ListResource, QueryParams};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// キャッシュキー
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource: String,
    digest: String,
}

impl CacheKey {
    pub fn new(resource: &str, query: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(resource.as_bytes());
        hasher.update(b"?");
        hasher.update(query.as_bytes());
        Self {
            resource: resource.to_string(),
            digest: hex::encode(hasher.finalize()),
        }
    }

    pub fn for_list(resource: ListResource, params: &QueryParams) -> Self {
        Self::new(resource.path(), &params.to_query_string())
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    fetched_at: Instant,
    invalidated: bool,
    generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    Fresh(T),
    Stale(T),
    Miss,
}

impl<T> CacheLookup<T> {
    pub fn value(self) -> Option<T> {
        match self {
            CacheLookup::Fresh(v) | CacheLookup::Stale(v) => Some(v),
            CacheLookup::Miss => None,
        }
    }
}

/// 発行済みリクエストの世代
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    key: CacheKey,
    generation: u64,
    /// 発行時点のリソースの無効化回数
    epoch: u64,
}

/// fetch の結果
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub value: T,
    /// より新しいリクエストが発行済みで、キャッシュに保存されなかった
    pub superseded: bool,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    /// キーごとの最新の発行世代（全キー通しの連番）
    generations: HashMap<CacheKey, u64>,
    next_generation: u64,
    epochs: HashMap<String, u64>,
}

impl Inner {
    fn epoch(&self, resource: &str) -> u64 {
        self.epochs.get(resource).copied().unwrap_or(0)
    }
}

pub struct QueryCache {
    inner: Mutex<Inner>,
    stale_after: Duration,
    max_entries: usize,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}

impl QueryCache {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            stale_after,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    fn is_stale(&self, entry: &CacheEntry) -> bool {
        entry.invalidated || entry.fetched_at.elapsed() >= self.stale_after
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> CacheLookup<T> {
        let inner = self.lock();
        let Some(entry) = inner.entries.get(key) else {
            return CacheLookup::Miss;
        };
        let Ok(value) = serde_json::from_value::<T>(entry.value.clone()) else {
            return CacheLookup::Miss;
        };
        if self.is_stale(entry) {
            CacheLookup::Stale(value)
        } else {
            CacheLookup::Fresh(value)
        }
    }

    /// リクエスト発行を登録し世代を払い出す
    pub fn begin(&self, key: &CacheKey) -> RequestToken {
        let mut inner = self.lock();
        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.generations.insert(key.clone(), generation);
        RequestToken {
            key: key.clone(),
            generation,
            epoch: inner.epoch(&key.resource),
        }
    }

    pub fn is_current(&self, token: &RequestToken) -> bool {
        self.lock().generations.get(&token.key).copied() == Some(token.generation)
    }

    /// 応答を保存。より新しいリクエストがあれば捨ててfalseを返す。
    /// 発行後にリソースが無効化されていれば stale として保存する
    pub fn complete<T: Serialize>(&self, token: &RequestToken, value: &T) -> Result<bool> {
        let value = serde_json::to_value(value)?;
        let mut inner = self.lock();
        if inner.generations.get(&token.key).copied() != Some(token.generation) {
            tracing::debug!(
                resource = %token.key.resource,
                generation = token.generation,
                "dropping superseded response"
            );
            return Ok(false);
        }
        let invalidated = inner.epoch(&token.key.resource) != token.epoch;
        inner.entries.insert(
            token.key.clone(),
            CacheEntry {
                value,
                fetched_at: Instant::now(),
                invalidated,
                generation: token.generation,
            },
        );
        self.evict_over_capacity(&mut inner, &token.key);
        Ok(true)
    }

    /// 失敗したリクエストの世代を片付ける
    pub fn abandon(&self, token: &RequestToken) {
        let mut inner = self.lock();
        if inner.generations.get(&token.key).copied() == Some(token.generation)
            && !inner.entries.contains_key(&token.key)
        {
            inner.generations.remove(&token.key);
        }
    }

    fn evict_over_capacity(&self, inner: &mut Inner, keep: &CacheKey) {
        while inner.entries.len() > self.max_entries {
            let victim = inner
                .entries
                .iter()
                .filter(|(key, _)| *key != keep)
                .min_by_key(|(_, entry)| (!self.is_stale(entry), entry.fetched_at))
                .map(|(key, entry)| (key.clone(), entry.generation));
            let Some((key, generation)) = victim else {
                break;
            };
            inner.entries.remove(&key);
            // 発行中のリクエストがなければ世代も消す
            if inner.generations.get(&key).copied() == Some(generation) {
                inner.generations.remove(&key);
            }
            tracing::debug!(resource = %key.resource, "evicted cache entry");
        }
    }

    /// リソースの全エントリを stale にする。発行中のリクエストの応答も stale で保存される
    pub fn invalidate(&self, resource: &str) -> usize {
        let mut inner = self.lock();
        *inner.epochs.entry(resource.to_string()).or_insert(0) += 1;
        let mut count = 0;
        for (key, entry) in inner.entries.iter_mut() {
            if key.resource == resource {
                entry.invalidated = true;
                count += 1;
            }
        }
        tracing::debug!(resource, count, "invalidated cache entries");
        count
    }

    pub fn remove(&self, key: &CacheKey) {
        self.lock().entries.remove(key);
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.generations.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// リクエストを実行してキャッシュする（再試行は1回）
    pub async fn fetch<T, F, Fut>(&self, key: &CacheKey, request: F) -> Result<Fetched<T>>
    where
        T: Serialize,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = self.begin(key);

        let value = match request().await {
            Ok(value) => value,
            Err(e) if e.is_retryable() => {
                tracing::warn!(resource = %key.resource, error = %e, "request failed, retrying once");
                match request().await {
                    Ok(value) => value,
                    Err(e) => {
                        self.abandon(&token);
                        return Err(e);
                    }
                }
            }
            Err(e) => {
                self.abandon(&token);
                return Err(e);
            }
        };

        let stored = self.complete(&token, &value)?;
        Ok(Fetched {
            value,
            superseded: !stored,
        })
    }
}
