//! クエリキャッシュテスト
//!
//! 再試行・世代管理・無効化・上限の動作を検証

use leadlab::cache::{CacheKey, CacheLookup, QueryCache};
use leadlab::error::LeadLabError;
use leadlab_common::{ListQuery, ListResource, PageSize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn leads_key(page: u32) -> CacheKey {
    let mut query = ListQuery::new(PageSize::Twenty);
    query.page = page;
    CacheKey::for_list(ListResource::Leads, &query.compose(ListResource::Leads))
}

/// 同じクエリは同じキーになる
#[test]
fn test_same_query_same_key() {
    assert_eq!(leads_key(0), leads_key(0));
    assert_ne!(leads_key(0), leads_key(1));
    assert_eq!(leads_key(0).resource, "leads");
}

/// ネットワークエラーは1回だけ再試行する
#[tokio::test]
async fn test_retry_once_on_network_error() {
    let cache = QueryCache::default();
    let calls = AtomicUsize::new(0);
    let counter = &calls;

    let result = cache
        .fetch(&leads_key(0), move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(LeadLabError::Api {
                    status: 503,
                    message: "unavailable".into(),
                })
            } else {
                Ok(vec![1i64, 2, 3])
            }
        })
        .await
        .expect("再試行で成功するはず");

    assert_eq!(result.value, vec![1, 2, 3]);
    assert!(!result.superseded);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// 2回続けて失敗したらエラーを返す
#[tokio::test]
async fn test_gives_up_after_second_failure() {
    let cache = QueryCache::default();
    let calls = AtomicUsize::new(0);
    let counter = &calls;

    let result = cache
        .fetch(&leads_key(0), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<Vec<i64>, _>(LeadLabError::Api {
                status: 502,
                message: "bad gateway".into(),
            })
        })
        .await;

    assert!(matches!(result, Err(LeadLabError::Api { status: 502, .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.is_empty());
}

/// クライアントエラーは再試行しない
#[tokio::test]
async fn test_no_retry_on_client_error() {
    let cache = QueryCache::default();
    let calls = AtomicUsize::new(0);
    let counter = &calls;

    let result = cache
        .fetch(&leads_key(0), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<Vec<i64>, _>(LeadLabError::Api {
                status: 404,
                message: "not found".into(),
            })
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// 同じキーで後発のリクエストがあれば古い応答は保存しない
#[test]
fn test_older_generation_is_not_stored() {
    let cache = QueryCache::default();
    let key = leads_key(0);

    let first = cache.begin(&key);
    let second = cache.begin(&key);
    assert!(!cache.is_current(&first));
    assert!(cache.is_current(&second));

    assert!(cache.complete(&second, &vec![2i64]).unwrap());
    assert!(!cache.complete(&first, &vec![1i64]).unwrap());
    assert_eq!(cache.lookup::<Vec<i64>>(&key), CacheLookup::Fresh(vec![2]));
}

/// 期限切れは stale として値を返す
#[test]
fn test_expired_entry_is_stale() {
    let cache = QueryCache::new(Duration::ZERO);
    let key = leads_key(0);
    let token = cache.begin(&key);
    cache.complete(&token, &vec![1i64]).unwrap();

    assert_eq!(cache.lookup::<Vec<i64>>(&key), CacheLookup::Stale(vec![1]));
    assert_eq!(cache.lookup::<Vec<i64>>(&key).value(), Some(vec![1]));
}

/// 無効化は対象リソースだけに効く
#[test]
fn test_invalidate_by_resource() {
    let cache = QueryCache::default();
    for key in [leads_key(0), leads_key(1), CacheKey::new("deals", "skip=0")] {
        let token = cache.begin(&key);
        cache.complete(&token, &0i64).unwrap();
    }

    assert_eq!(cache.invalidate("leads"), 2);
    assert!(matches!(cache.lookup::<i64>(&leads_key(1)), CacheLookup::Stale(_)));
    assert!(matches!(
        cache.lookup::<i64>(&CacheKey::new("deals", "skip=0")),
        CacheLookup::Fresh(_)
    ));

    cache.clear();
    assert_eq!(cache.len(), 0);
}

/// 無効化より前に発行したリクエストの応答は stale として保存される
#[test]
fn test_in_flight_response_after_invalidate_is_stale() {
    let cache = QueryCache::default();
    let key = leads_key(0);

    let token = cache.begin(&key);
    assert_eq!(cache.invalidate("leads"), 0);
    assert!(cache.complete(&token, &vec![1i64]).unwrap());
    assert_eq!(cache.lookup::<Vec<i64>>(&key), CacheLookup::Stale(vec![1]));

    // 無効化後に発行したリクエストは fresh
    let token = cache.begin(&key);
    assert!(cache.complete(&token, &vec![2i64]).unwrap());
    assert_eq!(cache.lookup::<Vec<i64>>(&key), CacheLookup::Fresh(vec![2]));
}

/// 他リソースの無効化は発行中のリクエストに影響しない
#[test]
fn test_invalidate_other_resource_keeps_in_flight_fresh() {
    let cache = QueryCache::default();
    let key = leads_key(0);

    let token = cache.begin(&key);
    cache.invalidate("deals");
    cache.complete(&token, &vec![1i64]).unwrap();
    assert_eq!(cache.lookup::<Vec<i64>>(&key), CacheLookup::Fresh(vec![1]));
}

/// 上限を超えたら stale なエントリから捨てる
#[test]
fn test_over_capacity_evicts_stale_first() {
    let cache = QueryCache::default().with_max_entries(2);
    let deals = CacheKey::new("deals", "skip=0");
    for key in [deals.clone(), leads_key(0)] {
        let token = cache.begin(&key);
        cache.complete(&token, &0i64).unwrap();
    }
    cache.invalidate("deals");

    let token = cache.begin(&leads_key(1));
    cache.complete(&token, &1i64).unwrap();

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.lookup::<i64>(&deals), CacheLookup::Miss);
    assert_eq!(cache.lookup::<i64>(&leads_key(0)), CacheLookup::Fresh(0));
    assert_eq!(cache.lookup::<i64>(&leads_key(1)), CacheLookup::Fresh(1));
}

/// すべて fresh なら最も古いエントリを捨てる
#[test]
fn test_over_capacity_evicts_oldest() {
    let cache = QueryCache::default().with_max_entries(2);
    for page in 0..3 {
        let token = cache.begin(&leads_key(page));
        cache.complete(&token, &(page as i64)).unwrap();
        std::thread::sleep(Duration::from_millis(2));
    }

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.lookup::<i64>(&leads_key(0)), CacheLookup::Miss);
    assert_eq!(cache.lookup::<i64>(&leads_key(2)), CacheLookup::Fresh(2));
}
