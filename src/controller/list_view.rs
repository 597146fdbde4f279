//! リスト表示コントローラ
//!
//! 検索デバウンス・フィルタ・ソート・ページングを1つのクエリにまとめ、
//! キャッシュ越しにリストを取得する。
//! - キャッシュ済みの値はすぐ表示し、stale なら裏で再取得する
//! - ページ/ページサイズが変わったら選択をクリアする
//! - 新しいリクエストを出した後に届いた古い応答は捨てる
//! - 取得失敗は通知として積み、直前に表示していた行はそのまま残す

use crate::api::ListSource;
use crate::cache::{CacheKey, CacheLookup, Fetched, QueryCache};
use crate::error::Result;
use crate::session::SessionStore;
use leadlab_common::{
    Debouncer, FilterCategory, HasId, ListQuery, Page, PageChange, PageSize, QueryParams,
    RestorePlan, RowId, Selection, Sort, TagId,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// 閉じられる一時通知
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub id: u64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Miss,
}

/// 発行したリクエスト
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub seq: u64,
    pub params: QueryParams,
    pub freshness: Freshness,
    key: CacheKey,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// 行を更新した。復元すべきスクロール位置があれば計画を返す
    Applied { restore: Option<RestorePlan> },
    /// より新しいリクエストがあるため捨てた
    Superseded,
    Failed { message: String },
}

pub struct ListViewController<T, S> {
    view: String,
    source: S,
    cache: Arc<QueryCache>,
    session: SessionStore,
    query: ListQuery,
    debouncer: Debouncer,
    selection: Selection<RowId>,
    rows: Vec<T>,
    total: u64,
    has_more: bool,
    state: LoadState,
    notices: Vec<Notice>,
    next_notice_id: u64,
    request_seq: u64,
    dirty: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> ListViewController<T, S>
where
    T: HasId + Clone + Serialize + DeserializeOwned,
    S: ListSource<T>,
{
    pub fn new(source: S, cache: Arc<QueryCache>, session: SessionStore, page_size: PageSize) -> Self {
        let view = source.resource().path().to_string();
        Self {
            view,
            source,
            cache,
            session,
            query: ListQuery::new(page_size),
            debouncer: Debouncer::default(),
            selection: Selection::new(),
            rows: Vec::new(),
            total: 0,
            has_more: false,
            state: LoadState::Idle,
            notices: Vec::new(),
            next_notice_id: 1,
            request_seq: 0,
            dirty: true,
            _marker: PhantomData,
        }
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// クエリが変わっていて再取得が必要か
    pub fn needs_load(&self) -> bool {
        self.dirty
    }

    pub fn page_count(&self) -> u64 {
        let size = self.query.page_size.get() as u64;
        self.total.div_ceil(size)
    }

    /// クエリ変更を適用し、ページング変更なら選択をクリアする。
    /// 送信パラメータが変わったらtrue
    fn apply(&mut self, change: impl FnOnce(&mut ListQuery)) -> bool {
        let before = self.query.compose(self.source.resource());
        let (page, page_size) = (self.query.page, self.query.page_size);

        change(&mut self.query);

        if self.query.page_size != page_size {
            self.session.commit_scroll(&self.view);
            self.selection.reconcile(PageChange::PageSize {
                from: page_size.get(),
                to: self.query.page_size.get(),
            });
        } else if self.query.page != page {
            self.session.commit_scroll(&self.view);
            self.selection.reconcile(PageChange::Page {
                from: page,
                to: self.query.page,
            });
        }

        let changed = self.query.compose(self.source.resource()) != before;
        self.dirty |= changed;
        changed
    }

    // =============================================
    // 検索
    // =============================================

    /// 入力欄の変更（リクエストはデバウンス確定後）
    pub fn type_search(&mut self, text: &str, now: Instant) {
        self.query.search_text = text.to_string();
        self.debouncer.input(text, now);
    }

    /// タイマー駆動。検索テキストが確定してクエリが変わったらtrue
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(text) = self.debouncer.poll(now) else {
            return false;
        };
        self.apply(|query| {
            query.set_debounced_search(&text);
        })
    }

    /// Enterキー相当: デバウンスを待たずに確定する
    pub fn submit_search(&mut self, text: &str) -> bool {
        self.debouncer.cancel();
        self.query.search_text = text.to_string();
        let text = text.to_string();
        self.apply(|query| {
            query.set_debounced_search(&text);
        })
    }

    pub fn search_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    // =============================================
    // フィルタ・ソート・ページング
    // =============================================

    pub fn set_tag_filter(&mut self, tag: Option<TagId>) {
        self.apply(|query| {
            query.set_tag_filter(tag);
        });
    }

    /// 不正な値は拒否され、クエリは変わらない
    pub fn toggle_filter(&mut self, category: FilterCategory, value: &str) -> Result<()> {
        let mut result = Ok(());
        self.apply(|query| result = query.toggle_filter_value(category, value));
        Ok(result?)
    }

    pub fn set_filter_values(&mut self, category: FilterCategory, values: Vec<String>) -> Result<()> {
        let mut result = Ok(());
        self.apply(|query| result = query.set_filter_values(category, values));
        Ok(result?)
    }

    pub fn clear_filters(&mut self) {
        self.apply(|query| query.clear_filters());
    }

    pub fn sort_by(&mut self, field: &str) {
        self.apply(|query| query.sort_by(field));
    }

    pub fn set_sort(&mut self, sort: Option<Sort>) {
        self.apply(|query| query.set_sort(sort));
    }

    pub fn set_page(&mut self, page: u32) {
        self.apply(|query| query.page = page);
    }

    pub fn next_page(&mut self) -> bool {
        if !self.has_more && (self.query.page as u64 + 1) >= self.page_count() {
            return false;
        }
        let page = self.query.page + 1;
        self.set_page(page);
        true
    }

    pub fn prev_page(&mut self) -> bool {
        if self.query.page == 0 {
            return false;
        }
        let page = self.query.page - 1;
        self.set_page(page);
        true
    }

    pub fn set_page_size(&mut self, page_size: PageSize) {
        self.apply(|query| {
            if query.page_size != page_size {
                query.page_size = page_size;
                query.page = 0;
            }
        });
    }

    // =============================================
    // 読み込み
    // =============================================

    /// リクエストを発行する。キャッシュ済みの値があれば先に表示する
    pub fn begin_load(&mut self) -> LoadRequest {
        let params = self.query.compose(self.source.resource());
        let key = CacheKey::for_list(self.source.resource(), &params);

        let freshness = match self.cache.lookup::<Page<T>>(&key) {
            CacheLookup::Fresh(page) => {
                self.show_page(page);
                Freshness::Fresh
            }
            CacheLookup::Stale(page) => {
                self.show_page(page);
                self.state = LoadState::Loading;
                Freshness::Stale
            }
            CacheLookup::Miss => {
                self.state = LoadState::Loading;
                Freshness::Miss
            }
        };

        self.request_seq += 1;
        self.dirty = false;
        tracing::debug!(
            view = %self.view,
            seq = self.request_seq,
            query = %params.to_query_string(),
            ?freshness,
            "list load"
        );

        LoadRequest {
            seq: self.request_seq,
            params,
            freshness,
            key,
        }
    }

    /// ネットワーク取得（キャッシュ層で1回再試行）
    pub async fn fetch(&self, request: &LoadRequest) -> Result<Fetched<Page<T>>> {
        let params = &request.params;
        self.cache
            .fetch(&request.key, || self.source.fetch_page(params))
            .await
    }

    /// 応答を反映する
    pub fn finish_load(
        &mut self,
        request: LoadRequest,
        result: Result<Fetched<Page<T>>>,
    ) -> LoadOutcome {
        if request.seq != self.request_seq {
            tracing::debug!(view = %self.view, seq = request.seq, latest = self.request_seq, "stale response dropped");
            return LoadOutcome::Superseded;
        }

        match result {
            Ok(fetched) if fetched.superseded => LoadOutcome::Superseded,
            Ok(fetched) => {
                self.show_page(fetched.value);
                LoadOutcome::Applied {
                    restore: self.restore_plan(),
                }
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(view = %self.view, error = %message, "list load failed");
                self.state = LoadState::Failed;
                self.push_notice(message.clone());
                LoadOutcome::Failed { message }
            }
        }
    }

    /// 発行から反映まで。新鮮なキャッシュがあればネットワークに出ない
    pub async fn load(&mut self) -> LoadOutcome {
        let request = self.begin_load();
        if request.freshness == Freshness::Fresh {
            return LoadOutcome::Applied {
                restore: self.restore_plan(),
            };
        }
        let result = self.fetch(&request).await;
        self.finish_load(request, result)
    }

    fn show_page(&mut self, page: Page<T>) {
        self.rows = page.results;
        self.total = page.total;
        self.has_more = page.has_more;
        self.state = LoadState::Loaded;
    }

    pub fn restore_plan(&self) -> Option<RestorePlan> {
        self.session.restore_plan(&self.view, self.query.page)
    }

    // =============================================
    // 選択
    // =============================================

    pub fn page_ids(&self) -> Vec<RowId> {
        self.rows.iter().map(HasId::row_id).collect()
    }

    pub fn toggle_row(&mut self, id: RowId) {
        self.selection.toggle(id);
    }

    /// 全選択チェックボックス（読み込み済みの現在ページのみ対象）
    pub fn toggle_all(&mut self) {
        let ids = self.page_ids();
        self.selection.toggle_all(&ids);
    }

    pub fn is_selected(&self, id: RowId) -> bool {
        self.selection.is_selected(&id)
    }

    pub fn is_all_selected(&self) -> bool {
        self.selection.is_all_selected(&self.page_ids())
    }

    /// 一括操作の実行時点の選択（自動スナップショットはしない）
    pub fn selected_ids(&self) -> Vec<RowId> {
        self.selection.snapshot()
    }

    /// 一括操作の完了後
    pub fn finish_bulk_action(&mut self) {
        self.selection.clear();
    }

    // =============================================
    // スクロール・通知
    // =============================================

    pub fn on_scroll(&mut self, offset: f64, now: Instant) -> bool {
        self.session
            .record_scroll(&self.view, self.query.page, offset, now)
    }

    pub fn flush_scroll(&mut self, now: Instant) -> bool {
        self.session.flush_scroll(&self.view, now)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    fn push_notice(&mut self, message: String) {
        self.notices.push(Notice {
            id: self.next_notice_id,
            message,
        });
        self.next_notice_id += 1;
    }

    pub fn dismiss_notice(&mut self, id: u64) {
        self.notices.retain(|notice| notice.id != id);
    }
}

impl<T, S> Drop for ListViewController<T, S> {
    fn drop(&mut self) {
        // 詳細画面へ移動して戻った時に復元できるよう確定しておく
        self.session.commit_scroll(&self.view);
    }
}
