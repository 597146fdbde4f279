//! セッション単位の共有状態
//!
//! リスト表示コントローラを作り直しても（詳細画面から戻るなど）
//! スクロール位置を復元できるよう、プロセス内で1つだけ生成して注入する。
//! プロセス終了で消える。

use leadlab_common::{RestorePlan, ScrollPositions};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

#[derive(Clone, Default)]
pub struct SessionStore {
    scroll: Arc<Mutex<HashMap<String, ScrollPositions>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ScrollPositions>> {
        // 書き込み中のpanicでロックが汚染されても位置情報は読み続ける
        self.scroll.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// スクロールイベントを記録（100msに1回へ間引き）
    pub fn record_scroll(&self, view: &str, page: u32, offset: f64, now: Instant) -> bool {
        let mut views = self.lock();
        views
            .entry(view.to_string())
            .or_default()
            .record(page, offset, now)
    }

    pub fn flush_scroll(&self, view: &str, now: Instant) -> bool {
        let mut views = self.lock();
        views
            .get_mut(view)
            .map(|positions| positions.flush(now))
            .unwrap_or(false)
    }

    /// 表示を離れる時に間引き中の最新値を確定
    pub fn commit_scroll(&self, view: &str) {
        let mut views = self.lock();
        if let Some(positions) = views.get_mut(view) {
            positions.commit_pending();
        }
    }

    pub fn scroll_offset(&self, view: &str, page: u32) -> Option<f64> {
        self.lock().get(view).and_then(|positions| positions.get(page))
    }

    pub fn restore_plan(&self, view: &str, page: u32) -> Option<RestorePlan> {
        self.lock()
            .get(view)
            .and_then(|positions| positions.restore_plan(page))
    }
}
