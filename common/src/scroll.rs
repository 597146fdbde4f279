//! スクロール位置の記録と復元計画
//!
//! ページごとに `"page-" + page` をキーとして縦オフセットを保持する。
//! 記録は100msに1回へ間引き、間引かれた最新値はpendingとして残して
//! 次の確定時に反映する。復元はレイアウト完了の遅れに備えて
//! 0ms / 50ms / 200ms の3回試行する。

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const SCROLL_THROTTLE: Duration = Duration::from_millis(100);

/// 復元試行のタイミング（読み込み完了からの経過時間）
pub const RESTORE_ATTEMPTS: [Duration; 3] = [
    Duration::ZERO,
    Duration::from_millis(50),
    Duration::from_millis(200),
];

pub fn page_key(page: u32) -> String {
    format!("page-{}", page)
}

/// 復元計画
#[derive(Debug, Clone, PartialEq)]
pub struct RestorePlan {
    pub page: u32,
    pub offset: f64,
    pub attempts: Vec<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingRecord {
    page: u32,
    offset: f64,
}

/// 1つのリスト表示のスクロール位置マップ
#[derive(Debug, Clone, Default)]
pub struct ScrollPositions {
    offsets: HashMap<String, f64>,
    last_write: Option<Instant>,
    pending: Option<PendingRecord>,
}

fn sanitize(offset: f64) -> f64 {
    if offset.is_finite() && offset > 0.0 {
        offset
    } else {
        0.0
    }
}

impl ScrollPositions {
    pub fn new() -> Self {
        Self::default()
    }

    /// スクロールイベント。保存した場合はtrue、間引いた場合はfalse
    pub fn record(&mut self, page: u32, offset: f64, now: Instant) -> bool {
        let offset = sanitize(offset);
        let open = match self.last_write {
            Some(last) => now.duration_since(last) >= SCROLL_THROTTLE,
            None => true,
        };

        if open {
            self.offsets.insert(page_key(page), offset);
            self.last_write = Some(now);
            self.pending = None;
            true
        } else {
            self.pending = Some(PendingRecord { page, offset });
            false
        }
    }

    /// 間引き窓が閉じていればpendingを確定
    pub fn flush(&mut self, now: Instant) -> bool {
        let Some(pending) = self.pending.clone() else {
            return false;
        };
        self.record(pending.page, pending.offset, now)
    }

    /// 間引き窓に関係なくpendingを確定（ページ離脱時）
    pub fn commit_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.offsets.insert(page_key(pending.page), pending.offset);
        }
    }

    pub fn get(&self, page: u32) -> Option<f64> {
        self.offsets.get(&page_key(page)).copied()
    }

    /// 保存済みオフセットが0より大きい場合のみ復元計画を返す
    pub fn restore_plan(&self, page: u32) -> Option<RestorePlan> {
        let offset = self.get(page)?;
        if offset <= 0.0 {
            return None;
        }
        Some(RestorePlan {
            page,
            offset,
            attempts: RESTORE_ATTEMPTS.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
