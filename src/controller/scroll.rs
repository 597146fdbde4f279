//! スクロール位置の復元
//!
//! 描画完了のタイミングが読めないため、同じオフセットへ
//! 0ms / 50ms / 200ms の3回スクロールを試みる。
//! 内容がオフセットより短い場合のクランプは描画側に任せ、エラーにはしない。

use leadlab_common::RestorePlan;
use tokio::time::Instant;

/// スクロール可能な表示領域
pub trait ScrollTarget {
    fn scroll_to(&mut self, offset: f64);
}

/// 復元計画を実行する。試行回数を返す
pub async fn restore_scroll<T: ScrollTarget>(plan: &RestorePlan, target: &mut T) -> usize {
    let started = Instant::now();
    let mut attempts = 0;
    for delay in &plan.attempts {
        tokio::time::sleep_until(started + *delay).await;
        target.scroll_to(plan.offset);
        attempts += 1;
    }
    tracing::debug!(page = plan.page, offset = plan.offset, attempts, "scroll restored");
    attempts
}
