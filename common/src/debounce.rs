//! 検索入力のデバウンス
//!
//! キー入力ごとに500msのタイマーを再始動し、入力が止まった時点の
//! テキストだけを確定値として1回だけ発行する。最大待ち時間の上限はない
//! （500ms未満の間隔で打ち続ける限り、確定は起きない）。

use std::time::{Duration, Instant};

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
enum State {
    Settled,
    Pending { text: String, deadline: Instant },
}

/// 時刻を外から与える純粋なデバウンス状態機械
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    state: State,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: State::Settled,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// キー入力: pendingへ遷移しタイマーを再始動
    pub fn input(&mut self, text: &str, now: Instant) {
        self.state = State::Pending {
            text: text.to_string(),
            deadline: now + self.delay,
        };
    }

    /// 締切を過ぎていればsettledへ遷移し、確定テキストを返す
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match &self.state {
            State::Pending { deadline, .. } if now >= *deadline => {
                match std::mem::replace(&mut self.state, State::Settled) {
                    State::Pending { text, .. } => Some(text),
                    State::Settled => None,
                }
            }
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            State::Pending { deadline, .. } => Some(*deadline),
            State::Settled => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending { .. })
    }

    /// 未確定の入力を破棄
    pub fn cancel(&mut self) {
        self.state = State::Settled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_publishes_after_delay() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::default();

        debouncer.input("acme", t0);
        assert!(debouncer.is_pending());
        assert_eq!(debouncer.poll(t0 + ms(499)), None);
        assert_eq!(debouncer.poll(t0 + ms(500)), Some("acme".to_string()));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_publishes_exactly_once() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::default();

        debouncer.input("acme", t0);
        assert!(debouncer.poll(t0 + ms(600)).is_some());
        assert_eq!(debouncer.poll(t0 + ms(700)), None);
        assert_eq!(debouncer.poll(t0 + ms(5000)), None);
    }

    #[test]
    fn test_rapid_typing_publishes_final_text_only() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::default();

        let keystrokes = ["a", "ac", "acm", "acme", "acme ", "acme c"];
        let mut now = t0;
        for text in keystrokes {
            debouncer.input(text, now);
            now += ms(120);
            assert_eq!(debouncer.poll(now), None);
        }

        let last = now - ms(120);
        assert_eq!(debouncer.deadline(), Some(last + ms(500)));
        assert_eq!(debouncer.poll(last + ms(499)), None);
        assert_eq!(debouncer.poll(last + ms(500)), Some("acme c".to_string()));
    }

    #[test]
    fn test_no_max_wait_cap() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::default();

        // 400ms間隔で10秒間打ち続けても確定しない
        let mut now = t0;
        for i in 0..25 {
            debouncer.input(&format!("q{}", i), now);
            now += ms(400);
            assert_eq!(debouncer.poll(now), None);
        }
    }

    #[test]
    fn test_cancel_discards_pending() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::default();
        debouncer.input("acme", t0);
        debouncer.cancel();
        assert_eq!(debouncer.poll(t0 + ms(1000)), None);
    }
}
