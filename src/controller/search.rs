//! 検索入力の非同期デバウンス
//!
//! キー入力を mpsc で受け取り、最後の入力から500ms何も来なければ
//! watch チャネルに確定テキストを発行する。状態遷移は Debouncer に任せ、
//! このタスクはタイマーを駆動するだけ。

use leadlab_common::Debouncer;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub struct SearchDebounce {
    keystrokes: mpsc::UnboundedSender<String>,
    settled: watch::Receiver<String>,
    task: JoinHandle<()>,
}

impl SearchDebounce {
    pub fn spawn(delay: Duration) -> Self {
        let (keystrokes, mut rx) = mpsc::unbounded_channel::<String>();
        let (tx, settled) = watch::channel(String::new());

        let task = tokio::spawn(async move {
            let mut debouncer = Debouncer::new(delay);
            loop {
                let deadline = debouncer.deadline().map(Instant::from_std);
                tokio::select! {
                    received = rx.recv() => {
                        let Some(text) = received else { break };
                        debouncer.input(&text, Instant::now().into_std());
                    }
                    _ = sleep_until_opt(deadline) => {
                        if let Some(text) = debouncer.poll(Instant::now().into_std()) {
                            tracing::debug!(search = %text, "search settled");
                            if tx.send(text).is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self {
            keystrokes,
            settled,
            task,
        }
    }

    /// キー入力（入力欄の現在値）。タスクが止まっていればfalse
    pub fn input(&self, text: &str) -> bool {
        if self.keystrokes.send(text.to_string()).is_err() {
            tracing::debug!(search = %text, "search debounce task has stopped; input dropped");
            return false;
        }
        true
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    /// 確定テキストの購読
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.settled.clone()
    }
}

impl Drop for SearchDebounce {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
