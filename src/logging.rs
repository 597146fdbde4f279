//! ログ初期化
//!
//! RUST_LOG が設定されていればそれを優先し、なければ info（--verbose 時は debug）。
//! 標準出力は結果表示に使うため、ログは標準エラーへ出す。

use tracing_subscriber::EnvFilter;

pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "leadlab=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // 二重初期化（テストなど）は無視する
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
