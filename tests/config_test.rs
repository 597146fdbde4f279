//! 設定ファイルテスト

use leadlab::config::{Config, DEFAULT_BASE_URL, DEFAULT_POLL_INTERVAL_MS};
use leadlab_common::PageSize;
use std::time::Duration;
use tempfile::tempdir;

/// ファイルがなければデフォルト
#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = tempdir().expect("Failed to create temp dir");
    let config = Config::load_from(&dir.path().join("config.json")).unwrap();

    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.default_page_size, PageSize::Twenty);
    assert_eq!(config.poll_interval(), Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
    assert!(config.api_token.is_none());
}

/// 保存と読み込み
#[test]
fn test_save_and_load() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        base_url: "https://crm.example.test/api/v1".into(),
        api_token: Some("secret".into()),
        default_page_size: PageSize::Fifty,
        ..Default::default()
    };
    config.save_to(&path).expect("設定保存失敗");

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"default_page_size\": 50"));

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.base_url, "https://crm.example.test/api/v1");
    assert_eq!(loaded.api_token.as_deref(), Some("secret"));
    assert_eq!(loaded.default_page_size, PageSize::Fifty);
}

/// 欠けた項目はデフォルトで補う
#[test]
fn test_partial_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"timeout_seconds": 5}"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.timeout(), Duration::from_secs(5));
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
}

/// 対応していないページサイズは読み込みエラー
#[test]
fn test_unsupported_page_size_rejected() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"default_page_size": 30}"#).unwrap();

    assert!(Config::load_from(&path).is_err());
}

/// 環境変数のベースURLは参照時だけ効き、保存されるファイルには書かれない
#[test]
fn test_env_base_url_is_not_persisted() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");

    std::env::set_var("LEADLAB_BASE_URL", "http://env-only.example/api");
    let mut config = Config::load_from(&path).unwrap();
    assert_eq!(config.get_base_url(), "http://env-only.example/api");
    assert_eq!(config.base_url, DEFAULT_BASE_URL);

    config.api_token = Some("T".into());
    config.save_to(&path).expect("設定保存失敗");
    std::env::remove_var("LEADLAB_BASE_URL");

    let reloaded = Config::load_from(&path).unwrap();
    assert_eq!(reloaded.base_url, DEFAULT_BASE_URL);
    assert_eq!(reloaded.get_base_url(), DEFAULT_BASE_URL);
    assert_eq!(reloaded.api_token.as_deref(), Some("T"));
}
