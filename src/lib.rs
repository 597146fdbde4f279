//! LeadLab CRM クライアント
//!
//! リスト表示（検索デバウンス・フィルタ・選択・スクロール復元）と
//! CSVインポートを LeadLab REST API に結びつける。

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod session;
