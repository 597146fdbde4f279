//! LeadLab REST API連携
//!
//! コントローラはHTTPの詳細を知らず、以下のトレイト越しにデータを取得する:
//! - ListSource: ページング付きリストの取得
//! - ImportApi: CSVインポートのプレビュー・開始・進捗
//!
//! 実装は client::LeadLabClient（reqwest）。

pub mod client;

pub use client::{Endpoint, LeadLabClient};

use crate::error::Result;
use leadlab_common::{
    ImportJob, ImportOptions, ImportPreview, ImportProgress, JobId, ListResource, Page,
    QueryParams,
};
use std::collections::BTreeMap;

/// ページング付きリストの取得元
#[allow(async_fn_in_trait)]
pub trait ListSource<T> {
    fn resource(&self) -> ListResource;

    async fn fetch_page(&self, params: &QueryParams) -> Result<Page<T>>;
}

/// アップロードするCSVファイル
#[derive(Debug, Clone)]
pub struct CsvUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl CsvUpload {
    pub async fn read(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Err(crate::error::LeadLabError::FileNotFound(
                path.display().to_string(),
            ));
        }
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.csv".to_string());
        Ok(Self { file_name, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// CSVインポートのエンドポイント
#[allow(async_fn_in_trait)]
pub trait ImportApi {
    /// POST /data-import/preview
    async fn preview(&self, upload: &CsvUpload) -> Result<ImportPreview>;

    /// POST /data-import
    async fn start_import(
        &self,
        upload: &CsvUpload,
        mapping: &BTreeMap<String, String>,
        options: &ImportOptions,
    ) -> Result<ImportJob>;

    /// GET /data-import/jobs/{id}/progress
    async fn import_progress(&self, job_id: &JobId) -> Result<ImportProgress>;
}

impl<A: ImportApi> ImportApi for std::sync::Arc<A> {
    async fn preview(&self, upload: &CsvUpload) -> Result<ImportPreview> {
        (**self).preview(upload).await
    }

    async fn start_import(
        &self,
        upload: &CsvUpload,
        mapping: &BTreeMap<String, String>,
        options: &ImportOptions,
    ) -> Result<ImportJob> {
        (**self).start_import(upload, mapping, options).await
    }

    async fn import_progress(&self, job_id: &JobId) -> Result<ImportProgress> {
        (**self).import_progress(job_id).await
    }
}
