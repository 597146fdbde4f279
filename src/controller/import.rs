//! CSVインポートセッション
//!
//! ImportWizard の状態遷移にAPI呼び出しを結びつける:
//! - ファイル選択: 拡張子チェックのみ（ネットワークなし）
//! - プレビュー: POST /data-import/preview → preview へ
//! - 開始: POST /data-import → importing へ
//! - 進捗: GET /data-import/jobs/{id}/progress を一定間隔でポーリング
//!
//! 失敗したジョブの再試行はしない。restart() で最初からやり直す。

use crate::api::{CsvUpload, ImportApi};
use crate::error::{LeadLabError, Result};
use leadlab_common::{
    Error as CommonError, ImportOptions, ImportProgress, ImportWizard, JobId, JobStatus,
    WizardStep,
};
use std::time::Duration;

pub struct ImportSession<A> {
    api: A,
    wizard: ImportWizard,
    upload: Option<CsvUpload>,
    poll_interval: Duration,
}

impl<A: ImportApi> ImportSession<A> {
    pub fn new(api: A, poll_interval: Duration) -> Self {
        Self {
            api,
            wizard: ImportWizard::new(),
            upload: None,
            poll_interval,
        }
    }

    pub fn wizard(&self) -> &ImportWizard {
        &self.wizard
    }

    pub fn step(&self) -> WizardStep {
        self.wizard.step()
    }

    /// ファイルを選択（CSV以外は即座に拒否）
    pub fn select_file(&mut self, upload: CsvUpload) -> Result<()> {
        self.wizard.select_file(&upload.file_name, Some(upload.size()))?;
        self.upload = Some(upload);
        Ok(())
    }

    /// プレビューを取得して preview へ進む
    pub async fn load_preview(&mut self) -> Result<()> {
        if !self.wizard.can_request_preview() {
            return Err(CommonError::InvalidTransition {
                from: self.wizard.step().name(),
                action: "request a preview",
            }
            .into());
        }
        let Some(upload) = &self.upload else {
            return Err(CommonError::Validation("ファイルが選択されていません".into()).into());
        };

        match self.api.preview(upload).await {
            Ok(preview) => {
                tracing::info!(
                    file = %upload.file_name,
                    headers = preview.headers.len(),
                    detected = preview.detected_mapping.len(),
                    "import preview loaded"
                );
                self.wizard.accept_preview(preview)?;
                Ok(())
            }
            Err(e) => {
                self.wizard.set_error(e.to_string());
                Err(e)
            }
        }
    }

    pub fn forward(&mut self) -> Result<()> {
        Ok(self.wizard.forward()?)
    }

    pub fn back(&mut self) -> Result<()> {
        Ok(self.wizard.back()?)
    }

    pub fn set_mapping(&mut self, column: &str, field: Option<&str>) -> Result<()> {
        Ok(self.wizard.set_mapping(column, field)?)
    }

    pub fn set_options(&mut self, options: ImportOptions) -> Result<()> {
        Ok(self.wizard.set_options(options)?)
    }

    /// インポートを開始して importing へ
    pub async fn start(&mut self) -> Result<JobId> {
        if self.wizard.step() != WizardStep::Options {
            return Err(CommonError::InvalidTransition {
                from: self.wizard.step().name(),
                action: "start the import",
            }
            .into());
        }
        let Some(upload) = &self.upload else {
            return Err(CommonError::Validation("ファイルが選択されていません".into()).into());
        };

        let job = match self
            .api
            .start_import(upload, self.wizard.mapping(), self.wizard.options())
            .await
        {
            Ok(job) => job,
            Err(e) => {
                self.wizard.set_error(e.to_string());
                return Err(e);
            }
        };
        let job_id = job.id.clone();
        tracing::info!(job_id = %job_id, file = %upload.file_name, "import started");
        self.wizard.start_import(job)?;
        Ok(job_id)
    }

    /// 進捗を1回取得
    pub async fn poll_once(&mut self) -> Result<ImportProgress> {
        let Some(job) = self.wizard.job() else {
            return Err(CommonError::InvalidTransition {
                from: self.wizard.step().name(),
                action: "poll progress",
            }
            .into());
        };
        let progress = self.api.import_progress(&job.id).await?;
        tracing::debug!(
            status = %progress.status,
            processed = progress.processed_records,
            total = progress.total_records,
            "import progress"
        );
        self.wizard.apply_progress(progress.clone())?;
        Ok(progress)
    }

    /// completed / failed になるまでポーリングする
    pub async fn wait_for_completion<F>(&mut self, mut on_progress: F) -> Result<ImportProgress>
    where
        F: FnMut(&ImportProgress),
    {
        loop {
            let progress = self.poll_once().await?;
            on_progress(&progress);

            match progress.status {
                JobStatus::Completed => {
                    tracing::info!(
                        successful = progress.successful_records,
                        failed = progress.failed_records,
                        skipped = progress.skipped_records,
                        "import completed"
                    );
                    return Ok(progress);
                }
                JobStatus::Failed => {
                    let summary = self
                        .wizard
                        .error()
                        .unwrap_or("インポートに失敗しました")
                        .to_string();
                    tracing::warn!(%summary, "import failed");
                    return Err(LeadLabError::ImportFailed(summary));
                }
                JobStatus::Pending | JobStatus::Processing => {
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// 最初からやり直す
    pub fn restart(&mut self) {
        self.wizard.restart();
        self.upload = None;
    }
}
