//! CSVインポートウィザードの状態機械
//!
//! upload → preview → mapping → options → importing の一方向ステッパー。
//! 「次へ」で1段進み、「戻る」で1段戻る（入力済みデータは保持）。
//! importing に入った後はジョブハンドルは不変で、進捗を読み取るだけ。
//! 失敗したインポートの自動リトライはしない（uploadからやり直す）。

use crate::error::{Error, Result};
use crate::types::{ImportJob, ImportOptions, ImportPreview, ImportProgress, JobStatus};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Upload,
    Preview,
    Mapping,
    Options,
    Importing,
}

impl WizardStep {
    pub fn name(&self) -> &'static str {
        match self {
            WizardStep::Upload => "upload",
            WizardStep::Preview => "preview",
            WizardStep::Mapping => "mapping",
            WizardStep::Options => "options",
            WizardStep::Importing => "importing",
        }
    }

    /// 1始まりのステップ番号（表示用）
    pub fn number(&self) -> usize {
        match self {
            WizardStep::Upload => 1,
            WizardStep::Preview => 2,
            WizardStep::Mapping => 3,
            WizardStep::Options => 4,
            WizardStep::Importing => 5,
        }
    }
}

/// 選択されたファイル
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    pub size: Option<u64>,
}

/// ファイル名がCSVかどうか（拡張子の大文字小文字は区別しない）
pub fn is_csv_file_name(name: &str) -> bool {
    name.to_lowercase().ends_with(".csv")
}

#[derive(Debug, Clone)]
pub struct ImportWizard {
    step: WizardStep,
    file: Option<SelectedFile>,
    preview: Option<ImportPreview>,
    mapping: BTreeMap<String, String>,
    options: ImportOptions,
    job: Option<ImportJob>,
    progress: Option<ImportProgress>,
    error: Option<String>,
}

impl Default for ImportWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportWizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Upload,
            file: None,
            preview: None,
            mapping: BTreeMap::new(),
            options: ImportOptions::default(),
            job: None,
            progress: None,
            error: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn preview(&self) -> Option<&ImportPreview> {
        self.preview.as_ref()
    }

    pub fn mapping(&self) -> &BTreeMap<String, String> {
        &self.mapping
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn job(&self) -> Option<&ImportJob> {
        self.job.as_ref()
    }

    pub fn progress(&self) -> Option<&ImportProgress> {
        self.progress.as_ref()
    }

    /// 画面に表示するエラー
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    fn invalid(&self, action: &'static str) -> Error {
        Error::InvalidTransition {
            from: self.step.name(),
            action,
        }
    }

    /// ファイル選択。CSV以外はネットワーク呼び出しなしで即座に拒否
    pub fn select_file(&mut self, name: &str, size: Option<u64>) -> Result<()> {
        if self.step != WizardStep::Upload {
            return Err(self.invalid("select a file"));
        }
        if !is_csv_file_name(name) {
            let message = format!("CSVファイルを選択してください: {}", name);
            self.error = Some(message.clone());
            return Err(Error::Validation(message));
        }

        self.file = Some(SelectedFile {
            name: name.to_string(),
            size,
        });
        self.preview = None;
        self.mapping.clear();
        self.error = None;
        Ok(())
    }

    /// プレビュー取得を要求できる状態か
    pub fn can_request_preview(&self) -> bool {
        self.step == WizardStep::Upload && self.file.is_some()
    }

    /// サーバーのプレビュー結果を受け取り preview へ進む（マッピングは自動検出結果で初期化）
    pub fn accept_preview(&mut self, preview: ImportPreview) -> Result<()> {
        if !self.can_request_preview() {
            return Err(self.invalid("accept a preview"));
        }
        self.mapping = preview.detected_mapping.clone();
        self.preview = Some(preview);
        self.error = None;
        self.step = WizardStep::Preview;
        Ok(())
    }

    /// 「次へ」
    pub fn forward(&mut self) -> Result<()> {
        self.step = match self.step {
            WizardStep::Upload if self.file.is_some() && self.preview.is_some() => {
                WizardStep::Preview
            }
            WizardStep::Preview => WizardStep::Mapping,
            WizardStep::Mapping => WizardStep::Options,
            _ => return Err(self.invalid("continue")),
        };
        Ok(())
    }

    /// 「戻る」（入力済みデータは保持）
    pub fn back(&mut self) -> Result<()> {
        self.step = match self.step {
            WizardStep::Preview => WizardStep::Upload,
            WizardStep::Mapping => WizardStep::Preview,
            WizardStep::Options => WizardStep::Mapping,
            WizardStep::Upload | WizardStep::Importing => return Err(self.invalid("go back")),
        };
        Ok(())
    }

    /// CSV列の割り当てを変更（Noneで取り込み対象外）。内容の妥当性はサーバーが判断する
    pub fn set_mapping(&mut self, column: &str, field: Option<&str>) -> Result<()> {
        if self.step == WizardStep::Importing {
            return Err(self.invalid("edit the mapping"));
        }
        match field {
            Some(field) => {
                self.mapping.insert(column.to_string(), field.to_string());
            }
            None => {
                self.mapping.remove(column);
            }
        }
        Ok(())
    }

    pub fn set_options(&mut self, options: ImportOptions) -> Result<()> {
        if self.step == WizardStep::Importing {
            return Err(self.invalid("edit the options"));
        }
        self.options = options;
        Ok(())
    }

    /// options → importing（ジョブハンドルはこれ以降不変）
    pub fn start_import(&mut self, job: ImportJob) -> Result<()> {
        if self.step != WizardStep::Options {
            return Err(self.invalid("start the import"));
        }
        self.job = Some(job);
        self.progress = None;
        self.error = None;
        self.step = WizardStep::Importing;
        Ok(())
    }

    /// ポーリング結果を反映。failed ならサーバーのエラー概要をそのまま表示する
    pub fn apply_progress(&mut self, progress: ImportProgress) -> Result<()> {
        if self.step != WizardStep::Importing {
            return Err(self.invalid("record progress"));
        }
        if progress.status == JobStatus::Failed {
            self.error = Some(
                progress
                    .error_summary
                    .clone()
                    .unwrap_or_else(|| "インポートに失敗しました".to_string()),
            );
        }
        self.progress = Some(progress);
        Ok(())
    }

    /// ポーリングを続けるべきか
    pub fn should_poll(&self) -> bool {
        self.step == WizardStep::Importing && !self.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.progress
            .as_ref()
            .map(|p| p.status.is_terminal())
            .unwrap_or(false)
    }

    /// 最初からやり直す
    pub fn restart(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobId;

    fn sample_preview() -> ImportPreview {
        let mut detected = BTreeMap::new();
        detected.insert("E-mail".to_string(), "email".to_string());
        detected.insert("Company".to_string(), "company".to_string());
        ImportPreview {
            headers: vec!["E-mail".to_string(), "Company".to_string(), "Notes".to_string()],
            detected_mapping: detected,
            ..Default::default()
        }
    }

    fn wizard_at_options() -> ImportWizard {
        let mut wizard = ImportWizard::new();
        wizard.select_file("leads.csv", Some(128)).unwrap();
        wizard.accept_preview(sample_preview()).unwrap();
        wizard.forward().unwrap();
        wizard.forward().unwrap();
        assert_eq!(wizard.step(), WizardStep::Options);
        wizard
    }

    fn job() -> ImportJob {
        ImportJob {
            id: JobId("42".to_string()),
            status: JobStatus::Pending,
        }
    }

    #[test]
    fn test_non_csv_rejected_without_transition() {
        let mut wizard = ImportWizard::new();
        let result = wizard.select_file("report.txt", None);
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(wizard.step(), WizardStep::Upload);
        assert!(wizard.error().is_some());
        assert!(wizard.file().is_none());
        assert!(!wizard.can_request_preview());
    }

    #[test]
    fn test_csv_suffix_case_insensitive() {
        assert!(is_csv_file_name("LEADS.CSV"));
        assert!(!is_csv_file_name("leads.csv.txt"));
        assert!(!is_csv_file_name("csv"));
    }

    #[test]
    fn test_preview_seeds_mapping() {
        let mut wizard = ImportWizard::new();
        wizard.select_file("leads.csv", None).unwrap();
        wizard.accept_preview(sample_preview()).unwrap();

        assert_eq!(wizard.step(), WizardStep::Preview);
        assert_eq!(wizard.mapping().get("E-mail").map(String::as_str), Some("email"));
        assert_eq!(wizard.mapping().len(), 2);
    }

    #[test]
    fn test_preview_requires_file() {
        let mut wizard = ImportWizard::new();
        assert!(wizard.accept_preview(sample_preview()).is_err());
        assert!(wizard.forward().is_err());
    }

    #[test]
    fn test_back_then_forward_returns_to_same_step() {
        let mut wizard = wizard_at_options();
        for expected in [WizardStep::Options, WizardStep::Mapping, WizardStep::Preview] {
            assert_eq!(wizard.step(), expected);
            wizard.back().unwrap();
            wizard.forward().unwrap();
            assert_eq!(wizard.step(), expected);
            wizard.back().unwrap();
        }
        assert_eq!(wizard.step(), WizardStep::Upload);
        assert!(wizard.back().is_err());
    }

    #[test]
    fn test_importing_only_from_options() {
        let mut wizard = ImportWizard::new();
        assert!(wizard.start_import(job()).is_err());

        wizard.select_file("leads.csv", None).unwrap();
        wizard.accept_preview(sample_preview()).unwrap();
        assert!(wizard.start_import(job()).is_err());

        let mut wizard = wizard_at_options();
        assert!(wizard.forward().is_err());
        wizard.start_import(job()).unwrap();
        assert_eq!(wizard.step(), WizardStep::Importing);
    }

    #[test]
    fn test_importing_is_dead_end() {
        let mut wizard = wizard_at_options();
        wizard.start_import(job()).unwrap();

        assert!(wizard.back().is_err());
        assert!(wizard.forward().is_err());
        assert!(wizard.set_mapping("Notes", Some("notes")).is_err());
        assert!(wizard.start_import(job()).is_err());
        assert_eq!(wizard.job().map(|j| j.id.0.as_str()), Some("42"));
    }

    #[test]
    fn test_mapping_editable_before_import() {
        let mut wizard = wizard_at_options();
        wizard.set_mapping("Notes", Some("notes")).unwrap();
        wizard.set_mapping("Company", None).unwrap();
        assert_eq!(wizard.mapping().get("Notes").map(String::as_str), Some("notes"));
        assert!(!wizard.mapping().contains_key("Company"));
    }

    #[test]
    fn test_failed_progress_surfaces_server_summary() {
        let mut wizard = wizard_at_options();
        wizard.start_import(job()).unwrap();
        assert!(wizard.should_poll());

        wizard
            .apply_progress(ImportProgress {
                status: JobStatus::Processing,
                progress_percentage: 50.0,
                ..Default::default()
            })
            .unwrap();
        assert!(wizard.should_poll());

        wizard
            .apply_progress(ImportProgress {
                status: JobStatus::Failed,
                error_summary: Some("Column 'email' missing".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(!wizard.should_poll());
        assert!(wizard.is_finished());
        assert_eq!(wizard.error(), Some("Column 'email' missing"));
    }

    #[test]
    fn test_restart_returns_to_upload() {
        let mut wizard = wizard_at_options();
        wizard.start_import(job()).unwrap();
        wizard.restart();
        assert_eq!(wizard.step(), WizardStep::Upload);
        assert!(wizard.file().is_none());
        assert!(wizard.job().is_none());
    }

    #[test]
    fn test_selecting_new_file_drops_previous_preview() {
        let mut wizard = ImportWizard::new();
        wizard.select_file("leads.csv", None).unwrap();
        wizard.accept_preview(sample_preview()).unwrap();
        wizard.back().unwrap();

        wizard.select_file("other.csv", None).unwrap();
        assert!(wizard.preview().is_none());
        assert!(wizard.mapping().is_empty());
        assert!(wizard.forward().is_err());
    }
}
