//! REST APIの型定義
//!
//! フロントエンド間で共有する型:
//! - Lead / Deal / Task: ページング取得されるリスト行
//! - Page: リストエンドポイントのレスポンス（素の配列もラップする）
//! - ImportPreview / ImportJob / ImportProgress: CSVインポート

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub type RowId = i64;
pub type TagId = i64;
pub type StageId = i64;

/// リスト行のID取得（選択状態の照合に使用）
pub trait HasId {
    fn row_id(&self) -> RowId;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// リード
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lead {
    pub id: RowId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: Option<String>,
    pub sector: Option<String>,
    pub location: Option<String>,
    pub source: Option<String>,
    pub country: Option<String>,
    pub stage_id: Option<StageId>,
    pub tags: Vec<Tag>,
    pub created_at: Option<String>,
}

impl Lead {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone().unwrap_or_default()
        } else {
            name.to_string()
        }
    }
}

/// 商談
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deal {
    pub id: RowId,
    pub title: String,
    pub value: f64,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub stage_id: Option<StageId>,
    pub lead_id: Option<RowId>,
    pub created_at: Option<String>,
}

/// 商談の部分更新（PATCH /deals/{id}）
#[derive(Debug, Clone, Default, Serialize)]
pub struct DealUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<StageId>,
}

/// タスク
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: RowId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub completed: bool,
    pub lead_id: Option<RowId>,
    pub created_at: Option<String>,
}

impl HasId for Lead {
    fn row_id(&self) -> RowId {
        self.id
    }
}

impl HasId for Deal {
    fn row_id(&self) -> RowId {
        self.id
    }
}

impl HasId for Task {
    fn row_id(&self) -> RowId {
        self.id
    }
}

/// パイプラインのステージ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage {
    pub id: StageId,
    pub name: String,
    pub position: i32,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notification {
    pub id: RowId,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: Option<String>,
}

/// ワークフロー定義（ノード/エッジ）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workflow {
    pub id: RowId,
    pub name: String,
    pub is_active: bool,
    pub trigger_type: Option<String>,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// チーム招待
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamInvitation {
    pub id: RowId,
    pub email: String,
    pub role: String,
    pub status: String,
    pub expires_at: Option<String>,
}

/// ダッシュボード集計（サーバー側で集計済み）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardStats {
    pub total_leads: u64,
    pub new_leads_this_month: u64,
    pub total_deals: u64,
    pub open_deals_value: f64,
    pub won_deals_value: f64,
    pub open_tasks: u64,
    pub conversion_rate: f64,
    pub leads_by_stage: BTreeMap<String, u64>,
}

/// リストエンドポイントのレスポンス
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub total: u64,
    pub has_more: bool,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            total: 0,
            has_more: false,
        }
    }
}

impl<T> Page<T> {
    /// 素の配列レスポンスをページとして扱う
    pub fn from_bare(results: Vec<T>) -> Self {
        let total = results.len() as u64;
        Self {
            results,
            total,
            has_more: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PageEnvelope<T> {
    Paged {
        #[serde(alias = "items")]
        results: Vec<T>,
        #[serde(default)]
        total: Option<u64>,
        #[serde(default)]
        has_more: bool,
    },
    Bare(Vec<T>),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Page<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match PageEnvelope::deserialize(deserializer)? {
            PageEnvelope::Paged {
                results,
                total,
                has_more,
            } => {
                let total = total.unwrap_or(results.len() as u64);
                Page {
                    results,
                    total,
                    has_more,
                }
            }
            PageEnvelope::Bare(results) => Page::from_bare(results),
        })
    }
}

// =============================================
// CSVインポート
// =============================================

/// インポートジョブID（サーバーにより数値/文字列どちらもあり得る）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => JobId(n.to_string()),
            Raw::Str(s) => JobId(s),
        })
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// プレビュー結果（POST /data-import/preview）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportPreview {
    pub headers: Vec<String>,
    pub sample_rows: Vec<serde_json::Value>,
    /// CSV列名 → エンティティのフィールド名（サーバーの自動検出）
    pub detected_mapping: BTreeMap<String, String>,
    pub total_rows: Option<u64>,
}

/// インポートオプション
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub skip_duplicates: bool,
    pub update_existing: bool,
    pub default_status: Option<String>,
    pub tag_ids: Vec<TagId>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            update_existing: false,
            default_status: None,
            tag_ids: Vec::new(),
        }
    }
}

/// インポート開始時に返るジョブハンドル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    #[serde(alias = "job_id")]
    pub id: JobId,
    #[serde(default)]
    pub status: JobStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 進捗（GET /data-import/jobs/{id}/progress）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportProgress {
    pub status: JobStatus,
    pub total_records: u64,
    pub processed_records: u64,
    pub successful_records: u64,
    pub failed_records: u64,
    pub skipped_records: u64,
    pub progress_percentage: f64,
    #[serde(alias = "error_message")]
    pub error_summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_deserialize_envelope() {
        let json = r#"{"results": [{"id": 1, "first_name": "Ada"}], "total": 42, "has_more": true}"#;
        let page: Page<Lead> = serde_json::from_str(json).expect("デシリアライズ失敗");
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].first_name, "Ada");
        assert_eq!(page.total, 42);
        assert!(page.has_more);
    }

    #[test]
    fn test_page_deserialize_bare_array() {
        let json = r#"[{"id": 1, "title": "A"}, {"id": 2, "title": "B"}]"#;
        let page: Page<Deal> = serde_json::from_str(json).expect("デシリアライズ失敗");
        assert_eq!(page.total, 2);
        assert!(!page.has_more);
        assert_eq!(page.results[1].title, "B");
    }

    #[test]
    fn test_page_deserialize_items_alias_without_total() {
        let json = r#"{"items": [{"id": 7, "title": "call back"}]}"#;
        let page: Page<Task> = serde_json::from_str(json).expect("デシリアライズ失敗");
        assert_eq!(page.total, 1);
        assert_eq!(page.results[0].row_id(), 7);
    }

    #[test]
    fn test_job_id_accepts_number_and_string() {
        let job: ImportJob = serde_json::from_str(r#"{"id": 12, "status": "pending"}"#).unwrap();
        assert_eq!(job.id, JobId("12".to_string()));

        let job: ImportJob = serde_json::from_str(r#"{"job_id": "abc-1"}"#).unwrap();
        assert_eq!(job.id.to_string(), "abc-1");
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn test_progress_deserialize() {
        let json = r#"{
            "status": "failed",
            "total_records": 10,
            "processed_records": 4,
            "successful_records": 3,
            "failed_records": 1,
            "skipped_records": 0,
            "progress_percentage": 40.0,
            "error_message": "Row 4: invalid email"
        }"#;
        let progress: ImportProgress = serde_json::from_str(json).unwrap();
        assert_eq!(progress.status, JobStatus::Failed);
        assert!(progress.status.is_terminal());
        assert_eq!(progress.error_summary.as_deref(), Some("Row 4: invalid email"));
    }

    #[test]
    fn test_deal_update_skips_unset_fields() {
        let update = DealUpdate {
            stage_id: Some(3),
            ..Default::default()
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"stage_id":3}"#);
    }

    #[test]
    fn test_lead_display_name_falls_back_to_email() {
        let lead = Lead {
            email: Some("ops@acme.test".to_string()),
            ..Default::default()
        };
        assert_eq!(lead.display_name(), "ops@acme.test");
    }
}
