//! reqwestによるLeadLab APIクライアント
//!
//! 更新系の呼び出しが成功したら、影響するリソースのキャッシュを無効化する
//! （タグ作成 → tags, leads など）。

use super::{CsvUpload, ImportApi, ListSource};
use crate::cache::QueryCache;
use crate::config::Config;
use crate::error::{LeadLabError, Result};
use leadlab_common::{
    DashboardStats, Deal, DealUpdate, ImportJob, ImportOptions, ImportPreview, ImportProgress,
    JobId, Lead, ListResource, Notification, Page, QueryParams, RowId, Stage, Tag, TagId,
    TeamInvitation, Workflow,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub struct LeadLabClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    cache: Option<Arc<QueryCache>>,
}

/// エラーレスポンスからメッセージを取り出す（`{"detail": ...}` 形式を優先）
pub fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return truncate(body.trim(), 200);
    };
    match value.get("detail") {
        Some(serde_json::Value::String(detail)) => detail.clone(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
            .collect::<Vec<_>>()
            .join("; "),
        _ => value
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| truncate(body.trim(), 200)),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

impl LeadLabClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        // Url::join で最後のセグメントが置き換わらないよう末尾を / にそろえる
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| LeadLabError::Config(format!("URLが不正です: {} ({})", base_url, e)))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            token,
            cache: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config.get_api_token()?;
        Self::new(&config.get_base_url(), Some(token), config.timeout())
    }

    /// 更新成功時に無効化するキャッシュを設定
    pub fn with_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| LeadLabError::Config(format!("URLが不正です: {} ({})", path, e)))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.endpoint(path)?;
        tracing::debug!(%method, %url, "api request");
        let builder = self.http.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = error_message(&body);
            tracing::warn!(status = status.as_u16(), %message, "api error");
            return Err(LeadLabError::Api {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&body).map_err(|e| LeadLabError::ApiParse(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.request(Method::GET, path)?.query(query).send().await?;
        Self::read_json(response).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let response = self.request(method, path)?.json(body).send().await?;
        Self::read_json(response).await
    }

    fn invalidate(&self, resources: &[&str]) {
        if let Some(cache) = &self.cache {
            for resource in resources {
                cache.invalidate(resource);
            }
        }
    }

    // =============================================
    // リスト・参照系
    // =============================================

    pub async fn list<T: DeserializeOwned>(
        &self,
        resource: ListResource,
        params: &QueryParams,
    ) -> Result<Page<T>> {
        // 合成済みのクエリ文字列をそのまま使う（キャッシュキーと一致させる）
        let mut url = self.endpoint(resource.path())?;
        url.set_query(Some(&params.to_query_string()));
        tracing::debug!(%url, "list request");
        let mut builder = self.http.get(url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;
        Self::read_json(response).await
    }

    pub async fn get_lead(&self, id: RowId) -> Result<Lead> {
        self.get(&format!("leads/{}", id), &[]).await
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let page: Page<Tag> = self.get("tags", &[]).await?;
        Ok(page.results)
    }

    pub async fn list_stages(&self) -> Result<Vec<Stage>> {
        let page: Page<Stage> = self.get("stages", &[]).await?;
        Ok(page.results)
    }

    pub async fn list_notifications(&self, unread_only: bool) -> Result<Vec<Notification>> {
        let query = if unread_only {
            vec![("unread_only", "true".to_string())]
        } else {
            Vec::new()
        };
        let page: Page<Notification> = self.get("notifications", &query).await?;
        Ok(page.results)
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        self.get("dashboard/stats", &[]).await
    }

    pub async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        let page: Page<Workflow> = self.get("workflows", &[]).await?;
        Ok(page.results)
    }

    pub async fn list_invitations(&self) -> Result<Vec<TeamInvitation>> {
        let page: Page<TeamInvitation> = self.get("team/invitations", &[]).await?;
        Ok(page.results)
    }

    // =============================================
    // 更新系（成功時にキャッシュ無効化）
    // =============================================

    pub async fn create_tag(&self, name: &str, color: Option<&str>) -> Result<Tag> {
        let tag = self
            .send_json(Method::POST, "tags", &json!({ "name": name, "color": color }))
            .await?;
        self.invalidate(&["tags", "leads"]);
        Ok(tag)
    }

    pub async fn add_lead_tag(&self, lead_id: RowId, tag_id: TagId) -> Result<Lead> {
        let lead = self
            .send_json(
                Method::POST,
                &format!("leads/{}/tags", lead_id),
                &json!({ "tag_id": tag_id }),
            )
            .await?;
        self.invalidate(&["leads"]);
        Ok(lead)
    }

    pub async fn update_deal(&self, id: RowId, update: &DealUpdate) -> Result<Deal> {
        let body = serde_json::to_value(update)?;
        let deal = self
            .send_json(Method::PATCH, &format!("deals/{}", id), &body)
            .await?;
        self.invalidate(&["deals", "dashboard"]);
        Ok(deal)
    }

    pub async fn mark_notification_read(&self, id: RowId) -> Result<Notification> {
        let notification = self
            .send_json(
                Method::PATCH,
                &format!("notifications/{}", id),
                &json!({ "is_read": true }),
            )
            .await?;
        self.invalidate(&["notifications"]);
        Ok(notification)
    }

    pub async fn trigger_workflow(&self, id: RowId, lead_id: Option<RowId>) -> Result<serde_json::Value> {
        let result = self
            .send_json(
                Method::POST,
                &format!("workflows/{}/trigger", id),
                &json!({ "lead_id": lead_id }),
            )
            .await?;
        self.invalidate(&["leads", "tasks", "deals"]);
        Ok(result)
    }

    pub async fn create_invitation(&self, email: &str, role: &str) -> Result<TeamInvitation> {
        let invitation = self
            .send_json(
                Method::POST,
                "team/invitations",
                &json!({ "email": email, "role": role }),
            )
            .await?;
        self.invalidate(&["team/invitations"]);
        Ok(invitation)
    }

    fn csv_part(upload: &CsvUpload) -> Result<Part> {
        Ok(Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str("text/csv")?)
    }
}

impl ImportApi for LeadLabClient {
    async fn preview(&self, upload: &CsvUpload) -> Result<ImportPreview> {
        let form = Form::new().part("file", Self::csv_part(upload)?);
        let response = self
            .request(Method::POST, "data-import/preview")?
            .multipart(form)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn start_import(
        &self,
        upload: &CsvUpload,
        mapping: &BTreeMap<String, String>,
        options: &ImportOptions,
    ) -> Result<ImportJob> {
        let form = Form::new()
            .part("file", Self::csv_part(upload)?)
            .text("field_mapping", serde_json::to_string(mapping)?)
            .text("options", serde_json::to_string(options)?);
        let response = self
            .request(Method::POST, "data-import")?
            .multipart(form)
            .send()
            .await?;
        let job = Self::read_json(response).await?;
        self.invalidate(&["leads", "dashboard"]);
        Ok(job)
    }

    async fn import_progress(&self, job_id: &JobId) -> Result<ImportProgress> {
        self.get(&format!("data-import/jobs/{}/progress", job_id), &[])
            .await
    }
}

/// 特定リソースのリスト取得元（コントローラに渡す）
pub struct Endpoint<T> {
    client: Arc<LeadLabClient>,
    resource: ListResource,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Endpoint<T> {
    pub fn new(client: Arc<LeadLabClient>, resource: ListResource) -> Self {
        Self {
            client,
            resource,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> ListSource<T> for Endpoint<T> {
    fn resource(&self) -> ListResource {
        self.resource
    }

    async fn fetch_page(&self, params: &QueryParams) -> Result<Page<T>> {
        self.client.list(self.resource, params).await
    }
}
