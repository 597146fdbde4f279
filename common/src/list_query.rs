//! リスト取得クエリの合成
//!
//! 検索・タグ・詳細フィルタ・ソート・ページングの状態を
//! リストエンドポイントへ送るパラメータ列に変換する。
//! 同じ入力からは常にバイト単位で同一の出力を生成する（キャッシュキーに使用）。

use crate::error::{self, Error};
use crate::types::TagId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use url::form_urlencoded;

pub const DEFAULT_SORT_FIELD: &str = "created_at";

/// 詳細フィルタのカテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterCategory {
    Sector,
    Location,
    Source,
    Country,
}

impl FilterCategory {
    pub const ALL: [FilterCategory; 4] = [
        FilterCategory::Sector,
        FilterCategory::Location,
        FilterCategory::Source,
        FilterCategory::Country,
    ];

    /// クエリパラメータ名
    pub fn key(&self) -> &'static str {
        match self {
            FilterCategory::Sector => "sector",
            FilterCategory::Location => "location",
            FilterCategory::Source => "source",
            FilterCategory::Country => "country",
        }
    }
}

impl std::str::FromStr for FilterCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sector" => Ok(FilterCategory::Sector),
            "location" => Ok(FilterCategory::Location),
            "source" => Ok(FilterCategory::Source),
            "country" => Ok(FilterCategory::Country),
            _ => Err(format!(
                "Unknown filter: {}. Use sector, location, source, or country",
                s
            )),
        }
    }
}

/// 1ページあたりの件数（20/50/100のみ）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PageSize {
    #[default]
    Twenty,
    Fifty,
    Hundred,
}

impl PageSize {
    pub fn get(&self) -> u32 {
        match self {
            PageSize::Twenty => 20,
            PageSize::Fifty => 50,
            PageSize::Hundred => 100,
        }
    }
}

impl From<PageSize> for u32 {
    fn from(value: PageSize) -> Self {
        value.get()
    }
}

impl TryFrom<u32> for PageSize {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            20 => Ok(PageSize::Twenty),
            50 => Ok(PageSize::Fifty),
            100 => Ok(PageSize::Hundred),
            _ => Err(format!("Unsupported page size: {}. Use 20, 50, or 100", value)),
        }
    }
}

impl std::str::FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: u32 = s
            .trim()
            .parse()
            .map_err(|_| format!("Invalid page size: {}", s))?;
        PageSize::try_from(n)
    }
}

impl std::fmt::Display for PageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// ソート指定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

/// リソースごとのエンドポイント情報
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListResource {
    Leads,
    Deals,
    Tasks,
}

impl ListResource {
    pub fn path(&self) -> &'static str {
        match self {
            ListResource::Leads => "leads",
            ListResource::Deals => "deals",
            ListResource::Tasks => "tasks",
        }
    }

    /// タグフィルタのパラメータ名
    pub fn tag_param(&self) -> &'static str {
        "tag_id"
    }
}

/// フィルタ値の検証。カンマは区切り文字なので値には含められない
pub fn validate_filter_value(value: &str) -> error::Result<()> {
    if value.contains(',') {
        return Err(Error::Validation(format!(
            "フィルタ値にカンマは使えません: {}",
            value
        )));
    }
    Ok(())
}

/// リスト表示の合成クエリ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    /// 入力中のテキスト（リクエストには使わない）
    pub search_text: String,
    /// デバウンス確定済みの検索テキスト
    pub debounced_search_text: String,
    pub tag_filter: Option<TagId>,
    /// カテゴリ間はAND、カテゴリ内はOR。空集合は制約なし
    pub advanced_filters: BTreeMap<FilterCategory, BTreeSet<String>>,
    pub sort: Option<Sort>,
    pub page: u32,
    pub page_size: PageSize,
    pub skip_override: Option<u64>,
}

impl ListQuery {
    pub fn new(page_size: PageSize) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    pub fn skip(&self) -> u64 {
        self.skip_override
            .unwrap_or(self.page as u64 * self.page_size.get() as u64)
    }

    /// 確定した検索テキストを反映（変化があればページ先頭へ戻す）。
    /// 送信時と同じく前後の空白を除いて比較する
    pub fn set_debounced_search(&mut self, text: &str) -> bool {
        if self.debounced_search_text.trim() == text.trim() {
            return false;
        }
        self.debounced_search_text = text.to_string();
        self.page = 0;
        true
    }

    pub fn set_tag_filter(&mut self, tag: Option<TagId>) -> bool {
        if self.tag_filter == tag {
            return false;
        }
        self.tag_filter = tag;
        self.page = 0;
        true
    }

    /// フィルタ値の選択/解除を切り替える
    pub fn toggle_filter_value(&mut self, category: FilterCategory, value: &str) -> error::Result<()> {
        validate_filter_value(value)?;
        let values = self.advanced_filters.entry(category).or_default();
        if !values.remove(value) {
            values.insert(value.to_string());
        }
        if values.is_empty() {
            self.advanced_filters.remove(&category);
        }
        self.page = 0;
        Ok(())
    }

    pub fn set_filter_values<I, S>(&mut self, category: FilterCategory, values: I) -> error::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        for value in &values {
            validate_filter_value(value)?;
        }
        if values.is_empty() {
            self.advanced_filters.remove(&category);
        } else {
            self.advanced_filters.insert(category, values);
        }
        self.page = 0;
        Ok(())
    }

    pub fn clear_filters(&mut self) {
        self.advanced_filters.clear();
        self.tag_filter = None;
        self.page = 0;
    }

    /// 列ヘッダのクリック相当: 同じ列なら昇降を反転、別の列なら降順で開始
    pub fn sort_by(&mut self, field: &str) {
        self.sort = match self.sort.take() {
            Some(sort) if sort.field == field => Some(Sort {
                field: sort.field,
                descending: !sort.descending,
            }),
            _ => Some(Sort {
                field: field.to_string(),
                descending: true,
            }),
        };
        self.page = 0;
    }

    pub fn set_sort(&mut self, sort: Option<Sort>) {
        self.sort = sort;
        self.page = 0;
    }

    /// リクエストパラメータを合成する
    pub fn compose(&self, resource: ListResource) -> QueryParams {
        let mut params = Vec::new();

        let search = self.debounced_search_text.trim();
        if !search.is_empty() {
            params.push(("search", search.to_string()));
        }

        if let Some(tag) = self.tag_filter {
            params.push((resource.tag_param(), tag.to_string()));
        }

        for category in FilterCategory::ALL {
            if let Some(values) = self.advanced_filters.get(&category) {
                if values.is_empty() {
                    continue;
                }
                let joined = values.iter().map(String::as_str).collect::<Vec<_>>().join(",");
                params.push((category.key(), joined));
            }
        }

        params.push(("skip", self.skip().to_string()));
        params.push(("limit", self.page_size.get().to_string()));

        let (sort_by, sort_desc) = match &self.sort {
            Some(sort) => (sort.field.as_str(), sort.descending),
            None => (DEFAULT_SORT_FIELD, true),
        };
        params.push(("sort_by", sort_by.to_string()));
        params.push(("sort_desc", sort_desc.to_string()));

        QueryParams { pairs: params }
    }
}

/// 合成済みのクエリパラメータ（順序固定）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.pairs {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// キャッシュキー（リソースパス + シリアライズ済みパラメータ）
    pub fn cache_key(&self, resource: ListResource) -> String {
        format!("{}?{}", resource.path(), self.to_query_string())
    }
}
