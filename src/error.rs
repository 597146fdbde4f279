use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeadLabError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIトークンが設定されていません。`leadlab config --set-token YOUR_TOKEN` で設定してください")]
    MissingToken,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("通信エラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("APIエラー ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("APIレスポンスのパースに失敗: {0}")]
    ApiParse(String),

    #[error("インポートに失敗しました: {0}")]
    ImportFailed(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] leadlab_common::Error),
}

impl LeadLabError {
    /// ネットワーク起因の失敗か（キャッシュ層で1回だけ再試行する対象）
    pub fn is_retryable(&self) -> bool {
        match self {
            LeadLabError::Http(_) => true,
            LeadLabError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LeadLabError>;
