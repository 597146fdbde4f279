//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    /// 入力検証エラー（ネットワーク呼び出し前に同期的に拒否）
    #[error("Validation error: {0}")]
    Validation(String),

    /// ウィザードで許可されていない遷移
    #[error("Invalid transition: cannot {action} from {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_validation() {
        let error = Error::Validation("CSVファイルを選択してください".to_string());
        assert_eq!(
            format!("{}", error),
            "Validation error: CSVファイルを選択してください"
        );
    }

    #[test]
    fn test_error_display_transition() {
        let error = Error::InvalidTransition {
            from: "importing",
            action: "go back",
        };
        let display = format!("{}", error);
        assert!(display.contains("importing"));
        assert!(display.contains("go back"));
    }

    #[test]
    fn test_error_from_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: Error = json_error.into();
        assert!(matches!(error, Error::Json(_)));
    }
}
