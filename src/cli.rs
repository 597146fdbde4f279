use clap::{Args, Parser, Subcommand};
use leadlab_common::PageSize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "leadlab")]
#[command(about = "LeadLab CRM クライアント", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// リスト取得の共通オプション
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// 検索キーワード
    #[arg(short, long)]
    pub search: Option<String>,

    /// タグIDで絞り込み
    #[arg(short, long)]
    pub tag: Option<i64>,

    /// 業種（カンマ区切りで複数指定、いずれかに一致）
    #[arg(long, value_delimiter = ',')]
    pub sector: Vec<String>,

    /// 所在地（カンマ区切り）
    #[arg(long, value_delimiter = ',')]
    pub location: Vec<String>,

    /// 流入元（カンマ区切り）
    #[arg(long, value_delimiter = ',')]
    pub source: Vec<String>,

    /// 国（カンマ区切り）
    #[arg(long, value_delimiter = ',')]
    pub country: Vec<String>,

    /// ソート列（デフォルト: created_at 降順）
    #[arg(long)]
    pub sort_by: Option<String>,

    /// 昇順で並べる
    #[arg(long)]
    pub asc: bool,

    /// ページ番号（0始まり）
    #[arg(short, long, default_value = "0")]
    pub page: u32,

    /// 1ページの件数 (20/50/100)
    #[arg(long)]
    pub page_size: Option<PageSize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// リード一覧
    Leads(ListArgs),

    /// 商談一覧
    Deals(ListArgs),

    /// タスク一覧
    Tasks(ListArgs),

    /// タグ管理
    Tags {
        #[command(subcommand)]
        action: TagAction,
    },

    /// リードにタグを付ける
    TagLead {
        /// リードID
        lead_id: i64,

        /// タグID
        tag_id: i64,
    },

    /// 商談のステージ/状態を更新
    UpdateDeal {
        /// 商談ID
        id: i64,

        /// 移動先ステージID
        #[arg(long)]
        stage: Option<i64>,

        /// 状態 (open/won/lost)
        #[arg(long)]
        status: Option<String>,

        /// 金額
        #[arg(long)]
        value: Option<f64>,
    },

    /// ステージ一覧
    Stages,

    /// CSVファイルからリードをインポート
    Import {
        /// CSVファイル
        #[arg(required = true)]
        file: PathBuf,

        /// 列の割り当てを上書き（例: --map "E-mail=email"）
        #[arg(short, long, value_parser = parse_mapping)]
        map: Vec<(String, String)>,

        /// 取り込まない列
        #[arg(long)]
        ignore: Vec<String>,

        /// 既存リードを更新する
        #[arg(long)]
        update_existing: bool,

        /// 重複行も取り込む
        #[arg(long)]
        keep_duplicates: bool,

        /// 確認をスキップ
        #[arg(short, long)]
        yes: bool,
    },

    /// ダッシュボード集計
    Dashboard,

    /// 通知
    Notifications {
        /// 未読のみ
        #[arg(long)]
        unread: bool,

        /// 既読にする通知ID
        #[arg(long)]
        mark_read: Option<i64>,
    },

    /// ワークフロー
    Workflows {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// チーム招待
    Invitations {
        #[command(subcommand)]
        action: InvitationAction,
    },

    /// 設定を表示/編集
    Config {
        /// APIトークンを設定
        #[arg(long)]
        set_token: Option<String>,

        /// APIのベースURLを設定
        #[arg(long)]
        set_base_url: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
pub enum TagAction {
    /// タグ一覧
    List,
    /// タグを作成
    Create {
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum WorkflowAction {
    /// ワークフロー一覧
    List,
    /// ワークフローを手動実行
    Trigger {
        id: i64,
        /// 対象リードID
        #[arg(long)]
        lead: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum InvitationAction {
    /// 招待一覧
    List,
    /// 招待を送信
    Create {
        email: String,
        #[arg(long, default_value = "member")]
        role: String,
    },
}

/// "列名=フィールド名" を分解
pub fn parse_mapping(s: &str) -> Result<(String, String), String> {
    let (column, field) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid mapping: {}. Use COLUMN=FIELD", s))?;
    let column = column.trim();
    let field = field.trim();
    if column.is_empty() || field.is_empty() {
        return Err(format!("Invalid mapping: {}. Use COLUMN=FIELD", s));
    }
    Ok((column.to_string(), field.to_string()))
}

/// APIのタイムスタンプ（RFC3339）をローカル時刻で表示。解釈できなければそのまま
pub fn format_timestamp(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return "-".to_string();
    };
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mapping() {
        assert_eq!(
            parse_mapping("E-mail = email"),
            Ok(("E-mail".to_string(), "email".to_string()))
        );
        assert!(parse_mapping("email").is_err());
        assert!(parse_mapping("=email").is_err());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(None), "-");
        assert_eq!(format_timestamp(Some("2024-03-01")), "2024-03-01");

        let shown = format_timestamp(Some("2024-03-01T09:30:00Z"));
        assert_eq!(shown.len(), "2024-03-01 09:30".len());
        assert!(shown.starts_with("2024-0"));
    }

    #[test]
    fn test_cli_parses_list_filters() {
        let cli = Cli::try_parse_from([
            "leadlab", "leads", "--search", "acme corp", "--sector", "SaaS,Retail",
            "--country", "US", "--page-size", "50", "--page", "2",
        ])
        .expect("パース失敗");

        match cli.command {
            Commands::Leads(args) => {
                assert_eq!(args.search.as_deref(), Some("acme corp"));
                assert_eq!(args.sector, vec!["SaaS", "Retail"]);
                assert_eq!(args.country, vec!["US"]);
                assert_eq!(args.page_size, Some(PageSize::Fifty));
                assert_eq!(args.page, 2);
            }
            _ => panic!("leads コマンドとして解釈されなかった"),
        }
    }

    #[test]
    fn test_cli_rejects_unsupported_page_size() {
        let result = Cli::try_parse_from(["leadlab", "deals", "--page-size", "30"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_import_mapping_overrides() {
        let cli = Cli::try_parse_from([
            "leadlab", "import", "leads.csv", "--map", "Mail=email", "--map", "Firm=company", "-y",
        ])
        .expect("パース失敗");

        match cli.command {
            Commands::Import { file, map, yes, .. } => {
                assert_eq!(file, PathBuf::from("leads.csv"));
                assert_eq!(map.len(), 2);
                assert_eq!(map[1], ("Firm".to_string(), "company".to_string()));
                assert!(yes);
            }
            _ => panic!("import コマンドとして解釈されなかった"),
        }
    }
}
