use anyhow::{anyhow, Context};
use clap::Parser;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use leadlab::api::{CsvUpload, Endpoint, LeadLabClient};
use leadlab::cache::QueryCache;
use leadlab::cli::{
    format_timestamp, Cli, Commands, InvitationAction, ListArgs, TagAction, WorkflowAction,
};
use leadlab::config::Config;
use leadlab::controller::{ImportSession, ListViewController, LoadOutcome};
use leadlab::logging::init_tracing;
use leadlab::session::SessionStore;
use leadlab_common::{
    Deal, DealUpdate, FilterCategory, HasId, ImportOptions, Lead, ListResource, Sort, Task,
    DEFAULT_SORT_FIELD,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().context("設定の読み込みに失敗しました")?;

    match cli.command {
        Commands::Config { set_token, set_base_url, show } => {
            let mut config = config;

            if let Some(token) = set_token {
                config.set_api_token(token)?;
                println!("✔ APIトークンを設定しました");
            }

            if let Some(url) = set_base_url {
                config.set_base_url(url)?;
                println!("✔ ベースURLを設定しました");
            }

            if show {
                println!("設定:");
                println!("  ベースURL: {}", config.get_base_url());
                println!("  ページサイズ: {}", config.default_page_size);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  ポーリング間隔: {}ms", config.poll_interval_ms);
                println!(
                    "  APIトークン: {}",
                    if config.get_api_token().is_ok() { "設定済み" } else { "未設定" }
                );
            }
        }

        Commands::Leads(args) => {
            let (client, cache) = connect(&config)?;
            run_list::<Lead>(client, cache, &config, ListResource::Leads, &args, |lead| {
                format!(
                    "{:>6}  {:<24} {:<28} {}",
                    lead.id,
                    lead.display_name(),
                    lead.company.as_deref().unwrap_or("-"),
                    lead.status.as_deref().unwrap_or("-"),
                )
            })
            .await?;
        }

        Commands::Deals(args) => {
            let (client, cache) = connect(&config)?;
            run_list::<Deal>(client, cache, &config, ListResource::Deals, &args, |deal| {
                format!(
                    "{:>6}  {:<32} {:>12.2} {}",
                    deal.id,
                    deal.title,
                    deal.value,
                    deal.status.as_deref().unwrap_or("-"),
                )
            })
            .await?;
        }

        Commands::Tasks(args) => {
            let (client, cache) = connect(&config)?;
            run_list::<Task>(client, cache, &config, ListResource::Tasks, &args, |task| {
                format!(
                    "{:>6}  [{}] {:<32} {}",
                    task.id,
                    if task.completed { "x" } else { " " },
                    task.title,
                    format_timestamp(task.due_date.as_deref()),
                )
            })
            .await?;
        }

        Commands::Tags { action } => {
            let (client, _) = connect(&config)?;
            match action {
                TagAction::List => {
                    let tags = client.list_tags().await?;
                    println!("🏷  タグ ({}件)\n", tags.len());
                    for tag in tags {
                        println!("{:>6}  {} {}", tag.id, tag.name, tag.color.unwrap_or_default());
                    }
                }
                TagAction::Create { name, color } => {
                    let tag = client.create_tag(&name, color.as_deref()).await?;
                    println!("✔ タグを作成しました: {} (ID: {})", tag.name, tag.id);
                }
            }
        }

        Commands::TagLead { lead_id, tag_id } => {
            let (client, _) = connect(&config)?;
            let lead = client.add_lead_tag(lead_id, tag_id).await?;
            println!("✔ {} にタグを付けました", lead.display_name());
        }

        Commands::UpdateDeal { id, stage, status, value } => {
            if stage.is_none() && status.is_none() && value.is_none() {
                return Err(anyhow!("--stage / --status / --value のいずれかを指定してください"));
            }
            let (client, _) = connect(&config)?;
            let update = DealUpdate {
                stage_id: stage,
                status,
                value,
                ..Default::default()
            };
            let deal = client.update_deal(id, &update).await?;
            println!("✔ 商談を更新しました: {} (ステージ: {:?})", deal.title, deal.stage_id);
        }

        Commands::Stages => {
            let (client, _) = connect(&config)?;
            let mut stages = client.list_stages().await?;
            stages.sort_by_key(|stage| stage.position);
            for stage in stages {
                println!("{:>6}  {:>2}. {}", stage.id, stage.position, stage.name);
            }
        }

        Commands::Import { file, map, ignore, update_existing, keep_duplicates, yes } => {
            println!("📥 leadlab - CSVインポート\n");
            let (client, _) = connect(&config)?;
            let mut session = ImportSession::new(client, config.poll_interval());

            // 1. ファイル選択
            println!("[1/4] ファイルを読み込み中...");
            let upload = CsvUpload::read(&file).await?;
            println!("✔ {} ({} bytes)\n", upload.file_name, upload.size());
            session.select_file(upload)?;

            // 2. プレビュー
            println!("[2/4] プレビューを取得中...");
            session.load_preview().await?;
            if let Some(preview) = session.wizard().preview() {
                println!("✔ 列: {}", preview.headers.join(", "));
                if let Some(total) = preview.total_rows {
                    println!("  行数: {}", total);
                }
            }
            println!();

            // 3. 列の割り当て
            session.forward()?;
            for (column, field) in &map {
                session.set_mapping(column, Some(field))?;
            }
            for column in &ignore {
                session.set_mapping(column, None)?;
            }
            println!("[3/4] 列の割り当て:");
            for (column, field) in session.wizard().mapping() {
                println!("  {} → {}", column, field);
            }
            println!();

            if !yes {
                let proceed = Confirm::new()
                    .with_prompt("この割り当てでインポートしますか？")
                    .default(true)
                    .interact()?;
                if !proceed {
                    println!("中止しました");
                    return Ok(());
                }
            }

            session.forward()?;
            session.set_options(ImportOptions {
                skip_duplicates: !keep_duplicates,
                update_existing,
                ..Default::default()
            })?;

            // 4. 実行
            println!("[4/4] インポート中...");
            let job_id = session.start().await?;
            println!("  ジョブID: {}", job_id);

            let pb = ProgressBar::new(100);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40} {pos}% {msg}")?
                    .progress_chars("=>-"),
            );
            let result = session
                .wait_for_completion(|progress| {
                    pb.set_position(progress.progress_percentage.clamp(0.0, 100.0) as u64);
                    pb.set_message(format!(
                        "{}/{}件",
                        progress.processed_records, progress.total_records
                    ));
                })
                .await;
            pb.finish_and_clear();

            let progress = result?;
            println!("✔ 成功: {}件", progress.successful_records);
            println!("  失敗: {}件", progress.failed_records);
            println!("  スキップ: {}件", progress.skipped_records);
            println!("\n✅ インポート完了");
        }

        Commands::Dashboard => {
            let (client, _) = connect(&config)?;
            let stats = client.dashboard_stats().await?;
            println!("📊 ダッシュボード\n");
            println!("  リード: {} (今月 +{})", stats.total_leads, stats.new_leads_this_month);
            println!("  商談: {}", stats.total_deals);
            println!("  進行中の金額: {:.2}", stats.open_deals_value);
            println!("  受注金額: {:.2}", stats.won_deals_value);
            println!("  未完了タスク: {}", stats.open_tasks);
            println!("  コンバージョン率: {:.1}%", stats.conversion_rate);
            if !stats.leads_by_stage.is_empty() {
                println!("  ステージ別:");
                for (stage, count) in &stats.leads_by_stage {
                    println!("    {}: {}", stage, count);
                }
            }
        }

        Commands::Notifications { unread, mark_read } => {
            let (client, _) = connect(&config)?;
            if let Some(id) = mark_read {
                client.mark_notification_read(id).await?;
                println!("✔ 通知 {} を既読にしました", id);
            } else {
                let notifications = client.list_notifications(unread).await?;
                println!("🔔 通知 ({}件)\n", notifications.len());
                for n in notifications {
                    let mark = if n.is_read { " " } else { "●" };
                    println!(
                        "{} {:>6}  {}  {}: {}",
                        mark,
                        n.id,
                        format_timestamp(n.created_at.as_deref()),
                        n.title,
                        n.message
                    );
                }
            }
        }

        Commands::Workflows { action } => {
            let (client, _) = connect(&config)?;
            match action {
                WorkflowAction::List => {
                    for workflow in client.list_workflows().await? {
                        println!(
                            "{:>6}  {} [{}] ノード{}個",
                            workflow.id,
                            workflow.name,
                            if workflow.is_active { "有効" } else { "無効" },
                            workflow.nodes.len(),
                        );
                    }
                }
                WorkflowAction::Trigger { id, lead } => {
                    client.trigger_workflow(id, lead).await?;
                    println!("✔ ワークフロー {} を実行しました", id);
                }
            }
        }

        Commands::Invitations { action } => {
            let (client, _) = connect(&config)?;
            match action {
                InvitationAction::List => {
                    for invitation in client.list_invitations().await? {
                        println!(
                            "{:>6}  {:<32} {:<10} {:<10} 期限: {}",
                            invitation.id,
                            invitation.email,
                            invitation.role,
                            invitation.status,
                            format_timestamp(invitation.expires_at.as_deref()),
                        );
                    }
                }
                InvitationAction::Create { email, role } => {
                    let invitation = client.create_invitation(&email, &role).await?;
                    println!("✔ 招待を送信しました: {}", invitation.email);
                }
            }
        }
    }

    Ok(())
}

fn connect(config: &Config) -> anyhow::Result<(Arc<LeadLabClient>, Arc<QueryCache>)> {
    let cache = Arc::new(QueryCache::default());
    let client = LeadLabClient::from_config(config)?.with_cache(cache.clone());
    Ok((Arc::new(client), cache))
}

async fn run_list<T>(
    client: Arc<LeadLabClient>,
    cache: Arc<QueryCache>,
    config: &Config,
    resource: ListResource,
    args: &ListArgs,
    render: impl Fn(&T) -> String,
) -> anyhow::Result<()>
where
    T: HasId + Clone + Serialize + DeserializeOwned,
{
    let page_size = args.page_size.unwrap_or(config.default_page_size);
    let mut view = ListViewController::new(
        Endpoint::<T>::new(client, resource),
        cache,
        SessionStore::new(),
        page_size,
    );

    if let Some(search) = &args.search {
        view.submit_search(search);
    }
    if args.tag.is_some() {
        view.set_tag_filter(args.tag);
    }
    for (category, values) in [
        (FilterCategory::Sector, &args.sector),
        (FilterCategory::Location, &args.location),
        (FilterCategory::Source, &args.source),
        (FilterCategory::Country, &args.country),
    ] {
        if !values.is_empty() {
            view.set_filter_values(category, values.clone())?;
        }
    }
    if args.sort_by.is_some() || args.asc {
        view.set_sort(Some(Sort {
            field: args.sort_by.clone().unwrap_or_else(|| DEFAULT_SORT_FIELD.to_string()),
            descending: !args.asc,
        }));
    }
    view.set_page(args.page);

    if let LoadOutcome::Failed { message } = view.load().await {
        return Err(anyhow!(message));
    }

    println!(
        "{} ページ {}/{} (全{}件)\n",
        resource.path(),
        args.page + 1,
        view.page_count().max(1),
        view.total()
    );
    for row in view.rows() {
        println!("{}", render(row));
    }
    if view.has_more() {
        println!("\n次のページ: --page {}", args.page + 1);
    }
    Ok(())
}
