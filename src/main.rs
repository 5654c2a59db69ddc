use anyhow::anyhow;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::json;
use tracing::{error, info};

use flow_radar::app::bootstrap::AppContext;
use flow_radar::app_config::log::setup_logging;
use flow_radar::job::pattern_refresh_job::parse_classes;
use flow_radar::market::model::flow::FlowRecord;
use flow_radar::market::model::pattern::Timeframe;
use flow_radar::time_util::mill_time_to_datetime;

#[derive(Parser)]
#[command(name = "flow-radar", about = "资金流排名与形态缓存维护工具")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 摄入一批资金流记录（JSON 数组文件）
    Ingest {
        #[arg(long)]
        file: String,
    },
    /// 刷新形态缓存：默认走到点判断，--force 绕过
    Refresh {
        #[arg(long)]
        force: bool,
        /// 周期列表，如 --classes 1H,4H；仅对 --force 生效，缺省为全部
        #[arg(long, value_delimiter = ',')]
        classes: Vec<String>,
    },
    /// 查看缓存状态
    Status,
    /// 清空形态缓存（管理操作）
    Clear,
    /// 存储探活
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    setup_logging().await?;

    let cli = Cli::parse();
    let context = AppContext::init().await?;

    let result = run_command(&context, cli.command).await;
    if let Err(e) = &result {
        error!("命令执行失败: {}", e);
    }
    context.shutdown().await;
    result
}

async fn run_command(context: &AppContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Ingest { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| anyhow!("读取批次文件失败 {}: {}", file, e))?;
            let records: Vec<FlowRecord> = serde_json::from_str(&raw)
                .map_err(|e| anyhow!("批次文件不是合法的记录数组: {}", e))?;

            info!("📥 摄入资金流批次: {} 条", records.len());
            let summary = context.flow_store.upsert_batch(records).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Refresh { force, classes } => {
            let report = if force {
                let targets = parse_classes(&classes)?;
                context.refresh_job.run_forced(targets).await?
            } else {
                context.refresh_job.run_due().await?
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Status => {
            let flows = context.flow_store.get_all().await;
            let patterns = context.pattern_store.read_all().await;

            let mut ages = serde_json::Map::new();
            for timeframe in Timeframe::ALL {
                let age = context.pattern_store.data_age(timeframe).await;
                ages.insert(timeframe.as_str().to_string(), json!(age));
            }

            let pattern_status = match patterns {
                Some(snapshot) => json!({
                    "updatedAt": mill_time_to_datetime(snapshot.meta.updated_at).ok(),
                    "totalScanned": snapshot.meta.total_scanned,
                    "nextRefresh": snapshot.meta.next_refresh,
                    "counts": snapshot
                        .timeframes
                        .iter()
                        .map(|(tf, entry)| (tf.as_str().to_string(), json!(entry.patterns.len())))
                        .collect::<serde_json::Map<_, _>>(),
                }),
                None => json!(null),
            };

            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "flows": flows,
                    "patterns": pattern_status,
                    "dataAgeMinutes": ages,
                }))?
            );
        }
        Commands::Clear => {
            context.pattern_store.clear().await?;
            info!("🧹 形态缓存已清空");
        }
        Commands::Health => {
            let alive = context.flow_store.health_check().await;
            println!("{}", json!({ "storage": alive }));
            if !alive {
                return Err(anyhow!("存储探活失败"));
            }
        }
    }
    Ok(())
}
