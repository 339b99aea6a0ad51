//! Historical market data collector CLI.

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use nexvest_collector::modules::{self, CollectOptions, SourceSelection, StoreKind};
use nexvest_collector::CollectorConfig;
use nexvest_data::{DocumentStore, JsonFileStore, PgDocumentStore, RangeQuery};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "nexvest-collector")]
#[command(about = "NexVest Historical Market Data Collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 과거 시세 수집 후 저장
    Collect {
        /// 수집 소스
        #[arg(long, value_enum, default_value = "all")]
        source: SourceSelection,

        /// 저장소
        #[arg(long, value_enum, default_value = "json")]
        store: StoreKind,

        /// 수집 기간 (년)
        #[arg(long)]
        years_back: Option<u32>,

        /// 거래소 동시 실행 수
        #[arg(long)]
        bvc_workers: Option<usize>,

        /// 티커 동시 실행 수
        #[arg(long)]
        yahoo_workers: Option<usize>,

        /// 진행 막대 숨김
        #[arg(long)]
        no_progress: bool,
    },

    /// JSON 출력 디렉터리를 PostgreSQL로 업로드
    Upload,

    /// 종목 기간 조회
    Query {
        /// 종목 심볼 (예: ECOPETROL)
        symbol: String,

        /// 시작 날짜 (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// 종료 날짜 (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// 최대 건수 (기간 미지정 시 기본 100)
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_enum, default_value = "json")]
        store: StoreKind,
    },

    /// 종목의 특정 날짜 레코드 조회
    Get {
        /// 종목 심볼 (예: ECOPETROL)
        symbol: String,

        /// 날짜 (YYYY-MM-DD)
        date: NaiveDate,

        #[arg(long, value_enum, default_value = "json")]
        store: StoreKind,
    },

    /// 저장된 종목 목록
    Symbols {
        #[arg(long, value_enum, default_value = "json")]
        store: StoreKind,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "nexvest_collector={level},nexvest_data={level}",
                    level = cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("NexVest Data Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    tracing::debug!(
        output_dir = %config.output_dir.display(),
        years_back = config.years_back,
        "설정 로드 완료"
    );

    match cli.command {
        Commands::Collect {
            source,
            store,
            years_back,
            bvc_workers,
            yahoo_workers,
            no_progress,
        } => {
            let defaults = CollectOptions::from_config(&config);
            let options = CollectOptions {
                source,
                years_back: years_back.unwrap_or(defaults.years_back),
                bvc_workers: bvc_workers.unwrap_or(defaults.bvc_workers),
                yahoo_workers: yahoo_workers.unwrap_or(defaults.yahoo_workers),
                show_progress: !no_progress,
            };

            let store = modules::open_store(store, &config).await?;
            let summary = modules::run_collect(&config, &options, store.as_ref()).await?;
            tracing::info!(
                duration_seconds = summary.duration_seconds,
                dates = summary.dates_processed,
                "=== 수집 완료 ==="
            );
        }
        Commands::Upload => {
            let url = config.require_database_url()?;
            let target = PgDocumentStore::connect(url, 10)
                .await
                .context("데이터베이스 연결 실패")?;
            target.ensure_schema().await?;

            let source = JsonFileStore::new(&config.output_dir);
            let summary = modules::upload_json_dir(&source, &target).await?;
            tracing::info!(
                upserted = summary.upserted,
                modified = summary.modified,
                "업로드 완료"
            );
            target.pool().close().await;
        }
        Commands::Query {
            symbol,
            from,
            to,
            limit,
            store,
        } => {
            let store = modules::open_store(store, &config).await?;
            let query = RangeQuery { from, to, limit };
            let documents = store
                .find(&symbol, &query)
                .await
                .with_context(|| format!("{} 조회 실패", symbol))?;
            println!("{}", serde_json::to_string_pretty(&documents)?);
        }
        Commands::Get {
            symbol,
            date,
            store,
        } => {
            let store = modules::open_store(store, &config).await?;
            let document = modules::find_record(store.as_ref(), &symbol, date)
                .await
                .with_context(|| format!("{} {} 조회 실패", symbol, date))?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Commands::Symbols { store } => {
            let store = modules::open_store(store, &config).await?;
            for symbol in store.list_symbols().await? {
                println!("{}", symbol);
            }
        }
    }

    tracing::info!("NexVest Data Collector 종료");
    Ok(())
}
