//! 지수 구성종목 동기화 CLI.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use market_collector::config::parse_list;
use market_collector::modules::{self, GroupOutcome, RemoveOutcome, SyncOptions, SyncRunReport};
use market_collector::{CollectorConfig, CollectorError};
use market_core::{AssetGroup, AssetType, NewAsset};
use market_data::{init_schema, AddOutcome, Database, DatabaseConfig, SqliteAssetRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "market-collector")]
#[command(about = "Index constituent sync for the local market data registry", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 스키마 생성 및 업그레이드
    InitDb,

    /// 지수 구성종목 동기화
    SyncIndices {
        /// 대상 그룹 (쉼표로 구분, 예: "sp500,dax")
        #[arg(long)]
        groups: Option<String>,

        /// 변경 계획만 출력
        #[arg(long)]
        dry_run: bool,

        /// 예상 구성종목 수 검증 생략
        #[arg(long)]
        allow_partial: bool,

        /// 결과를 JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 변경 없이 구성종목 차이 확인 (sync-indices --dry-run)
    CheckIndices {
        #[arg(long)]
        groups: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// 기존 asset_group 컬럼으로 그룹 멤버십 채우기
    MigrateMemberships,

    /// 자산 수동 등록
    AddAsset {
        symbol: String,

        /// 자산 유형 (stock, index, commodity, fx, crypto, etf)
        #[arg(long, default_value = "stock")]
        asset_type: AssetType,

        /// 소속 그룹
        #[arg(long)]
        group: Option<AssetGroup>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        sector: Option<String>,

        #[arg(long)]
        exchange: Option<String>,
    },

    /// 자산 비활성화 (가격 데이터 유지)
    RemoveAsset {
        symbol: String,

        /// 자산과 가격 데이터를 영구 삭제
        #[arg(long)]
        purge: bool,

        /// 영구 삭제 확인
        #[arg(long, requires = "purge")]
        yes: bool,
    },

    /// 자산 목록
    ListAssets {
        #[arg(long)]
        group: Option<AssetGroup>,

        /// 비활성 자산 포함
        #[arg(long)]
        all: bool,
    },

    /// 그룹별 구성종목 현황
    Groups,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화 (market_collector, market_data 모두 포함)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "market_collector={},market_data={}",
                    cli.log_level, cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CollectorConfig::from_env()?;
    tracing::debug!(
        database_url = %config.database_url,
        groups = config.groups.len(),
        "설정 로드 완료"
    );

    let db_config = DatabaseConfig::for_cli(config.database_url.clone())
        .with_max_connections(config.db_max_connections);
    let db = Database::connect(&db_config)
        .await
        .map_err(|e| CollectorError::Config(format!("데이터베이스 연결 실패: {}", e)))?;
    init_schema(db.pool()).await?;
    let registry = SqliteAssetRegistry::new(db.pool().clone());

    let exit = match cli.command {
        Commands::InitDb => {
            println!("스키마 준비 완료: {}", config.database_url);
            ExitCode::SUCCESS
        }
        Commands::SyncIndices {
            groups,
            dry_run,
            allow_partial,
            json,
        } => {
            let options = SyncOptions::from_config(&config.reconcile)
                .dry_run(dry_run)
                .allow_partial(allow_partial);
            run_sync(&registry, &config, groups.as_deref(), &options, json).await?
        }
        Commands::CheckIndices { groups, json } => {
            let options = SyncOptions::from_config(&config.reconcile).dry_run(true);
            run_sync(&registry, &config, groups.as_deref(), &options, json).await?
        }
        Commands::MigrateMemberships => {
            let inserted = modules::migrate_memberships(&registry).await?;
            println!("그룹 멤버십 {}건 생성", inserted);
            ExitCode::SUCCESS
        }
        Commands::AddAsset {
            symbol,
            asset_type,
            group,
            name,
            sector,
            exchange,
        } => {
            let asset = NewAsset {
                symbol: symbol.trim().to_uppercase(),
                asset_type,
                name,
                sector,
                exchange,
                group,
            };
            let outcome = modules::add_asset(&registry, &asset).await?;
            let label = match outcome {
                AddOutcome::Created => "등록",
                AddOutcome::Reactivated => "재활성화",
                AddOutcome::AlreadyActive => "이미 활성 상태",
            };
            println!("{}: {}", asset.symbol, label);
            ExitCode::SUCCESS
        }
        Commands::RemoveAsset { symbol, purge, yes } => {
            match modules::remove_asset(&registry, &symbol, purge, yes).await {
                Ok(RemoveOutcome::Deactivated {
                    symbol,
                    memberships,
                }) => {
                    println!("{}: 비활성화 (그룹 소속 {}건 해제)", symbol, memberships);
                    ExitCode::SUCCESS
                }
                Ok(RemoveOutcome::Purged(report)) => {
                    println!(
                        "{}: 영구 삭제 (가격 데이터 {}행, 그룹 소속 {}건)",
                        report.symbol, report.price_rows, report.memberships
                    );
                    ExitCode::SUCCESS
                }
                Err(CollectorError::Confirmation(msg)) => {
                    eprintln!("{}", msg);
                    ExitCode::FAILURE
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::ListAssets { group, all } => {
            let assets = modules::list_assets(&registry, group, all).await?;
            println!(
                "{:<12} {:<10} {:<12} {:<8} {}",
                "SYMBOL", "TYPE", "GROUP", "ACTIVE", "NAME"
            );
            for asset in &assets {
                println!(
                    "{:<12} {:<10} {:<12} {:<8} {}",
                    asset.symbol,
                    asset.asset_type,
                    asset.asset_group.as_ref().map(AssetGroup::as_str).unwrap_or("-"),
                    if asset.is_active { "yes" } else { "no" },
                    asset.name.as_deref().unwrap_or("")
                );
            }
            println!("총 {}개", assets.len());
            ExitCode::SUCCESS
        }
        Commands::Groups => {
            let overview = modules::group_overview(&registry, &config.groups).await?;
            println!(
                "{:<12} {:<14} {:>8} {:>8} {:>10}",
                "GROUP", "NAME", "ACTIVE", "TOTAL", "EXPECTED"
            );
            for row in &overview {
                println!(
                    "{:<12} {:<14} {:>8} {:>8} {:>10}",
                    row.group,
                    row.name.as_deref().unwrap_or(if row.configured { "" } else { "(미설정)" }),
                    row.active,
                    row.total,
                    row.expected.map(|e| e.to_string()).unwrap_or_else(|| "-".to_string())
                );
            }
            ExitCode::SUCCESS
        }
    };

    db.close().await;
    Ok(exit)
}

async fn run_sync(
    registry: &SqliteAssetRegistry,
    config: &CollectorConfig,
    groups: Option<&str>,
    options: &SyncOptions,
    json: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let selected = match groups {
        Some(list) => market_collector::config::select_groups(config.groups.clone(), &parse_list(list))?,
        None => config.groups.clone(),
    };
    let fetcher = modules::build_fetcher(config)?;
    let report = modules::sync_indices(registry, &fetcher, &selected, options).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(if report.exit_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(report: &SyncRunReport) {
    for group in &report.groups {
        match &group.outcome {
            GroupOutcome::Applied { plan, summary } => {
                println!(
                    "[{}] 소스 {}개: 추가 {}, 재활성화 {}, 비활성화 {}, 유지 {}, 실패 {}",
                    group.group,
                    group.fetched,
                    summary.added,
                    summary.reactivated,
                    summary.deactivated,
                    plan.unchanged,
                    summary.error_count()
                );
                for failure in &summary.errors {
                    println!("  ! {} ({:?}): {}", failure.symbol, failure.phase, failure.message);
                }
            }
            GroupOutcome::Planned { plan } => {
                println!(
                    "[{}] 소스 {}개 (dry run): 추가 {}, 재활성화 {}, 비활성화 {}, 유지 {}",
                    group.group,
                    group.fetched,
                    plan.to_create.len(),
                    plan.to_reactivate.len(),
                    plan.to_deactivate.len(),
                    plan.unchanged
                );
                print_symbols("+", &plan.to_create);
                print_symbols("~", &plan.to_reactivate);
                print_symbols("-", &plan.to_deactivate);
            }
            GroupOutcome::Skipped { reason } => println!("[{}] 건너뜀: {}", group.group, reason),
            GroupOutcome::FetchFailed { error } => {
                println!("[{}] 수집 실패: {}", group.group, error)
            }
            GroupOutcome::StorageFailed { error } => {
                println!("[{}] 저장소 오류: {}", group.group, error)
            }
        }
    }

    let totals = report.totals();
    println!(
        "합계: 추가 {}, 재활성화 {}, 비활성화 {}, 실패 {} (그룹 실패 {}, 건너뜀 {})",
        totals.added,
        totals.reactivated,
        totals.deactivated,
        totals.errors,
        totals.failed_groups,
        totals.skipped_groups
    );
}

fn print_symbols(marker: &str, symbols: &std::collections::BTreeSet<String>) {
    if symbols.is_empty() {
        return;
    }
    let list: Vec<&str> = symbols.iter().map(String::as_str).collect();
    println!("  {} {}", marker, list.join(", "));
}
