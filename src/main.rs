use clap::Parser;
use recommend_gateway::adapters::server;
use recommend_gateway::config::cli::Command;
use recommend_gateway::utils::error::ErrorSeverity;
use recommend_gateway::utils::logger::{self, LogFormat};
use recommend_gateway::utils::validation::Validate;
use recommend_gateway::{
    Aggregator, BreakerRegistry, CliArgs, HalTraversal, HttpPageFetcher, RecommendationService,
    StaticRegistry,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let settings = match args.load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    logger::init_logger(LogFormat::from_json_flag(settings.server.json_logs), args.verbose);

    tracing::info!("Starting recommend-gateway");
    if args.verbose {
        tracing::debug!("Settings: {:?}", settings);
    }

    // 驗證配置
    if let Err(e) = settings.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let discovery = Arc::new(StaticRegistry::from_services(&settings.services)?);
    // 連線逾時與單次呼叫逾時一致，整體逾時交給 ResilientCall
    let client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(settings.aggregation.per_call_timeout())
        .build()?;
    let fetcher = Arc::new(HttpPageFetcher::new(discovery, HalTraversal::with_client(client)));
    let registry = Arc::new(BreakerRegistry::new((&settings.breaker).into()));
    let shutdown = CancellationToken::new();

    let aggregator = Aggregator::new(
        Arc::clone(&fetcher),
        fetcher,
        Arc::clone(&registry),
        settings.aggregation.clone(),
    )
    .with_shutdown(shutdown.clone());
    let service = Arc::new(RecommendationService::new(aggregator, registry));

    let span = logger::service_span(&settings.server.bind_address);
    let command = args.command.clone().unwrap_or(Command::Serve);
    run(command, service, &settings.server.bind_address, shutdown)
        .instrument(span)
        .await
}

type Gateway = RecommendationService<HttpPageFetcher<StaticRegistry>, HttpPageFetcher<StaticRegistry>>;

async fn run(
    command: Command,
    service: Arc<Gateway>,
    bind_address: &str,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    match command {
        Command::Serve => {
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutdown signal received");
                }
                signal.cancel();
            });

            server::serve(server::router(service), bind_address, shutdown).await?;
        }
        Command::Query { customer_id } => match service.recommend(&customer_id).wait().await {
            Ok(details) => {
                println!("{}", serde_json::to_string_pretty(&details)?);
            }
            Err(e) => {
                tracing::error!(
                    "❌ Aggregation failed: {} (Category: {:?}, Severity: {:?})",
                    e,
                    e.category(),
                    e.severity()
                );
                eprintln!("❌ {}", e.user_friendly_message());
                eprintln!("💡 建議: {}", e.recovery_suggestion());

                // 根據錯誤嚴重程度決定退出碼
                let exit_code = match e.severity() {
                    ErrorSeverity::Low => 2,
                    ErrorSeverity::Medium => 2,
                    ErrorSeverity::High => 1,
                    ErrorSeverity::Critical => 3,
                };
                std::process::exit(exit_code);
            }
        },
    }

    Ok(())
}
