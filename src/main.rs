// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use axum::Extension;
use clap::{Parser, Subcommand};
use ladderwatch::config::settings::Settings;
use ladderwatch::domain::repositories::job_repository::JobRepository;
use ladderwatch::domain::repositories::request_log_repository::RequestLogRepository;
use ladderwatch::domain::repositories::snapshot_repository::SnapshotRepository;
use ladderwatch::domain::services::build_categorizer::KeywordBuildCategorizer;
use ladderwatch::domain::services::collection_service::CollectionOrchestrator;
use ladderwatch::domain::services::rate_limiting_service::RateLimitManager;
use ladderwatch::infrastructure::clients::poe_ladder_client::PoeLadderClient;
use ladderwatch::infrastructure::database::connection;
use ladderwatch::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use ladderwatch::infrastructure::repositories::request_log_repo_impl::RequestLogRepositoryImpl;
use ladderwatch::infrastructure::repositories::snapshot_repo_impl::SnapshotRepositoryImpl;
use ladderwatch::presentation::routes;
use ladderwatch::queue::scheduler::TaskScheduler;
use ladderwatch::queue::task_queue::InMemoryJobQueue;
use ladderwatch::utils::shutdown::{SharedShutdown, ShutdownSignal};
use ladderwatch::utils::telemetry;
use ladderwatch::workers::{CollectionJobRunner, MaintenanceWorker};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// 天梯数据采集服务
#[derive(Parser, Debug)]
#[command(name = "ladderwatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 恢复任务并启动工作器、维护循环与 HTTP 服务
    Serve,
    /// 对所有到期的监控目标执行一次采集，并以 JSON 输出结果
    Collect,
    /// 删除过期快照
    Cleanup {
        /// 保留天数，默认使用配置值
        #[arg(long)]
        days: Option<i64>,
    },
}

/// 组合根产出的共享组件
struct Components {
    db: Arc<sea_orm::DatabaseConnection>,
    limiter: Arc<RateLimitManager>,
    snapshots: Arc<dyn SnapshotRepository>,
    orchestrator: Arc<CollectionOrchestrator>,
}

async fn build_components(
    settings: &Settings,
    shutdown: SharedShutdown,
) -> anyhow::Result<Components> {
    let db = Arc::new(connection::connect_and_migrate(&settings.database).await?);
    info!("Database connection established");

    let request_log: Arc<dyn RequestLogRepository> =
        Arc::new(RequestLogRepositoryImpl::new(db.clone()));
    let limiter = Arc::new(
        RateLimitManager::new(&settings.rate_limiting).with_request_log(request_log),
    );
    info!("Rate limiter initialized");

    let snapshots: Arc<dyn SnapshotRepository> = Arc::new(SnapshotRepositoryImpl::new(db.clone()));
    let client = Arc::new(PoeLadderClient::new(&settings.collection)?);

    let orchestrator = Arc::new(CollectionOrchestrator::new(
        client,
        snapshots.clone(),
        limiter.clone(),
        Arc::new(KeywordBuildCategorizer::new()),
        settings.collection.clone(),
        shutdown,
    ));

    Ok(Components {
        db,
        limiter,
        snapshots,
        orchestrator,
    })
}

fn spawn_ctrl_c(shutdown: SharedShutdown) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, shutting down...");
            shutdown.request();
        }
    });
}

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并执行子命令
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_telemetry();
    let cli = Cli::parse();

    let settings = Settings::new()?;
    info!("Configuration loaded");

    let shutdown = ShutdownSignal::shared();
    spawn_ctrl_c(shutdown.clone());

    let components = build_components(&settings, shutdown.clone()).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(settings, components, shutdown).await,
        Commands::Collect => {
            let results = components.orchestrator.collect_if_needed().await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
        Commands::Cleanup { days } => {
            let deleted = match days {
                Some(days) => components.orchestrator.cleanup_older_than(days).await?,
                None => components.orchestrator.cleanup_old_snapshots().await?,
            };
            println!("Deleted {} snapshots", deleted);
            Ok(())
        }
    }
}

async fn serve(
    settings: Settings,
    components: Components,
    shutdown: SharedShutdown,
) -> anyhow::Result<()> {
    info!("Starting ladderwatch...");

    let job_repo: Arc<dyn JobRepository> = Arc::new(JobRepositoryImpl::new(components.db.clone()));
    let scheduler = TaskScheduler::new(
        Arc::new(InMemoryJobQueue::new()),
        job_repo,
        Arc::new(CollectionJobRunner::new(components.orchestrator.clone())),
        settings.scheduler.clone(),
        shutdown.clone(),
    );

    let report = scheduler.recover().await?;
    info!(
        failed = report.failed.len(),
        requeued = report.requeued.len(),
        untouched = report.untouched.len(),
        "Job recovery finished"
    );
    scheduler.start_worker();

    if let Err(e) = components.orchestrator.refresh_leagues().await {
        warn!("Initial league discovery failed: {}", e);
    }

    let maintenance = MaintenanceWorker::new(
        components.orchestrator.clone(),
        scheduler.clone(),
        shutdown.clone(),
    )
    .start();

    let app = routes::routes()
        .layer(Extension(scheduler.clone()))
        .layer(Extension(components.limiter.clone()))
        .layer(Extension(components.snapshots.clone()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let addr = settings.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { signal.wait().await })
        .await?;

    scheduler.shutdown(SHUTDOWN_GRACE).await;
    if tokio::time::timeout(SHUTDOWN_GRACE, maintenance).await.is_err() {
        warn!("Maintenance worker did not stop in time");
    }

    info!("Shutdown complete");
    Ok(())
}
