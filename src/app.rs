use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use relay_api::{create_app, routes::AppState};
use relay_core::{
    traits::{CancellationRepository, DeviceClient, DeviceRepository, RelayRepository},
    AppConfig,
};
use relay_dispatcher::{
    CancellationDrainer, DispatchCoordinator, ReadyWorkSelector, RelayProcessor, RetryPolicy,
};
use relay_infrastructure::{
    build_device_client, DatabaseManager, SqliteCancellationRepository, SqliteDeviceRepository,
    SqliteRelayRepository,
};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 仅运行调度循环
    Dispatcher,
    /// 仅运行API服务器
    Api,
    /// 运行所有已启用的组件
    All,
}

impl AppMode {
    fn runs_dispatcher(self, config: &AppConfig) -> bool {
        match self {
            AppMode::Dispatcher => true,
            AppMode::Api => false,
            AppMode::All => config.dispatcher.enabled,
        }
    }

    fn runs_api(self, config: &AppConfig) -> bool {
        match self {
            AppMode::Api => true,
            AppMode::Dispatcher => false,
            AppMode::All => config.api.enabled,
        }
    }
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    database: Arc<DatabaseManager>,
    relay_repo: Arc<dyn RelayRepository>,
    device_repo: Arc<dyn DeviceRepository>,
    cancellation_repo: Arc<dyn CancellationRepository>,
    /// Only built when the dispatcher runs, so API-only nodes need no device credentials.
    device_client: Option<Arc<dyn DeviceClient>>,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        let database = Arc::new(
            DatabaseManager::new(&config.database)
                .await
                .context("初始化数据库失败")?,
        );

        let device_client = if mode.runs_dispatcher(&config) {
            Some(
                build_device_client(&config.device_api, config.dispatcher.call_timeout())
                    .await
                    .context("创建设备API客户端失败")?,
            )
        } else {
            None
        };

        Ok(Self::from_parts(config, mode, database, device_client))
    }

    /// Assembles the application around an existing database and device client.
    pub fn from_parts(
        config: AppConfig,
        mode: AppMode,
        database: Arc<DatabaseManager>,
        device_client: Option<Arc<dyn DeviceClient>>,
    ) -> Self {
        let pool = database.pool().clone();
        Self {
            config,
            mode,
            relay_repo: Arc::new(SqliteRelayRepository::new(pool.clone())),
            device_repo: Arc::new(SqliteDeviceRepository::new(pool.clone())),
            cancellation_repo: Arc::new(SqliteCancellationRepository::new(pool)),
            database,
            device_client,
        }
    }

    /// Wires selector, drainer and processor into a coordinator.
    pub fn coordinator(&self) -> Result<DispatchCoordinator> {
        let client = self
            .device_client
            .clone()
            .context("当前运行模式未创建设备API客户端")?;
        let dispatcher = &self.config.dispatcher;

        let processor = RelayProcessor::new(
            Arc::clone(&self.relay_repo),
            Arc::clone(&self.device_repo),
            client,
            RetryPolicy::from(dispatcher),
        );

        Ok(DispatchCoordinator::new(
            ReadyWorkSelector::new(Arc::clone(&self.relay_repo), dispatcher.batch_limit),
            CancellationDrainer::new(
                Arc::clone(&self.cancellation_repo),
                Arc::clone(&self.relay_repo),
                dispatcher.cancellation_page_size,
            ),
            Arc::new(processor),
            dispatcher,
        ))
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            relay_repo: Arc::clone(&self.relay_repo),
            device_repo: Arc::clone(&self.device_repo),
            cancellation_repo: Arc::clone(&self.cancellation_repo),
            database: Some(Arc::clone(&self.database)),
        };
        create_app(state, self.config.api.request_timeout())
    }

    /// 运行应用程序，直到收到关闭信号或调度循环失败
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);

        let api_handle = if self.mode.runs_api(&self.config) {
            let listener = TcpListener::bind(&self.config.api.bind_address)
                .await
                .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;
            let router = self.router();
            let api_shutdown = shutdown_rx.resubscribe();
            Some(tokio::spawn(serve_api(listener, router, api_shutdown)))
        } else {
            None
        };

        if self.mode.runs_dispatcher(&self.config) {
            let coordinator = self.coordinator()?;
            if let Err(e) = coordinator.run(shutdown_rx).await {
                if let Some(handle) = api_handle {
                    handle.abort();
                }
                return Err(e).context("调度循环异常终止");
            }
        }

        if let Some(handle) = api_handle {
            handle.await.context("API服务器任务异常退出")??;
        }

        info!("所有组件已停止");
        Ok(())
    }

    pub async fn close(&self) {
        self.database.close().await;
    }
}

async fn serve_api(
    listener: TcpListener,
    router: Router,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let address = listener.local_addr().context("读取监听地址失败")?;
    info!("API服务器启动在 http://{}", address);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("API服务器收到关闭信号");
        })
        .await
        .map_err(|e| {
            error!("API服务器运行失败: {}", e);
            anyhow::Error::from(e)
        })?;

    info!("API服务器已停止");
    Ok(())
}
