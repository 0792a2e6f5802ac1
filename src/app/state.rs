// ==========================================
// DFU 需求转移系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 传输层（HTTP/WebSocket 等）持有 AppState,
//       通过 subscribe() 获取变更广播
// ==========================================

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::api::DemandTransferApi;
use crate::config::config_manager::ConfigManager;
use crate::engine::events::{BroadcastNotifier, ChangeNotification, ChangeNotifier};
use crate::repository::{
    action_log_repo::ActionLogRepository, session_repo::SessionStore,
    session_repo::SqliteSessionRepository,
};

/// 应用状态
///
/// 包含API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 需求转移API
    pub transfer_api: Arc<DemandTransferApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,

    /// 变更广播
    notifier: Arc<BroadcastNotifier>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并确保表结构
    /// 2. 读取配置（默认操作人、广播容量、工作表名）
    /// 3. 从存储加载会话并创建 API 实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::ensure_schema(&conn).map_err(|e| format!("数据库表结构初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let default_actor = config_manager
            .get_default_actor()
            .map_err(|e| format!("读取默认操作人失败: {}", e))?;
        let capacity = config_manager
            .get_channel_capacity()
            .map_err(|e| format!("读取广播容量失败: {}", e))?;
        let sheet_name = config_manager
            .get_import_sheet_name()
            .map_err(|e| format!("读取工作表配置失败: {}", e))?;

        // ==========================================
        // Repository / 通知
        // ==========================================
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let session_store: Arc<dyn SessionStore> = Arc::new(SqliteSessionRepository::new(conn));
        let notifier = Arc::new(BroadcastNotifier::new(capacity));

        // ==========================================
        // API
        // ==========================================
        let transfer_api = DemandTransferApi::new(
            session_store,
            Some(notifier.clone() as Arc<dyn ChangeNotifier>),
        )
        .map_err(|e| format!("无法加载会话: {}", e))?
        .with_action_log(action_log_repo.clone())
        .with_default_actor(&default_actor)
        .with_import_sheet_name(sheet_name);

        tracing::info!(
            default_actor = %default_actor,
            channel_capacity = capacity,
            "AppState初始化完成"
        );

        Ok(Self {
            db_path,
            transfer_api: Arc::new(transfer_api),
            config_manager,
            action_log_repo,
            notifier,
        })
    }

    /// 订阅变更通知
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.notifier.subscribe()
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 DFU_TRANSFER_DB_PATH（非空时）
/// - 开发环境: 用户数据目录/dfu-demand-transfer-dev/session.db
/// - 生产环境: 用户数据目录/dfu-demand-transfer/session.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("DFU_TRANSFER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./session.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("dfu-demand-transfer-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("dfu-demand-transfer");
        }

        // 目录创建失败时由打开数据库报错
        std::fs::create_dir_all(&path).ok();
        path = path.join("session.db");
    }

    path.to_string_lossy().to_string()
}
