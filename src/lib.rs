// ==========================================
// DFU 需求转移系统 - 核心库
// ==========================================
// 系统定位: 多人协同的 DFU 需求预测转移
// 技术栈: Rust + SQLite
// 数据流: 上传 → 聚合视图 → 转移/撤销/新增变体 → 导出
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入导出层 - 外部表格
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/表结构）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    ActionLog, ActionType, AggregationFilter, AggregationResult, CompletedTransfer, DemandRecord,
    TransferSelection, TransferType, WeekKey,
};

// 引擎
pub use engine::{
    AggregationEngine, ChangeNotification, ChangeNotifier, TransferEngine, UndoEngine,
    VariantEngine,
};

// API
pub use api::{ApiError, ApiResult, DemandTransferApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "DFU 需求转移系统";
