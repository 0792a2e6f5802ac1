// ==========================================
// DFU 需求转移系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 默认广播缓冲区大小
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// 默认操作人
pub const DEFAULT_ACTOR: &str = "anonymous";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照
    pub fn get_config_snapshot(&self) -> Result<BTreeMap<String, String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut config_map = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(config_map)
    }

    // ===== 会话配置 =====

    /// 操作人为空时使用的默认身份
    pub fn get_default_actor(&self) -> Result<String, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::DEFAULT_ACTOR, DEFAULT_ACTOR)?;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(DEFAULT_ACTOR.to_string());
        }
        Ok(trimmed.to_string())
    }

    /// 变更通知广播缓冲区大小（非法值回退默认值）
    pub fn get_channel_capacity(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(
            config_keys::CHANNEL_CAPACITY,
            &DEFAULT_CHANNEL_CAPACITY.to_string(),
        )?;

        match value.trim().parse::<usize>() {
            Ok(capacity) if capacity > 0 => Ok(capacity),
            _ => {
                tracing::warn!(
                    key = config_keys::CHANNEL_CAPACITY,
                    value = %value,
                    "配置值非法,使用默认值 {}",
                    DEFAULT_CHANNEL_CAPACITY
                );
                Ok(DEFAULT_CHANNEL_CAPACITY)
            }
        }
    }

    /// Excel 导入工作表名（None 表示第一个工作表）
    pub fn get_import_sheet_name(&self) -> Result<Option<String>, Box<dyn Error>> {
        Ok(self
            .get_config_value(config_keys::IMPORT_SHEET_NAME)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 会话
    pub const DEFAULT_ACTOR: &str = "session.default_actor";

    // 变更通知
    pub const CHANNEL_CAPACITY: &str = "notify.channel_capacity";

    // 导入
    pub const IMPORT_SHEET_NAME: &str = "import.sheet_name";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = setup();
        assert_eq!(config.get_default_actor().unwrap(), "anonymous");
        assert_eq!(config.get_channel_capacity().unwrap(), 256);
        assert_eq!(config.get_import_sheet_name().unwrap(), None);
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = setup();
        config.set_global_config_value(config_keys::DEFAULT_ACTOR, " planner ").unwrap();
        config.set_global_config_value(config_keys::CHANNEL_CAPACITY, "0").unwrap();
        config.set_global_config_value(config_keys::IMPORT_SHEET_NAME, "Forecast").unwrap();

        assert_eq!(config.get_default_actor().unwrap(), "planner");
        assert_eq!(config.get_channel_capacity().unwrap(), 256);
        assert_eq!(config.get_import_sheet_name().unwrap().as_deref(), Some("Forecast"));

        config.set_global_config_value(config_keys::CHANNEL_CAPACITY, "16").unwrap();
        assert_eq!(config.get_channel_capacity().unwrap(), 16);
        assert_eq!(config.get_config_snapshot().unwrap().len(), 3);
    }
}
