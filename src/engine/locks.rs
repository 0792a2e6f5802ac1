// ==========================================
// DFU 需求转移系统 - DFU 互斥锁注册表
// ==========================================
// 职责: 按 DFU 代码分配互斥锁,串行化同一 DFU 的
//       读取 → 计算 → 合并 → 持久化 序列
// 红线: 不同 DFU 互不阻塞
// ==========================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct DfuLockRegistry {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DfuLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得 DFU 对应的锁（不存在则创建）
    ///
    /// 调用方持有返回的 Arc 并自行 lock(); 注册表本身的锁只在查找时持有
    pub fn lock_for(&self, dfu_code: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(dfu_code.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
