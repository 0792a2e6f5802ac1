use super::*;

use crate::domain::pending::PendingSelection;
use crate::domain::record::WeekKey;

impl DemandTransferApi {
    // ==========================================
    // 待执行选择
    // ==========================================

    /// 整体转移: 所有变体转到 target
    pub fn set_bulk_target(&self, dfu_code: &str, target: &str) -> ApiResult<()> {
        let dfu_code = require_identifier(dfu_code, "DFU")?;
        let target = require_identifier(target, "Product Number")?;

        let mut session = self.write_session()?;
        ensure_variants(&session, dfu_code, &[target])?;
        session.pending_mut().set_bulk(dfu_code, target);
        Ok(())
    }

    /// 逐变体转移: 设置单个源变体的目标
    pub fn set_individual_target(&self, dfu_code: &str, source: &str, target: &str) -> ApiResult<()> {
        let dfu_code = require_identifier(dfu_code, "DFU")?;
        let source = require_identifier(source, "Product Number")?;
        let target = require_identifier(target, "Product Number")?;

        let mut session = self.write_session()?;
        ensure_variants(&session, dfu_code, &[source, target])?;
        session
            .pending_mut()
            .set_individual_target(dfu_code, source, target);
        Ok(())
    }

    /// 按周转移: 勾选/取消某周
    ///
    /// # 参数
    /// - week_key: "{week}-{location}" 文本
    ///
    /// # 返回
    /// 更新后的勾选状态
    pub fn toggle_granular_week(
        &self,
        dfu_code: &str,
        source: &str,
        target: &str,
        week_key: &str,
    ) -> ApiResult<bool> {
        let (dfu_code, source, target) = granular_identifiers(dfu_code, source, target)?;
        let week = parse_week_key(week_key)?;

        let mut session = self.write_session()?;
        ensure_variants(&session, dfu_code, &[source, target])?;
        Ok(session
            .pending_mut()
            .toggle_granular_week(dfu_code, source, target, week))
    }

    /// 按周转移: 设置自定义数量（None 恢复为该周全部数量）
    pub fn set_granular_quantity(
        &self,
        dfu_code: &str,
        source: &str,
        target: &str,
        week_key: &str,
        quantity: Option<f64>,
    ) -> ApiResult<()> {
        let (dfu_code, source, target) = granular_identifiers(dfu_code, source, target)?;
        let week = parse_week_key(week_key)?;
        if let Some(q) = quantity {
            if !q.is_finite() {
                return Err(ApiError::ValidationError(format!("转移数量无效: {}", q)));
            }
        }

        let mut session = self.write_session()?;
        ensure_variants(&session, dfu_code, &[source, target])?;
        session
            .pending_mut()
            .set_granular_quantity(dfu_code, source, target, week, quantity);
        Ok(())
    }

    pub fn get_pending(&self, dfu_code: &str) -> ApiResult<Option<PendingSelection>> {
        Ok(self.read_session()?.pending().get(dfu_code.trim()).cloned())
    }

    /// 清除 DFU 的待执行选择; 返回是否存在
    pub fn clear_pending(&self, dfu_code: &str) -> ApiResult<bool> {
        Ok(self
            .write_session()?
            .pending_mut()
            .clear(dfu_code.trim())
            .is_some())
    }

    /// 执行 DFU 的待执行选择
    pub fn execute_pending(&self, dfu_code: &str, user: &str) -> ApiResult<TransferResponse> {
        let dfu_code = require_identifier(dfu_code, "DFU")?;
        let selection = self
            .read_session()?
            .pending()
            .get(dfu_code)
            .and_then(PendingSelection::to_selection)
            .ok_or_else(|| ApiError::ValidationError(format!("DFU 没有待执行的转移选择: {}", dfu_code)))?;

        // 成功后 apply_transfer 清除待执行选择
        self.apply_transfer(dfu_code, &selection, user)
    }
}

fn granular_identifiers<'a>(
    dfu_code: &'a str,
    source: &'a str,
    target: &'a str,
) -> ApiResult<(&'a str, &'a str, &'a str)> {
    Ok((
        require_identifier(dfu_code, "DFU")?,
        require_identifier(source, "Product Number")?,
        require_identifier(target, "Product Number")?,
    ))
}

fn parse_week_key(raw: &str) -> ApiResult<WeekKey> {
    WeekKey::parse(raw)
        .ok_or_else(|| ApiError::ValidationError(format!("周桶键格式无效（应为 周次-来源地）: {}", raw)))
}

/// 校验 DFU 存在且给定变体都属于该 DFU
fn ensure_variants(session: &Session, dfu_code: &str, variants: &[&str]) -> ApiResult<()> {
    if !session.contains_dfu(dfu_code) {
        return Err(ApiError::NotFound(format!("DFU 不存在: {}", dfu_code)));
    }
    let known = session.dfu_variants(dfu_code);
    for variant in variants {
        if !known.contains(*variant) {
            return Err(ApiError::ValidationError(format!(
                "变体不属于 DFU: dfu={}, variant={}",
                dfu_code, variant
            )));
        }
    }
    Ok(())
}
