// ==========================================
// DFU 需求转移系统 - 命令行入口
// ==========================================
// 用法:
//   dfu-demand-transfer <command> [args...]
//
// 数据库路径取 DFU_TRANSFER_DB_PATH,否则使用用户数据目录
// 操作人取 DFU_TRANSFER_USER,否则使用配置中的默认操作人
// DFU_TRANSFER_LOG_FORMAT=json 时以 JSON 行输出日志
// ==========================================

use anyhow::{bail, Context, Result};
use dfu_demand_transfer::app::{get_default_db_path, AppState};
use dfu_demand_transfer::domain::supplementary::SupplementaryKind;
use dfu_demand_transfer::{AggregationFilter, TransferSelection};

const USAGE: &str = "\
用法: dfu-demand-transfer <command> [args...]

命令:
  import <file>                          上传需求文件（CSV / Excel）
  import-supplementary <kind> <file>     上传补充数据（stock_on_hand / open_supply / in_transit / lifecycle）
  summary [plant] [line]                 打印 DFU 聚合视图
  transfer-bulk <dfu> <target>           整体转移
  add-variant <dfu> <variant>            新增零需求变体
  undo <dfu>                             撤销转移
  export <file>                          导出当前记录为 CSV
  history [limit]                        最近操作日志
  reset                                  清空会话";

fn main() -> Result<()> {
    match std::env::var("DFU_TRANSFER_LOG_FORMAT").as_deref() {
        Ok("json") => dfu_demand_transfer::logging::init_json(),
        _ => dfu_demand_transfer::logging::init(),
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let db_path = get_default_db_path();
    let state = AppState::new(db_path.clone())
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("无法初始化AppState: {}", db_path))?;
    let api = &state.transfer_api;
    let user = std::env::var("DFU_TRANSFER_USER").unwrap_or_default();

    match (command.as_str(), &args[1..]) {
        ("import", [file]) => {
            let response = api.upload_file(file, &user)?;
            println!("{}", serde_json::to_string_pretty(&response.summary)?);
        }
        ("import-supplementary", [kind, file]) => {
            let kind: SupplementaryKind = kind.parse().map_err(anyhow::Error::msg)?;
            let response = api.upload_supplementary_file(kind, file, &user)?;
            println!(
                "{}: {} product(s) from {} row(s), {} skipped, {} invalid",
                response.kind,
                response.products,
                response.rows,
                response.skipped_rows,
                response.invalid_values
            );
        }
        ("summary", rest) if rest.len() <= 2 => {
            let filter = AggregationFilter::new(
                rest.first().map(String::as_str),
                rest.get(1).map(String::as_str),
            );
            let aggregates = api.get_aggregates(&filter)?;
            for (dfu_code, aggregate) in &aggregates.dfus {
                let marker = if aggregate.completed { "*" } else { " " };
                println!(
                    "{} {:<16} total={:<12} variants={}",
                    marker,
                    dfu_code,
                    aggregate.total_demand(),
                    aggregate.variants.iter().cloned().collect::<Vec<_>>().join(",")
                );
            }
            println!(
                "{} DFU(s), {} completed",
                aggregates.dfus.len(),
                aggregates.completed_count()
            );
        }
        ("transfer-bulk", [dfu_code, target]) => {
            let selection = TransferSelection::Bulk {
                target: target.clone(),
            };
            let response = api.apply_transfer(dfu_code, &selection, &user)?;
            println!("{}", response.summary);
        }
        ("add-variant", [dfu_code, variant]) => {
            let response = api.add_variant(dfu_code, variant, &user)?;
            println!("{} record(s) added", response.records_added);
        }
        ("undo", [dfu_code]) => {
            let response = api.undo_transfer(dfu_code, &user)?;
            println!("{} record(s) restored", response.restored_records);
        }
        ("export", [file]) => {
            let count = api.export_csv(file)?;
            println!("{} record(s) exported to {}", count, file);
        }
        ("history", rest) if rest.len() <= 1 => {
            let limit = match rest.first() {
                Some(raw) => raw.parse().with_context(|| format!("无效的条数: {}", raw))?,
                None => 20,
            };
            for log in api.recent_actions(limit)? {
                println!(
                    "{} {:<20} {:<12} {}",
                    log.action_ts.format("%Y-%m-%d %H:%M:%S"),
                    log.action_type,
                    log.actor,
                    log.detail.unwrap_or_default()
                );
            }
        }
        ("reset", []) => {
            api.reset(&user)?;
            println!("session cleared");
        }
        _ => bail!("无法识别的命令: {}\n\n{}", args.join(" "), USAGE),
    }

    Ok(())
}
