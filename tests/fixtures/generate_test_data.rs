// ==========================================
// 测试数据生成器
// ==========================================
// 用途: 生成需求与补充数据 CSV 文件（手工联调 / 性能观察）
// 输出: tests/fixtures/datasets/*.csv
// ==========================================

use chrono::{Duration, Local};
use csv::Writer;
use std::error::Error;
use std::fs::{self, File};

const OUTPUT_DIR: &str = "tests/fixtures/datasets";

// CSV 表头（固定列名）
const DEMAND_HEADER: &[&str] = &[
    "DFU",
    "Product Number",
    "weekly fcst",
    "PartDescription",
    "Production Plant",
    "Production Line",
    "Week Number",
    "Source Location",
];

const PLANTS: [&str; 3] = ["P100", "P200", "P300"];
const LINES: [&str; 4] = ["L1", "L2", "L3", "L4"];
const LOCATIONS: [&str; 2] = ["DC-EAST", "DC-WEST"];

// 需求记录结构
#[derive(Clone)]
struct DemandRow {
    dfu: String,
    product_number: String,
    weekly_fcst: String,
    description: String,
    plant: String,
    line: String,
    week_number: String,
    source_location: String,
}

impl DemandRow {
    fn to_row(&self) -> Vec<String> {
        vec![
            self.dfu.clone(),
            self.product_number.clone(),
            self.weekly_fcst.clone(),
            self.description.clone(),
            self.plant.clone(),
            self.line.clone(),
            self.week_number.clone(),
            self.source_location.clone(),
        ]
    }
}

// 生成一个 DFU 的全部记录: 变体 × 周 × 来源地
fn generate_dfu_rows(dfu_index: usize, variants: usize, weeks: usize) -> Vec<DemandRow> {
    let dfu = format!("DFU{:05}", dfu_index + 1);
    let plant = PLANTS[dfu_index % PLANTS.len()];
    let line = LINES[dfu_index % LINES.len()];

    let mut rows = Vec::with_capacity(variants * weeks * LOCATIONS.len());
    for v in 0..variants {
        let product_number = format!("{}-V{}", dfu, v + 1);
        for week in 1..=weeks {
            for (l, location) in LOCATIONS.iter().enumerate() {
                let fcst = ((dfu_index * 7 + v * 13 + week * 3 + l) % 120) as f64;
                rows.push(DemandRow {
                    dfu: dfu.clone(),
                    product_number: product_number.clone(),
                    weekly_fcst: format!("{:.0}", fcst),
                    description: format!("Variant {} of {}", v + 1, dfu),
                    plant: plant.to_string(),
                    line: line.to_string(),
                    week_number: week.to_string(),
                    source_location: location.to_string(),
                });
            }
        }
    }
    rows
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("开始生成测试数据集...");
    fs::create_dir_all(OUTPUT_DIR)?;

    // 1. 小数据集 (20 个 DFU)
    generate_demand("01_small_demand.csv", 20, 3, 4)?;

    // 2. 大数据集 (500 个 DFU)
    generate_demand("02_large_demand.csv", 500, 4, 12)?;

    // 3. 脏数据（空 DFU、无效数量、千分位）
    generate_dirty_demand()?;

    // 4. 补充数据
    generate_supplementary()?;

    println!("✓ 所有测试数据集生成完成！");
    Ok(())
}

fn generate_demand(
    file_name: &str,
    dfus: usize,
    variants: usize,
    weeks: usize,
) -> Result<(), Box<dyn Error>> {
    let path = format!("{}/{}", OUTPUT_DIR, file_name);
    let mut wtr = Writer::from_writer(File::create(&path)?);
    wtr.write_record(DEMAND_HEADER)?;

    let mut count = 0;
    for i in 0..dfus {
        for row in generate_dfu_rows(i, variants, weeks) {
            wtr.write_record(&row.to_row())?;
            count += 1;
        }
    }

    wtr.flush()?;
    println!("✓ 生成 {} ({}条)", file_name, count);
    Ok(())
}

fn generate_dirty_demand() -> Result<(), Box<dyn Error>> {
    let file_name = "03_dirty_demand.csv";
    let path = format!("{}/{}", OUTPUT_DIR, file_name);
    let mut wtr = Writer::from_writer(File::create(&path)?);
    wtr.write_record(DEMAND_HEADER)?;

    let mut rows = generate_dfu_rows(0, 2, 3);
    rows[0].weekly_fcst = "1,250".to_string();
    rows[1].weekly_fcst = "n/a".to_string();
    rows[2].weekly_fcst = String::new();
    rows[3].dfu = String::new();
    let count = rows.len();
    for row in rows {
        wtr.write_record(&row.to_row())?;
    }

    wtr.flush()?;
    println!("✓ 生成 {} ({}条，包含脏数据)", file_name, count);
    Ok(())
}

fn generate_supplementary() -> Result<(), Box<dyn Error>> {
    let today = Local::now().date_naive();
    let products: Vec<String> = (0..20)
        .flat_map(|d| (0..3).map(move |v| format!("DFU{:05}-V{}", d + 1, v + 1)))
        .collect();

    for (file_name, column) in [
        ("04_stock_on_hand.csv", "Stock On Hand"),
        ("05_open_supply.csv", "Open Supply"),
        ("06_in_transit.csv", "In Transit"),
    ] {
        let mut wtr = Writer::from_writer(File::create(format!("{}/{}", OUTPUT_DIR, file_name))?);
        wtr.write_record(["Product Number", column])?;
        for (i, product) in products.iter().enumerate() {
            wtr.write_record([product.clone(), ((i * 17) % 300).to_string()])?;
        }
        wtr.flush()?;
        println!("✓ 生成 {} ({}条)", file_name, products.len());
    }

    let file_name = "07_lifecycle.csv";
    let mut wtr = Writer::from_writer(File::create(format!("{}/{}", OUTPUT_DIR, file_name))?);
    wtr.write_record(["Product Number", "SOS Date", "EOS Date"])?;
    for (i, product) in products.iter().enumerate() {
        let sos = today - Duration::days(30 + i as i64);
        // 每 4 个变体有一个没有停止日期
        let eos = if i % 4 == 0 {
            String::new()
        } else {
            (today + Duration::days(90 + (i as i64) * 7)).to_string()
        };
        wtr.write_record([product.clone(), sos.to_string(), eos])?;
    }
    wtr.flush()?;
    println!("✓ 生成 {} ({}条)", file_name, products.len());
    Ok(())
}
