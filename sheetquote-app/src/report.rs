use std::fmt::Write;

use sheetquote_config::MaterialCatalog;
use sheetquote_engine::CostEstimate;
use sheetquote_engine::aggregate::DrawingSummary;

fn measure(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

pub fn summary_text(summary: &DrawingSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "图元总数：{}", summary.total_entities);
    if summary.skipped_entities > 0 {
        let _ = writeln!(out, "跳过的未支持实体：{}", summary.skipped_entities);
    }
    let _ = writeln!(out, "总周长：{:.2} mm", summary.total_perimeter);
    let _ = writeln!(out, "最大面积：{:.2} mm²", summary.largest_area);
    let _ = writeln!(out, "面积合计：{:.2} mm²", summary.total_area);
    out
}

pub fn analysis_text(summary: &DrawingSummary) -> String {
    let mut out = summary_text(summary);
    if summary.entity_details.is_empty() {
        return out;
    }
    out.push_str("图元明细：\n");
    for detail in &summary.entity_details {
        let _ = writeln!(
            out,
            "  #{:<3} {:<10} 图层={:<8} 闭合={} 周长={} 面积={}",
            detail.index,
            detail.dxf_type,
            detail.layer,
            if detail.closed { "是" } else { "否" },
            measure(detail.perimeter),
            measure(detail.area)
        );
    }
    out
}

pub fn quote_text(estimate: &CostEstimate) -> String {
    let cost = &estimate.cost;
    let mut out = summary_text(&estimate.summary);
    let _ = writeln!(
        out,
        "材料：{}（切割 {:.2}/m，板材 {:.2}/m²）",
        cost.material, cost.cut_cost_per_meter, cost.sheet_cost_per_square_meter
    );
    let _ = writeln!(out, "数量：{}", cost.quantity);
    let _ = writeln!(out, "切割费用：{:.2}", cost.cut_cost);
    let _ = writeln!(out, "材料费用：{:.2}", cost.material_cost);
    let _ = writeln!(out, "单件价格：{:.2}", cost.unit_cost);
    let _ = writeln!(out, "总价：{:.2}", cost.total_cost);
    let _ = writeln!(
        out,
        "折扣：{}%（-{:.2}）",
        cost.discount_percent, cost.discount_value
    );
    let _ = writeln!(out, "最终价格：{:.2}", cost.final_cost);
    out
}

pub fn materials_text(catalog: &MaterialCatalog) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {:>12} {:>14}  说明", "编码", "切割/m", "板材/m²");
    for rate in catalog.iter() {
        let _ = writeln!(
            out,
            "{:<10} {:>12.2} {:>14.2}  {}",
            rate.code, rate.cut_cost_per_meter, rate.sheet_cost_per_square_meter, rate.description
        );
    }
    out
}
