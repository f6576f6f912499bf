use serde::{Deserialize, Serialize};
use sheetquote_config::MaterialCatalog;
use tracing::debug;

use crate::aggregate::DrawingSummary;
use crate::discount::discount_percent;
use crate::errors::EngineError;

const MM_PER_METER: f64 = 1_000.0;
const MM2_PER_SQUARE_METER: f64 = 1_000_000.0;
const MARKUP_FACTOR: f64 = 2.0;

/// 报价明细。金额不做内部取整，由展示层格式化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub material: String,
    pub quantity: u64,
    pub cut_cost_per_meter: f64,
    pub sheet_cost_per_square_meter: f64,
    pub cut_cost: f64,
    pub material_cost: f64,
    pub unit_cost: f64,
    pub total_cost: f64,
    pub discount_percent: u32,
    pub discount_value: f64,
    pub final_cost: f64,
}

/// 基于材料表的报价计算。图纸长度单位固定按毫米处理。
#[derive(Debug, Clone, Copy)]
pub struct PricingEngine<'a> {
    catalog: &'a MaterialCatalog,
}

impl<'a> PricingEngine<'a> {
    pub fn new(catalog: &'a MaterialCatalog) -> Self {
        Self { catalog }
    }

    pub fn estimate_cost(
        &self,
        summary: &DrawingSummary,
        material: &str,
        quantity: i64,
    ) -> Result<CostBreakdown, EngineError> {
        let quantity = u64::try_from(quantity)
            .ok()
            .filter(|&q| q >= 1)
            .ok_or(EngineError::InvalidQuantity(quantity))?;
        let code = material.trim();
        let rate = self
            .catalog
            .get(code)
            .ok_or_else(|| EngineError::UnknownMaterial(code.to_string()))?;

        let cut_cost = (summary.total_perimeter / MM_PER_METER) * rate.cut_cost_per_meter;
        let material_cost =
            (summary.largest_area / MM2_PER_SQUARE_METER) * rate.sheet_cost_per_square_meter;
        let unit_cost = (cut_cost + material_cost) * MARKUP_FACTOR;
        let total_cost = unit_cost * quantity as f64;
        let discount_percent = discount_percent(quantity);
        let discount_value = total_cost * f64::from(discount_percent) / 100.0;
        let final_cost = total_cost - discount_value;

        debug!(
            material = code,
            quantity,
            unit_cost,
            discount_percent,
            final_cost,
            "报价计算完成"
        );

        Ok(CostBreakdown {
            material: rate.code.clone(),
            quantity,
            cut_cost_per_meter: rate.cut_cost_per_meter,
            sheet_cost_per_square_meter: rate.sheet_cost_per_square_meter,
            cut_cost,
            material_cost,
            unit_cost,
            total_cost,
            discount_percent,
            discount_value,
            final_cost,
        })
    }
}
