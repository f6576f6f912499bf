pub mod analysis;
pub mod outcome;
pub mod pricing;
pub mod render;

pub use analysis::{Analyzer, CostEstimate, DocumentSource};
pub use outcome::Outcome;

pub mod errors {
    use sheetquote_io::IoError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("failed to read drawing: {0}")]
        DocumentRead(#[from] IoError),
        #[error("unknown material code: {0}")]
        UnknownMaterial(String),
        #[error("quantity must be at least 1, got {0}")]
        InvalidQuantity(i64),
        #[error("entity #{index} ({dxf_type}) produced a non-finite {measure}")]
        GeometryComputation {
            index: usize,
            dxf_type: String,
            measure: &'static str,
        },
    }
}

pub mod extract {
    use sheetquote_core::document::{Document, EntityId};
    use sheetquote_core::shape::Shape;
    use tracing::debug;

    /// 已识别的图元及其来源信息。
    #[derive(Debug, Clone)]
    pub struct ExtractedShape {
        pub id: EntityId,
        pub dxf_type: String,
        pub layer: String,
        pub shape: Shape,
    }

    /// 一次提取的结果：按文件顺序排列的图元，以及被跳过的实体数量。
    #[derive(Debug, Clone, Default)]
    pub struct Extraction {
        pub shapes: Vec<ExtractedShape>,
        pub skipped: usize,
    }

    /// 遍历模型空间实体，保留四类可计算图元，其余实体只计数不报错。
    pub fn extract_shapes(document: &Document) -> Extraction {
        let mut extraction = Extraction::default();
        for (id, entity) in document.entities() {
            match Shape::classify(entity) {
                Some(shape) => extraction.shapes.push(ExtractedShape {
                    id,
                    dxf_type: entity.dxf_type().to_string(),
                    layer: entity.layer_name().to_string(),
                    shape,
                }),
                None => {
                    debug!(
                        id = id.get(),
                        dxf_type = entity.dxf_type(),
                        layer = entity.layer_name(),
                        "跳过未支持的实体"
                    );
                    extraction.skipped += 1;
                }
            }
        }
        extraction
    }

}

pub mod aggregate {
    use serde::{Deserialize, Serialize};
    use sheetquote_core::shape::{self, EntityKind};

    use crate::errors::EngineError;
    use crate::extract::Extraction;

    /// 单个图元的明细记录。`index` 为从 1 开始的序号。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct EntityDetail {
        pub index: usize,
        pub kind: EntityKind,
        pub dxf_type: String,
        pub layer: String,
        pub closed: bool,
        pub perimeter: Option<f64>,
        pub area: Option<f64>,
    }

    /// 图纸汇总。明细与汇总值在同一次遍历中得到，
    /// 始终满足 `total_entities == entity_details.len()`。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct DrawingSummary {
        pub total_entities: usize,
        pub total_perimeter: f64,
        pub largest_area: f64,
        pub total_area: f64,
        pub skipped_entities: usize,
        pub entity_details: Vec<EntityDetail>,
    }

    pub fn summarize(extraction: &Extraction) -> Result<DrawingSummary, EngineError> {
        let mut summary = DrawingSummary {
            skipped_entities: extraction.skipped,
            entity_details: Vec::with_capacity(extraction.shapes.len()),
            ..DrawingSummary::default()
        };

        for (position, extracted) in extraction.shapes.iter().enumerate() {
            let index = position + 1;
            let perimeter = shape::perimeter(&extracted.shape);
            let area = shape::area(&extracted.shape);
            for (measure, value) in [("perimeter", perimeter), ("area", area)] {
                if matches!(value, Some(v) if !v.is_finite()) {
                    return Err(EngineError::GeometryComputation {
                        index,
                        dxf_type: extracted.dxf_type.clone(),
                        measure,
                    });
                }
            }

            summary.total_perimeter += perimeter.unwrap_or(0.0);
            if let Some(area) = area {
                summary.total_area += area;
                summary.largest_area = summary.largest_area.max(area);
            }
            summary.entity_details.push(EntityDetail {
                index,
                kind: extracted.shape.kind(),
                dxf_type: extracted.dxf_type.clone(),
                layer: extracted.layer.clone(),
                closed: extracted.shape.is_closed(),
                perimeter,
                area,
            });
        }

        summary.total_entities = summary.entity_details.len();
        Ok(summary)
    }

    #[cfg(test)]
    mod tests {
        use std::f64::consts::PI;

        use sheetquote_core::document::Document;
        use sheetquote_core::geometry::Point2;

        use super::*;
        use crate::extract::extract_shapes;

        fn sample_document() -> Document {
            let mut document = Document::new();
            document.add_polyline(
                [
                    Point2::new(0.0, 0.0),
                    Point2::new(100.0, 0.0),
                    Point2::new(100.0, 100.0),
                    Point2::new(0.0, 100.0),
                ],
                true,
                "CUT",
            );
            document.add_unsupported("TEXT", "ANNOT");
            document.add_circle(Point2::new(50.0, 50.0), 10.0, "CUT");
            document.add_line(Point2::new(0.0, 0.0), Point2::new(3.0, 4.0), "CUT");
            document.add_arc(Point2::new(0.0, 0.0), 10.0, 0.0, 90.0, "CUT");
            document.add_unsupported("INSERT", "0");
            document
        }

        #[test]
        fn summary_counts_only_recognized_entities() {
            let summary = summarize(&extract_shapes(&sample_document())).expect("汇总失败");

            assert_eq!(summary.total_entities, 4);
            assert_eq!(summary.total_entities, summary.entity_details.len());
            assert_eq!(summary.skipped_entities, 2);

            let indices: Vec<usize> = summary.entity_details.iter().map(|d| d.index).collect();
            assert_eq!(indices, vec![1, 2, 3, 4]);
            let kinds: Vec<EntityKind> = summary.entity_details.iter().map(|d| d.kind).collect();
            assert_eq!(
                kinds,
                vec![
                    EntityKind::Polyline,
                    EntityKind::Circle,
                    EntityKind::Line,
                    EntityKind::Arc
                ]
            );
        }

        #[test]
        fn aggregates_match_per_entity_measures() {
            let summary = summarize(&extract_shapes(&sample_document())).expect("汇总失败");

            let expected_perimeter = 400.0 + 2.0 * PI * 10.0 + 5.0 + 5.0 * PI;
            assert!((summary.total_perimeter - expected_perimeter).abs() < 1e-9);
            assert!((summary.largest_area - 10_000.0).abs() < 1e-9);
            assert!((summary.total_area - (10_000.0 + PI * 100.0)).abs() < 1e-9);

            let line = &summary.entity_details[2];
            assert!(!line.closed);
            assert_eq!(line.area, None);
            let circle = &summary.entity_details[1];
            assert!(circle.closed);
            assert_eq!(circle.dxf_type, "CIRCLE");
        }

        #[test]
        fn largest_area_is_zero_without_closed_shapes() {
            let mut document = Document::new();
            document.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "0");
            document.add_polyline(
                [Point2::new(0.0, 0.0), Point2::new(0.0, 10.0)],
                false,
                "0",
            );

            let summary = summarize(&extract_shapes(&document)).expect("汇总失败");
            assert_eq!(summary.largest_area, 0.0);
            assert_eq!(summary.total_area, 0.0);
            assert!((summary.total_perimeter - 20.0).abs() < 1e-12);
        }

        #[test]
        fn empty_document_yields_empty_summary() {
            let summary = summarize(&extract_shapes(&Document::new())).expect("汇总失败");
            assert_eq!(summary, DrawingSummary::default());
        }

        #[test]
        fn non_finite_measure_is_reported() {
            let mut document = Document::new();
            document.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), "0");
            document.add_circle(Point2::new(0.0, 0.0), f64::NAN, "0");

            match summarize(&extract_shapes(&document)) {
                Err(EngineError::GeometryComputation {
                    index,
                    dxf_type,
                    measure,
                }) => {
                    assert_eq!(index, 2);
                    assert_eq!(dxf_type, "CIRCLE");
                    assert_eq!(measure, "perimeter");
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }
}

pub mod discount {
    /// 数量折扣档位：数量不小于 `min_quantity` 时享受 `percent` 折扣。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DiscountTier {
        pub min_quantity: u64,
        pub percent: u32,
    }

    /// 按门槛降序排列，首个满足的档位生效。
    pub const DISCOUNT_TIERS: [DiscountTier; 6] = [
        DiscountTier {
            min_quantity: 1000,
            percent: 60,
        },
        DiscountTier {
            min_quantity: 500,
            percent: 50,
        },
        DiscountTier {
            min_quantity: 250,
            percent: 40,
        },
        DiscountTier {
            min_quantity: 100,
            percent: 30,
        },
        DiscountTier {
            min_quantity: 50,
            percent: 20,
        },
        DiscountTier {
            min_quantity: 10,
            percent: 10,
        },
    ];

    pub fn discount_percent(quantity: u64) -> u32 {
        DISCOUNT_TIERS
            .iter()
            .find(|tier| quantity >= tier.min_quantity)
            .map_or(0, |tier| tier.percent)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn boundaries_map_to_exact_tiers() {
            let quantities = [9, 10, 49, 50, 99, 100, 249, 250, 499, 500, 999, 1000];
            let expected = [0, 10, 10, 20, 20, 30, 30, 40, 40, 50, 50, 60];
            for (quantity, percent) in quantities.into_iter().zip(expected) {
                assert_eq!(discount_percent(quantity), percent, "quantity = {quantity}");
            }
        }

        #[test]
        fn schedule_is_monotonic() {
            let mut previous = discount_percent(0);
            for quantity in 1..=2_000 {
                let current = discount_percent(quantity);
                assert!(current >= previous, "quantity = {quantity}");
                previous = current;
            }
            assert_eq!(discount_percent(u64::MAX), 60);
        }

        #[test]
        fn tiers_are_sorted_descending() {
            assert!(
                DISCOUNT_TIERS
                    .windows(2)
                    .all(|pair| pair[0].min_quantity > pair[1].min_quantity)
            );
        }
    }
}
