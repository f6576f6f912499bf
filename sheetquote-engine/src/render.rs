use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use sheetquote_core::geometry::{Bounds2D, Point2};
use sheetquote_core::shape::{EntityKind, Shape};

use crate::errors::EngineError;
use crate::extract::{ExtractedShape, Extraction};

const MIN_ARC_SEGMENTS: usize = 2;
const MIN_CIRCLE_SEGMENTS: usize = 8;

/// 供外部绘图器使用的折线图元。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawPrimitive {
    pub kind: EntityKind,
    pub layer: String,
    pub closed: bool,
    pub points: Vec<Point2>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedDrawing {
    pub primitives: Vec<DrawPrimitive>,
    pub bounds: Option<Bounds2D>,
}

/// 曲线离散化参数。
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub segments_per_circle: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            segments_per_circle: 64,
        }
    }
}

impl RenderOptions {
    fn circle_segments(&self) -> usize {
        self.segments_per_circle.max(MIN_CIRCLE_SEGMENTS)
    }
}

pub fn render_shapes(
    extraction: &Extraction,
    options: &RenderOptions,
) -> Result<RenderedDrawing, EngineError> {
    let primitives = extraction
        .shapes
        .iter()
        .enumerate()
        .map(|(position, extracted)| to_primitive(position + 1, extracted, options))
        .collect::<Result<Vec<_>, _>>()?;

    let mut bounds = Bounds2D::empty();
    for point in primitives.iter().flat_map(|primitive| primitive.points.iter()) {
        bounds.include_point(*point);
    }

    Ok(RenderedDrawing {
        bounds: if bounds.is_empty() { None } else { Some(bounds) },
        primitives,
    })
}

/// 坐标、半径与角度都必须是有限值，否则无法离散化。
fn has_finite_inputs(shape: &Shape) -> bool {
    match shape {
        Shape::Line { start, end } => start.is_finite() && end.is_finite(),
        Shape::Polyline { points, .. } => points.iter().all(|point| point.is_finite()),
        Shape::Circle { center, radius } => center.is_finite() && radius.is_finite(),
        Shape::Arc {
            center,
            radius,
            start_angle,
            end_angle,
        } => {
            center.is_finite()
                && radius.is_finite()
                && start_angle.is_finite()
                && end_angle.is_finite()
        }
    }
}

/// 逆时针扫掠角，归一到 (0, 360]；起止角相同视为整圆。
fn arc_sweep(start_angle: f64, end_angle: f64) -> f64 {
    let sweep = (end_angle - start_angle).rem_euclid(360.0);
    if sweep == 0.0 { 360.0 } else { sweep }
}

fn to_primitive(
    index: usize,
    extracted: &ExtractedShape,
    options: &RenderOptions,
) -> Result<DrawPrimitive, EngineError> {
    if !has_finite_inputs(&extracted.shape) {
        return Err(EngineError::GeometryComputation {
            index,
            dxf_type: extracted.dxf_type.clone(),
            measure: "render outline",
        });
    }

    let points = match &extracted.shape {
        Shape::Line { start, end } => vec![*start, *end],
        Shape::Polyline { points, closed } => {
            let mut outline = points.clone();
            if *closed {
                outline.extend(points.first().copied());
            }
            outline
        }
        Shape::Circle { center, radius } => {
            sample_arc(*center, *radius, 0.0, TAU, options.circle_segments())
        }
        Shape::Arc {
            center,
            radius,
            start_angle,
            end_angle,
        } => {
            let circle_segments = options.circle_segments();
            let sweep = arc_sweep(*start_angle, *end_angle);
            let segments = ((circle_segments as f64) * sweep / 360.0).ceil() as usize;
            sample_arc(
                *center,
                *radius,
                start_angle.to_radians(),
                sweep.to_radians(),
                segments.clamp(MIN_ARC_SEGMENTS, circle_segments),
            )
        }
    };

    Ok(DrawPrimitive {
        kind: extracted.shape.kind(),
        layer: extracted.layer.clone(),
        closed: extracted.shape.is_closed(),
        points,
    })
}

/// 逆时针采样 `segments + 1` 个点，首尾分别位于起止角。
fn sample_arc(center: Point2, radius: f64, start: f64, sweep: f64, segments: usize) -> Vec<Point2> {
    (0..=segments)
        .map(|step| {
            let angle = start + sweep * (step as f64) / (segments as f64);
            Point2::new(
                center.x() + radius * angle.cos(),
                center.y() + radius * angle.sin(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use sheetquote_core::document::Document;

    use super::*;
    use crate::extract::extract_shapes;

    fn try_render(
        document: &Document,
        segments_per_circle: usize,
    ) -> Result<RenderedDrawing, EngineError> {
        render_shapes(
            &extract_shapes(document),
            &RenderOptions {
                segments_per_circle,
            },
        )
    }

    fn render(document: &Document, segments_per_circle: usize) -> RenderedDrawing {
        try_render(document, segments_per_circle).expect("渲染失败")
    }

    #[test]
    fn closed_polyline_repeats_first_vertex() {
        let mut document = Document::new();
        document.add_polyline(
            [
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 5.0),
            ],
            true,
            "CUT",
        );
        document.add_line(Point2::new(-2.0, -1.0), Point2::new(3.0, 4.0), "CUT");

        let drawing = render(&document, 32);
        assert_eq!(drawing.primitives.len(), 2);
        let outline = &drawing.primitives[0];
        assert!(outline.closed);
        assert_eq!(outline.points.len(), 4);
        assert_eq!(outline.points[0], outline.points[3]);
        assert_eq!(drawing.primitives[1].points.len(), 2);

        let bounds = drawing.bounds.expect("应有包围盒");
        assert_eq!(bounds.min(), Point2::new(-2.0, -1.0));
        assert_eq!(bounds.max(), Point2::new(10.0, 5.0));
    }

    #[test]
    fn circle_is_sampled_all_the_way_around() {
        let mut document = Document::new();
        document.add_circle(Point2::new(1.0, 1.0), 2.0, "HOLES");

        let drawing = render(&document, 16);
        let circle = &drawing.primitives[0];
        assert_eq!(circle.kind, EntityKind::Circle);
        assert_eq!(circle.points.len(), 17);
        let first = circle.points[0];
        let last = circle.points[16];
        assert!((first.x() - 3.0).abs() < 1e-12);
        assert!(first.distance_to(last) < 1e-9);
        for point in &circle.points {
            assert!((point.distance_to(Point2::new(1.0, 1.0)) - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn arc_crossing_zero_runs_counter_clockwise() {
        let mut document = Document::new();
        document.add_arc(Point2::new(0.0, 0.0), 1.0, 270.0, 90.0, "0");

        let drawing = render(&document, 64);
        let arc = &drawing.primitives[0];
        assert_eq!(arc.points.len(), 33);
        let first = arc.points[0];
        let middle = arc.points[16];
        let last = arc.points[32];
        assert!((first.y() + 1.0).abs() < 1e-9);
        assert!((middle.x() - 1.0).abs() < 1e-9, "中点应位于 0°");
        assert!((last.y() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tiny_arc_keeps_minimum_segments() {
        let mut document = Document::new();
        document.add_arc(Point2::new(0.0, 0.0), 5.0, 10.0, 11.0, "0");

        let drawing = render(&document, 64);
        assert_eq!(drawing.primitives[0].points.len(), MIN_ARC_SEGMENTS + 1);
    }

    #[test]
    fn empty_document_has_no_bounds() {
        let mut document = Document::new();
        document.add_unsupported("TEXT", "0");
        let drawing = render(&document, 64);
        assert!(drawing.primitives.is_empty());
        assert!(drawing.bounds.is_none());
    }

    #[test]
    fn non_finite_arc_angle_is_rejected() {
        let mut document = Document::new();
        document.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "0");
        document.add_arc(Point2::new(0.0, 0.0), 1.0, 0.0, f64::INFINITY, "CUT");

        match try_render(&document, 64) {
            Err(EngineError::GeometryComputation {
                index, dxf_type, ..
            }) => {
                assert_eq!(index, 2);
                assert_eq!(dxf_type, "ARC");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn non_finite_circle_radius_is_rejected() {
        let mut document = Document::new();
        document.add_circle(Point2::new(0.0, 0.0), f64::NAN, "HOLES");
        assert!(matches!(
            try_render(&document, 64),
            Err(EngineError::GeometryComputation { index: 1, .. })
        ));
    }

    #[test]
    fn huge_arc_angle_is_bounded_by_one_turn() {
        let mut document = Document::new();
        document.add_arc(Point2::new(0.0, 0.0), 2.0, 0.0, 1e10, "0");

        let drawing = render(&document, 64);
        let arc = &drawing.primitives[0];
        assert!(arc.points.len() <= 65, "点数 = {}", arc.points.len());
        assert!(arc.points.len() >= MIN_ARC_SEGMENTS + 1);
        for point in &arc.points {
            assert!(point.is_finite());
            assert!((point.distance_to(Point2::new(0.0, 0.0)) - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn multi_turn_sweep_wraps_into_one_turn() {
        assert_eq!(arc_sweep(10.0, 10.0), 360.0);
        assert_eq!(arc_sweep(270.0, 90.0), 180.0);
        assert_eq!(arc_sweep(0.0, 450.0), 90.0);
        assert_eq!(arc_sweep(0.0, -90.0), 270.0);
    }
}
