pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，全部计算使用双精度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        /// 两点间的欧氏距离。
        #[inline]
        pub fn distance_to(self, other: Point2) -> f64 {
            self.vector_to(other).length()
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }
    }

    /// 轴对齐边界框，供外部渲染器确定绘制范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        #[inline]
        pub fn width(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.x() - self.min.x()
            }
        }

        #[inline]
        pub fn height(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.y() - self.min.y()
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn bounds_grow_with_points() {
            let mut bounds = Bounds2D::empty();
            assert!(bounds.is_empty());
            assert_eq!(bounds.width(), 0.0);

            bounds.include_point(Point2::new(2.0, -1.0));
            assert!(!bounds.is_empty());
            assert_eq!(bounds.width(), 0.0);

            bounds.include_point(Point2::new(-3.0, 4.0));
            assert_eq!(bounds.min(), Point2::new(-3.0, -1.0));
            assert_eq!(bounds.max(), Point2::new(2.0, 4.0));
            assert_eq!(bounds.width(), 5.0);
            assert_eq!(bounds.height(), 5.0);
        }

        #[test]
        fn distance_and_finiteness() {
            let a = Point2::new(0.0, 0.0);
            let b = Point2::new(3.0, 4.0);
            assert_eq!(a.distance_to(b), 5.0);
            assert_eq!(a.vector_to(b), Vector2::new(3.0, 4.0));
            assert!(b.is_finite());
            assert!(!Point2::new(f64::NAN, 0.0).is_finite());
        }
    }
}

pub mod document {
    use std::collections::BTreeSet;

    use serde::{Deserialize, Serialize};

    use crate::geometry::Point2;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 模型空间中的原始实体。只有四类几何图元被完整解析，其余类型仅保留名称。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Polyline(Polyline),
        Unsupported(UnsupportedEntity),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Circle(circle) => &circle.layer,
                Entity::Arc(arc) => &arc.layer,
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::Unsupported(other) => &other.layer,
            }
        }

        /// DXF 中的实体类型名，例如 `LWPOLYLINE`。
        pub fn dxf_type(&self) -> &str {
            match self {
                Entity::Line(_) => "LINE",
                Entity::Circle(_) => "CIRCLE",
                Entity::Arc(_) => "ARC",
                Entity::Polyline(polyline) => polyline.flavor.dxf_type(),
                Entity::Unsupported(other) => &other.kind,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub layer: String,
    }

    /// 圆弧实体，角度以度为单位保存（与 DXF 文件一致）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub layer: String,
    }

    /// 多段线来源：`LWPOLYLINE` 或经典 2D `POLYLINE`。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum PolylineFlavor {
        Lightweight,
        Classic,
    }

    impl PolylineFlavor {
        pub fn dxf_type(self) -> &'static str {
            match self {
                PolylineFlavor::Lightweight => "LWPOLYLINE",
                PolylineFlavor::Classic => "POLYLINE",
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
        pub flavor: PolylineFlavor,
        pub layer: String,
    }

    impl Polyline {
        pub fn points(&self) -> impl Iterator<Item = Point2> + '_ {
            self.vertices.iter().map(|vertex| vertex.position)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    /// 未识别的实体类型，仅记录类型名与图层。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UnsupportedEntity {
        pub kind: String,
        pub layer: String,
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
        layers: BTreeSet<String>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer("0");
            doc
        }

        /// 头段中的 `$ACADVER`，例如 `AC1015`。
        pub fn version(&self) -> Option<&str> {
            self.version.as_deref()
        }

        pub fn set_version(&mut self, version: impl Into<String>) {
            self.version = Some(version.into());
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            if !self.layers.contains(key) {
                self.layers.insert(key.to_string());
            }
        }

        pub fn layers(&self) -> impl Iterator<Item = &str> {
            self.layers.iter().map(String::as_str)
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            self.ensure_layer(entity.layer_name());
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        pub fn add_line(&mut self, start: Point2, end: Point2, layer: impl Into<String>) -> EntityId {
            let layer = layer.into();
            self.add_entity(Entity::Line(Line { start, end, layer }))
        }

        pub fn add_circle(
            &mut self,
            center: Point2,
            radius: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.add_entity(Entity::Circle(Circle {
                center,
                radius,
                layer,
            }))
        }

        /// 添加圆弧，角度单位为度。
        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.add_entity(Entity::Arc(Arc {
                center,
                radius,
                start_angle,
                end_angle,
                layer,
            }))
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            let collected = vertices
                .into_iter()
                .map(PolylineVertex::new)
                .collect::<Vec<_>>();
            self.add_polyline_with_vertices(collected, is_closed, PolylineFlavor::Lightweight, layer)
        }

        pub fn add_polyline_with_vertices<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            flavor: PolylineFlavor,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            let layer = layer.into();
            self.add_entity(Entity::Polyline(Polyline {
                vertices: vertices.into_iter().collect(),
                is_closed,
                flavor,
                layer,
            }))
        }

        pub fn add_unsupported(
            &mut self,
            kind: impl Into<String>,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Unsupported(UnsupportedEntity {
                kind: kind.into(),
                layer: layer.into(),
            }))
        }

        pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
            self.entities.iter().map(|(id, entity)| (*id, entity))
        }

        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find(|(candidate, _)| *candidate == id)
                .map(|(_, entity)| entity)
        }

        pub fn entity_count(&self) -> usize {
            self.entities.len()
        }

        fn next_id(&mut self) -> EntityId {
            let id = EntityId::new(self.next_entity_id);
            self.next_entity_id += 1;
            id
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn document_stores_entities_in_order() {
            let mut doc = Document::new();
            let line = doc.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "0");
            let circle = doc.add_circle(Point2::new(5.0, 5.0), 2.0, "CUT");
            let arc = doc.add_arc(Point2::new(5.0, 0.0), 3.5, 0.0, 90.0, "CUT");
            let text = doc.add_unsupported("TEXT", "ANNOT");

            assert_eq!(line.get(), 0);
            assert_eq!(circle.get(), 1);
            assert_eq!(arc.get(), 2);
            assert_eq!(text.get(), 3);
            assert_eq!(doc.entity_count(), 4);

            let layers: Vec<_> = doc.layers().collect();
            assert_eq!(layers, vec!["0", "ANNOT", "CUT"]);

            match doc.entity(arc) {
                Some(Entity::Arc(arc)) => {
                    assert_eq!(arc.layer, "CUT");
                    assert!((arc.end_angle - 90.0).abs() < f64::EPSILON);
                }
                other => panic!("unexpected entity lookup result: {other:?}"),
            }
            assert_eq!(doc.entity(text).map(Entity::dxf_type), Some("TEXT"));
        }

        #[test]
        fn polyline_flavor_reports_dxf_type() {
            let mut doc = Document::new();
            let id = doc.add_polyline_with_vertices(
                [
                    PolylineVertex::new(Point2::new(0.0, 0.0)),
                    PolylineVertex::with_bulge(Point2::new(1.0, 0.0), 0.5),
                ],
                false,
                PolylineFlavor::Classic,
                "0",
            );
            assert_eq!(doc.entity(id).map(Entity::dxf_type), Some("POLYLINE"));
        }
    }
}

pub mod shape {
    use std::f64::consts::{PI, TAU};
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use crate::document::Entity;
    use crate::geometry::Point2;

    /// 参与计算的四类图元。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum EntityKind {
        Line,
        Polyline,
        Circle,
        Arc,
    }

    impl EntityKind {
        pub fn as_str(self) -> &'static str {
            match self {
                EntityKind::Line => "line",
                EntityKind::Polyline => "polyline",
                EntityKind::Circle => "circle",
                EntityKind::Arc => "arc",
            }
        }
    }

    impl fmt::Display for EntityKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// 归一化后的图元记录。角度单位为度，长度单位沿用图纸单位（默认毫米）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "lowercase")]
    pub enum Shape {
        Line {
            start: Point2,
            end: Point2,
        },
        Polyline {
            points: Vec<Point2>,
            closed: bool,
        },
        Circle {
            center: Point2,
            radius: f64,
        },
        Arc {
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
        },
    }

    impl Shape {
        /// 将原始实体归类；不在四类之内的实体返回 `None`。
        pub fn classify(entity: &Entity) -> Option<Shape> {
            match entity {
                Entity::Line(line) => Some(Shape::Line {
                    start: line.start,
                    end: line.end,
                }),
                Entity::Circle(circle) => Some(Shape::Circle {
                    center: circle.center,
                    radius: circle.radius,
                }),
                Entity::Arc(arc) => Some(Shape::Arc {
                    center: arc.center,
                    radius: arc.radius,
                    start_angle: arc.start_angle,
                    end_angle: arc.end_angle,
                }),
                Entity::Polyline(polyline) => Some(Shape::Polyline {
                    points: polyline.points().collect(),
                    closed: polyline.is_closed,
                }),
                Entity::Unsupported(_) => None,
            }
        }

        pub fn kind(&self) -> EntityKind {
            match self {
                Shape::Line { .. } => EntityKind::Line,
                Shape::Polyline { .. } => EntityKind::Polyline,
                Shape::Circle { .. } => EntityKind::Circle,
                Shape::Arc { .. } => EntityKind::Arc,
            }
        }

        /// 圆恒为闭合；多段线取决于闭合标志；直线与圆弧恒为开放。
        pub fn is_closed(&self) -> bool {
            match self {
                Shape::Circle { .. } => true,
                Shape::Polyline { closed, .. } => *closed,
                Shape::Line { .. } | Shape::Arc { .. } => false,
            }
        }
    }

    /// 图元周长。开放与闭合多段线都计算周长，闭合时额外计入末点到首点的线段。
    pub fn perimeter(shape: &Shape) -> Option<f64> {
        match shape {
            Shape::Line { start, end } => Some(start.distance_to(*end)),
            Shape::Polyline { points, closed } => {
                let mut total: f64 = points
                    .windows(2)
                    .map(|pair| pair[0].distance_to(pair[1]))
                    .sum();
                if *closed {
                    if let (Some(first), Some(last)) = (points.first(), points.last()) {
                        total += last.distance_to(*first);
                    }
                }
                Some(total)
            }
            Shape::Circle { radius, .. } => Some(TAU * radius),
            Shape::Arc {
                radius,
                start_angle,
                end_angle,
                ..
            } => Some(arc_length(*radius, *start_angle, *end_angle)),
        }
    }

    /// 封闭面积：闭合多段线使用鞋带公式，圆为 πr²，其余为 `None`。
    pub fn area(shape: &Shape) -> Option<f64> {
        match shape {
            Shape::Polyline {
                points,
                closed: true,
            } => Some(shoelace_area(points)),
            Shape::Circle { radius, .. } => Some(PI * radius * radius),
            Shape::Polyline { closed: false, .. } | Shape::Line { .. } | Shape::Arc { .. } => None,
        }
    }

    /// 扫掠角取 `|end - start|`，不做 0°/360° 环绕修正。
    pub fn arc_length(radius: f64, start_angle: f64, end_angle: f64) -> f64 {
        let sweep = (end_angle - start_angle).abs();
        (sweep / 360.0) * TAU * radius
    }

    /// 循环点序列的鞋带公式，结果取绝对值，与遍历方向无关。
    pub fn shoelace_area(points: &[Point2]) -> f64 {
        let count = points.len();
        let mut twice_area = 0.0;
        for (i, current) in points.iter().enumerate() {
            let next = points[(i + 1) % count];
            twice_area += current.x() * next.y() - current.y() * next.x();
        }
        twice_area.abs() / 2.0
    }

}
