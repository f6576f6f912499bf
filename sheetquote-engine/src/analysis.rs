use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sheetquote_config::MaterialCatalog;
use sheetquote_core::document::Document;
use sheetquote_io::{DocumentLoader, DxfFacade};
use tracing::{info, warn};

use crate::aggregate::{DrawingSummary, summarize};
use crate::errors::EngineError;
use crate::extract::{Extraction, extract_shapes};
use crate::outcome::Outcome;
use crate::pricing::{CostBreakdown, PricingEngine};
use crate::render::{RenderOptions, RenderedDrawing, render_shapes};

/// 图纸来源：磁盘路径或内存中的字节。
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl DocumentSource {
    fn describe(&self) -> String {
        match self {
            DocumentSource::Path(path) => path.display().to_string(),
            DocumentSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub summary: DrawingSummary,
    pub cost: CostBreakdown,
}

/// 顶层入口。每个操作独立完成“读取 → 提取 → 汇总/报价/渲染”，
/// 任何错误都在此处转换为 `Outcome::Failure`。
pub struct Analyzer<'a, L = DxfFacade> {
    loader: L,
    catalog: &'a MaterialCatalog,
    render_options: RenderOptions,
}

impl<'a> Analyzer<'a, DxfFacade> {
    pub fn new(catalog: &'a MaterialCatalog) -> Self {
        Self::with_loader(DxfFacade::new(), catalog)
    }
}

impl<'a, L: DocumentLoader> Analyzer<'a, L> {
    pub fn with_loader(loader: L, catalog: &'a MaterialCatalog) -> Self {
        Self {
            loader,
            catalog,
            render_options: RenderOptions::default(),
        }
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    pub fn catalog(&self) -> &MaterialCatalog {
        self.catalog
    }

    pub fn analyze_drawing(&self, source: &DocumentSource) -> Outcome<DrawingSummary> {
        let result = self
            .extract(source)
            .and_then(|extraction| summarize(&extraction));
        if let Ok(summary) = &result {
            info!(
                source = %source.describe(),
                entities = summary.total_entities,
                skipped = summary.skipped_entities,
                perimeter = summary.total_perimeter,
                "图纸分析完成"
            );
        }
        self.finish("analyze", source, result)
    }

    pub fn estimate_drawing_cost(
        &self,
        source: &DocumentSource,
        material: &str,
        quantity: i64,
    ) -> Outcome<CostEstimate> {
        let result = self.extract(source).and_then(|extraction| {
            let summary = summarize(&extraction)?;
            let cost = PricingEngine::new(self.catalog).estimate_cost(&summary, material, quantity)?;
            Ok(CostEstimate { summary, cost })
        });
        if let Ok(estimate) = &result {
            info!(
                source = %source.describe(),
                material = %estimate.cost.material,
                quantity = estimate.cost.quantity,
                final_cost = estimate.cost.final_cost,
                "报价完成"
            );
        }
        self.finish("quote", source, result)
    }

    pub fn render_drawing(&self, source: &DocumentSource) -> Outcome<RenderedDrawing> {
        let result = self
            .extract(source)
            .and_then(|extraction| render_shapes(&extraction, &self.render_options));
        if let Ok(drawing) = &result {
            let (width, height) = drawing
                .bounds
                .map_or((0.0, 0.0), |bounds| (bounds.width(), bounds.height()));
            info!(
                source = %source.describe(),
                primitives = drawing.primitives.len(),
                width,
                height,
                "图元离散化完成"
            );
        }
        self.finish("render", source, result)
    }

    fn load(&self, source: &DocumentSource) -> Result<Document, EngineError> {
        let document = match source {
            DocumentSource::Path(path) => self.loader.load(path)?,
            DocumentSource::Bytes(bytes) => self.loader.load_bytes(bytes)?,
        };
        Ok(document)
    }

    fn extract(&self, source: &DocumentSource) -> Result<Extraction, EngineError> {
        self.load(source).map(|document| extract_shapes(&document))
    }

    fn finish<T>(
        &self,
        operation: &'static str,
        source: &DocumentSource,
        result: Result<T, EngineError>,
    ) -> Outcome<T> {
        if let Err(err) = &result {
            warn!(operation, source = %source.describe(), error = %err, "操作失败");
        }
        Outcome::from(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE_DXF: &str = "0\nSECTION\n2\nHEADER\n9\n$ACADVER\n1\nAC1015\n0\nENDSEC\n\
0\nSECTION\n2\nENTITIES\n\
0\nLWPOLYLINE\n8\nCUT\n90\n4\n70\n1\n10\n0\n20\n0\n10\n100\n20\n0\n10\n100\n20\n100\n10\n0\n20\n100\n\
0\nTEXT\n8\nANNOT\n10\n5\n20\n5\n40\n2.5\n1\nPLATE\n\
0\nENDSEC\n0\nEOF\n";

    fn source(text: &str) -> DocumentSource {
        DocumentSource::Bytes(text.as_bytes().to_vec())
    }

    #[test]
    fn analyze_reports_square_plate() {
        let catalog = MaterialCatalog::builtin().expect("builtin catalog");
        let analyzer = Analyzer::new(&catalog);

        let summary = match analyzer.analyze_drawing(&source(SQUARE_DXF)) {
            Outcome::Success(summary) => summary,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(summary.total_entities, 1);
        assert_eq!(summary.skipped_entities, 1);
        assert!((summary.total_perimeter - 400.0).abs() < 1e-9);
        assert!((summary.largest_area - 10_000.0).abs() < 1e-9);
        assert_eq!(summary.entity_details[0].dxf_type, "LWPOLYLINE");
        assert!(summary.entity_details[0].closed);
    }

    #[test]
    fn quote_for_square_plate() {
        let catalog = MaterialCatalog::builtin().expect("builtin catalog");
        let analyzer = Analyzer::new(&catalog);

        let estimate = analyzer
            .estimate_drawing_cost(&source(SQUARE_DXF), "CR18", 10)
            .into_result()
            .expect("报价失败");
        assert!((estimate.cost.final_cost - 37_800.0).abs() < 1e-9);
        assert_eq!(estimate.summary.total_entities, 1);
    }

    #[test]
    fn unknown_material_is_a_failure_without_payload() {
        let catalog = MaterialCatalog::builtin().expect("builtin catalog");
        let outcome = Analyzer::new(&catalog).estimate_drawing_cost(&source(SQUARE_DXF), "NOPE", 5);
        assert!(outcome.payload().is_none());
        assert!(outcome.message().is_some_and(|message| message.contains("NOPE")));
    }

    #[test]
    fn malformed_document_is_a_failure() {
        let catalog = MaterialCatalog::builtin().expect("builtin catalog");
        let analyzer = Analyzer::new(&catalog);

        let outcome = analyzer.analyze_drawing(&source("this is not a drawing"));
        assert!(!outcome.is_success());

        let outcome = analyzer.render_drawing(&DocumentSource::Path(PathBuf::from(
            "/nonexistent/drawing.dxf",
        )));
        assert!(outcome.message().is_some_and(|message| message.contains("drawing.dxf")));
    }

    #[test]
    fn render_uses_configured_segments() {
        let catalog = MaterialCatalog::builtin().expect("builtin catalog");
        let analyzer = Analyzer::new(&catalog).with_render_options(RenderOptions {
            segments_per_circle: 12,
        });
        let circle = "0\nSECTION\n2\nENTITIES\n0\nCIRCLE\n8\n0\n10\n0\n20\n0\n40\n1\n0\nENDSEC\n0\nEOF\n";

        let drawing = analyzer
            .render_drawing(&source(circle))
            .into_result()
            .expect("渲染失败");
        assert_eq!(drawing.primitives.len(), 1);
        assert_eq!(drawing.primitives[0].points.len(), 13);
    }

    #[test]
    fn infinite_arc_angle_fails_instead_of_panicking() {
        let catalog = MaterialCatalog::builtin().expect("builtin catalog");
        let analyzer = Analyzer::new(&catalog);
        let arc = "0\nSECTION\n2\nENTITIES\n0\nARC\n8\n0\n10\n0\n20\n0\n40\n1\n50\n0\n51\ninf\n0\nENDSEC\n0\nEOF\n";

        let outcome = analyzer.render_drawing(&source(arc));
        assert!(outcome.payload().is_none());
        assert!(outcome.message().is_some_and(|message| message.contains("ARC")));

        let outcome = analyzer.analyze_drawing(&source(arc));
        assert!(!outcome.is_success());
    }

    struct EmptyLoader;

    impl DocumentLoader for EmptyLoader {
        fn load(&self, _path: &std::path::Path) -> Result<Document, sheetquote_io::IoError> {
            Ok(Document::new())
        }

        fn load_bytes(&self, _bytes: &[u8]) -> Result<Document, sheetquote_io::IoError> {
            Ok(Document::new())
        }
    }

    #[test]
    fn custom_loader_is_used() {
        let catalog = MaterialCatalog::builtin().expect("builtin catalog");
        let analyzer = Analyzer::with_loader(EmptyLoader, &catalog);
        let summary = analyzer
            .analyze_drawing(&DocumentSource::Path(PathBuf::from("ignored.dxf")))
            .into_result()
            .expect("分析失败");
        assert_eq!(summary, DrawingSummary::default());
    }
}
