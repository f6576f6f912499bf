mod binary;

use std::fs;
use std::path::Path;

use sheetquote_core::{
    document::{
        Arc, Circle, Document, Entity, Line, Polyline, PolylineFlavor, PolylineVertex,
        UnsupportedEntity,
    },
    geometry::Point2,
};
use thiserror::Error;

use crate::binary::BinaryPairs;

pub use crate::binary::BINARY_SENTINEL;

/// 支持读取的 `$ACADVER` 版本（R12 至 2018）。
pub const SUPPORTED_VERSIONS: &[&str] = &[
    "AC1009", "AC1012", "AC1014", "AC1015", "AC1018", "AC1021", "AC1024", "AC1027", "AC1032",
];

const VERTEX_SPLINE_FRAME: i16 = 0x10;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
    #[error("unsupported DXF version: {0}")]
    UnsupportedVersion(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;

    fn load_bytes(&self, bytes: &[u8]) -> Result<Document, IoError>;
}

/// DXF 读取入口，自动识别 ASCII 与二进制格式。
#[derive(Debug, Clone, Copy, Default)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_bytes(&data)
    }

    fn load_bytes(&self, bytes: &[u8]) -> Result<Document, IoError> {
        let result = if let Some(payload) = bytes.strip_prefix(BINARY_SENTINEL) {
            DxfParser::new(DxfReader::binary(payload)).parse()
        } else {
            let text = String::from_utf8_lossy(bytes);
            DxfParser::new(DxfReader::text(&text)).parse()
        };
        result.map_err(|err| match err {
            DxfError::UnsupportedVersion { version } => IoError::UnsupportedVersion(version),
            DxfError::Invalid { message } => IoError::InvalidDocument(message),
        })
    }
}

#[derive(Debug)]
enum DxfError {
    UnsupportedVersion { version: String },
    Invalid { message: String },
}

impl DxfError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// 每个实体都可能携带的公共字段。
#[derive(Debug, Default)]
struct CommonFields {
    layer: Option<String>,
    paper_space: bool,
}

impl CommonFields {
    /// 吸收公共组码，返回是否已处理。
    fn absorb(&mut self, code: i32, value: &str, kind: &str) -> Result<bool, DxfError> {
        match code {
            8 => {
                self.layer = Some(value.trim().to_string());
                Ok(true)
            }
            67 => {
                self.paper_space = parse_i32(value, &format!("{kind} 空间标志（组码 67）"))? == 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn layer(&mut self) -> String {
        self.layer.take().unwrap_or_else(|| "0".to_string())
    }
}

struct ParsedEntity {
    entity: Entity,
    paper_space: bool,
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
}

impl<'a> DxfParser<'a> {
    fn new(reader: DxfReader<'a>) -> Self {
        Self { reader }
    }

    fn parse(mut self) -> Result<Document, DxfError> {
        let mut document = Document::new();
        let mut sections = 0usize;
        while let Some((code, value)) = self.reader.next_pair()? {
            if code == 999 {
                continue;
            }
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    sections += 1;
                    match name.trim() {
                        "HEADER" => self.parse_header(&mut document)?,
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        if sections == 0 {
            return Err(DxfError::invalid("未找到任何 SECTION，输入不是有效的 DXF 文件"));
        }
        Ok(document)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn parse_header(&mut self, document: &mut Document) -> Result<(), DxfError> {
        let mut expecting_version = false;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some((9, name)) => expecting_version = name.trim() == "$ACADVER",
                Some((1, value)) if expecting_version => {
                    expecting_version = false;
                    let version = value.trim().to_string();
                    if !SUPPORTED_VERSIONS.contains(&version.as_str()) {
                        return Err(DxfError::UnsupportedVersion { version });
                    }
                    document.set_version(version);
                }
                Some(_) => {}
                None => return Err(DxfError::invalid("HEADER 段未找到 ENDSEC 终止标记")),
            }
        }
        Ok(())
    }

    fn parse_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            let parsed = match value.trim() {
                "ENDSEC" => break,
                "SEQEND" => {
                    self.skip_entity_body()?;
                    continue;
                }
                "LINE" => self.parse_line()?,
                "CIRCLE" => self.parse_circle()?,
                "ARC" => self.parse_arc()?,
                "LWPOLYLINE" => self.parse_lwpolyline()?,
                "POLYLINE" => self.parse_polyline_entity()?,
                other => self.parse_unsupported(other)?,
            };
            // 图纸空间实体不属于模型空间。
            if !parsed.paper_space {
                document.add_entity(parsed.entity);
            }
        }
        Ok(())
    }

    fn parse_unsupported(&mut self, kind: &str) -> Result<ParsedEntity, DxfError> {
        let mut common = CommonFields::default();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    common.absorb(code, &value, kind)?;
                }
                None => return Err(DxfError::invalid(format!("{kind} 未正确结束"))),
            }
        }
        Ok(ParsedEntity {
            paper_space: common.paper_space,
            entity: Entity::Unsupported(UnsupportedEntity {
                kind: kind.to_string(),
                layer: common.layer(),
            }),
        })
    }

    fn parse_line(&mut self) -> Result<ParsedEntity, DxfError> {
        let mut common = CommonFields::default();
        let mut start_x = None;
        let mut start_y = None;
        let mut end_x = None;
        let mut end_y = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    if common.absorb(code, &value, "LINE")? {
                        continue;
                    }
                    match code {
                        10 => assign_coord(&mut start_x, &value, "LINE 起点 X（组码 10）")?,
                        20 => assign_coord(&mut start_y, &value, "LINE 起点 Y（组码 20）")?,
                        11 => assign_coord(&mut end_x, &value, "LINE 终点 X（组码 11）")?,
                        21 => assign_coord(&mut end_y, &value, "LINE 终点 Y（组码 21）")?,
                        30 | 31 => {} // 忽略 Z 坐标
                        _ => {}
                    }
                }
                None => return Err(DxfError::invalid("LINE 未正确结束")),
            }
        }

        let sx = start_x.ok_or_else(|| DxfError::invalid("LINE 缺少起点 X（组码 10）"))?;
        let sy = start_y.ok_or_else(|| DxfError::invalid("LINE 缺少起点 Y（组码 20）"))?;
        let ex = end_x.ok_or_else(|| DxfError::invalid("LINE 缺少终点 X（组码 11）"))?;
        let ey = end_y.ok_or_else(|| DxfError::invalid("LINE 缺少终点 Y（组码 21）"))?;

        Ok(ParsedEntity {
            paper_space: common.paper_space,
            entity: Entity::Line(Line {
                start: Point2::new(sx, sy),
                end: Point2::new(ex, ey),
                layer: common.layer(),
            }),
        })
    }

    fn parse_circle(&mut self) -> Result<ParsedEntity, DxfError> {
        let mut common = CommonFields::default();
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    if common.absorb(code, &value, "CIRCLE")? {
                        continue;
                    }
                    match code {
                        10 => assign_coord(&mut center_x, &value, "CIRCLE 圆心 X（组码 10）")?,
                        20 => assign_coord(&mut center_y, &value, "CIRCLE 圆心 Y（组码 20）")?,
                        40 => assign_coord(&mut radius, &value, "CIRCLE 半径（组码 40）")?,
                        _ => {}
                    }
                }
                None => return Err(DxfError::invalid("CIRCLE 未正确结束")),
            }
        }

        let cx = center_x.ok_or_else(|| DxfError::invalid("CIRCLE 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("CIRCLE 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::invalid("CIRCLE 缺少半径（组码 40）"))?;

        Ok(ParsedEntity {
            paper_space: common.paper_space,
            entity: Entity::Circle(Circle {
                center: Point2::new(cx, cy),
                radius,
                layer: common.layer(),
            }),
        })
    }

    fn parse_arc(&mut self) -> Result<ParsedEntity, DxfError> {
        let mut common = CommonFields::default();
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        let mut start_angle = None;
        let mut end_angle = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    if common.absorb(code, &value, "ARC")? {
                        continue;
                    }
                    match code {
                        10 => assign_coord(&mut center_x, &value, "ARC 圆心 X（组码 10）")?,
                        20 => assign_coord(&mut center_y, &value, "ARC 圆心 Y（组码 20）")?,
                        40 => assign_coord(&mut radius, &value, "ARC 半径（组码 40）")?,
                        50 => assign_coord(&mut start_angle, &value, "ARC 起始角（组码 50）")?,
                        51 => assign_coord(&mut end_angle, &value, "ARC 终止角（组码 51）")?,
                        _ => {}
                    }
                }
                None => return Err(DxfError::invalid("ARC 未正确结束")),
            }
        }

        let cx = center_x.ok_or_else(|| DxfError::invalid("ARC 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("ARC 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::invalid("ARC 缺少半径（组码 40）"))?;
        let start_angle =
            start_angle.ok_or_else(|| DxfError::invalid("ARC 缺少起始角（组码 50）"))?;
        let end_angle = end_angle.ok_or_else(|| DxfError::invalid("ARC 缺少终止角（组码 51）"))?;

        Ok(ParsedEntity {
            paper_space: common.paper_space,
            entity: Entity::Arc(Arc {
                center: Point2::new(cx, cy),
                radius,
                start_angle,
                end_angle,
                layer: common.layer(),
            }),
        })
    }

    fn parse_lwpolyline(&mut self) -> Result<ParsedEntity, DxfError> {
        let mut common = CommonFields::default();
        let mut is_closed = false;
        let mut vertices: Vec<PolylineVertex> = Vec::new();
        let mut pending_x: Option<f64> = None;
        let mut pending_y: Option<f64> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    if common.absorb(code, &value, "LWPOLYLINE")? {
                        continue;
                    }
                    match code {
                        70 => {
                            let flag = parse_i32(&value, "LWPOLYLINE 标志")?;
                            is_closed = flag & 0x01 == 0x01;
                        }
                        10 => {
                            let x = parse_f64(&value, "LWPOLYLINE 顶点 X")?;
                            if let Some(y) = pending_y.take() {
                                vertices.push(PolylineVertex::new(Point2::new(x, y)));
                            } else if pending_x.replace(x).is_some() {
                                return Err(DxfError::invalid(
                                    "LWPOLYLINE 顶点缺少对应的 Y（组码 20）",
                                ));
                            }
                        }
                        20 => {
                            let y = parse_f64(&value, "LWPOLYLINE 顶点 Y")?;
                            if let Some(x) = pending_x.take() {
                                vertices.push(PolylineVertex::new(Point2::new(x, y)));
                            } else if pending_y.replace(y).is_some() {
                                return Err(DxfError::invalid(
                                    "LWPOLYLINE 顶点缺少对应的 X（组码 10）",
                                ));
                            }
                        }
                        42 => {
                            let bulge = parse_f64(&value, "LWPOLYLINE 顶点 bulge")?;
                            match vertices.last_mut() {
                                Some(vertex) => vertex.bulge = bulge,
                                None => {
                                    return Err(DxfError::invalid(
                                        "LWPOLYLINE 在定义首个顶点前遇到 bulge（组码 42）",
                                    ));
                                }
                            }
                        }
                        _ => {}
                    }
                }
                None => return Err(DxfError::invalid("LWPOLYLINE 未正确结束")),
            }
        }

        if pending_x.is_some() || pending_y.is_some() {
            return Err(DxfError::invalid(
                "LWPOLYLINE 顶点坐标成对出现（组码 10/20），检测到不完整的顶点",
            ));
        }

        if vertices.is_empty() {
            return Err(DxfError::invalid("LWPOLYLINE 未解析到任何顶点"));
        }

        Ok(ParsedEntity {
            paper_space: common.paper_space,
            entity: Entity::Polyline(Polyline {
                vertices,
                is_closed,
                flavor: PolylineFlavor::Lightweight,
                layer: common.layer(),
            }),
        })
    }

    /// 经典 `POLYLINE`：头部之后跟随若干 `VERTEX`，以 `SEQEND` 结束。
    /// 仅 2D 多段线参与计算，3D 多段线与网格按未支持实体记录。
    fn parse_polyline_entity(&mut self) -> Result<ParsedEntity, DxfError> {
        let mut common = CommonFields::default();
        let mut flags: i16 = 0;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => {
                    if common.absorb(code, &value, "POLYLINE")? {
                        continue;
                    }
                    if code == 70 {
                        flags = parse_i16(&value, "POLYLINE 标志（组码 70）")?;
                    }
                }
                None => return Err(DxfError::invalid("POLYLINE 未正确结束")),
            }
        }

        if flags & (0x08 | 0x10 | 0x40) != 0 {
            self.skip_polyline_sequence()?;
            return Ok(ParsedEntity {
                paper_space: common.paper_space,
                entity: Entity::Unsupported(UnsupportedEntity {
                    kind: "POLYLINE".to_string(),
                    layer: common.layer(),
                }),
            });
        }

        let mut vertices = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "VERTEX" => vertices.extend(self.parse_vertex()?),
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        // 缺少 SEQEND 时容忍，交还给上层继续解析。
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => continue,
                None => return Err(DxfError::invalid("POLYLINE 未找到 SEQEND 终止标记")),
            }
        }

        if vertices.is_empty() {
            return Err(DxfError::invalid("POLYLINE 未解析到任何顶点"));
        }

        Ok(ParsedEntity {
            paper_space: common.paper_space,
            entity: Entity::Polyline(Polyline {
                vertices,
                is_closed: flags & 0x01 == 0x01,
                flavor: PolylineFlavor::Classic,
                layer: common.layer(),
            }),
        })
    }

    /// 样条拟合多段线中的框架控制点（标志 16）不在轮廓上，返回 `None`。
    fn parse_vertex(&mut self) -> Result<Option<PolylineVertex>, DxfError> {
        let mut x = None;
        let mut y = None;
        let mut bulge = None;
        let mut flags: i16 = 0;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    10 => assign_coord(&mut x, &value, "VERTEX X（组码 10）")?,
                    20 => assign_coord(&mut y, &value, "VERTEX Y（组码 20）")?,
                    42 => assign_coord(&mut bulge, &value, "VERTEX bulge（组码 42）")?,
                    70 => flags = parse_i16(&value, "VERTEX 标志（组码 70）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("VERTEX 未正确结束")),
            }
        }
        let x = x.ok_or_else(|| DxfError::invalid("VERTEX 缺少 X（组码 10）"))?;
        let y = y.ok_or_else(|| DxfError::invalid("VERTEX 缺少 Y（组码 20）"))?;
        if flags & VERTEX_SPLINE_FRAME != 0 {
            return Ok(None);
        }
        let vertex = PolylineVertex::with_bulge(Point2::new(x, y), bulge.unwrap_or(0.0));
        Ok(Some(vertex))
    }

    fn skip_polyline_sequence(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "VERTEX" => self.skip_entity_body()?,
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }
}

/// 组码/值对的来源：ASCII 逐行读取，或二进制按组码类型解码。
enum PairSource<'a> {
    Text(TextPairs<'a>),
    Binary(BinaryPairs<'a>),
}

struct DxfReader<'a> {
    source: PairSource<'a>,
    buffer: Option<(i32, String)>,
}

impl<'a> DxfReader<'a> {
    fn text(source: &'a str) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        Self {
            source: PairSource::Text(TextPairs::new(source)),
            buffer: None,
        }
    }

    fn binary(payload: &'a [u8]) -> Self {
        Self {
            source: PairSource::Binary(BinaryPairs::new(payload)),
            buffer: None,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }
        match &mut self.source {
            PairSource::Text(pairs) => pairs.next_pair(),
            PairSource::Binary(pairs) => pairs.next_pair(),
        }
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "DXF pair 只允许回退一次");
        self.buffer = Some(pair);
    }
}

struct TextPairs<'a> {
    lines: std::str::Lines<'a>,
    line_number: usize,
}

impl<'a> TextPairs<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        let code_line = loop {
            match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    // 文件末尾的空行不构成组码。
                    if line.trim().is_empty() && self.lines.clone().all(|l| l.trim().is_empty()) {
                        return Ok(None);
                    }
                    break line;
                }
                None => return Ok(None),
            }
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::invalid(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim_end_matches('\r').to_string();
        Ok(Some((code, value)))
    }
}

fn assign_coord(slot: &mut Option<f64>, raw: &str, context: &str) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::invalid(format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, context)?);
    Ok(())
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i16(raw: &str, context: &str) -> Result<i16, DxfError> {
    let value = parse_i32(raw, context)?;
    i16::try_from(value)
        .map_err(|_| DxfError::invalid(format!("{context} 超出 i16 范围（值：{value}）")))
}

fn lossy_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
