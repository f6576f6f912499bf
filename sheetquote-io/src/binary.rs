use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::{DxfError, lossy_string};

/// 二进制 DXF 文件头。
pub const BINARY_SENTINEL: &[u8] = b"AutoCAD Binary DXF\r\n\x1a\x00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Double,
    Int16,
    Int32,
    Int64,
    Bool,
    Chunk,
}

/// 按组码区间确定值的编码方式。
fn value_kind(code: i32) -> Option<ValueKind> {
    let kind = match code {
        0..=9 => ValueKind::Text,
        10..=59 => ValueKind::Double,
        60..=79 => ValueKind::Int16,
        90..=99 => ValueKind::Int32,
        100..=109 => ValueKind::Text,
        110..=149 => ValueKind::Double,
        160..=169 => ValueKind::Int64,
        170..=179 => ValueKind::Int16,
        210..=239 => ValueKind::Double,
        // 280-289 在二进制中同样写作 int16
        270..=289 => ValueKind::Int16,
        290..=299 => ValueKind::Bool,
        310..=319 => ValueKind::Chunk,
        300..=369 => ValueKind::Text,
        370..=389 => ValueKind::Int16,
        390..=399 => ValueKind::Text,
        400..=409 => ValueKind::Int16,
        410..=419 => ValueKind::Text,
        420..=429 => ValueKind::Int32,
        430..=439 => ValueKind::Text,
        440..=459 => ValueKind::Int32,
        460..=469 => ValueKind::Double,
        470..=481 => ValueKind::Text,
        999 => ValueKind::Text,
        1004 => ValueKind::Chunk,
        1000..=1009 => ValueKind::Text,
        1010..=1059 => ValueKind::Double,
        1060..=1070 => ValueKind::Int16,
        1071 => ValueKind::Int32,
        _ => return None,
    };
    Some(kind)
}

/// 二进制 DXF 的组码/值读取器。R13 及以后使用 2 字节组码，
/// R12 使用 1 字节组码（255 表示后随 2 字节扩展组码）。
pub(crate) struct BinaryPairs<'a> {
    cursor: Cursor<&'a [u8]>,
    wide_codes: bool,
}

impl<'a> BinaryPairs<'a> {
    pub(crate) fn new(payload: &'a [u8]) -> Self {
        // 首个组码必为 0；紧随其后的字节若仍为 0，说明组码占 2 字节。
        let wide_codes = payload.len() >= 2 && payload[0] == 0 && payload[1] == 0;
        Self {
            cursor: Cursor::new(payload),
            wide_codes,
        }
    }

    fn offset(&self) -> u64 {
        self.cursor.position()
    }

    fn is_exhausted(&self) -> bool {
        self.cursor.position() as usize >= self.cursor.get_ref().len()
    }

    pub(crate) fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if self.is_exhausted() {
            return Ok(None);
        }
        let code_offset = self.offset();
        let code = self.read_code()?;
        let kind = value_kind(code).ok_or_else(|| {
            DxfError::invalid(format!("二进制 DXF 偏移 {code_offset} 处遇到未知组码 {code}"))
        })?;
        let value = self.read_value(code, kind)?;
        Ok(Some((code, value)))
    }

    fn read_code(&mut self) -> Result<i32, DxfError> {
        let offset = self.offset();
        let truncated = |_: std::io::Error| {
            DxfError::invalid(format!("二进制 DXF 在偏移 {offset} 处截断（读取组码）"))
        };
        if self.wide_codes {
            return self
                .cursor
                .read_i16::<LittleEndian>()
                .map(i32::from)
                .map_err(truncated);
        }
        let short = self.cursor.read_u8().map_err(truncated)?;
        if short == 255 {
            self.cursor
                .read_i16::<LittleEndian>()
                .map(i32::from)
                .map_err(truncated)
        } else {
            Ok(i32::from(short))
        }
    }

    fn read_value(&mut self, code: i32, kind: ValueKind) -> Result<String, DxfError> {
        let offset = self.offset();
        let truncated = |_: std::io::Error| {
            DxfError::invalid(format!(
                "二进制 DXF 在偏移 {offset} 处截断（组码 {code} 的值）"
            ))
        };
        let value = match kind {
            ValueKind::Text => self.read_text(code)?,
            ValueKind::Double => format_double(
                self.cursor
                    .read_f64::<LittleEndian>()
                    .map_err(truncated)?,
            ),
            ValueKind::Int16 => self
                .cursor
                .read_i16::<LittleEndian>()
                .map_err(truncated)?
                .to_string(),
            ValueKind::Int32 => self
                .cursor
                .read_i32::<LittleEndian>()
                .map_err(truncated)?
                .to_string(),
            ValueKind::Int64 => self
                .cursor
                .read_i64::<LittleEndian>()
                .map_err(truncated)?
                .to_string(),
            ValueKind::Bool => {
                let flag = self.cursor.read_u8().map_err(truncated)?;
                if flag == 0 { "0" } else { "1" }.to_string()
            }
            ValueKind::Chunk => {
                let length = self.cursor.read_u8().map_err(truncated)? as usize;
                let data = self.take(length, code)?;
                data.iter().map(|byte| format!("{byte:02X}")).collect()
            }
        };
        Ok(value)
    }

    fn read_text(&mut self, code: i32) -> Result<String, DxfError> {
        let start = self.offset() as usize;
        let data: &'a [u8] = *self.cursor.get_ref();
        let remaining = &data[start.min(data.len())..];
        let Some(terminator) = remaining.iter().position(|&byte| byte == 0) else {
            return Err(DxfError::invalid(format!(
                "二进制 DXF 在偏移 {start} 处的字符串（组码 {code}）缺少结束符"
            )));
        };
        let text = lossy_string(&remaining[..terminator]);
        self.cursor.set_position((start + terminator + 1) as u64);
        Ok(text)
    }

    fn take(&mut self, length: usize, code: i32) -> Result<&'a [u8], DxfError> {
        let start = self.offset() as usize;
        let data: &'a [u8] = *self.cursor.get_ref();
        let end = start + length;
        if end > data.len() {
            return Err(DxfError::invalid(format!(
                "二进制 DXF 在偏移 {start} 处截断（组码 {code} 的数据块）"
            )));
        }
        self.cursor.set_position(end as u64);
        Ok(&data[start..end])
    }
}

/// 以最短可往返表示输出浮点数，保证文本解析后数值不变。
fn format_double(value: f64) -> String {
    format!("{value:?}")
}
