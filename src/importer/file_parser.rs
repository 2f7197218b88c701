// ==========================================
// 游戏目录站 - 文件解析器实现
// ==========================================
// 职责: 表格文件 → 带行号的原始行（阶段 0）
// 支持: CSV (.csv) / Excel & ODS (.xlsx/.xlsm/.xls/.xlsb/.ods，第一个工作表)
// 行号: 与表格中显示的行号一致（表头为第 1 行），跳过的空行不改变后续编号
// ==========================================

use crate::domain::ImportWarning;
use crate::importer::catalog_importer_trait::{FieldMapper, FileParser};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::Column;
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

// ==========================================
// SheetGrid - 单元格网格
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    pub header: Vec<String>,
    /// 表头所在行号（1 起）
    pub header_row: usize,
    /// (行号, 单元格)
    pub rows: Vec<(usize, Vec<String>)>,
}

// ==========================================
// RawRow - 原始行记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub row_index: usize,
    /// 只包含非空单元格（已 TRIM）
    pub cells: HashMap<Column, String>,
}

impl RawRow {
    pub fn new(row_index: usize) -> Self {
        Self {
            row_index,
            cells: HashMap::new(),
        }
    }

    pub fn with(mut self, column: Column, value: &str) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: Column, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.cells.insert(column, value.to_string());
        }
    }

    pub fn get(&self, column: Column) -> Option<&str> {
        self.cells.get(&column).map(String::as_str)
    }
}

// ==========================================
// ParsedSheet - 解析结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ParsedSheet {
    pub rows: Vec<RawRow>,
    pub warnings: Vec<ImportWarning>,
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn read_grid(&self, path: &Path) -> ImportResult<SheetGrid> {
        let bytes = fs::read(path)?;
        let line_starts = line_starts(&bytes);
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(bytes.as_slice());

        let mut grid = SheetGrid::default();
        let mut header_seen = false;

        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            // 记录位置取自跳过空行之前，需越过换行符再换算行号
            let line = record
                .position()
                .map(|p| line_of(&bytes, &line_starts, p.byte() as usize))
                .unwrap_or(idx + 1);
            let cells: Vec<String> = record.iter().map(|v| v.to_string()).collect();

            if !header_seen {
                grid.header = cells
                    .into_iter()
                    .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
                    .collect();
                grid.header_row = line;
                header_seen = true;
            } else {
                grid.rows.push((line, cells));
            }
        }

        if !header_seen {
            return Err(ImportError::MissingHeader);
        }
        Ok(grid)
    }
}

/// 每个物理行的起始字节（\n、\r\n、单独的 \r 都算换行）
fn line_starts(bytes: &[u8]) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'\n' => starts.push(i + 1),
            b'\r' if bytes.get(i + 1) != Some(&b'\n') => starts.push(i + 1),
            _ => {}
        }
    }
    starts
}

/// 字节偏移 → 1 起的行号（先跳过空行的换行符）
fn line_of(bytes: &[u8], line_starts: &[usize], offset: usize) -> usize {
    let start = bytes
        .iter()
        .skip(offset)
        .position(|b| *b != b'\n' && *b != b'\r')
        .map_or(bytes.len(), |skip| offset + skip);
    line_starts.partition_point(|s| *s <= start)
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn read_grid(&self, path: &Path) -> ImportResult<SheetGrid> {
        let mut workbook = open_workbook_auto(path)?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("工作簿无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        // 区域从第一个非空单元格开始
        let first_row = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);

        let mut rows = range.rows();
        let header_row = rows.next().ok_or(ImportError::MissingHeader)?;

        let mut grid = SheetGrid {
            header: header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect(),
            header_row: first_row,
            rows: Vec::new(),
        };

        for (offset, data_row) in rows.enumerate() {
            let cells = data_row.iter().map(|cell| cell.to_string()).collect();
            grid.rows.push((first_row + offset + 1, cells));
        }

        debug!(sheet = %sheet_name, rows = grid.rows.len(), "工作表读取完成");
        Ok(grid)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    /// 按扩展名选择解析器
    pub fn parser_for(extension: &str) -> ImportResult<Box<dyn FileParser>> {
        match extension.to_lowercase().as_str() {
            "csv" => Ok(Box::new(CsvParser)),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(Box::new(ExcelParser)),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }

    /// 解析文件为原始行记录
    ///
    /// # 参数
    /// - path: 文件路径
    /// - mapper: 表头映射器
    ///
    /// # 返回
    /// - Ok(ParsedSheet): 非空数据行（行号保留） + 表头警告
    /// - Err: 格式不支持 / 解码失败 / 表头缺失或无法识别
    pub fn parse(&self, path: &Path, mapper: &dyn FieldMapper) -> ImportResult<ParsedSheet> {
        if !path.is_file() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        let grid = Self::parser_for(&extension)?.read_grid(path)?;
        let mapping = mapper.map_headers(&grid.header)?;

        let mut sheet = ParsedSheet {
            rows: Vec::with_capacity(grid.rows.len()),
            warnings: mapping.warnings.clone(),
        };
        for warning in &mut sheet.warnings {
            warning.row_index = Some(grid.header_row);
        }

        for (row_index, cells) in grid.rows {
            // 跳过完全空白的行（包括未知列）
            if cells.iter().all(|v| v.trim().is_empty()) {
                continue;
            }

            let mut row = RawRow::new(row_index);
            for (col_idx, value) in cells.iter().enumerate() {
                if let Some(Some(column)) = mapping.columns.get(col_idx) {
                    row.set(*column, value);
                }
            }
            sheet.rows.push(row);
        }

        Ok(sheet)
    }
}
