// ==========================================
// 游戏目录站 - 数据清洗器实现
// ==========================================
// 职责: slug 生成 / 标记解析 / URL 校验 / 日期解析 / 标签拆分
// 约定: Err(String) 为写入报告的行级原因
// ==========================================

use crate::importer::catalog_importer_trait::DataCleaner as DataCleanerTrait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use url::Url;

/// 标签分隔符
const TAG_DELIMITERS: [char; 4] = [',', ';', '|', '、'];

/// 日期格式（按顺序尝试）
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Excel 日期序列号的合理范围（1900-01-01 ~ 9999-12-31）
const EXCEL_SERIAL_RANGE: (f64, f64) = (1.0, 2_958_465.0);

pub struct DataCleaner;

impl DataCleanerTrait for DataCleaner {
    fn slugify(&self, text: &str) -> String {
        let mut slug = String::with_capacity(text.len());
        for ch in text.trim().chars().flat_map(|c| c.to_lowercase()) {
            let mapped = match ch {
                'a'..='z' | '0'..='9' => Some(ch),
                '-' | '_' => Some('-'),
                c if c.is_whitespace() => Some('-'),
                _ => None,
            };
            if let Some(c) = mapped {
                // 合并连续连字符
                if c == '-' && slug.ends_with('-') {
                    continue;
                }
                slug.push(c);
            }
        }
        slug.trim_matches('-').to_string()
    }

    fn parse_flag(&self, value: Option<&str>) -> Result<bool, String> {
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(false);
        };
        match raw.to_lowercase().as_str() {
            "1" | "y" | "yes" | "true" | "x" | "是" => Ok(true),
            "0" | "n" | "no" | "false" | "否" => Ok(false),
            _ => Err(format!("unrecognised flag value '{}'", raw)),
        }
    }

    fn clean_embed_url(&self, value: &str) -> Result<String, String> {
        parse_http_url(value.trim())
    }

    fn clean_asset_url(&self, value: &str) -> Result<String, String> {
        let value = value.trim();
        // 站内根路径（排除协议相对地址 //host/...）
        if value.starts_with('/') && !value.starts_with("//") {
            if value.chars().any(char::is_whitespace) {
                return Err(format!("path '{}' contains whitespace", value));
            }
            return Ok(value.to_string());
        }
        parse_http_url(value)
    }

    fn parse_publish_date(&self, value: &str) -> Result<DateTime<Utc>, String> {
        let value = value.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(dt.with_timezone(&Utc));
        }
        for format in DATETIME_FORMATS {
            if let Ok(ndt) = NaiveDateTime::parse_from_str(value, format) {
                return Ok(Utc.from_utc_datetime(&ndt));
            }
        }
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(value, format) {
                return Ok(start_of_day(date));
            }
        }
        // YYYYMMDD（固定 8 位数字）
        if value.len() == 8 && value.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(date) = NaiveDate::parse_from_str(value, "%Y%m%d") {
                return Ok(start_of_day(date));
            }
        }
        if let Some(dt) = parse_excel_serial(value) {
            return Ok(dt);
        }

        Err(format!("unrecognised date '{}'", value))
    }

    fn parse_display_order(&self, value: &str) -> Result<i64, String> {
        let value = value.trim();
        let parsed = value.parse::<i64>().ok().or_else(|| {
            // Excel 单元格中的整数可能带小数部分 ".0"
            value
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        });
        match parsed {
            Some(order) if order >= 0 => Ok(order),
            _ => Err(format!("'{}' is not a non-negative integer", value)),
        }
    }

    fn split_tags(&self, value: &str) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for part in value.split(&TAG_DELIMITERS[..]) {
            let tag = part.trim().to_lowercase();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }
}

fn parse_http_url(value: &str) -> Result<String, String> {
    let url = Url::parse(value).map_err(|e| format!("invalid URL '{}': {}", value, e))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url.to_string()),
        "http" | "https" => Err(format!("URL '{}' has no host", value)),
        scheme => Err(format!("URL scheme '{}' is not http(s)", scheme)),
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Excel 日期序列号（1900 日期系统，基准 1899-12-30）
fn parse_excel_serial(value: &str) -> Option<DateTime<Utc>> {
    let serial = value.parse::<f64>().ok()?;
    let (min, max) = EXCEL_SERIAL_RANGE;
    if !serial.is_finite() || serial < min || serial > max {
        return None;
    }

    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(chrono::NaiveTime::MIN);
    let days = serial.trunc() as i64;
    let seconds = (serial.fract() * 86_400.0).round() as i64;
    let ndt = epoch
        .checked_add_signed(chrono::Duration::days(days))?
        .checked_add_signed(chrono::Duration::seconds(seconds))?;
    Some(Utc.from_utc_datetime(&ndt))
}
