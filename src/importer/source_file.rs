// ==========================================
// 游戏目录站 - 上传源文件
// ==========================================
// 职责: 独占持有本次导入的临时文件，Drop 时删除
// 约束: 成功 / 校验失败 / 致命错误任一退出路径都不残留文件
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tracing::debug;

// ==========================================
// SourceFile - 独占的源文件
// ==========================================
#[derive(Debug)]
pub struct SourceFile {
    // TempPath 在 Drop 时删除文件
    path: TempPath,
}

impl SourceFile {
    /// 将上传内容写入临时文件
    ///
    /// # 参数
    /// - bytes: 上传内容
    /// - extension: 原始文件扩展名（决定解析器）
    /// - max_bytes: 大小上限，超出时不落盘直接拒绝
    pub fn from_bytes(bytes: &[u8], extension: &str, max_bytes: u64) -> ImportResult<Self> {
        let size = bytes.len() as u64;
        check_size(size, max_bytes)?;

        let mut temp = upload_temp_file(extension)?;
        temp.write_all(bytes)?;
        temp.flush()?;

        debug!(path = %temp.path().display(), size, "上传内容已写入临时文件");
        Ok(Self {
            path: temp.into_temp_path(),
        })
    }

    /// 将磁盘上的文件复制为临时源文件（原文件保留）
    ///
    /// 先按文件元数据检查大小，超限时不读取内容
    pub fn copy_from(path: &Path, max_bytes: u64) -> ImportResult<Self> {
        if !path.is_file() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let size = fs::metadata(path)?.len();
        check_size(size, max_bytes)?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let mut temp = upload_temp_file(extension)?;
        let mut input = File::open(path)?;
        io::copy(&mut input, temp.as_file_mut())?;
        temp.flush()?;

        debug!(from = %path.display(), to = %temp.path().display(), size, "源文件已复制");
        Ok(Self {
            path: temp.into_temp_path(),
        })
    }

    /// 接管已存在的文件（导入结束后删除）
    pub fn adopt<P: Into<PathBuf>>(path: P) -> ImportResult<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        Ok(Self {
            path: TempPath::from_path(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 小写扩展名（无扩展名时为空串）
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase()
    }

    pub fn size(&self) -> ImportResult<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }
}

fn check_size(size: u64, max_bytes: u64) -> ImportResult<()> {
    if size > max_bytes {
        return Err(ImportError::FileTooLarge {
            size,
            limit: max_bytes,
        });
    }
    Ok(())
}

fn upload_temp_file(extension: &str) -> ImportResult<NamedTempFile> {
    let extension = extension.trim().trim_start_matches('.').to_lowercase();
    let suffix = format!(".{}", extension);
    Ok(tempfile::Builder::new()
        .prefix("catalog-upload-")
        .suffix(&suffix)
        .tempfile()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_removed_on_drop() {
        let source = SourceFile::from_bytes(b"title\nA\n", "CSV", 1024).unwrap();
        let path = source.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(source.extension(), "csv");
        assert_eq!(source.size().unwrap(), 8);

        drop(source);
        assert!(!path.exists());
    }

    #[test]
    fn test_from_bytes_rejects_oversize() {
        let result = SourceFile::from_bytes(&[0u8; 16], "csv", 8);
        assert!(matches!(
            result,
            Err(ImportError::FileTooLarge { size: 16, limit: 8 })
        ));
    }

    #[test]
    fn test_adopt_missing_file() {
        let result = SourceFile::adopt("/nonexistent/catalog.csv");
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_copy_from_keeps_original() {
        let mut original = tempfile::Builder::new().suffix(".CSV").tempfile().unwrap();
        original.write_all(b"title\nA\n").unwrap();

        let source = SourceFile::copy_from(original.path(), 1024).unwrap();
        let copy = source.path().to_path_buf();
        assert_ne!(copy, original.path());
        assert_eq!(source.extension(), "csv");
        assert_eq!(source.size().unwrap(), 8);

        drop(source);
        assert!(!copy.exists());
        assert!(original.path().exists());
    }

    #[test]
    fn test_copy_from_checks_size_before_reading() {
        let original = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        // 稀疏扩展，不写入实际内容
        original.as_file().set_len(4096).unwrap();

        let result = SourceFile::copy_from(original.path(), 1024);
        assert!(matches!(
            result,
            Err(ImportError::FileTooLarge {
                size: 4096,
                limit: 1024
            })
        ));
    }

    #[test]
    fn test_copy_from_missing_file() {
        let result = SourceFile::copy_from(Path::new("/nonexistent/catalog.csv"), 1024);
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_adopt_takes_ownership() {
        let path = tempfile::NamedTempFile::new()
            .unwrap()
            .into_temp_path()
            .keep()
            .unwrap();

        let source = SourceFile::adopt(path.clone()).unwrap();
        drop(source);
        assert!(!path.exists());
    }
}
