// ==========================================
// 游戏目录站 - 存储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 瞬时错误（可重试）/ 永久错误（立即失败）
// ==========================================

use rusqlite::ErrorCode;
use thiserror::Error;

/// 存储层错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    // ===== 瞬时错误（网络/存储层，可重试）=====
    #[error("数据库繁忙: {0}")]
    Busy(String),

    #[error("数据库连接失败: {0}")]
    ConnectionError(String),

    #[error("存储暂时不可用: {0}")]
    Unavailable(String),

    // ===== 永久错误（不重试）=====
    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("存储拒绝请求: {0}")]
    Rejected(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// 是否为可重试的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Busy(_) | StoreError::ConnectionError(_) | StoreError::Unavailable(_)
        )
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg) => {
                let msg = msg.clone().unwrap_or_else(|| e.to_string());
                match e.code {
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StoreError::Busy(msg),
                    ErrorCode::CannotOpen | ErrorCode::SystemIoFailure => {
                        StoreError::ConnectionError(msg)
                    }
                    ErrorCode::ConstraintViolation if msg.contains("FOREIGN KEY") => {
                        StoreError::ForeignKeyViolation(msg)
                    }
                    ErrorCode::ConstraintViolation => StoreError::UniqueConstraintViolation(msg),
                    _ => StoreError::DatabaseQueryError(msg),
                }
            }
            _ => StoreError::DatabaseQueryError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32, msg: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), Some(msg.to_string()))
    }

    #[test]
    fn test_busy_is_transient() {
        let err: StoreError = sqlite_failure(rusqlite::ffi::SQLITE_BUSY, "database is locked").into();
        assert!(err.is_transient());
    }

    #[test]
    fn test_constraint_is_permanent() {
        let err: StoreError =
            sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT, "FOREIGN KEY constraint failed").into();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
        assert!(!err.is_transient());
    }
}
