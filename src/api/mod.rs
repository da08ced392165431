// ==========================================
// WEG 运营费用结算 - API 层
// ==========================================
// 职责: 对外暴露结算操作，校验输入并统一错误类型
// ==========================================

pub mod error;
pub mod statement_api;

pub use error::{ApiError, ApiResult};
pub use statement_api::{RecomputeResponse, StatementApi, StoredStatement};
