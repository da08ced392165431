// ==========================================
// WEG 运营费用结算 - 配置层
// ==========================================
// 职责: 结算参数管理（金额精度、供暖拆分比例、法定区间）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod settlement_config;
pub mod settlement_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use settlement_config::SettlementConfig;
pub use settlement_config_trait::SettlementConfigReader;
