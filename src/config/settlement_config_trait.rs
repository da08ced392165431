// ==========================================
// WEG 运营费用结算 - 结算配置读取 Trait
// ==========================================
// 职责: 定义计算核心所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::settlement_config::SettlementConfig;
use std::error::Error;

// ==========================================
// SettlementConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）/ SettlementConfig（固定值）
pub trait SettlementConfigReader: Send + Sync {
    /// 金额舍入精度（小数位）
    ///
    /// # 默认值
    /// - 2
    fn get_money_decimals(&self) -> Result<u32, Box<dyn Error>>;

    /// 物业未配置供暖设置时的采暖计量费比例 (%)
    ///
    /// # 默认值
    /// - 70
    fn get_default_consumption_share_percent(&self) -> Result<f64, Box<dyn Error>>;

    /// 热水费用中按计量分摊的比例 (%)
    ///
    /// # 默认值
    /// - 70
    fn get_warmwater_consumption_share_percent(&self) -> Result<f64, Box<dyn Error>>;

    /// 计量费比例的法定区间 (min, max)
    ///
    /// # 默认值
    /// - (50, 70)
    fn get_legal_consumption_share_range(&self) -> Result<(f64, f64), Box<dyn Error>>;

    /// 冷水参考温度 (°C)，用于按体积估算热水能耗
    ///
    /// # 默认值
    /// - 10
    fn get_warmwater_reference_temp_c(&self) -> Result<f64, Box<dyn Error>>;

    /// 一次性物化全部配置（一次计算只读一次配置）
    fn load_settlement_config(&self) -> Result<SettlementConfig, Box<dyn Error>> {
        let (legal_min, legal_max) = self.get_legal_consumption_share_range()?;
        Ok(SettlementConfig {
            money_decimals: self.get_money_decimals()?,
            default_consumption_share_percent: self.get_default_consumption_share_percent()?,
            warmwater_consumption_share_percent: self.get_warmwater_consumption_share_percent()?,
            legal_consumption_share_min: legal_min,
            legal_consumption_share_max: legal_max,
            warmwater_reference_temp_c: self.get_warmwater_reference_temp_c()?,
        })
    }
}
