// ==========================================
// WEG 运营费用结算 - 领域类型定义
// ==========================================
// 职责: 封闭枚举（分摊键、费用类别、表计类型、结算状态）
// 红线: 新增分摊键必须走穷举 match，禁止字符串分支
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 分摊键 (Distribution Key)
// ==========================================
// 决定一个费用类别按什么口径分摊到各单元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionKey {
    OwnershipShare,  // 共有份额 (MEA)
    LivingArea,      // 居住面积
    PersonCount,     // 人数
    UnitCount,       // 单元数
    PerFlat,         // 每户固定
    ColdWater,       // 冷水用量
    TotalWater,      // 冷水 + 热水用量
    HeatingEnergy,   // 采暖热表用量
    WarmWaterEnergy, // 热水热表用量
    Individual,      // 单独指定（全部为 0）
}

impl DistributionKey {
    /// 全部分摊键（按固定顺序）
    pub const ALL: [DistributionKey; 10] = [
        DistributionKey::OwnershipShare,
        DistributionKey::LivingArea,
        DistributionKey::PersonCount,
        DistributionKey::UnitCount,
        DistributionKey::PerFlat,
        DistributionKey::ColdWater,
        DistributionKey::TotalWater,
        DistributionKey::HeatingEnergy,
        DistributionKey::WarmWaterEnergy,
        DistributionKey::Individual,
    ];

    /// 解析分摊键
    ///
    /// 同时接受结算单上的德文标签和 snake_case 标识。
    /// 未知字符串返回 None，由调用方降级为 Individual。
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mea" | "ownership_share" | "miteigentumsanteil" => Some(DistributionKey::OwnershipShare),
            "wohnfläche" | "wohnflaeche" | "living_area" => Some(DistributionKey::LivingArea),
            "personen" | "personenanzahl" | "person_count" => Some(DistributionKey::PersonCount),
            "einheiten" | "unit_count" => Some(DistributionKey::UnitCount),
            "pro wohnung" | "pro_wohnung" | "per_flat" => Some(DistributionKey::PerFlat),
            "kaltwasser" | "cold_water" => Some(DistributionKey::ColdWater),
            "wasser gesamt" | "wasser_gesamt" | "total_water" => Some(DistributionKey::TotalWater),
            "heizenergie" | "heating_energy" => Some(DistributionKey::HeatingEnergy),
            "warmwasserenergie" | "warm_water_energy" => Some(DistributionKey::WarmWaterEnergy),
            "einzelzuordnung" | "individual" => Some(DistributionKey::Individual),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            DistributionKey::OwnershipShare => "ownership_share",
            DistributionKey::LivingArea => "living_area",
            DistributionKey::PersonCount => "person_count",
            DistributionKey::UnitCount => "unit_count",
            DistributionKey::PerFlat => "per_flat",
            DistributionKey::ColdWater => "cold_water",
            DistributionKey::TotalWater => "total_water",
            DistributionKey::HeatingEnergy => "heating_energy",
            DistributionKey::WarmWaterEnergy => "warm_water_energy",
            DistributionKey::Individual => "individual",
        }
    }

    /// 结算单展示用标签
    pub fn label(&self) -> &'static str {
        match self {
            DistributionKey::OwnershipShare => "MEA",
            DistributionKey::LivingArea => "Wohnfläche",
            DistributionKey::PersonCount => "Personen",
            DistributionKey::UnitCount => "Einheiten",
            DistributionKey::PerFlat => "pro Wohnung",
            DistributionKey::ColdWater => "Kaltwasser",
            DistributionKey::TotalWater => "Wasser gesamt",
            DistributionKey::HeatingEnergy => "Heizenergie",
            DistributionKey::WarmWaterEnergy => "Warmwasserenergie",
            DistributionKey::Individual => "Einzelzuordnung",
        }
    }

    /// 基数单位
    pub fn unit(&self) -> &'static str {
        match self {
            DistributionKey::OwnershipShare => "‰",
            DistributionKey::LivingArea => "m²",
            DistributionKey::PersonCount => "Pers.",
            DistributionKey::UnitCount | DistributionKey::PerFlat => "Einh.",
            DistributionKey::ColdWater | DistributionKey::TotalWater => "m³",
            DistributionKey::HeatingEnergy | DistributionKey::WarmWaterEnergy => "MWh",
            DistributionKey::Individual => "-",
        }
    }

    /// 是否依赖表计读数
    pub fn is_consumption_based(&self) -> bool {
        matches!(
            self,
            DistributionKey::ColdWater
                | DistributionKey::TotalWater
                | DistributionKey::HeatingEnergy
                | DistributionKey::WarmWaterEnergy
        )
    }
}

impl fmt::Display for DistributionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 费用类别种类 (Category Kind)
// ==========================================
// 创建时显式标记，不再按名称前缀判断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryKind {
    Operating, // 普通运营费用
    Heating,   // 供暖相关
}

impl CategoryKind {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "HEATING" => CategoryKind::Heating,
            _ => CategoryKind::Operating,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CategoryKind::Operating => "OPERATING",
            CategoryKind::Heating => "HEATING",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 表计类型 (Meter Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeterType {
    ColdWater,     // 冷水表 (m³)
    WarmWater,     // 热水表 (m³)
    HeatHeating,   // 热量表 - 采暖 (MWh)
    HeatWarmWater, // 热量表 - 热水 (MWh)
}

impl MeterType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "COLD_WATER" => Some(MeterType::ColdWater),
            "WARM_WATER" => Some(MeterType::WarmWater),
            "HEAT_HEATING" => Some(MeterType::HeatHeating),
            "HEAT_WARM_WATER" => Some(MeterType::HeatWarmWater),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            MeterType::ColdWater => "COLD_WATER",
            MeterType::WarmWater => "WARM_WATER",
            MeterType::HeatHeating => "HEAT_HEATING",
            MeterType::HeatWarmWater => "HEAT_WARM_WATER",
        }
    }
}

impl fmt::Display for MeterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 供暖系统类型 (Heating System Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeatingSystemType {
    HeatingOnly,             // 仅采暖
    CombinedHeatingHotWater, // 采暖 + 热水联合系统
}

impl HeatingSystemType {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "COMBINED_HEATING_HOT_WATER" | "COMBINED" => HeatingSystemType::CombinedHeatingHotWater,
            _ => HeatingSystemType::HeatingOnly,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            HeatingSystemType::HeatingOnly => "HEATING_ONLY",
            HeatingSystemType::CombinedHeatingHotWater => "COMBINED_HEATING_HOT_WATER",
        }
    }

    /// 是否需要从总能耗中扣除热水能耗
    pub fn includes_hot_water(&self) -> bool {
        matches!(self, HeatingSystemType::CombinedHeatingHotWater)
    }
}

// ==========================================
// 热水计量口径 (Hot Water Unit Mode)
// ==========================================
// 指定热水表读数的单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HotwaterUnitMode {
    Mwh,      // 热量表读数 (MWh)
    Kwh,      // 热量表读数 (kWh)
    VolumeM3, // 水量表读数 (m³)，按供水温度估算能耗
}

impl HotwaterUnitMode {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "KWH" => HotwaterUnitMode::Kwh,
            "VOLUME_M3" | "M3" => HotwaterUnitMode::VolumeM3,
            _ => HotwaterUnitMode::Mwh,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            HotwaterUnitMode::Mwh => "MWH",
            HotwaterUnitMode::Kwh => "KWH",
            HotwaterUnitMode::VolumeM3 => "VOLUME_M3",
        }
    }
}

impl Default for HotwaterUnitMode {
    fn default() -> Self {
        HotwaterUnitMode::Mwh
    }
}

// ==========================================
// 结算状态 (Statement Status)
// ==========================================
// 状态机: DRAFT --(recompute)--> DRAFT ; DRAFT --(finalize)--> FINALIZED (终态)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementStatus {
    Draft,     // 草稿
    Finalized, // 已定稿
}

impl StatementStatus {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "FINALIZED" => StatementStatus::Finalized,
            _ => StatementStatus::Draft,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            StatementStatus::Draft => "DRAFT",
            StatementStatus::Finalized => "FINALIZED",
        }
    }
}

impl fmt::Display for StatementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 结算行费用类型 (Cost Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostType {
    Operating,            // 普通运营费用
    HeatingBase,          // 采暖基本费
    HeatingConsumption,   // 采暖计量费
    WarmWaterBase,        // 热水基本费
    WarmWaterConsumption, // 热水计量费
}

impl CostType {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "HEATING_BASE" => CostType::HeatingBase,
            "HEATING_CONSUMPTION" => CostType::HeatingConsumption,
            "WARM_WATER_BASE" => CostType::WarmWaterBase,
            "WARM_WATER_CONSUMPTION" => CostType::WarmWaterConsumption,
            _ => CostType::Operating,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CostType::Operating => "OPERATING",
            CostType::HeatingBase => "HEATING_BASE",
            CostType::HeatingConsumption => "HEATING_CONSUMPTION",
            CostType::WarmWaterBase => "WARM_WATER_BASE",
            CostType::WarmWaterConsumption => "WARM_WATER_CONSUMPTION",
        }
    }

    /// 供暖四项的展示标签
    pub fn label(&self) -> &'static str {
        match self {
            CostType::Operating => "Betriebskosten",
            CostType::HeatingBase => "Heizung Grundkosten",
            CostType::HeatingConsumption => "Heizung Verbrauchskosten",
            CostType::WarmWaterBase => "Warmwasser Grundkosten",
            CostType::WarmWaterConsumption => "Warmwasser Verbrauchskosten",
        }
    }

    pub fn is_heating(&self) -> bool {
        !matches!(self, CostType::Operating)
    }
}

impl fmt::Display for CostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_key_parse_labels_and_ids() {
        assert_eq!(DistributionKey::parse("Wohnfläche"), Some(DistributionKey::LivingArea));
        assert_eq!(DistributionKey::parse(" MEA "), Some(DistributionKey::OwnershipShare));
        assert_eq!(DistributionKey::parse("total_water"), Some(DistributionKey::TotalWater));
        assert_eq!(DistributionKey::parse("Aufzugsschlüssel"), None);

        for key in DistributionKey::ALL {
            assert_eq!(DistributionKey::parse(key.to_db_str()), Some(key));
            assert_eq!(DistributionKey::parse(key.label()), Some(key));
        }
    }

    #[test]
    fn test_statement_status_round_trip() {
        assert_eq!(StatementStatus::from_str("FINALIZED"), StatementStatus::Finalized);
        assert_eq!(StatementStatus::from_str("draft"), StatementStatus::Draft);
        assert_eq!(StatementStatus::Finalized.to_string(), "FINALIZED");
    }

    #[test]
    fn test_cost_type_heating_flags() {
        assert!(!CostType::Operating.is_heating());
        assert!(CostType::WarmWaterConsumption.is_heating());
        assert_eq!(CostType::from_str("HEATING_BASE"), CostType::HeatingBase);
    }
}
