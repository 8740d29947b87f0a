//! 转盘奖品的领域类型: 静态配置 (PrizeTable) 与可变计数 (PrizeState)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::PrizeConfig;
use crate::entities::{
    device_entity as devices, prize_state_entity as prize_states, spin_record_entity as spins,
};
use crate::error::{AppError, AppResult};

const DEFAULT_NO_WIN_NAME: &str = "Try Again";
const DEFAULT_NO_WIN_MESSAGE: &str = "Better luck next time!";

/// 一次抽奖的结果: 实物奖品或未中奖哨兵
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Outcome {
    Prize(String),
    NoWin,
}

impl Outcome {
    pub fn is_win(&self) -> bool {
        matches!(self, Outcome::Prize(_))
    }

    pub fn prize_name(&self) -> Option<&str> {
        match self {
            Outcome::Prize(name) => Some(name),
            Outcome::NoWin => None,
        }
    }
}

/// 奖品静态配置, 启动后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct PrizeDefinition {
    pub name: String,
    /// 相对权重 (> 0)
    pub weight: f64,
    /// 总库存, None = 不限
    pub total_capacity: Option<i64>,
    /// 每日发放上限, None = 不限
    pub daily_capacity: Option<i64>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoWinDefinition {
    pub name: String,
    /// 可以为 0 (永不抽中, 仅在全部奖品不可用时作为兜底)
    pub weight: f64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WheelSlot {
    Prize(PrizeDefinition),
    NoWin(NoWinDefinition),
}

impl WheelSlot {
    pub fn name(&self) -> &str {
        match self {
            WheelSlot::Prize(p) => &p.name,
            WheelSlot::NoWin(n) => &n.name,
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            WheelSlot::Prize(p) => p.weight,
            WheelSlot::NoWin(n) => n.weight,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            WheelSlot::Prize(p) => Outcome::Prize(p.name.clone()),
            WheelSlot::NoWin(_) => Outcome::NoWin,
        }
    }
}

/// 参与加权抽取的候选项
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub outcome: Outcome,
    pub weight: f64,
}

impl Candidate {
    pub fn new(outcome: Outcome, weight: f64) -> Self {
        Self { outcome, weight }
    }
}

/// 转盘奖位表 (顺序固定, 抽取时按此顺序累加权重)
#[derive(Debug, Clone, PartialEq)]
pub struct PrizeTable {
    slots: Vec<WheelSlot>,
}

impl PrizeTable {
    /// 从配置构建并校验奖位表:
    /// - 名称非空且唯一
    /// - 奖品权重 > 0, 未中奖权重 >= 0
    /// - 库存/每日上限 >= 0
    /// - 权重总和有限
    /// - 最多一个未中奖奖位, 未配置时追加一个权重为 0 的兜底奖位
    pub fn from_config(prizes: &[PrizeConfig]) -> AppResult<Self> {
        let mut seen = HashSet::new();
        let mut slots = Vec::with_capacity(prizes.len() + 1);
        let mut has_no_win = false;

        for p in prizes {
            let name = p.name.trim();
            if name.is_empty() {
                return Err(AppError::ConfigError("prize name must not be empty".into()));
            }
            if !seen.insert(name.to_string()) {
                return Err(AppError::ConfigError(format!("duplicate prize name: {name}")));
            }
            if !p.weight.is_finite() || p.weight < 0.0 {
                return Err(AppError::ConfigError(format!(
                    "prize {name} has invalid weight {}",
                    p.weight
                )));
            }

            if p.no_win {
                if has_no_win {
                    return Err(AppError::ConfigError(
                        "only one no-win slot may be configured".into(),
                    ));
                }
                has_no_win = true;
                slots.push(WheelSlot::NoWin(NoWinDefinition {
                    name: name.to_string(),
                    weight: p.weight,
                    message: p
                        .message
                        .clone()
                        .unwrap_or_else(|| DEFAULT_NO_WIN_MESSAGE.to_string()),
                }));
                continue;
            }

            if p.weight <= 0.0 {
                return Err(AppError::ConfigError(format!(
                    "prize {name} must have a positive weight"
                )));
            }
            for (label, cap) in [("total", p.total_capacity), ("daily", p.daily_capacity)] {
                if let Some(c) = cap
                    && c < 0
                {
                    return Err(AppError::ConfigError(format!(
                        "prize {name} has negative {label} capacity"
                    )));
                }
            }

            slots.push(WheelSlot::Prize(PrizeDefinition {
                name: name.to_string(),
                weight: p.weight,
                total_capacity: p.total_capacity,
                daily_capacity: p.daily_capacity,
                message: p
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("Congratulations! You won {name}!")),
            }));
        }

        if !has_no_win {
            if seen.contains(DEFAULT_NO_WIN_NAME) {
                return Err(AppError::ConfigError(format!(
                    "{DEFAULT_NO_WIN_NAME} is reserved for the no-win slot"
                )));
            }
            slots.push(WheelSlot::NoWin(NoWinDefinition {
                name: DEFAULT_NO_WIN_NAME.to_string(),
                weight: 0.0,
                message: DEFAULT_NO_WIN_MESSAGE.to_string(),
            }));
        }

        let table = Self { slots };
        if !table.total_weight().is_finite() {
            return Err(AppError::ConfigError(
                "sum of prize weights must be finite".into(),
            ));
        }
        Ok(table)
    }

    pub fn slots(&self) -> &[WheelSlot] {
        &self.slots
    }

    pub fn prizes(&self) -> impl Iterator<Item = &PrizeDefinition> {
        self.slots.iter().filter_map(|s| match s {
            WheelSlot::Prize(p) => Some(p),
            WheelSlot::NoWin(_) => None,
        })
    }

    pub fn no_win(&self) -> &NoWinDefinition {
        self.slots
            .iter()
            .find_map(|s| match s {
                WheelSlot::NoWin(n) => Some(n),
                WheelSlot::Prize(_) => None,
            })
            .expect("prize table always holds a no-win slot")
    }

    pub fn prize(&self, name: &str) -> Option<&PrizeDefinition> {
        self.prizes().find(|p| p.name == name)
    }

    pub fn outcome_name<'a>(&'a self, outcome: &'a Outcome) -> &'a str {
        match outcome {
            Outcome::Prize(name) => name,
            Outcome::NoWin => &self.no_win().name,
        }
    }

    pub fn message(&self, outcome: &Outcome) -> String {
        match outcome {
            Outcome::Prize(name) => self
                .prize(name)
                .map(|p| p.message.clone())
                .unwrap_or_else(|| "Congratulations on your prize!".to_string()),
            Outcome::NoWin => self.no_win().message.clone(),
        }
    }

    /// 所有奖位的静态权重之和
    pub fn total_weight(&self) -> f64 {
        self.slots.iter().map(WheelSlot::weight).sum()
    }

    /// 按配置初始化满库存状态
    pub fn initial_states(&self, today: NaiveDate) -> Vec<PrizeState> {
        self.prizes().map(|p| PrizeState::full(p, today)).collect()
    }
}

/// 奖品可变计数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeState {
    pub name: String,
    pub total_capacity: Option<i64>,
    pub daily_capacity: Option<i64>,
    /// None = 不限库存
    pub remaining_stock: Option<i64>,
    pub distributed_today: i64,
    pub distributed_total: i64,
    pub last_reset_day: NaiveDate,
}

impl PrizeState {
    pub fn full(def: &PrizeDefinition, today: NaiveDate) -> Self {
        Self {
            name: def.name.clone(),
            total_capacity: def.total_capacity,
            daily_capacity: def.daily_capacity,
            remaining_stock: def.total_capacity,
            distributed_today: 0,
            distributed_total: 0,
            last_reset_day: today,
        }
    }

    pub fn has_stock(&self) -> bool {
        self.remaining_stock.is_none_or(|remain| remain > 0)
    }

    pub fn under_daily_cap(&self) -> bool {
        self.daily_capacity
            .is_none_or(|cap| self.distributed_today < cap)
    }

    /// 当前可发放: 有库存且未达当日上限
    pub fn is_available(&self) -> bool {
        self.has_stock() && self.under_daily_cap()
    }

    /// 跨天时清零当日计数, 返回是否发生了重置
    pub fn rollover(&mut self, today: NaiveDate) -> bool {
        if self.last_reset_day == today {
            return false;
        }
        self.distributed_today = 0;
        self.last_reset_day = today;
        true
    }

    /// 条件扣减: 库存与当日计数同时更新, 不可用时不做任何修改
    pub fn take_one(&mut self) -> bool {
        if !self.is_available() {
            return false;
        }
        if let Some(remain) = self.remaining_stock.as_mut() {
            *remain -= 1;
        }
        self.distributed_today += 1;
        self.distributed_total += 1;
        true
    }

    /// 剩余库存百分比 (不限库存或总量为 0 时为 None)
    pub fn remaining_percentage(&self) -> Option<f64> {
        match (self.remaining_stock, self.total_capacity) {
            (Some(remain), Some(total)) if total > 0 => {
                Some((remain as f64 / total as f64 * 1000.0).round() / 10.0)
            }
            _ => None,
        }
    }
}

impl From<prize_states::Model> for PrizeState {
    fn from(m: prize_states::Model) -> Self {
        PrizeState {
            name: m.name,
            total_capacity: m.total_capacity,
            daily_capacity: m.daily_capacity,
            remaining_stock: m.remaining_stock,
            distributed_today: m.distributed_today,
            distributed_total: m.distributed_total,
            last_reset_day: m.last_reset_day,
        }
    }
}

/// 设备抽奖标记 (客户端提供的 ID, 未经认证, 仅作弱防刷)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: String,
    pub has_spun: bool,
    pub spun_at: Option<DateTime<Utc>>,
}

impl From<devices::Model> for DeviceRecord {
    fn from(m: devices::Model) -> Self {
        DeviceRecord {
            device_id: m.device_id,
            has_spun: m.has_spun,
            spun_at: m.spun_at,
        }
    }
}

/// 抽奖审计记录 (只追加)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinRecord {
    pub id: i64,
    pub device_id: Option<String>,
    pub prize_won: String,
    pub is_win: bool,
    pub spun_at: DateTime<Utc>,
}

impl From<spins::Model> for SpinRecord {
    fn from(m: spins::Model) -> Self {
        SpinRecord {
            id: m.id as i64,
            device_id: m.device_id,
            prize_won: m.prize_won,
            is_win: m.is_win,
            spun_at: m.spun_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
    }

    fn cap_config() -> Vec<PrizeConfig> {
        vec![
            PrizeConfig::limited("Cap", 30.0, 2, 1, "cap!"),
            PrizeConfig::no_win("Try Again", 25.0, "again"),
        ]
    }

    #[test]
    fn test_table_keeps_config_order() {
        let table = PrizeTable::from_config(&cap_config()).unwrap();
        let names: Vec<&str> = table.slots().iter().map(WheelSlot::name).collect();
        assert_eq!(names, vec!["Cap", "Try Again"]);
        assert_eq!(table.total_weight(), 55.0);
        assert_eq!(table.outcome_name(&Outcome::NoWin), "Try Again");
        assert_eq!(table.message(&Outcome::Prize("Cap".into())), "cap!");
    }

    #[test]
    fn test_table_rejects_overflowing_total_weight() {
        let err = PrizeTable::from_config(&[
            PrizeConfig::limited("Shirt", 1e308, 5, 5, "shirt"),
            PrizeConfig::limited("Book", 1e308, 5, 5, "book"),
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_table_appends_zero_weight_no_win() {
        let table =
            PrizeTable::from_config(&[PrizeConfig::limited("Pen", 10.0, 5, 5, "pen")]).unwrap();
        assert_eq!(table.slots().len(), 2);
        assert_eq!(table.no_win().weight, 0.0);
        assert_eq!(table.no_win().name, "Try Again");
    }

    #[test]
    fn test_table_rejects_invalid_config() {
        let dup = vec![
            PrizeConfig::limited("Cap", 1.0, 1, 1, ""),
            PrizeConfig::limited("Cap", 1.0, 1, 1, ""),
        ];
        assert!(PrizeTable::from_config(&dup).is_err());

        let zero_weight = vec![PrizeConfig::limited("Cap", 0.0, 1, 1, "")];
        assert!(PrizeTable::from_config(&zero_weight).is_err());

        let negative_cap = vec![PrizeConfig::limited("Cap", 1.0, -1, 1, "")];
        assert!(PrizeTable::from_config(&negative_cap).is_err());

        let two_no_win = vec![
            PrizeConfig::no_win("Nope", 1.0, ""),
            PrizeConfig::no_win("Again", 1.0, ""),
        ];
        assert!(PrizeTable::from_config(&two_no_win).is_err());
    }

    #[test]
    fn test_take_one_updates_both_counters() {
        let table = PrizeTable::from_config(&cap_config()).unwrap();
        let mut state = table.initial_states(day(1)).remove(0);
        assert!(state.take_one());
        assert_eq!(state.remaining_stock, Some(1));
        assert_eq!(state.distributed_today, 1);
        assert_eq!(state.distributed_total, 1);

        // 当日上限 1, 第二次扣减失败且不修改任何计数
        assert!(!state.take_one());
        assert_eq!(state.remaining_stock, Some(1));
        assert_eq!(state.distributed_today, 1);
    }

    #[test]
    fn test_rollover_resets_daily_only() {
        let table = PrizeTable::from_config(&cap_config()).unwrap();
        let mut state = table.initial_states(day(1)).remove(0);
        assert!(state.take_one());

        assert!(!state.rollover(day(1)));
        assert!(state.rollover(day(2)));
        assert_eq!(state.distributed_today, 0);
        assert_eq!(state.remaining_stock, Some(1));
        assert_eq!(state.last_reset_day, day(2));
        assert!(!state.rollover(day(2)));
    }

    #[test]
    fn test_unbounded_prize_always_available() {
        let def = PrizeDefinition {
            name: "Sticker".into(),
            weight: 1.0,
            total_capacity: None,
            daily_capacity: None,
            message: String::new(),
        };
        let mut state = PrizeState::full(&def, day(1));
        for _ in 0..100 {
            assert!(state.take_one());
        }
        assert_eq!(state.remaining_stock, None);
        assert_eq!(state.distributed_total, 100);
        assert_eq!(state.remaining_percentage(), None);
    }

    #[test]
    fn test_remaining_percentage() {
        let table = PrizeTable::from_config(&cap_config()).unwrap();
        let mut state = table.initial_states(day(1)).remove(0);
        assert_eq!(state.remaining_percentage(), Some(100.0));
        state.take_one();
        assert_eq!(state.remaining_percentage(), Some(50.0));
    }
}
