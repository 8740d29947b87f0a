use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{PrizeState, SpinRecord, WheelSlot};
use crate::utils::PageInfo;

/// 抽奖请求
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct SpinRequest {
    /// 客户端设备ID (可选, 也可通过 X-Device-ID 请求头传递)
    #[serde(default, alias = "deviceId")]
    pub device_id: Option<String>,
    /// 客户端已使用的抽奖次数 (客户端上报, 不可信)
    #[serde(default, alias = "spinsUsed", alias = "priorSpinCount")]
    pub prior_spin_count: u32,
}

/// 快照查询参数
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SnapshotQuery {
    /// 设备ID (可选, 也可通过 X-Device-ID 请求头传递)
    #[serde(default, alias = "deviceId")]
    pub device_id: Option<String>,
}

/// 单个奖品的库存快照
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PrizeSnapshot {
    pub name: String,
    /// 剩余库存 (null = 不限)
    pub remaining_stock: Option<i64>,
    /// 总库存 (null = 不限)
    pub total_capacity: Option<i64>,
    /// 累计发放
    pub distributed_total: i64,
    /// 当日已发放
    pub distributed_today: i64,
    /// 每日上限 (null = 不限)
    pub daily_capacity: Option<i64>,
    /// 剩余库存百分比 (保留一位小数)
    pub remaining_percentage: Option<f64>,
    /// 当前是否可抽中
    pub available: bool,
}

impl From<&PrizeState> for PrizeSnapshot {
    fn from(s: &PrizeState) -> Self {
        PrizeSnapshot {
            name: s.name.clone(),
            remaining_stock: s.remaining_stock,
            total_capacity: s.total_capacity,
            distributed_total: s.distributed_total,
            distributed_today: s.distributed_today,
            daily_capacity: s.daily_capacity,
            remaining_percentage: s.remaining_percentage(),
            available: s.is_available(),
        }
    }
}

/// 仪表盘快照
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WheelSnapshot {
    pub per_prize: Vec<PrizeSnapshot>,
    /// 请求设备是否已抽过
    pub device_has_spun: bool,
    /// 实物奖品累计发放总数
    pub total_distributed: i64,
    /// 累计抽奖次数 (含未中奖)
    pub total_spins: u64,
    /// 累计未中奖次数
    pub no_win_total: u64,
}

/// 抽奖响应
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SpinResponse {
    /// 结果名称 (奖品名或未中奖名称)
    pub outcome: String,
    pub is_win: bool,
    /// 展示给用户的文案
    pub message: String,
    /// 剩余抽奖次数 (null = 不限)
    pub spins_remaining: Option<u32>,
    pub spun_at: DateTime<Utc>,
    /// 提交后的计数快照
    pub counters_snapshot: WheelSnapshot,
}

/// 转盘奖位配置 (含实际概率)
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WheelSlotResponse {
    pub name: String,
    pub weight: f64,
    /// 静态概率 (weight / 总权重), 百分比
    pub probability_percent: f64,
    pub total_capacity: Option<i64>,
    pub daily_capacity: Option<i64>,
    pub is_no_win: bool,
}

impl WheelSlotResponse {
    pub fn from_slot(slot: &WheelSlot, total_weight: f64) -> Self {
        let (total_capacity, daily_capacity, is_no_win) = match slot {
            WheelSlot::Prize(p) => (p.total_capacity, p.daily_capacity, false),
            WheelSlot::NoWin(_) => (None, None, true),
        };
        let probability_percent = if total_weight > 0.0 {
            (slot.weight() / total_weight * 10000.0).round() / 100.0
        } else {
            0.0
        };
        WheelSlotResponse {
            name: slot.name().to_string(),
            weight: slot.weight(),
            probability_percent,
            total_capacity,
            daily_capacity,
            is_no_win,
        }
    }
}

/// 抽奖记录响应
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SpinRecordResponse {
    pub id: i64,
    pub device_id: Option<String>,
    pub prize_won: String,
    pub is_win: bool,
    pub spun_at: DateTime<Utc>,
}

impl From<SpinRecord> for SpinRecordResponse {
    fn from(r: SpinRecord) -> Self {
        SpinRecordResponse {
            id: r.id,
            device_id: r.device_id,
            prize_won: r.prize_won,
            is_win: r.is_win,
            spun_at: r.spun_at,
        }
    }
}

/// 抽奖记录分页响应
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SpinHistoryPage {
    pub items: Vec<SpinRecordResponse>,
    pub pagination: PageInfo,
}

/// 重置响应
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ResetResponse {
    pub message: String,
    pub prizes: Vec<PrizeSnapshot>,
}
