//! 转盘状态存储
//!
//! 分配逻辑只依赖 [`WheelStore`], 存储实现可替换:
//! - [`MemoryStore`]: 进程内存, 用于测试与单进程部署
//! - [`crate::database::DatabaseStore`]: sea-orm (PostgreSQL / SQLite)
//!
//! `commit` 必须是原子的: 库存扣减、当日计数、设备标记与抽奖记录
//! 要么全部生效, 要么全部不生效。

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::AppResult;
use crate::models::{DeviceRecord, PrizeState, SpinRecord};

pub use memory::MemoryStore;

/// 一次待提交的抽奖结果
#[derive(Debug, Clone, PartialEq)]
pub struct SpinCommit {
    /// 中奖奖品名称; None 表示未中奖
    pub prize: Option<String>,
    /// 写入抽奖记录的结果名称 (未中奖时为未中奖奖位名称)
    pub outcome_name: String,
    pub device_id: Option<String>,
    pub spun_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitStatus {
    /// 全部写入成功
    Applied(SpinRecord),
    /// 条件扣减失败 (库存为 0 或已达当日上限), 未做任何修改
    PrizeUnavailable,
    /// 设备已被并发请求标记, 未做任何修改
    DeviceAlreadySpun,
}

#[async_trait]
pub trait WheelStore: Send + Sync {
    /// 补齐缺失的奖品状态 (已存在的行保持不变)
    async fn seed(&self, initial: &[PrizeState]) -> AppResult<()>;

    /// 将 last_reset_day 不是今天的奖品当日计数清零, 返回重置的奖品数
    async fn rollover_daily_counters(&self, today: NaiveDate) -> AppResult<u64>;

    async fn prize_states(&self) -> AppResult<Vec<PrizeState>>;

    async fn find_device(&self, device_id: &str) -> AppResult<Option<DeviceRecord>>;

    /// 原子提交一次抽奖
    async fn commit(&self, commit: &SpinCommit) -> AppResult<CommitStatus>;

    /// 按时间倒序分页获取抽奖记录, 同时返回总数
    async fn list_spins(&self, offset: u64, limit: u64) -> AppResult<(Vec<SpinRecord>, u64)>;

    async fn count_spins(&self) -> AppResult<u64>;

    /// 清空设备与抽奖记录并恢复满库存 (单个原子操作)
    async fn reset(&self, initial: &[PrizeState]) -> AppResult<Vec<PrizeState>>;
}
