use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{CommitStatus, SpinCommit, WheelStore};
use crate::error::AppResult;
use crate::models::{DeviceRecord, PrizeState, SpinRecord};

#[derive(Debug, Default)]
struct Inner {
    prizes: Vec<PrizeState>,
    devices: HashMap<String, DeviceRecord>,
    spins: Vec<SpinRecord>,
    next_spin_id: i64,
}

/// 进程内存存储, 所有写操作在同一把写锁内完成
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WheelStore for MemoryStore {
    async fn seed(&self, initial: &[PrizeState]) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        for state in initial {
            if !inner.prizes.iter().any(|p| p.name == state.name) {
                inner.prizes.push(state.clone());
            }
        }
        Ok(())
    }

    async fn rollover_daily_counters(&self, today: NaiveDate) -> AppResult<u64> {
        // 先用读锁判断, 同一天内的重复调用不争抢写锁
        if self
            .inner
            .read()
            .await
            .prizes
            .iter()
            .all(|p| p.last_reset_day == today)
        {
            return Ok(0);
        }

        let mut inner = self.inner.write().await;
        let reset = inner
            .prizes
            .iter_mut()
            .map(|p| p.rollover(today))
            .filter(|&changed| changed)
            .count();
        Ok(reset as u64)
    }

    async fn prize_states(&self) -> AppResult<Vec<PrizeState>> {
        Ok(self.inner.read().await.prizes.clone())
    }

    async fn find_device(&self, device_id: &str) -> AppResult<Option<DeviceRecord>> {
        Ok(self.inner.read().await.devices.get(device_id).cloned())
    }

    async fn commit(&self, commit: &SpinCommit) -> AppResult<CommitStatus> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        if let Some(device_id) = &commit.device_id
            && inner.devices.get(device_id).is_some_and(|d| d.has_spun)
        {
            return Ok(CommitStatus::DeviceAlreadySpun);
        }

        if let Some(name) = &commit.prize {
            let Some(state) = inner.prizes.iter_mut().find(|p| &p.name == name) else {
                return Ok(CommitStatus::PrizeUnavailable);
            };
            if !state.take_one() {
                return Ok(CommitStatus::PrizeUnavailable);
            }
        }

        if let Some(device_id) = &commit.device_id {
            inner.devices.insert(
                device_id.clone(),
                DeviceRecord {
                    device_id: device_id.clone(),
                    has_spun: true,
                    spun_at: Some(commit.spun_at),
                },
            );
        }

        inner.next_spin_id += 1;
        let record = SpinRecord {
            id: inner.next_spin_id,
            device_id: commit.device_id.clone(),
            prize_won: commit.outcome_name.clone(),
            is_win: commit.prize.is_some(),
            spun_at: commit.spun_at,
        };
        inner.spins.push(record.clone());

        Ok(CommitStatus::Applied(record))
    }

    async fn list_spins(&self, offset: u64, limit: u64) -> AppResult<(Vec<SpinRecord>, u64)> {
        let inner = self.inner.read().await;
        let total = inner.spins.len() as u64;
        let items = inner
            .spins
            .iter()
            .rev()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((items, total))
    }

    async fn count_spins(&self) -> AppResult<u64> {
        Ok(self.inner.read().await.spins.len() as u64)
    }

    async fn reset(&self, initial: &[PrizeState]) -> AppResult<Vec<PrizeState>> {
        let mut inner = self.inner.write().await;
        inner.prizes = initial.to_vec();
        inner.devices.clear();
        inner.spins.clear();
        Ok(inner.prizes.clone())
    }
}
