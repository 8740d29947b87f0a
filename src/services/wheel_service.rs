use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};

use crate::config::{AvailabilityPolicy, WheelConfig};
use crate::error::{AppError, AppResult, EligibilityRejection};
use crate::models::{
    Candidate, Outcome, PrizeSnapshot, PrizeState, PrizeTable, ResetResponse, SpinHistoryPage,
    SpinRecord, SpinRecordResponse, SpinRequest, SpinResponse, WheelSlotResponse, WheelSnapshot,
};
use crate::services::allocation::{
    all_candidates, draw_weighted_outcome, evaluate_eligibility, filter_eligible_prizes,
    resolve_availability, total_weight,
};
use crate::store::{CommitStatus, SpinCommit, WheelStore};
use crate::utils::{Clock, PageInfo, PageQuery};

const MAX_DEVICE_ID_LEN: usize = 255;

/// 转盘抽奖服务
///
/// 资格校验到提交之间由 `spin_gate` 串行化, 同一进程内不会有两个请求
/// 同时看到最后一件库存; 存储层的条件扣减保证多进程部署同样不会超发。
#[derive(Clone)]
pub struct WheelService {
    table: Arc<PrizeTable>,
    store: Arc<dyn WheelStore>,
    clock: Arc<dyn Clock>,
    rng: Arc<Mutex<StdRng>>,
    policy: AvailabilityPolicy,
    max_spins_per_session: Option<u32>,
    spin_gate: Arc<tokio::sync::Mutex<()>>,
}

impl WheelService {
    pub fn new(
        table: PrizeTable,
        store: Arc<dyn WheelStore>,
        clock: Arc<dyn Clock>,
        config: &WheelConfig,
    ) -> Self {
        let rng = match config.draw_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            table: Arc::new(table),
            store,
            clock,
            rng: Arc::new(Mutex::new(rng)),
            policy: config.availability_policy,
            max_spins_per_session: config.max_spins_per_session,
            spin_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// 启动时补齐奖品状态
    pub async fn init(&self) -> AppResult<()> {
        let initial = self.table.initial_states(self.clock.today());
        self.store.seed(&initial).await?;
        self.rollover_if_needed().await?;
        log::info!(
            "Wheel ready: {} slots, policy={:?}, max_spins_per_session={:?}",
            self.table.slots().len(),
            self.policy,
            self.max_spins_per_session
        );
        Ok(())
    }

    /// 抽奖 (Spin)
    ///
    /// 逻辑:
    /// 1. 跨天时重置当日计数
    /// 2. 资格校验 (设备已抽 / 次数用尽), 拒绝时不做任何写入
    /// 3. 按策略加权抽取 (预过滤 或 抽取后替换)
    /// 4. 原子提交; 库存在提交时被抢光则改为未中奖
    /// 5. 返回结果与最新计数
    pub async fn spin(&self, request: SpinRequest) -> AppResult<SpinResponse> {
        let device_id = normalize_device_id(request.device_id)?;

        let _gate = self.spin_gate.lock().await;
        self.rollover_if_needed().await?;

        let device = match &device_id {
            Some(id) => self.store.find_device(id).await?,
            None => None,
        };
        evaluate_eligibility(
            device.as_ref(),
            request.prior_spin_count,
            self.max_spins_per_session,
        )
        .map_err(AppError::EligibilityRejected)?;

        let states = self.store.prize_states().await?;
        let drawn = self.draw(&states);

        let spun_at = self.clock.now();
        let has_device = device_id.is_some();
        let (outcome, record) = self.commit_outcome(drawn, device_id, spun_at).await?;

        log::info!(
            "Spin committed: device={} outcome={}",
            record.device_id.as_deref().unwrap_or("-"),
            record.prize_won
        );

        let counters_snapshot = self.build_snapshot(has_device).await?;

        Ok(SpinResponse {
            outcome: record.prize_won,
            is_win: outcome.is_win(),
            message: self.table.message(&outcome),
            spins_remaining: self
                .max_spins_per_session
                .map(|max| max.saturating_sub(request.prior_spin_count + 1)),
            spun_at,
            counters_snapshot,
        })
    }

    /// 仪表盘快照 (只读, 先执行跨天重置)
    pub async fn snapshot(&self, device_id: Option<String>) -> AppResult<WheelSnapshot> {
        let device_id = normalize_device_id(device_id)?;
        self.rollover_if_needed().await?;

        let device_has_spun = match &device_id {
            Some(id) => self
                .store
                .find_device(id)
                .await?
                .is_some_and(|d| d.has_spun),
            None => false,
        };
        self.build_snapshot(device_has_spun).await
    }

    /// 奖位配置与静态概率
    pub fn list_prizes(&self) -> Vec<WheelSlotResponse> {
        let total = self.table.total_weight();
        self.table
            .slots()
            .iter()
            .map(|slot| WheelSlotResponse::from_slot(slot, total))
            .collect()
    }

    /// 抽奖记录 (倒序分页)
    pub async fn history(&self, query: &PageQuery) -> AppResult<SpinHistoryPage> {
        let (items, total) = self
            .store
            .list_spins(query.offset(), query.limit())
            .await?;
        Ok(SpinHistoryPage {
            items: items.into_iter().map(SpinRecordResponse::from).collect(),
            pagination: PageInfo::new(query, total),
        })
    }

    /// 管理员重置: 清空设备与记录, 恢复满库存
    pub async fn reset(&self) -> AppResult<ResetResponse> {
        let _gate = self.spin_gate.lock().await;
        let initial = self.table.initial_states(self.clock.today());
        let restored = self.store.reset(&initial).await?;
        log::warn!("Wheel state reset: {} prizes restored to full stock", restored.len());

        Ok(ResetResponse {
            message: "All prizes restored to full stock.".to_string(),
            prizes: self.ordered(&restored).map(PrizeSnapshot::from).collect(),
        })
    }

    // -----------------------------
    // 内部辅助方法
    // -----------------------------

    async fn rollover_if_needed(&self) -> AppResult<()> {
        let today = self.clock.today();
        let reset = self.store.rollover_daily_counters(today).await?;
        if reset > 0 {
            log::info!("Daily counters rolled over to {today} for {reset} prizes");
        }
        Ok(())
    }

    fn draw(&self, states: &[PrizeState]) -> Outcome {
        match self.policy {
            AvailabilityPolicy::PreFilter => {
                let candidates = filter_eligible_prizes(&self.table, states);
                self.draw_from(&candidates)
            }
            AvailabilityPolicy::Substitute => {
                let drawn = self.draw_from(&all_candidates(&self.table));
                let resolved = resolve_availability(drawn.clone(), states);
                if resolved != drawn {
                    log::info!(
                        "Drawn prize {} unavailable, substituted with no-win",
                        self.table.outcome_name(&drawn)
                    );
                }
                resolved
            }
        }
    }

    fn draw_from(&self, candidates: &[Candidate]) -> Outcome {
        let total = total_weight(candidates);
        if !total.is_finite() || total <= 0.0 {
            return Outcome::NoWin;
        }
        let value = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen_range(0.0..total)
        };
        draw_weighted_outcome(candidates, value)
    }

    async fn commit_outcome(
        &self,
        drawn: Outcome,
        device_id: Option<String>,
        spun_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<(Outcome, SpinRecord)> {
        let mut outcome = drawn;
        loop {
            let commit = SpinCommit {
                prize: outcome.prize_name().map(str::to_string),
                outcome_name: self.table.outcome_name(&outcome).to_string(),
                device_id: device_id.clone(),
                spun_at,
            };

            match self.store.commit(&commit).await? {
                CommitStatus::Applied(record) => return Ok((outcome, record)),
                CommitStatus::PrizeUnavailable if outcome.is_win() => {
                    log::warn!(
                        "Prize {} exhausted at commit time, falling back to no-win",
                        commit.outcome_name
                    );
                    outcome = Outcome::NoWin;
                }
                CommitStatus::PrizeUnavailable => {
                    return Err(AppError::InternalError(
                        "no-win commit reported an unavailable prize".into(),
                    ));
                }
                CommitStatus::DeviceAlreadySpun => {
                    return Err(AppError::EligibilityRejected(
                        EligibilityRejection::DeviceAlreadySpun,
                    ));
                }
            }
        }
    }

    /// 按奖位表顺序排列状态, 未配置的历史奖品不展示
    fn ordered<'a>(&'a self, states: &'a [PrizeState]) -> impl Iterator<Item = &'a PrizeState> {
        self.table
            .prizes()
            .filter_map(move |p| states.iter().find(|s| s.name == p.name))
    }

    async fn build_snapshot(&self, device_has_spun: bool) -> AppResult<WheelSnapshot> {
        let states = self.store.prize_states().await?;
        let total_spins = self.store.count_spins().await?;

        let per_prize: Vec<PrizeSnapshot> =
            self.ordered(&states).map(PrizeSnapshot::from).collect();
        let total_distributed: i64 = per_prize.iter().map(|p| p.distributed_total).sum();

        Ok(WheelSnapshot {
            per_prize,
            device_has_spun,
            total_distributed,
            total_spins,
            no_win_total: total_spins.saturating_sub(total_distributed.max(0) as u64),
        })
    }
}

/// 设备ID: 去除首尾空白, 空字符串视为未提供
fn normalize_device_id(device_id: Option<String>) -> AppResult<Option<String>> {
    let Some(raw) = device_id else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > MAX_DEVICE_ID_LEN {
        return Err(AppError::MalformedRequest(format!(
            "device_id must be at most {MAX_DEVICE_ID_LEN} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrizeConfig;
    use crate::store::MemoryStore;
    use crate::utils::ManualClock;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap(),
        ))
    }

    fn wheel_config(policy: AvailabilityPolicy, max: Option<u32>) -> WheelConfig {
        WheelConfig {
            max_spins_per_session: max,
            availability_policy: policy,
            admin_token: String::new(),
            draw_seed: Some(42),
        }
    }

    /// 只有一顶帽子, 未中奖权重为 0
    fn single_cap_table() -> PrizeTable {
        PrizeTable::from_config(&[
            PrizeConfig::limited("Cap", 100.0, 1, 1, "Congratulations! You won a stylish cap!"),
            PrizeConfig::no_win("NoWin", 0.0, "Better luck next time!"),
        ])
        .unwrap()
    }

    async fn service_with(
        table: PrizeTable,
        store: Arc<dyn WheelStore>,
        clock: Arc<ManualClock>,
        config: WheelConfig,
    ) -> WheelService {
        let service = WheelService::new(table, store, clock, &config);
        service.init().await.unwrap();
        service
    }

    fn request(device: Option<&str>, prior: u32) -> SpinRequest {
        SpinRequest {
            device_id: device.map(str::to_string),
            prior_spin_count: prior,
        }
    }

    #[tokio::test]
    async fn test_single_cap_scenario_pre_filter() {
        let service = service_with(
            single_cap_table(),
            Arc::new(MemoryStore::new()),
            clock(),
            wheel_config(AvailabilityPolicy::PreFilter, Some(1)),
        )
        .await;

        let first = service.spin(request(Some("a"), 0)).await.unwrap();
        assert_eq!(first.outcome, "Cap");
        assert!(first.is_win);
        assert_eq!(first.message, "Congratulations! You won a stylish cap!");
        assert_eq!(first.spins_remaining, Some(0));
        assert_eq!(first.counters_snapshot.per_prize[0].remaining_stock, Some(0));

        let second = service.spin(request(Some("b"), 0)).await.unwrap();
        assert_eq!(second.outcome, "NoWin");
        assert!(!second.is_win);
        assert_eq!(second.counters_snapshot.no_win_total, 1);
        assert_eq!(second.counters_snapshot.total_spins, 2);
    }

    #[tokio::test]
    async fn test_single_cap_scenario_substitute() {
        let service = service_with(
            single_cap_table(),
            Arc::new(MemoryStore::new()),
            clock(),
            wheel_config(AvailabilityPolicy::Substitute, None),
        )
        .await;

        assert_eq!(service.spin(request(None, 0)).await.unwrap().outcome, "Cap");
        for _ in 0..5 {
            assert_eq!(service.spin(request(None, 0)).await.unwrap().outcome, "NoWin");
        }
    }

    #[tokio::test]
    async fn test_device_rejected_without_mutation() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(
            single_cap_table(),
            store.clone(),
            clock(),
            wheel_config(AvailabilityPolicy::PreFilter, None),
        )
        .await;

        service.spin(request(Some("device-1"), 0)).await.unwrap();
        let before = service.snapshot(None).await.unwrap();

        let err = service.spin(request(Some("device-1"), 0)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::EligibilityRejected(EligibilityRejection::DeviceAlreadySpun)
        ));
        // 首尾空白不影响设备识别
        let err = service.spin(request(Some("  device-1 "), 0)).await.unwrap_err();
        assert!(matches!(err, AppError::EligibilityRejected(_)));

        let after = service.snapshot(None).await.unwrap();
        assert_eq!(before, after);
        assert!(service.snapshot(Some("device-1".into())).await.unwrap().device_has_spun);
    }

    #[tokio::test]
    async fn test_anonymous_spin_reports_device_not_spun() {
        let service = service_with(
            single_cap_table(),
            Arc::new(MemoryStore::new()),
            clock(),
            wheel_config(AvailabilityPolicy::PreFilter, None),
        )
        .await;

        let anonymous = service.spin(SpinRequest::default()).await.unwrap();
        assert!(!anonymous.counters_snapshot.device_has_spun);

        let tracked = service.spin(request(Some("tablet-7"), 0)).await.unwrap();
        assert!(tracked.counters_snapshot.device_has_spun);
    }

    #[tokio::test]
    async fn test_spin_limit_exceeded() {
        let service = service_with(
            single_cap_table(),
            Arc::new(MemoryStore::new()),
            clock(),
            wheel_config(AvailabilityPolicy::PreFilter, Some(1)),
        )
        .await;

        let err = service.spin(request(None, 1)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::EligibilityRejected(EligibilityRejection::SpinLimitExceeded)
        ));
        assert_eq!(service.snapshot(None).await.unwrap().total_spins, 0);
    }

    #[tokio::test]
    async fn test_daily_cap_and_rollover() {
        let clock = clock();
        let table = PrizeTable::from_config(&[
            PrizeConfig::limited("Pen", 100.0, 10, 2, "pen"),
            PrizeConfig::no_win("Try Again", 0.0, "again"),
        ])
        .unwrap();
        let service = service_with(
            table,
            Arc::new(MemoryStore::new()),
            clock.clone(),
            wheel_config(AvailabilityPolicy::PreFilter, None),
        )
        .await;

        let outcomes: Vec<String> = {
            let mut v = Vec::new();
            for _ in 0..4 {
                v.push(service.spin(request(None, 0)).await.unwrap().outcome);
            }
            v
        };
        assert_eq!(outcomes, vec!["Pen", "Pen", "Try Again", "Try Again"]);

        clock.advance_days(1);
        let snapshot = service.snapshot(None).await.unwrap();
        assert_eq!(snapshot.per_prize[0].distributed_today, 0);
        assert_eq!(snapshot.per_prize[0].remaining_stock, Some(8));

        assert_eq!(service.spin(request(None, 0)).await.unwrap().outcome, "Pen");
    }

    #[tokio::test]
    async fn test_reset_restores_full_stock() {
        let service = service_with(
            single_cap_table(),
            Arc::new(MemoryStore::new()),
            clock(),
            wheel_config(AvailabilityPolicy::PreFilter, Some(1)),
        )
        .await;
        service.spin(request(Some("a"), 0)).await.unwrap();

        let reset = service.reset().await.unwrap();
        assert_eq!(reset.prizes[0].remaining_stock, Some(1));
        assert_eq!(reset.prizes[0].distributed_today, 0);

        let snapshot = service.snapshot(Some("a".into())).await.unwrap();
        assert!(!snapshot.device_has_spun);
        assert_eq!(snapshot.total_spins, 0);
        // 重置后同一设备可以再次抽奖
        assert_eq!(service.spin(request(Some("a"), 0)).await.unwrap().outcome, "Cap");
    }

    #[tokio::test]
    async fn test_malformed_device_id() {
        let service = service_with(
            single_cap_table(),
            Arc::new(MemoryStore::new()),
            clock(),
            wheel_config(AvailabilityPolicy::PreFilter, None),
        )
        .await;
        let long_id = "x".repeat(MAX_DEVICE_ID_LEN + 1);
        let err = service.spin(request(Some(&long_id), 0)).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedRequest(_)));
    }

    #[tokio::test]
    async fn test_list_prizes_reports_static_odds() {
        let service = service_with(
            single_cap_table(),
            Arc::new(MemoryStore::new()),
            clock(),
            wheel_config(AvailabilityPolicy::PreFilter, None),
        )
        .await;
        let prizes = service.list_prizes();
        assert_eq!(prizes.len(), 2);
        assert_eq!(prizes[0].probability_percent, 100.0);
        assert!(prizes[1].is_no_win);
    }

    /// 提交阶段存储不可用
    struct FailingCommitStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl WheelStore for FailingCommitStore {
        async fn seed(&self, initial: &[PrizeState]) -> AppResult<()> {
            self.inner.seed(initial).await
        }
        async fn rollover_daily_counters(&self, today: NaiveDate) -> AppResult<u64> {
            self.inner.rollover_daily_counters(today).await
        }
        async fn prize_states(&self) -> AppResult<Vec<PrizeState>> {
            self.inner.prize_states().await
        }
        async fn find_device(
            &self,
            device_id: &str,
        ) -> AppResult<Option<crate::models::DeviceRecord>> {
            self.inner.find_device(device_id).await
        }
        async fn commit(&self, _commit: &SpinCommit) -> AppResult<CommitStatus> {
            Err(AppError::StorageUnavailable("write timed out".into()))
        }
        async fn list_spins(&self, offset: u64, limit: u64) -> AppResult<(Vec<SpinRecord>, u64)> {
            self.inner.list_spins(offset, limit).await
        }
        async fn count_spins(&self) -> AppResult<u64> {
            self.inner.count_spins().await
        }
        async fn reset(&self, initial: &[PrizeState]) -> AppResult<Vec<PrizeState>> {
            self.inner.reset(initial).await
        }
    }

    #[tokio::test]
    async fn test_commit_failure_never_reports_a_win() {
        let store = Arc::new(FailingCommitStore {
            inner: MemoryStore::new(),
        });
        let service = service_with(
            single_cap_table(),
            store.clone(),
            clock(),
            wheel_config(AvailabilityPolicy::PreFilter, None),
        )
        .await;

        let err = service.spin(request(Some("a"), 0)).await.unwrap_err();
        assert_eq!(err.error_code(), "STORAGE_UNAVAILABLE");

        let states = store.prize_states().await.unwrap();
        assert_eq!(states[0].remaining_stock, Some(1));
        assert!(store.find_device("a").await.unwrap().is_none());
    }
}
