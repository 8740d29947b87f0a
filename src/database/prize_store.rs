use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    SqlErr, TransactionTrait,
};

use crate::entities::{
    device_entity as devices, prize_state_entity as prize_states, spin_record_entity as spins,
};
use crate::error::AppResult;
use crate::models::{DeviceRecord, PrizeState, SpinRecord};
use crate::store::{CommitStatus, SpinCommit, WheelStore};

/// sea-orm 存储实现
///
/// 库存扣减使用条件更新 (where remaining_stock > 0 and distributed_today < daily_capacity),
/// 多个进程共享同一数据库时也不会超发。
#[derive(Clone)]
pub struct DatabaseStore {
    pool: DatabaseConnection,
}

impl DatabaseStore {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    async fn insert_states(
        &self,
        txn: &DatabaseTransaction,
        states: &[PrizeState],
    ) -> AppResult<()> {
        let now = Utc::now();
        for state in states {
            prize_states::Entity::insert(prize_states::ActiveModel {
                name: Set(state.name.clone()),
                total_capacity: Set(state.total_capacity),
                daily_capacity: Set(state.daily_capacity),
                remaining_stock: Set(state.remaining_stock),
                distributed_today: Set(state.distributed_today),
                distributed_total: Set(state.distributed_total),
                last_reset_day: Set(state.last_reset_day),
                updated_at: Set(Some(now)),
            })
            .exec_without_returning(txn)
            .await?;
        }
        Ok(())
    }
}

/// 主键冲突: 另一个进程已先插入同一设备
fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[async_trait]
impl WheelStore for DatabaseStore {
    async fn seed(&self, initial: &[PrizeState]) -> AppResult<()> {
        let txn = self.pool.begin().await?;

        let mut missing = Vec::new();
        for state in initial {
            match prize_states::Entity::find_by_id(state.name.clone())
                .one(&txn)
                .await?
            {
                Some(existing) => {
                    // 已有计数以数据库为准, 配置变更需通过 reset 生效
                    if existing.total_capacity != state.total_capacity
                        || existing.daily_capacity != state.daily_capacity
                    {
                        log::warn!(
                            "Prize {} capacity differs from config (stored total={:?} daily={:?}); run a reset to apply",
                            state.name,
                            existing.total_capacity,
                            existing.daily_capacity
                        );
                    }
                }
                None => missing.push(state.clone()),
            }
        }

        self.insert_states(&txn, &missing).await?;
        txn.commit().await?;

        if !missing.is_empty() {
            log::info!("Seeded {} prize states", missing.len());
        }
        Ok(())
    }

    async fn rollover_daily_counters(&self, today: NaiveDate) -> AppResult<u64> {
        let result = prize_states::Entity::update_many()
            .col_expr(prize_states::Column::DistributedToday, Expr::value(0i64))
            .col_expr(prize_states::Column::LastResetDay, Expr::value(today))
            .col_expr(prize_states::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(prize_states::Column::LastResetDay.ne(today))
            .exec(&self.pool)
            .await?;
        Ok(result.rows_affected)
    }

    async fn prize_states(&self) -> AppResult<Vec<PrizeState>> {
        let list = prize_states::Entity::find()
            .order_by_asc(prize_states::Column::Name)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    async fn find_device(&self, device_id: &str) -> AppResult<Option<DeviceRecord>> {
        let device = devices::Entity::find_by_id(device_id.to_string())
            .one(&self.pool)
            .await?;
        Ok(device.map(Into::into))
    }

    /// 单事务提交:
    /// 1. 设备已标记则放弃
    /// 2. 中奖时条件扣减库存并累加当日/累计计数 (rows_affected != 1 视为库存竞争失败)
    /// 3. 标记设备
    /// 4. 写抽奖记录
    async fn commit(&self, commit: &SpinCommit) -> AppResult<CommitStatus> {
        let txn = self.pool.begin().await?;

        let existing = match &commit.device_id {
            Some(device_id) => {
                devices::Entity::find_by_id(device_id.clone())
                    .one(&txn)
                    .await?
            }
            None => None,
        };
        if existing.as_ref().is_some_and(|d| d.has_spun) {
            txn.rollback().await?;
            return Ok(CommitStatus::DeviceAlreadySpun);
        }

        if let Some(name) = &commit.prize {
            let result = prize_states::Entity::update_many()
                .col_expr(
                    prize_states::Column::RemainingStock,
                    Expr::col(prize_states::Column::RemainingStock).sub(1),
                )
                .col_expr(
                    prize_states::Column::DistributedToday,
                    Expr::col(prize_states::Column::DistributedToday).add(1),
                )
                .col_expr(
                    prize_states::Column::DistributedTotal,
                    Expr::col(prize_states::Column::DistributedTotal).add(1),
                )
                .col_expr(prize_states::Column::UpdatedAt, Expr::value(commit.spun_at))
                .filter(prize_states::Column::Name.eq(name.as_str()))
                .filter(
                    Condition::any()
                        .add(prize_states::Column::RemainingStock.is_null())
                        .add(prize_states::Column::RemainingStock.gt(0)),
                )
                .filter(
                    Condition::any()
                        .add(prize_states::Column::DailyCapacity.is_null())
                        .add(
                            Expr::col(prize_states::Column::DistributedToday)
                                .lt(Expr::col(prize_states::Column::DailyCapacity)),
                        ),
                )
                .exec(&txn)
                .await?;

            if result.rows_affected != 1 {
                txn.rollback().await?;
                return Ok(CommitStatus::PrizeUnavailable);
            }
        }

        if let Some(device_id) = &commit.device_id {
            match existing {
                Some(device) => {
                    let mut am = device.into_active_model();
                    am.has_spun = Set(true);
                    am.spun_at = Set(Some(commit.spun_at));
                    am.update(&txn).await?;
                }
                None => {
                    let inserted = devices::Entity::insert(devices::ActiveModel {
                        device_id: Set(device_id.clone()),
                        has_spun: Set(true),
                        spun_at: Set(Some(commit.spun_at)),
                        created_at: Set(commit.spun_at),
                    })
                    .exec_without_returning(&txn)
                    .await;
                    match inserted {
                        Ok(_) => {}
                        Err(err) if is_unique_violation(&err) => {
                            txn.rollback().await?;
                            log::info!("Device {device_id} was committed concurrently");
                            return Ok(CommitStatus::DeviceAlreadySpun);
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }

        let record = spins::ActiveModel {
            device_id: Set(commit.device_id.clone()),
            prize_won: Set(commit.outcome_name.clone()),
            is_win: Set(commit.prize.is_some()),
            spun_at: Set(commit.spun_at),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(CommitStatus::Applied(record.into()))
    }

    async fn list_spins(&self, offset: u64, limit: u64) -> AppResult<(Vec<SpinRecord>, u64)> {
        let total = spins::Entity::find().count(&self.pool).await?;
        let items = spins::Entity::find()
            .order_by_desc(spins::Column::SpunAt)
            .order_by_desc(spins::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.pool)
            .await?;
        Ok((items.into_iter().map(Into::into).collect(), total))
    }

    async fn count_spins(&self) -> AppResult<u64> {
        Ok(spins::Entity::find().count(&self.pool).await?)
    }

    async fn reset(&self, initial: &[PrizeState]) -> AppResult<Vec<PrizeState>> {
        // 删除顺序：记录 -> 设备 -> 奖品
        let txn = self.pool.begin().await?;
        spins::Entity::delete_many().exec(&txn).await?;
        devices::Entity::delete_many().exec(&txn).await?;
        prize_states::Entity::delete_many().exec(&txn).await?;
        self.insert_states(&txn, initial).await?;
        txn.commit().await?;
        Ok(initial.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, StoreBackend};
    use crate::database::{create_pool, run_migrations};
    use chrono::TimeZone;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
    }

    fn states() -> Vec<PrizeState> {
        vec![
            PrizeState {
                name: "Cap".into(),
                total_capacity: Some(1),
                daily_capacity: Some(1),
                remaining_stock: Some(1),
                distributed_today: 0,
                distributed_total: 0,
                last_reset_day: day(1),
            },
            PrizeState {
                name: "Sticker".into(),
                total_capacity: None,
                daily_capacity: None,
                remaining_stock: None,
                distributed_today: 0,
                distributed_total: 0,
                last_reset_day: day(1),
            },
        ]
    }

    fn commit(prize: Option<&str>, device: Option<&str>) -> SpinCommit {
        SpinCommit {
            prize: prize.map(str::to_string),
            outcome_name: prize.unwrap_or("Try Again").to_string(),
            device_id: device.map(str::to_string),
            spun_at: Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).unwrap(),
        }
    }

    async fn sqlite_store() -> DatabaseStore {
        let pool = create_pool(&DatabaseConfig {
            backend: StoreBackend::Database,
            url: "sqlite::memory:".into(),
            max_connections: 1,
        })
        .await
        .unwrap();
        run_migrations(&pool).await.unwrap();
        let store = DatabaseStore::new(pool);
        store.seed(&states()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_conditional_decrement_stops_at_zero() {
        let store = sqlite_store().await;

        let first = store.commit(&commit(Some("Cap"), Some("a"))).await.unwrap();
        assert!(matches!(first, CommitStatus::Applied(_)));
        let second = store.commit(&commit(Some("Cap"), Some("b"))).await.unwrap();
        assert_eq!(second, CommitStatus::PrizeUnavailable);

        let cap = store
            .prize_states()
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.name == "Cap")
            .unwrap();
        assert_eq!(cap.remaining_stock, Some(0));
        assert_eq!(cap.distributed_today, 1);
        assert_eq!(cap.distributed_total, 1);
        assert!(store.find_device("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unbounded_prize_and_device_marking() {
        let store = sqlite_store().await;

        let applied = store.commit(&commit(Some("Sticker"), Some("a"))).await.unwrap();
        assert!(matches!(applied, CommitStatus::Applied(ref r) if r.prize_won == "Sticker"));
        assert!(store.find_device("a").await.unwrap().unwrap().has_spun);

        let again = store.commit(&commit(None, Some("a"))).await.unwrap();
        assert_eq!(again, CommitStatus::DeviceAlreadySpun);

        let (records, total) = store.list_spins(0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].prize_won, "Sticker");
    }

    #[tokio::test]
    async fn test_duplicate_device_insert_is_unique_violation() {
        let store = sqlite_store().await;
        store.commit(&commit(None, Some("kiosk-3"))).await.unwrap();

        let err = devices::Entity::insert(devices::ActiveModel {
            device_id: Set("kiosk-3".into()),
            has_spun: Set(true),
            spun_at: Set(None),
            created_at: Set(Utc::now()),
        })
        .exec_without_returning(&store.pool)
        .await
        .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&DbErr::Custom("connection reset".into())));
    }

    #[tokio::test]
    async fn test_rollover_and_reset() {
        let store = sqlite_store().await;
        store.commit(&commit(Some("Cap"), None)).await.unwrap();

        assert_eq!(store.rollover_daily_counters(day(2)).await.unwrap(), 2);
        assert_eq!(store.rollover_daily_counters(day(2)).await.unwrap(), 0);
        let cap = store
            .prize_states()
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.name == "Cap")
            .unwrap();
        assert_eq!(cap.distributed_today, 0);
        assert_eq!(cap.remaining_stock, Some(0));

        store.reset(&states()).await.unwrap();
        let cap = store
            .prize_states()
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.name == "Cap")
            .unwrap();
        assert_eq!(cap.remaining_stock, Some(1));
        assert_eq!(store.list_spins(0, 10).await.unwrap().1, 0);
    }
}
