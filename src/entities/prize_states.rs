use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 奖品计数实体
/// 概念说明:
/// - total_capacity / daily_capacity: 来自配置的库存与每日上限 (NULL 表示不限)
/// - remaining_stock: 剩余库存 (NULL 表示不限, 不参与扣减)
/// - distributed_today: 当日已发放, last_reset_day 与今天不同时清零
/// - distributed_total: 累计发放
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "prize_states")]
pub struct Model {
    /// 奖品名称 (唯一)
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    pub total_capacity: Option<i64>,
    pub daily_capacity: Option<i64>,
    pub remaining_stock: Option<i64>,
    pub distributed_today: i64,
    pub distributed_total: i64,
    pub last_reset_day: NaiveDate,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
