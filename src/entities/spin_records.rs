use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 抽奖记录实体
/// 说明:
/// - 每次完成的抽奖产生一条记录 (包括未中奖)
/// - prize_won 存储结果名称快照, 奖品配置后续修改仍可回溯
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "spin_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// 设备ID (匿名抽奖时为空)
    pub device_id: Option<String>,
    /// 结果名称
    pub prize_won: String,
    pub is_win: bool,
    pub spun_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
