use sea_orm_migration::prelude::*;

/// Prize States (每个奖品的库存与当日发放计数)
#[derive(DeriveIden)]
enum PrizeStates {
    Table,
    Name,
    TotalCapacity,
    DailyCapacity,
    RemainingStock,
    DistributedToday,
    DistributedTotal,
    LastResetDay,
    UpdatedAt,
}

/// Devices (设备是否已抽奖)
#[derive(DeriveIden)]
enum Devices {
    Table,
    DeviceId,
    HasSpun,
    SpunAt,
    CreatedAt,
}

/// Spin Records (抽奖审计日志, 只追加)
#[derive(DeriveIden)]
enum SpinRecords {
    Table,
    Id,
    DeviceId,
    PrizeWon,
    IsWin,
    SpunAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 奖品配置来自 config.toml, 不在迁移中写入初始数据;
/// 服务启动时按配置补齐缺失的 prize_states 行。
///
/// total_capacity / daily_capacity / remaining_stock 为 NULL 表示不限量。
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PrizeStates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PrizeStates::Name)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PrizeStates::TotalCapacity).big_integer().null())
                    .col(ColumnDef::new(PrizeStates::DailyCapacity).big_integer().null())
                    .col(ColumnDef::new(PrizeStates::RemainingStock).big_integer().null())
                    .col(
                        ColumnDef::new(PrizeStates::DistributedToday)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PrizeStates::DistributedTotal)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(PrizeStates::LastResetDay).date().not_null())
                    .col(
                        ColumnDef::new(PrizeStates::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Devices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Devices::DeviceId)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Devices::HasSpun)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Devices::SpunAt).timestamp_with_time_zone().null())
                    .col(
                        ColumnDef::new(Devices::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SpinRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SpinRecords::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SpinRecords::DeviceId).string_len(255).null())
                    .col(
                        ColumnDef::new(SpinRecords::PrizeWon)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SpinRecords::IsWin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SpinRecords::SpunAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 历史记录按时间倒序分页
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_spin_records_spun_at")
                    .table(SpinRecords::Table)
                    .col(SpinRecords::SpunAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_spin_records_device")
                    .table(SpinRecords::Table)
                    .col(SpinRecords::DeviceId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(SpinRecords::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Devices::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(PrizeStates::Table).to_owned())
            .await?;

        Ok(())
    }
}
