use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

/// Campaigns (活动，只读配置)
#[derive(DeriveIden)]
enum Campaigns {
    Table,
    Id,
    Name,
    WheelColor,
    MaxUsesPerIdentity,
    PrizeExpiryDays,
    FormFields,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

/// Campaign Prizes (转盘奖品，按 position 顺序排列成扇区)
#[derive(DeriveIden)]
enum CampaignPrizes {
    Table,
    Id,
    CampaignId,
    Position,
    Name,
    Weight,
    CouponCode,
}

/// Participations (参与记录)
#[derive(DeriveIden)]
enum Participations {
    Table,
    Id,
    CampaignId,
    ParticipantData,
    IdentityKey,
    UseSlot,
    HasSpun,
    PrizeWon,
    CouponCode,
    CouponUsed,
    RotationDegrees,
    CreatedAt,
    SpunAt,
    ExpiresAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 权重使用百分比 (0..=100)，同一活动的奖品权重之和应为 100
/// 演示活动初始奖品:
/// - 10% OFF 30
/// - Free Shipping 20
/// - 20% OFF 15
/// - Try Again 35 (无优惠码)
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 活动表
        manager
            .create_table(
                Table::create()
                    .table(Campaigns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Campaigns::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Campaigns::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Campaigns::WheelColor)
                            .string_len(32)
                            .not_null()
                            .default("#6d28d9"),
                    )
                    .col(
                        ColumnDef::new(Campaigns::MaxUsesPerIdentity)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Campaigns::PrizeExpiryDays)
                            .integer()
                            .not_null()
                            .default(7),
                    )
                    .col(
                        ColumnDef::new(Campaigns::FormFields)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Campaigns::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Campaigns::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Campaigns::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        // 奖品表
        manager
            .create_table(
                Table::create()
                    .table(CampaignPrizes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CampaignPrizes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CampaignPrizes::CampaignId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampaignPrizes::Position)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CampaignPrizes::Name)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(CampaignPrizes::Weight).double().not_null())
                    .col(
                        ColumnDef::new(CampaignPrizes::CouponCode)
                            .string_len(64)
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campaign_prizes_campaign")
                            .from(CampaignPrizes::Table, CampaignPrizes::CampaignId)
                            .to(Campaigns::Table, Campaigns::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_campaign_prizes_campaign_position")
                    .table(CampaignPrizes::Table)
                    .col(CampaignPrizes::CampaignId)
                    .col(CampaignPrizes::Position)
                    .to_owned(),
            )
            .await?;

        // 参与记录表
        manager
            .create_table(
                Table::create()
                    .table(Participations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Participations::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Participations::CampaignId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Participations::ParticipantData)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Participations::IdentityKey)
                            .string_len(320)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Participations::UseSlot)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Participations::HasSpun)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Participations::PrizeWon).string_len(255).null())
                    .col(ColumnDef::new(Participations::CouponCode).string_len(64).null())
                    .col(
                        ColumnDef::new(Participations::CouponUsed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Participations::RotationDegrees).double().null())
                    .col(
                        ColumnDef::new(Participations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Participations::SpunAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Participations::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_participations_campaign")
                            .from(Participations::Table, Participations::CampaignId)
                            .to(Campaigns::Table, Campaigns::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一身份在同一活动下每个名额只能占用一次：并发提交时由数据库保证唯一
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_participations_identity_slot_unique")
                    .table(Participations::Table)
                    .col(Participations::CampaignId)
                    .col(Participations::IdentityKey)
                    .col(Participations::UseSlot)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_participations_campaign_created")
                    .table(Participations::Table)
                    .col(Participations::CampaignId)
                    .col(Participations::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // 初始化演示活动
        let conn = manager.get_connection();
        let seed_sql = r#"
WITH demo AS (
    INSERT INTO campaigns (name, wheel_color, max_uses_per_identity, prize_expiry_days, form_fields)
    VALUES ('Demo Wheel', '#6d28d9', 1, 3, '["Name", "Email", "Phone"]'::jsonb)
    RETURNING id
)
INSERT INTO campaign_prizes (campaign_id, position, name, weight, coupon_code)
SELECT demo.id, p.position, p.name, p.weight, p.coupon_code
FROM demo, (VALUES
    (0, '10% OFF', 30.0, 'SPIN10'),
    (1, 'Free Shipping', 20.0, 'SHIPFREE'),
    (2, '20% OFF', 15.0, 'SPIN20'),
    (3, 'Try Again', 35.0, NULL)
) AS p(position, name, weight, coupon_code);
"#;
        conn.execute(Statement::from_string(
            manager.get_database_backend(),
            seed_sql.to_string(),
        ))
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 删除顺序：参与记录 -> 奖品 -> 活动
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(Participations::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(CampaignPrizes::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Campaigns::Table).to_owned())
            .await?;

        Ok(())
    }
}
