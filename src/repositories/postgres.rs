use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use serde_json::Value;

use super::{
    CampaignRepository, CreateOutcome, NewParticipation, ParticipationRepository, SettleOutcome,
    Settlement,
};
use crate::entities::{
    campaign_entity as campaigns, campaign_prize_entity as prizes,
    participation_entity as participations,
};
use crate::error::{AppError, AppResult};
use crate::models::{Campaign, PaginationParams, Participation};
use crate::utils::{IdentityKey, IdentityResolver};
use crate::wheel::{Prize, PrizeTable};

/// SeaORM / PostgreSQL 存储
#[derive(Clone)]
pub struct PgStore {
    pool: DatabaseConnection,
}

impl PgStore {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    async fn get_participation(&self, participation_id: i64) -> AppResult<participations::Model> {
        participations::Entity::find_by_id(participation_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Participation {participation_id} not found")))
    }
}

#[async_trait]
impl CampaignRepository for PgStore {
    async fn find_campaign(&self, campaign_id: i64) -> AppResult<Option<Campaign>> {
        let Some(model) = campaigns::Entity::find_by_id(campaign_id)
            .filter(campaigns::Column::IsActive.eq(true))
            .one(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        // 扇区顺序：position，其次 id
        let prize_list = prizes::Entity::find()
            .filter(prizes::Column::CampaignId.eq(campaign_id))
            .order_by_asc(prizes::Column::Position)
            .order_by_asc(prizes::Column::Id)
            .all(&self.pool)
            .await?;

        let table = PrizeTable::new(prize_list.into_iter().map(Prize::from).collect())
            .map_err(|e| AppError::ConfigError(format!("Campaign {campaign_id}: {e}")))?;

        let form_fields = model.form_field_names();
        let identity = IdentityResolver::from_form_fields(&form_fields);
        Ok(Some(Campaign {
            id: model.id,
            name: model.name,
            prizes: table,
            max_uses_per_identity: u32::try_from(model.max_uses_per_identity)
                .unwrap_or(1)
                .max(1),
            prize_expiry_days: u32::try_from(model.prize_expiry_days)
                .unwrap_or(1)
                .max(1),
            wheel_color: model.wheel_color,
            form_fields,
            identity,
        }))
    }
}

#[async_trait]
impl ParticipationRepository for PgStore {
    async fn find_by_identity(
        &self,
        campaign_id: i64,
        identity: &IdentityKey,
    ) -> AppResult<Vec<Participation>> {
        let list = participations::Entity::find()
            .filter(participations::Column::CampaignId.eq(campaign_id))
            .filter(participations::Column::IdentityKey.eq(identity.as_str()))
            .order_by_asc(participations::Column::UseSlot)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    async fn create_pending(&self, new: NewParticipation) -> AppResult<CreateOutcome> {
        let use_slot = i32::try_from(new.use_slot)
            .map_err(|_| AppError::ValidationError("Participation slot out of range".into()))?;

        // 依赖唯一索引 (campaign_id, identity_key, use_slot) 做原子条件插入
        let inserted = participations::ActiveModel {
            campaign_id: Set(new.campaign_id),
            participant_data: Set(Value::Object(new.participant_data)),
            identity_key: Set(new.identity_key.as_str().to_string()),
            use_slot: Set(use_slot),
            has_spun: Set(false),
            coupon_used: Set(false),
            created_at: Set(new.created_at),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;

        match inserted {
            Ok(model) => Ok(CreateOutcome::Created(model.into())),
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(CreateOutcome::Duplicate)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn mark_spun(
        &self,
        participation_id: i64,
        settlement: Settlement,
    ) -> AppResult<SettleOutcome> {
        // 条件更新：只有 has_spun = false 的记录会被结算
        let result = participations::Entity::update_many()
            .col_expr(participations::Column::HasSpun, Expr::value(true))
            .col_expr(
                participations::Column::PrizeWon,
                Expr::value(Some(settlement.prize_won)),
            )
            .col_expr(
                participations::Column::CouponCode,
                Expr::value(settlement.coupon_code),
            )
            .col_expr(
                participations::Column::RotationDegrees,
                Expr::value(Some(settlement.rotation_degrees)),
            )
            .col_expr(
                participations::Column::SpunAt,
                Expr::value(Some(settlement.spun_at)),
            )
            .col_expr(
                participations::Column::ExpiresAt,
                Expr::value(Some(settlement.expires_at)),
            )
            .filter(participations::Column::Id.eq(participation_id))
            .filter(participations::Column::HasSpun.eq(false))
            .exec(&self.pool)
            .await?;

        let current = self.get_participation(participation_id).await?;
        if result.rows_affected == 1 {
            Ok(SettleOutcome::Settled(current.into()))
        } else if current.has_spun {
            Ok(SettleOutcome::AlreadySpun(current.into()))
        } else {
            Err(AppError::InternalError(format!(
                "Participation {participation_id} could not be settled"
            )))
        }
    }

    async fn set_coupon_used(
        &self,
        participation_id: i64,
        used: Option<bool>,
    ) -> AppResult<Option<Participation>> {
        let value = match used {
            Some(v) => Expr::value(v),
            None => Expr::col(participations::Column::CouponUsed).not(),
        };

        // 单条 UPDATE 完成取反，只作用于有优惠码的记录
        participations::Entity::update_many()
            .col_expr(participations::Column::CouponUsed, value)
            .filter(participations::Column::Id.eq(participation_id))
            .filter(participations::Column::CouponCode.is_not_null())
            .filter(Expr::cust("btrim(coupon_code) <> ''"))
            .exec(&self.pool)
            .await?;

        let current: Participation = self.get_participation(participation_id).await?.into();
        Ok(current.coupon().is_some().then_some(current))
    }

    async fn find_by_id(&self, participation_id: i64) -> AppResult<Option<Participation>> {
        let model = participations::Entity::find_by_id(participation_id)
            .one(&self.pool)
            .await?;
        Ok(model.map(Into::into))
    }

    async fn list_by_campaign(
        &self,
        campaign_id: i64,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Participation>, u64)> {
        let base_query = participations::Entity::find()
            .filter(participations::Column::CampaignId.eq(campaign_id));

        let total = base_query.clone().count(&self.pool).await?;

        let items = base_query
            .order_by_desc(participations::Column::CreatedAt)
            .order_by_desc(participations::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;

        Ok((items.into_iter().map(Into::into).collect(), total))
    }
}
