use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Participation;

/// 参与记录实体
/// 说明:
/// - (campaign_id, identity_key, use_slot) 唯一，保证同一身份并发提交只有一条能插入
/// - prize_won / coupon_code 为中奖时的快照（奖品配置后续修改不影响历史）
/// - rotation_degrees 保存最终角度，重放时前端可停在同一位置
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "participations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub campaign_id: i64,
    pub participant_data: Json,
    pub identity_key: String,
    pub use_slot: i32,
    pub has_spun: bool,
    pub prize_won: Option<String>,
    pub coupon_code: Option<String>,
    pub coupon_used: bool,
    #[sea_orm(column_type = "Double", nullable)]
    pub rotation_degrees: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub spun_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campaigns::Entity",
        from = "Column::CampaignId",
        to = "super::campaigns::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Campaign,
}

impl Related<super::campaigns::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Participation {
    fn from(m: Model) -> Self {
        let participant_data = match m.participant_data {
            Value::Object(map) => map,
            _ => Default::default(),
        };
        Participation {
            id: m.id,
            campaign_id: m.campaign_id,
            participant_data,
            identity_key: m.identity_key,
            use_slot: u32::try_from(m.use_slot).unwrap_or(0),
            has_spun: m.has_spun,
            prize_won: m.prize_won,
            coupon_code: m.coupon_code,
            coupon_used: m.coupon_used,
            rotation_degrees: m.rotation_degrees,
            created_at: m.created_at,
            spun_at: m.spun_at,
            expires_at: m.expires_at,
        }
    }
}
