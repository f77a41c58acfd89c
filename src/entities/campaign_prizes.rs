use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::wheel::Prize;

/// 转盘奖品实体
/// - position: 扇区顺序（0 号在顶部，顺时针）
/// - weight: 百分比权重，同一活动合计 100
/// - coupon_code: NULL 表示无优惠券
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaign_prizes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub campaign_id: i64,
    pub position: i32,
    pub name: String,
    #[sea_orm(column_type = "Double")]
    pub weight: f64,
    pub coupon_code: Option<String>,
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

impl From<Model> for Prize {
    fn from(m: Model) -> Self {
        Prize {
            id: m.id,
            name: m.name,
            weight: m.weight,
            coupon_code: m.coupon_code,
        }
    }
}
