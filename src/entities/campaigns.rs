use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 活动实体（本服务只读）
/// - max_uses_per_identity: 同一身份最多参与次数
/// - prize_expiry_days: 优惠券有效天数（按配置时区的自然日计算）
/// - form_fields: 活动表单字段名 JSON 数组
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "campaigns")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub wheel_color: String,
    pub max_uses_per_identity: i32,
    pub prize_expiry_days: i32,
    pub form_fields: Json,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::campaign_prizes::Entity")]
    Prizes,
    #[sea_orm(has_many = "super::participations::Entity")]
    Participations,
}

impl Related<super::campaign_prizes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prizes.def()
    }
}

impl Related<super::participations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// form_fields 中的字符串项，忽略其它类型
    pub fn form_field_names(&self) -> Vec<String> {
        self.form_fields
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
