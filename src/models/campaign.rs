use serde::Serialize;
use utoipa::ToSchema;

use crate::utils::IdentityResolver;
use crate::wheel::{PrizeTable, wedge_bounds};

/// 活动配置（本服务只读，增删改由活动管理后台负责）
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    /// 扇区顺序即奖品顺序：0 号扇区位于顶部，顺时针排列
    pub prizes: PrizeTable,
    /// 同一身份最多参与次数 (>= 1)
    pub max_uses_per_identity: u32,
    /// 中奖后优惠券有效天数 (>= 1)
    pub prize_expiry_days: u32,
    pub wheel_color: String,
    /// 表单字段名（由活动定义）
    pub form_fields: Vec<String>,
    /// 按 form_fields 解析出的身份字段，随活动加载一次构建
    pub identity: IdentityResolver,
}

/// 转盘单个扇区（不暴露权重与优惠码）
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WheelWedgeResponse {
    pub index: usize,
    pub prize_id: i64,
    pub name: String,
    /// 起始角度（顶部为 0°，顺时针）
    pub start_angle: f64,
    pub end_angle: f64,
}

/// 转盘展示信息
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WheelResponse {
    pub campaign_id: i64,
    pub name: String,
    pub wheel_color: String,
    pub prize_expiry_days: u32,
    pub form_fields: Vec<String>,
    pub time_zone: String,
    pub wedges: Vec<WheelWedgeResponse>,
}

impl WheelResponse {
    pub fn from_campaign(campaign: &Campaign, time_zone: &str) -> Self {
        let count = campaign.prizes.len();
        let wedges = campaign
            .prizes
            .prizes()
            .iter()
            .enumerate()
            .map(|(index, prize)| {
                let (start_angle, end_angle) = wedge_bounds(index, count);
                WheelWedgeResponse {
                    index,
                    prize_id: prize.id,
                    name: prize.name.clone(),
                    start_angle,
                    end_angle,
                }
            })
            .collect();

        WheelResponse {
            campaign_id: campaign.id,
            name: campaign.name.clone(),
            wheel_color: campaign.wheel_color.clone(),
            prize_expiry_days: campaign.prize_expiry_days,
            form_fields: campaign.form_fields.clone(),
            time_zone: time_zone.to_string(),
            wedges,
        }
    }
}
