use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::utils::to_local;

/// 参与记录
///
/// 生命周期: pending (has_spun = false) -> spun (has_spun = true，写入奖品/优惠码)。
/// coupon_used 是独立的可逆开关，不是终态。
/// campaign_id / participant_data / identity_key / created_at 创建后不可变。
#[derive(Debug, Clone, PartialEq)]
pub struct Participation {
    pub id: i64,
    pub campaign_id: i64,
    /// 表单原始数据（键由活动定义）
    pub participant_data: Map<String, Value>,
    /// 归一化身份键，仅用于去重查询
    pub identity_key: String,
    /// 同一身份在活动内占用的名额序号 (0 起)
    pub use_slot: u32,
    pub has_spun: bool,
    pub prize_won: Option<String>,
    pub coupon_code: Option<String>,
    pub coupon_used: bool,
    pub rotation_degrees: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub spun_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    Pending,
    Spun,
    Redeemed,
}

impl Participation {
    pub fn status(&self) -> ParticipationStatus {
        match (self.has_spun, self.coupon_used) {
            (false, _) => ParticipationStatus::Pending,
            (true, false) => ParticipationStatus::Spun,
            (true, true) => ParticipationStatus::Redeemed,
        }
    }

    /// 非空优惠码
    pub fn coupon(&self) -> Option<&str> {
        self.coupon_code.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// 提交参与请求（动态表单）
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SubmitParticipationRequest {
    /// 表单字段 -> 值
    #[schema(value_type = Object)]
    pub data: Map<String, Value>,
}

/// 提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionDecision {
    /// 新建了 pending 记录
    Admitted,
    /// 已有未转动的记录，复用之
    Resumed,
    /// 已达参与上限，返回之前的结果
    AlreadyParticipated,
}

/// 参与记录响应（时间按配置时区展示）
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipationResponse {
    pub id: i64,
    pub campaign_id: i64,
    #[schema(value_type = Object)]
    pub participant_data: Map<String, Value>,
    pub status: ParticipationStatus,
    pub has_spun: bool,
    pub prize_won: Option<String>,
    pub coupon_code: Option<String>,
    pub coupon_used: bool,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<FixedOffset>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub expires_at: Option<DateTime<FixedOffset>>,
}

impl ParticipationResponse {
    pub fn new(p: &Participation, tz: Tz) -> Self {
        ParticipationResponse {
            id: p.id,
            campaign_id: p.campaign_id,
            participant_data: p.participant_data.clone(),
            status: p.status(),
            has_spun: p.has_spun,
            prize_won: p.prize_won.clone(),
            coupon_code: p.coupon().map(str::to_string),
            coupon_used: p.coupon_used,
            created_at: to_local(p.created_at, tz),
            expires_at: p.expires_at.map(|e| to_local(e, tz)),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubmissionResponse {
    pub decision: SubmissionDecision,
    pub message: Option<String>,
    pub participation: ParticipationResponse,
}

/// 转盘结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpinResponse {
    pub participation_id: i64,
    /// 本次转动的事件 ID（重放时为空）
    pub spin_id: Option<Uuid>,
    /// 最终旋转角度（度，包含整圈）
    pub rotation_degrees: Option<f64>,
    /// 指针停留的扇区
    pub wedge_index: Option<usize>,
    pub prize_won: Option<String>,
    pub coupon_code: Option<String>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub expires_at: Option<DateTime<FixedOffset>>,
    /// true 表示该记录之前已经转过，返回的是已保存的结果
    pub replayed: bool,
}

/// 优惠券核销开关：used 为空时取反
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct CouponToggleRequest {
    pub used: Option<bool>,
}

/// 参与记录查询参数
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ParticipationListQuery {
    /// 页码 (默认 1)
    pub page: Option<u32>,
    /// 每页数量 (默认 20)
    pub per_page: Option<u32>,
}
