//! Storage seams for campaigns and participations.
//!
//! Services only see these traits. Both implementations honour the same
//! atomicity rules: `create_pending` is a conditional insert keyed on
//! `(campaign_id, identity_key, use_slot)` and `mark_spun` only succeeds on
//! a record that has not been spun yet.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::AppResult;
use crate::models::{Campaign, Participation, PaginationParams};
use crate::utils::IdentityKey;

/// 待插入的 pending 参与记录
#[derive(Debug, Clone)]
pub struct NewParticipation {
    pub campaign_id: i64,
    pub participant_data: Map<String, Value>,
    pub identity_key: IdentityKey,
    pub use_slot: u32,
    pub created_at: DateTime<Utc>,
}

/// 转盘结算写入的字段
#[derive(Debug, Clone)]
pub struct Settlement {
    pub prize_won: String,
    pub coupon_code: Option<String>,
    pub rotation_degrees: f64,
    pub spun_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(Participation),
    /// 同一身份同一名额已被占用（并发提交）
    Duplicate,
}

#[derive(Debug, Clone)]
pub enum SettleOutcome {
    Settled(Participation),
    /// 已经结算过，返回已保存的记录
    AlreadySpun(Participation),
}

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn find_campaign(&self, campaign_id: i64) -> AppResult<Option<Campaign>>;
}

#[async_trait]
pub trait ParticipationRepository: Send + Sync {
    /// All records of `campaign_id` with this identity, ordered by slot.
    async fn find_by_identity(
        &self,
        campaign_id: i64,
        identity: &IdentityKey,
    ) -> AppResult<Vec<Participation>>;

    async fn create_pending(&self, new: NewParticipation) -> AppResult<CreateOutcome>;

    async fn mark_spun(&self, participation_id: i64, settlement: Settlement)
    -> AppResult<SettleOutcome>;

    /// 原子地设置或取反 (`used = None`) 核销状态。
    /// 记录没有优惠码时不做修改，返回 `None`。
    async fn set_coupon_used(
        &self,
        participation_id: i64,
        used: Option<bool>,
    ) -> AppResult<Option<Participation>>;

    async fn find_by_id(&self, participation_id: i64) -> AppResult<Option<Participation>>;

    /// Newest first, plus the total count.
    async fn list_by_campaign(
        &self,
        campaign_id: i64,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Participation>, u64)>;
}
