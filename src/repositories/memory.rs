use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sea_orm::DbErr;
use tokio::sync::Mutex;

use super::{
    CampaignRepository, CreateOutcome, NewParticipation, ParticipationRepository, SettleOutcome,
    Settlement,
};
use crate::error::{AppError, AppResult};
use crate::models::{Campaign, PaginationParams, Participation};
use crate::utils::IdentityKey;

#[derive(Default)]
struct MemoryState {
    campaigns: HashMap<i64, Campaign>,
    participations: BTreeMap<i64, Participation>,
    next_id: i64,
}

/// In-process store with the same conditional insert / update semantics as
/// the PostgreSQL store. Used by tests and local demos.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_next_settlement: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_campaign(&self, campaign: Campaign) {
        let mut state = self.state.lock().await;
        state.campaigns.insert(campaign.id, campaign);
    }

    /// Makes the next `mark_spun` fail before writing anything.
    pub fn fail_next_settlement(&self) {
        self.fail_next_settlement.store(true, Ordering::SeqCst);
    }

    pub async fn participation_count(&self, campaign_id: i64) -> usize {
        let state = self.state.lock().await;
        state
            .participations
            .values()
            .filter(|p| p.campaign_id == campaign_id)
            .count()
    }
}

#[async_trait]
impl CampaignRepository for MemoryStore {
    async fn find_campaign(&self, campaign_id: i64) -> AppResult<Option<Campaign>> {
        let state = self.state.lock().await;
        Ok(state.campaigns.get(&campaign_id).cloned())
    }
}

#[async_trait]
impl ParticipationRepository for MemoryStore {
    async fn find_by_identity(
        &self,
        campaign_id: i64,
        identity: &IdentityKey,
    ) -> AppResult<Vec<Participation>> {
        let mut found: Vec<Participation> = {
            let state = self.state.lock().await;
            state
                .participations
                .values()
                .filter(|p| p.campaign_id == campaign_id && p.identity_key == identity.as_str())
                .cloned()
                .collect()
        };
        found.sort_by_key(|p| p.use_slot);
        // 模拟一次 I/O 往返，让并发请求能在读与写之间交错
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn create_pending(&self, new: NewParticipation) -> AppResult<CreateOutcome> {
        let mut state = self.state.lock().await;
        let taken = state.participations.values().any(|p| {
            p.campaign_id == new.campaign_id
                && p.identity_key == new.identity_key.as_str()
                && p.use_slot == new.use_slot
        });
        if taken {
            return Ok(CreateOutcome::Duplicate);
        }

        state.next_id += 1;
        let participation = Participation {
            id: state.next_id,
            campaign_id: new.campaign_id,
            participant_data: new.participant_data,
            identity_key: new.identity_key.as_str().to_string(),
            use_slot: new.use_slot,
            has_spun: false,
            prize_won: None,
            coupon_code: None,
            coupon_used: false,
            rotation_degrees: None,
            created_at: new.created_at,
            spun_at: None,
            expires_at: None,
        };
        state
            .participations
            .insert(participation.id, participation.clone());
        Ok(CreateOutcome::Created(participation))
    }

    async fn mark_spun(
        &self,
        participation_id: i64,
        settlement: Settlement,
    ) -> AppResult<SettleOutcome> {
        if self.fail_next_settlement.swap(false, Ordering::SeqCst) {
            return Err(AppError::DatabaseError(DbErr::Custom(
                "injected settlement failure".into(),
            )));
        }

        let mut state = self.state.lock().await;
        let p = state
            .participations
            .get_mut(&participation_id)
            .ok_or_else(|| AppError::NotFound(format!("Participation {participation_id} not found")))?;
        if p.has_spun {
            return Ok(SettleOutcome::AlreadySpun(p.clone()));
        }
        p.has_spun = true;
        p.prize_won = Some(settlement.prize_won);
        p.coupon_code = settlement.coupon_code;
        p.rotation_degrees = Some(settlement.rotation_degrees);
        p.spun_at = Some(settlement.spun_at);
        p.expires_at = Some(settlement.expires_at);
        Ok(SettleOutcome::Settled(p.clone()))
    }

    async fn set_coupon_used(
        &self,
        participation_id: i64,
        used: Option<bool>,
    ) -> AppResult<Option<Participation>> {
        let mut state = self.state.lock().await;
        let p = state
            .participations
            .get_mut(&participation_id)
            .ok_or_else(|| AppError::NotFound(format!("Participation {participation_id} not found")))?;
        if p.coupon().is_none() {
            return Ok(None);
        }
        p.coupon_used = used.unwrap_or(!p.coupon_used);
        Ok(Some(p.clone()))
    }

    async fn find_by_id(&self, participation_id: i64) -> AppResult<Option<Participation>> {
        let found = {
            let state = self.state.lock().await;
            state.participations.get(&participation_id).cloned()
        };
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn list_by_campaign(
        &self,
        campaign_id: i64,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Participation>, u64)> {
        let state = self.state.lock().await;
        let mut items: Vec<Participation> = state
            .participations
            .values()
            .filter(|p| p.campaign_id == campaign_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = items.len() as u64;
        let page = items
            .into_iter()
            .skip(params.get_offset() as usize)
            .take(params.get_limit() as usize)
            .collect();
        Ok((page, total))
    }
}
