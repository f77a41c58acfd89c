use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Campaign, PaginatedResponse, PaginationParams, Participation, ParticipationListQuery,
    ParticipationPageResponse, ParticipationResponse, SpinResponse, SubmissionDecision,
    SubmissionResponse,
};
use crate::repositories::{
    CampaignRepository, CreateOutcome, NewParticipation, ParticipationRepository, SettleOutcome,
    Settlement,
};
use crate::services::participation_guard::{GuardDecision, decide};
use crate::utils::{compute_expiry, to_local};
use crate::wheel::{RotationPolicy, SpinSequencer, WheelError, resolve_wedge};

/// 并发提交冲突后最多重新判定的次数
const MAX_ADMISSION_ATTEMPTS: usize = 3;

/// 参与流程：提交去重 -> 转盘结算 -> 优惠券核销
#[derive(Clone)]
pub struct ParticipationService {
    campaigns: Arc<dyn CampaignRepository>,
    participations: Arc<dyn ParticipationRepository>,
    time_zone: Tz,
    rotation_policy: RotationPolicy,
    settle_after: Duration,
    spinning: Arc<Mutex<HashSet<i64>>>,
}

impl ParticipationService {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        participations: Arc<dyn ParticipationRepository>,
        time_zone: Tz,
        rotation_policy: RotationPolicy,
        settle_after: Duration,
    ) -> Self {
        Self {
            campaigns,
            participations,
            time_zone,
            rotation_policy,
            settle_after,
            spinning: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// 提交表单
    ///
    /// 逻辑:
    /// 1. 校验活动奖品权重（配置错误时拒绝，不允许进入转盘）
    /// 2. 从表单数据提取归一化身份键
    /// 3. 查询同一身份的已有记录并判定: 新建 / 复用 pending / 返回之前结果
    /// 4. 新建依赖存储层唯一约束，冲突时重新判定
    pub async fn submit(
        &self,
        campaign_id: i64,
        data: Map<String, Value>,
    ) -> AppResult<SubmissionResponse> {
        let campaign = self.load_campaign(campaign_id).await?;
        ensure_balanced(&campaign)?;

        let identity = campaign
            .identity
            .extract(&data)
            .ok_or_else(|| {
                AppError::ValidationError("A valid email or phone number is required".into())
            })?;

        for attempt in 1..=MAX_ADMISSION_ATTEMPTS {
            let existing = self
                .participations
                .find_by_identity(campaign_id, &identity)
                .await?;

            match decide(&existing, campaign.max_uses_per_identity) {
                GuardDecision::Resume(p) => {
                    return Ok(self.submission(SubmissionDecision::Resumed, None, &p));
                }
                GuardDecision::AlreadyParticipated(p) => {
                    return Ok(self.submission(
                        SubmissionDecision::AlreadyParticipated,
                        Some("You have already participated in this campaign".into()),
                        &p,
                    ));
                }
                GuardDecision::Admit { use_slot } => {
                    let new = NewParticipation {
                        campaign_id,
                        participant_data: data.clone(),
                        identity_key: identity.clone(),
                        use_slot,
                        created_at: Utc::now(),
                    };
                    match self.participations.create_pending(new).await? {
                        CreateOutcome::Created(p) => {
                            log::info!(
                                "Participation {} created for campaign {campaign_id} (slot {use_slot})",
                                p.id
                            );
                            return Ok(self.submission(SubmissionDecision::Admitted, None, &p));
                        }
                        CreateOutcome::Duplicate => {
                            log::info!(
                                "Duplicate submission for campaign {campaign_id} slot {use_slot} \
                                 (attempt {attempt}), re-checking"
                            );
                        }
                    }
                }
            }
        }

        Err(AppError::Conflict(
            "Submission is already being processed, please retry".into(),
        ))
    }

    /// 转盘 (Spin)
    ///
    /// 已结算的记录直接返回保存的结果；否则按 idle -> animating -> settled
    /// 走一次转盘，以指针停留的扇区为准发放奖品，并计算优惠券过期时间。
    /// 转盘一旦开始就在独立任务中跑完并写库，请求中途断开也不会取消。
    /// 写库失败时返回错误，记录保持 pending，可重试。
    pub async fn spin(&self, participation_id: i64) -> AppResult<SpinResponse> {
        let participation = self.load_participation(participation_id).await?;
        let campaign = self.load_campaign(participation.campaign_id).await?;

        if participation.has_spun {
            return Ok(self.replay(&participation, &campaign));
        }
        ensure_balanced(&campaign)?;

        let in_flight = InFlightSpin::acquire(&self.spinning, participation_id)?;

        let participations = self.participations.clone();
        let policy = self.rotation_policy;
        let settle_after = self.settle_after;
        let expires_at = compute_expiry(
            participation.created_at,
            campaign.prize_expiry_days,
            self.time_zone,
        );
        let table = campaign.prizes.clone();

        let task = tokio::spawn(async move {
            let _in_flight = in_flight;
            let mut sequencer = SpinSequencer::new(settle_after);
            let result = sequencer.run(&table, policy).await?;
            let settlement = Settlement {
                prize_won: result.prize.name.clone(),
                coupon_code: result.prize.coupon().map(str::to_string),
                rotation_degrees: result.rotation,
                spun_at: Utc::now(),
                expires_at,
            };
            let outcome = participations
                .mark_spun(participation_id, settlement)
                .await?;
            Ok::<_, AppError>((result, outcome))
        });

        let (result, outcome) = task
            .await
            .map_err(|e| AppError::InternalError(format!("Spin task failed: {e}")))??;

        match outcome {
            SettleOutcome::Settled(p) => {
                let spin_id = Uuid::new_v4();
                log::info!(
                    "Spin {spin_id} settled: participation {participation_id} won '{}' \
                     (wedge {}, drawn {})",
                    result.prize.name,
                    result.reconciliation.delivered,
                    result.reconciliation.drawn
                );
                Ok(SpinResponse {
                    participation_id,
                    spin_id: Some(spin_id),
                    rotation_degrees: Some(result.rotation),
                    wedge_index: Some(result.reconciliation.delivered),
                    prize_won: p.prize_won.clone(),
                    coupon_code: p.coupon().map(str::to_string),
                    expires_at: p.expires_at.map(|e| to_local(e, self.time_zone)),
                    replayed: false,
                })
            }
            SettleOutcome::AlreadySpun(p) => {
                log::info!(
                    "Participation {participation_id} was settled concurrently, returning stored outcome"
                );
                Ok(self.replay(&p, &campaign))
            }
        }
    }

    /// 优惠券核销开关（可逆、幂等），仅对有优惠码的记录生效
    ///
    /// used 为空时在存储层原子取反，并发取反不会丢失更新
    pub async fn toggle_coupon(
        &self,
        participation_id: i64,
        used: Option<bool>,
    ) -> AppResult<ParticipationResponse> {
        let participation = self.load_participation(participation_id).await?;
        if participation.coupon().is_none() {
            return Err(AppError::ValidationError(
                "This participation has no coupon to redeem".into(),
            ));
        }
        let updated = self
            .participations
            .set_coupon_used(participation_id, used)
            .await?
            .ok_or_else(|| {
                AppError::ValidationError("This participation has no coupon to redeem".into())
            })?;
        Ok(ParticipationResponse::new(&updated, self.time_zone))
    }

    pub async fn get_participation(&self, participation_id: i64) -> AppResult<ParticipationResponse> {
        let participation = self.load_participation(participation_id).await?;
        Ok(ParticipationResponse::new(&participation, self.time_zone))
    }

    /// 分页获取活动参与记录（倒序），供导出/报表使用
    pub async fn list_participations(
        &self,
        campaign_id: i64,
        query: &ParticipationListQuery,
    ) -> AppResult<ParticipationPageResponse> {
        self.load_campaign(campaign_id).await?;
        let params = PaginationParams::new(query.page, query.per_page);
        let (items, total) = self
            .participations
            .list_by_campaign(campaign_id, &params)
            .await?;
        let items = items
            .iter()
            .map(|p| ParticipationResponse::new(p, self.time_zone))
            .collect();
        Ok(PaginatedResponse::new(items, &params, total))
    }

    // -----------------------------
    // 内部辅助方法
    // -----------------------------

    async fn load_campaign(&self, campaign_id: i64) -> AppResult<Campaign> {
        self.campaigns
            .find_campaign(campaign_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Campaign {campaign_id} not found")))
    }

    async fn load_participation(&self, participation_id: i64) -> AppResult<Participation> {
        self.participations
            .find_by_id(participation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Participation {participation_id} not found")))
    }

    fn submission(
        &self,
        decision: SubmissionDecision,
        message: Option<String>,
        p: &Participation,
    ) -> SubmissionResponse {
        SubmissionResponse {
            decision,
            message,
            participation: ParticipationResponse::new(p, self.time_zone),
        }
    }

    fn replay(&self, p: &Participation, campaign: &Campaign) -> SpinResponse {
        SpinResponse {
            participation_id: p.id,
            spin_id: None,
            rotation_degrees: p.rotation_degrees,
            wedge_index: p
                .rotation_degrees
                .and_then(|r| resolve_wedge(r, campaign.prizes.len()).ok()),
            prize_won: p.prize_won.clone(),
            coupon_code: p.coupon().map(str::to_string),
            expires_at: p.expires_at.map(|e| to_local(e, self.time_zone)),
            replayed: true,
        }
    }
}

fn ensure_balanced(campaign: &Campaign) -> AppResult<()> {
    campaign
        .prizes
        .validate_total()
        .map_err(|e| AppError::ConfigError(format!("Campaign {}: {e}", campaign.id)))
}

/// 同一参与记录同一时间只能有一个转盘在 animating
struct InFlightSpin {
    spinning: Arc<Mutex<HashSet<i64>>>,
    participation_id: i64,
}

impl InFlightSpin {
    fn acquire(spinning: &Arc<Mutex<HashSet<i64>>>, participation_id: i64) -> AppResult<Self> {
        let mut set = spinning
            .lock()
            .map_err(|_| AppError::InternalError("Spin registry poisoned".into()))?;
        if !set.insert(participation_id) {
            return Err(WheelError::SpinNotIdle.into());
        }
        Ok(Self {
            spinning: spinning.clone(),
            participation_id,
        })
    }
}

impl Drop for InFlightSpin {
    fn drop(&mut self) {
        if let Ok(mut set) = self.spinning.lock() {
            set.remove(&self.participation_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryStore;
    use crate::utils::IdentityResolver;
    use crate::wheel::prize_table::prize;
    use crate::wheel::{Prize, PrizeTable};
    use futures_util::future::join_all;
    use serde_json::json;

    const CAMPAIGN_ID: i64 = 7;

    fn campaign(max_uses: u32, prizes: Vec<Prize>) -> Campaign {
        let form_fields = vec!["Name".to_string(), "Email".to_string()];
        Campaign {
            id: CAMPAIGN_ID,
            name: "Summer Wheel".into(),
            prizes: PrizeTable::new(prizes).unwrap(),
            max_uses_per_identity: max_uses,
            prize_expiry_days: 3,
            wheel_color: "#ff8800".into(),
            identity: IdentityResolver::from_form_fields(&form_fields),
            form_fields,
        }
    }

    fn four_prizes() -> Vec<Prize> {
        vec![
            prize(1, "10% OFF", 30.0, Some("SPIN10")),
            prize(2, "Free Shipping", 20.0, Some("SHIPFREE")),
            prize(3, "20% OFF", 15.0, Some("SPIN20")),
            prize(4, "Try Again", 35.0, None),
        ]
    }

    async fn setup_with(
        campaign: Campaign,
        settle_after: Duration,
    ) -> (MemoryStore, ParticipationService) {
        let store = MemoryStore::new();
        store.insert_campaign(campaign).await;
        let service = ParticipationService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            chrono_tz::America::Sao_Paulo,
            RotationPolicy::Weighted,
            settle_after,
        );
        (store, service)
    }

    async fn setup(max_uses: u32) -> (MemoryStore, ParticipationService) {
        setup_with(campaign(max_uses, four_prizes()), Duration::ZERO).await
    }

    fn form(email: &str) -> Map<String, Value> {
        json!({ "Name": "Ana", "Email": email })
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_resubmission_returns_first_outcome() {
        let (store, service) = setup(1).await;

        let first = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();
        assert_eq!(first.decision, SubmissionDecision::Admitted);
        let spin = service.spin(first.participation.id).await.unwrap();
        assert!(!spin.replayed);

        let again = service
            .submit(CAMPAIGN_ID, form("  ANA@Example.com"))
            .await
            .unwrap();
        assert_eq!(again.decision, SubmissionDecision::AlreadyParticipated);
        assert!(again.message.is_some());
        assert_eq!(again.participation.id, first.participation.id);
        assert_eq!(again.participation.prize_won, spin.prize_won);
        assert_eq!(again.participation.coupon_code, spin.coupon_code);
        assert_eq!(again.participation.expires_at, spin.expires_at);
        assert_eq!(store.participation_count(CAMPAIGN_ID).await, 1);
    }

    #[tokio::test]
    async fn test_resubmission_before_spin_resumes_pending() {
        let (store, service) = setup(1).await;
        let first = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();
        let second = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();
        assert_eq!(second.decision, SubmissionDecision::Resumed);
        assert_eq!(second.participation.id, first.participation.id);
        assert_eq!(store.participation_count(CAMPAIGN_ID).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_admit_exactly_one() {
        let (store, service) = setup(1).await;
        let results = join_all(
            (0..8).map(|_| service.submit(CAMPAIGN_ID, form("racer@example.com"))),
        )
        .await;

        let results: Vec<SubmissionResponse> = results.into_iter().map(Result::unwrap).collect();
        let admitted = results
            .iter()
            .filter(|r| r.decision == SubmissionDecision::Admitted)
            .count();
        assert_eq!(admitted, 1);
        let id = results[0].participation.id;
        assert!(results.iter().all(|r| r.participation.id == id));
        assert_eq!(store.participation_count(CAMPAIGN_ID).await, 1);
    }

    #[tokio::test]
    async fn test_max_uses_allows_another_round_after_spin() {
        let (store, service) = setup(2).await;

        let first = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();
        service.spin(first.participation.id).await.unwrap();

        let second = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();
        assert_eq!(second.decision, SubmissionDecision::Admitted);
        assert_ne!(second.participation.id, first.participation.id);
        service.spin(second.participation.id).await.unwrap();

        let third = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();
        assert_eq!(third.decision, SubmissionDecision::AlreadyParticipated);
        assert_eq!(third.participation.id, second.participation.id);
        assert_eq!(store.participation_count(CAMPAIGN_ID).await, 2);
    }

    #[tokio::test]
    async fn test_second_spin_replays_stored_outcome() {
        let (_, service) = setup(1).await;
        let sub = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();

        let first = service.spin(sub.participation.id).await.unwrap();
        let second = service.spin(sub.participation.id).await.unwrap();
        assert!(second.replayed);
        assert!(second.spin_id.is_none());
        assert_eq!(second.prize_won, first.prize_won);
        assert_eq!(second.rotation_degrees, first.rotation_degrees);
        assert_eq!(second.wedge_index, first.wedge_index);
    }

    #[tokio::test]
    async fn test_delivered_prize_matches_landing_wedge() {
        let (_, service) = setup(1).await;
        let table = PrizeTable::new(four_prizes()).unwrap();
        for i in 0..50 {
            let sub = service
                .submit(CAMPAIGN_ID, form(&format!("player{i}@example.com")))
                .await
                .unwrap();
            let spin = service.spin(sub.participation.id).await.unwrap();
            let wedge = resolve_wedge(spin.rotation_degrees.unwrap(), table.len()).unwrap();
            assert_eq!(spin.wedge_index, Some(wedge));
            assert_eq!(spin.prize_won.as_deref(), Some(table.prizes()[wedge].name.as_str()));
        }
    }

    #[tokio::test]
    async fn test_concurrent_spins_settle_once() {
        let (_, service) =
            setup_with(campaign(1, four_prizes()), Duration::from_millis(20)).await;
        let sub = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();
        let id = sub.participation.id;

        let (a, b) = tokio::join!(service.spin(id), service.spin(id));
        let ok: Vec<_> = [&a, &b].into_iter().filter(|r| r.is_ok()).collect();
        assert_eq!(ok.len(), 1);
        let rejected = if a.is_err() { a } else { b };
        assert!(matches!(
            rejected,
            Err(AppError::Wheel(WheelError::SpinNotIdle))
        ));

        // 结算完成后可正常重放
        let replay = service.spin(id).await.unwrap();
        assert!(replay.replayed);
    }

    #[tokio::test]
    async fn test_started_spin_settles_when_caller_gives_up() {
        let (store, service) =
            setup_with(campaign(1, four_prizes()), Duration::from_millis(50)).await;
        let sub = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();
        let id = sub.participation.id;

        // 调用方在动画结束前断开
        let abandoned = tokio::time::timeout(Duration::from_millis(10), service.spin(id)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let stored = store.find_by_id(id).await.unwrap().unwrap();
        assert!(stored.has_spun);
        assert!(stored.prize_won.is_some());

        let replay = service.spin(id).await.unwrap();
        assert!(replay.replayed);
        assert_eq!(replay.prize_won, stored.prize_won);
    }

    #[tokio::test]
    async fn test_settlement_failure_leaves_record_pending() {
        let (store, service) = setup(1).await;
        let sub = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();
        let id = sub.participation.id;

        store.fail_next_settlement();
        assert!(matches!(
            service.spin(id).await,
            Err(AppError::DatabaseError(_))
        ));
        let after = service.get_participation(id).await.unwrap();
        assert!(!after.has_spun);
        assert!(after.prize_won.is_none());

        let retry = service.spin(id).await.unwrap();
        assert!(!retry.replayed);
        assert!(retry.prize_won.is_some());
        assert_eq!(store.participation_count(CAMPAIGN_ID).await, 1);
    }

    #[tokio::test]
    async fn test_expiry_is_calendar_days_in_time_zone() {
        let (store, service) = setup(1).await;
        let sub = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();
        let spin = service.spin(sub.participation.id).await.unwrap();

        let stored = store
            .find_by_id(sub.participation.id)
            .await
            .unwrap()
            .unwrap();
        let expected = compute_expiry(stored.created_at, 3, chrono_tz::America::Sao_Paulo);
        assert_eq!(stored.expires_at, Some(expected));
        assert_eq!(
            spin.expires_at,
            Some(to_local(expected, chrono_tz::America::Sao_Paulo))
        );
    }

    #[tokio::test]
    async fn test_coupon_toggle_is_idempotent_and_reversible() {
        let (_, service) = setup_with(
            campaign(1, vec![prize(1, "Free Coffee", 100.0, Some("COFFEE"))]),
            Duration::ZERO,
        )
        .await;
        let sub = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();
        let id = sub.participation.id;

        // 转动前没有优惠码
        assert!(matches!(
            service.toggle_coupon(id, None).await,
            Err(AppError::ValidationError(_))
        ));

        let spin = service.spin(id).await.unwrap();
        assert_eq!(spin.coupon_code.as_deref(), Some("COFFEE"));

        let used = service.toggle_coupon(id, None).await.unwrap();
        assert!(used.coupon_used);
        assert!(used.has_spun);
        let still_used = service.toggle_coupon(id, Some(true)).await.unwrap();
        assert!(still_used.coupon_used);
        let reverted = service.toggle_coupon(id, None).await.unwrap();
        assert!(!reverted.coupon_used);
        assert!(reverted.has_spun);
    }

    #[tokio::test]
    async fn test_concurrent_coupon_flips_are_not_lost() {
        let (_, service) = setup_with(
            campaign(1, vec![prize(1, "Free Coffee", 100.0, Some("COFFEE"))]),
            Duration::ZERO,
        )
        .await;
        let sub = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();
        let id = sub.participation.id;
        service.spin(id).await.unwrap();

        let flips = join_all((0..2).map(|_| service.toggle_coupon(id, None))).await;
        assert!(flips.iter().all(Result::is_ok));
        // 两次取反回到原状态
        assert!(!service.get_participation(id).await.unwrap().coupon_used);

        let flips = join_all((0..3).map(|_| service.toggle_coupon(id, None))).await;
        assert!(flips.iter().all(Result::is_ok));
        assert!(service.get_participation(id).await.unwrap().coupon_used);
    }

    #[tokio::test]
    async fn test_coupon_toggle_rejected_without_coupon() {
        let (_, service) = setup_with(
            campaign(1, vec![prize(1, "Try Again", 100.0, None)]),
            Duration::ZERO,
        )
        .await;
        let sub = service.submit(CAMPAIGN_ID, form("ana@example.com")).await.unwrap();
        let spin = service.spin(sub.participation.id).await.unwrap();
        assert_eq!(spin.prize_won.as_deref(), Some("Try Again"));
        assert!(spin.coupon_code.is_none());
        assert!(matches!(
            service.toggle_coupon(sub.participation.id, Some(true)).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_unbalanced_campaign_rejected_before_spin() {
        let (store, service) = setup_with(
            campaign(
                1,
                vec![prize(1, "a", 40.0, Some("A")), prize(2, "b", 50.0, None)],
            ),
            Duration::ZERO,
        )
        .await;
        assert!(matches!(
            service.submit(CAMPAIGN_ID, form("ana@example.com")).await,
            Err(AppError::ConfigError(_))
        ));
        assert_eq!(store.participation_count(CAMPAIGN_ID).await, 0);
    }

    #[tokio::test]
    async fn test_submission_without_identity_rejected() {
        let (_, service) = setup(1).await;
        let data = json!({ "Name": "Ana" }).as_object().cloned().unwrap();
        assert!(matches!(
            service.submit(CAMPAIGN_ID, data).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            service.submit(999, form("ana@example.com")).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_participations_newest_first() {
        let (_, service) = setup(1).await;
        for i in 0..3 {
            service
                .submit(CAMPAIGN_ID, form(&format!("p{i}@example.com")))
                .await
                .unwrap();
        }
        let page = service
            .list_participations(
                CAMPAIGN_ID,
                &ParticipationListQuery {
                    page: Some(1),
                    per_page: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data.len(), 2);
        assert!(page.data[0].id > page.data[1].id);
    }
}
