use std::sync::Arc;

use chrono_tz::Tz;

use crate::error::{AppError, AppResult};
use crate::models::WheelResponse;
use crate::repositories::CampaignRepository;

/// 活动转盘展示（只读）
#[derive(Clone)]
pub struct CampaignService {
    campaigns: Arc<dyn CampaignRepository>,
    time_zone: Tz,
}

impl CampaignService {
    pub fn new(campaigns: Arc<dyn CampaignRepository>, time_zone: Tz) -> Self {
        Self {
            campaigns,
            time_zone,
        }
    }

    /// 获取转盘扇区布局；权重不为 100 的活动不对外展示
    pub async fn get_wheel(&self, campaign_id: i64) -> AppResult<WheelResponse> {
        let campaign = self
            .campaigns
            .find_campaign(campaign_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Campaign {campaign_id} not found")))?;

        campaign
            .prizes
            .validate_total()
            .map_err(|e| AppError::ConfigError(format!("Campaign {campaign_id}: {e}")))?;

        Ok(WheelResponse::from_campaign(&campaign, self.time_zone.name()))
    }
}
