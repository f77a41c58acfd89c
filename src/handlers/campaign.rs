use crate::models::*;
use crate::services::CampaignService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/campaigns/{campaign_id}/wheel",
    tag = "campaign",
    params(
        ("campaign_id" = i64, Path, description = "活动ID")
    ),
    responses(
        (status = 200, description = "获取转盘成功", body = WheelResponse),
        (status = 404, description = "活动不存在"),
        (status = 422, description = "活动奖品配置错误")
    )
)]
/// 获取活动转盘（扇区顺序、角度、表单字段），不返回权重
pub async fn get_wheel(
    service: web::Data<CampaignService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match service.get_wheel(path.into_inner()).await {
        Ok(wheel) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": wheel }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn campaign_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/campaigns/{campaign_id}/wheel", web::get().to(get_wheel));
}
