use crate::models::*;
use crate::services::ParticipationService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/campaigns/{campaign_id}/participations",
    tag = "participation",
    params(
        ("campaign_id" = i64, Path, description = "活动ID")
    ),
    request_body = SubmitParticipationRequest,
    responses(
        (status = 200, description = "提交成功（新建 / 复用 / 已参与）", body = SubmissionResponse),
        (status = 400, description = "缺少有效的邮箱或手机号"),
        (status = 404, description = "活动不存在"),
        (status = 409, description = "并发提交冲突，请重试"),
        (status = 422, description = "活动奖品配置错误")
    )
)]
/// 提交参与表单:
/// 1. 从表单中提取邮箱/手机号作为身份
/// 2. 同一身份已有未转动记录时直接复用
/// 3. 达到参与上限时返回之前的结果
pub async fn submit(
    service: web::Data<ParticipationService>,
    path: web::Path<i64>,
    req: web::Json<SubmitParticipationRequest>,
) -> Result<HttpResponse> {
    match service.submit(path.into_inner(), req.into_inner().data).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/campaigns/{campaign_id}/participations",
    tag = "participation",
    params(
        ("campaign_id" = i64, Path, description = "活动ID"),
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("per_page" = Option<u32>, Query, description = "每页数量 (默认20)")
    ),
    responses(
        (status = 200, description = "获取参与记录成功", body = ParticipationPageResponse),
        (status = 404, description = "活动不存在")
    )
)]
/// 分页获取活动参与记录（倒序）
pub async fn list_participations(
    service: web::Data<ParticipationService>,
    path: web::Path<i64>,
    query: web::Query<ParticipationListQuery>,
) -> Result<HttpResponse> {
    match service
        .list_participations(path.into_inner(), &query.into_inner())
        .await
    {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/participations/{participation_id}",
    tag = "participation",
    params(
        ("participation_id" = i64, Path, description = "参与记录ID")
    ),
    responses(
        (status = 200, description = "获取参与记录成功", body = ParticipationResponse),
        (status = 404, description = "记录不存在")
    )
)]
pub async fn get_participation(
    service: web::Data<ParticipationService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match service.get_participation(path.into_inner()).await {
        Ok(p) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": p }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/participations/{participation_id}/spin",
    tag = "participation",
    params(
        ("participation_id" = i64, Path, description = "参与记录ID")
    ),
    responses(
        (status = 200, description = "转盘成功（已转过则返回保存的结果）", body = SpinResponse),
        (status = 404, description = "记录不存在"),
        (status = 409, description = "转盘正在进行中"),
        (status = 422, description = "活动奖品配置错误")
    )
)]
/// 转动转盘:
/// 1. 已转过的记录直接返回保存的结果
/// 2. 生成旋转角度，以指针停留的扇区为准发放奖品
/// 3. 写入奖品、优惠码与过期时间
pub async fn spin(
    service: web::Data<ParticipationService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match service.spin(path.into_inner()).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/participations/{participation_id}/coupon",
    tag = "participation",
    params(
        ("participation_id" = i64, Path, description = "参与记录ID")
    ),
    request_body = CouponToggleRequest,
    responses(
        (status = 200, description = "更新核销状态成功", body = ParticipationResponse),
        (status = 400, description = "该记录没有优惠券"),
        (status = 404, description = "记录不存在")
    )
)]
/// 设置优惠券核销状态（不传 used 则取反）
pub async fn toggle_coupon(
    service: web::Data<ParticipationService>,
    path: web::Path<i64>,
    req: Option<web::Json<CouponToggleRequest>>,
) -> Result<HttpResponse> {
    let used = req.and_then(|r| r.into_inner().used);
    match service.toggle_coupon(path.into_inner(), used).await {
        Ok(p) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": p }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn participation_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/campaigns/{campaign_id}/participations")
            .route("", web::post().to(submit))
            .route("", web::get().to(list_participations)),
    )
    .service(
        web::scope("/participations/{participation_id}")
            .route("", web::get().to(get_participation))
            .route("/spin", web::post().to(spin))
            .route("/coupon", web::post().to(toggle_coupon)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::campaign_config;
    use crate::repositories::MemoryStore;
    use crate::utils::IdentityResolver;
    use crate::services::CampaignService;
    use crate::wheel::RotationPolicy;
    use crate::wheel::prize_table::sample_table;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        let form_fields = vec!["Nome".to_string(), "E-mail".to_string(), "Telefone".to_string()];
        store
            .insert_campaign(Campaign {
                id: 1,
                name: "Demo Wheel".into(),
                prizes: sample_table(),
                max_uses_per_identity: 1,
                prize_expiry_days: 3,
                wheel_color: "#ff0000".into(),
                identity: IdentityResolver::from_form_fields(&form_fields),
                form_fields,
            })
            .await;
        store
    }

    #[actix_web::test]
    async fn test_submit_spin_and_redeem_over_http() {
        let store = store().await;
        let tz = chrono_tz::America::Sao_Paulo;
        let participation_service = ParticipationService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            tz,
            RotationPolicy::Weighted,
            Duration::ZERO,
        );
        let campaign_service = CampaignService::new(Arc::new(store.clone()), tz);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(participation_service))
                .app_data(web::Data::new(campaign_service))
                .service(
                    web::scope("/api/v1")
                        .configure(campaign_config)
                        .configure(participation_config),
                ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/campaigns/1/wheel")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["wedges"].as_array().unwrap().len(), 4);

        let req = test::TestRequest::post()
            .uri("/api/v1/campaigns/1/participations")
            .set_json(json!({ "data": { "Nome": "Ana", "E-mail": "Ana@Example.com" } }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["decision"], "admitted");
        let id = body["data"]["participation"]["id"].as_i64().unwrap();

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/participations/{id}/spin"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["replayed"], false);
        let has_coupon = !body["data"]["coupon_code"].is_null();

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/participations/{id}/coupon"))
            .set_json(json!({ "used": true }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        if has_coupon {
            assert_eq!(resp.status(), StatusCode::OK);
        } else {
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }

        let req = test::TestRequest::post()
            .uri("/api/v1/campaigns/1/participations")
            .set_json(json!({ "data": { "Nome": "Ana", "E-mail": "ana@example.com " } }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["decision"], "already_participated");
        assert_eq!(body["data"]["participation"]["id"].as_i64(), Some(id));
    }

    #[actix_web::test]
    async fn test_unknown_participation_is_404() {
        let store = store().await;
        let service = ParticipationService::new(
            Arc::new(store.clone()),
            Arc::new(store),
            chrono_tz::UTC,
            RotationPolicy::Uniform,
            Duration::ZERO,
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .configure(participation_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/participations/42/spin")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
