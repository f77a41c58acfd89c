use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::campaign::get_wheel,
        handlers::participation::submit,
        handlers::participation::list_participations,
        handlers::participation::get_participation,
        handlers::participation::spin,
        handlers::participation::toggle_coupon,
    ),
    components(
        schemas(
            WheelResponse,
            WheelWedgeResponse,
            SubmitParticipationRequest,
            SubmissionDecision,
            SubmissionResponse,
            ParticipationStatus,
            ParticipationResponse,
            ParticipationListQuery,
            ParticipationPageResponse,
            SpinResponse,
            CouponToggleRequest,
            ApiError,
        )
    ),
    tags(
        (name = "campaign", description = "Spin wheel layout API"),
        (name = "participation", description = "Participation, spin and coupon API"),
    ),
    info(
        title = "Spin Wheel Backend API",
        version = "1.0.0",
        description = "Spin-to-win campaign REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_wheel_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/campaigns/{campaign_id}/wheel",
            "/campaigns/{campaign_id}/participations",
            "/participations/{participation_id}",
            "/participations/{participation_id}/spin",
            "/participations/{participation_id}/coupon",
        ] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "missing {expected}");
        }
    }
}
