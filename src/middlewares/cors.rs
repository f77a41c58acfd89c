use actix_cors::Cors;

/// 转盘页面嵌入在各活动落地页中，来源不固定
pub fn create_cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}
