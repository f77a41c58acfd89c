use chrono::{DateTime, Days, Duration, FixedOffset, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{AppError, AppResult};

pub fn parse_time_zone(name: &str) -> AppResult<Tz> {
    name.parse::<Tz>()
        .map_err(|e| AppError::ConfigError(format!("Invalid time zone '{name}': {e}")))
}

/// 按配置时区展示时间
pub fn to_local(instant: DateTime<Utc>, tz: Tz) -> DateTime<FixedOffset> {
    instant.with_timezone(&tz).fixed_offset()
}

/// 优惠券过期时间：`created_at` 换算为 `tz` 的本地时间，加 `days` 个自然日，时分秒不变
///
/// 跨夏令时切换时不等于 `days * 24h`。
/// 本地时间出现两次时取较早的时刻；因夏令时跳过的本地时间顺延一小时。
pub fn compute_expiry(created_at: DateTime<Utc>, days: u32, tz: Tz) -> DateTime<Utc> {
    let local = created_at.with_timezone(&tz).naive_local();
    let Some(target) = local.checked_add_days(Days::new(u64::from(days))) else {
        return created_at + Duration::days(i64::from(days));
    };
    resolve_local(target, tz).unwrap_or_else(|| created_at + Duration::days(i64::from(days)))
}

fn resolve_local(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}
