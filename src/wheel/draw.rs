use rand::Rng;

use super::{FULL_WEIGHT, PrizeTable, WheelError};

/// 按奖品顺序做累积权重抽取
///
/// `r` 取值 `[0, 100)`。每个奖品占半开区间 `[累计, 累计 + 权重)`，
/// 即第一个累计值严格大于 `r` 的奖品中奖：
/// 权重 `[30, 20, 15, 35]` 时 `r = 29.9` 选中 0 号，`r = 30.0` 选中 1 号。
/// 权重为 0 的奖品区间为空，永远不会中奖。
///
/// 权重和不为 100 的奖品表按比例缩放，不直接拒绝。
pub fn draw_index(table: &PrizeTable, r: f64) -> Result<usize, WheelError> {
    if !r.is_finite() || !(0.0..FULL_WEIGHT).contains(&r) {
        return Err(WheelError::InvalidRandom(r));
    }

    let total = table.total_weight();
    if total <= 0.0 {
        return Err(WheelError::ZeroTotalWeight);
    }

    // 权重和不为 100 时按比例缩放，而不是让本次抽奖失败
    let threshold = if table.is_balanced() {
        r
    } else {
        log::warn!("Prize weights sum to {total}, normalizing draw to 100");
        r * total / FULL_WEIGHT
    };

    let mut acc = 0.0;
    for (index, prize) in table.prizes().iter().enumerate() {
        acc += prize.weight;
        if threshold < acc {
            return Ok(index);
        }
    }

    // 浮点累加误差兜底：落到最后一个有权重的奖品
    table
        .prizes()
        .iter()
        .rposition(|p| p.weight > 0.0)
        .ok_or(WheelError::ZeroTotalWeight)
}

/// 在 `[0, 100)` 内均匀取 `r` 后抽取
pub fn draw<R: Rng + ?Sized>(table: &PrizeTable, rng: &mut R) -> Result<usize, WheelError> {
    let r = rng.gen_range(0.0..FULL_WEIGHT);
    draw_index(table, r)
}
