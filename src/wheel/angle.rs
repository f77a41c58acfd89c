use super::WheelError;

pub const FULL_TURN: f64 = 360.0;

/// `θ mod 360`，结果始终在 `[0, 360)`（负角度同样适用）
pub fn normalize_angle(theta: f64) -> f64 {
    let n = theta.rem_euclid(FULL_TURN);
    // rem_euclid 对极小负数可能返回 360.0
    if n >= FULL_TURN { 0.0 } else { n }
}

/// 转盘顺时针转过 `θ` 后，顶部固定指针在扇区布局中的位置
pub fn pointer_position(theta: f64) -> f64 {
    normalize_angle(FULL_TURN - normalize_angle(theta))
}

pub fn wedge_span(wedges: usize) -> f64 {
    FULL_TURN / wedges as f64
}

/// 第 `index` 个扇区的 `[start, end)`，从顶部顺时针计算
pub fn wedge_bounds(index: usize, wedges: usize) -> (f64, f64) {
    let span = wedge_span(wedges);
    (index as f64 * span, (index + 1) as f64 * span)
}

/// 指针所指的扇区下标
/// 0 号扇区从顶部开始，下标顺时针递增
pub fn resolve_wedge(theta: f64, wedges: usize) -> Result<usize, WheelError> {
    if wedges == 0 {
        return Err(WheelError::NoWedges);
    }
    if !theta.is_finite() {
        return Err(WheelError::InvalidAngle(theta));
    }
    let index = (pointer_position(theta) / wedge_span(wedges)).floor() as usize;
    Ok(index % wedges)
}
