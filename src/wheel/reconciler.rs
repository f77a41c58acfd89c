use serde::Serialize;

/// 一次转盘实际发放的扇区，以及用于判定的两个信号
///
/// 以视觉扇区（指针停留位置）为准：玩家拿到的永远是看到的奖品，权重抽取仅作参考。
/// 使用 [`super::RotationPolicy::Weighted`] 时旋转角度会落在抽中的扇区内，
/// 两者一致，发放分布仍符合配置的权重。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub delivered: usize,
    pub visual: usize,
    pub drawn: usize,
}

impl Reconciliation {
    pub fn agreed(&self) -> bool {
        self.visual == self.drawn
    }
}

pub fn reconcile(visual: usize, drawn: usize) -> Reconciliation {
    let outcome = Reconciliation {
        delivered: visual,
        visual,
        drawn,
    };
    if !outcome.agreed() {
        log::info!("Visual wedge {visual} differs from weighted draw {drawn}, delivering visual");
    }
    outcome
}
