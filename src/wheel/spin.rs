use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::angle::{FULL_TURN, normalize_angle, resolve_wedge, wedge_bounds, wedge_span};
use super::{Prize, PrizeTable, Reconciliation, WheelError, draw, reconcile};

/// 停止前至少转的整圈数
pub const MIN_TURNS: f64 = 5.0;
/// 在 [`MIN_TURNS`] 之上额外的圈数（合计 5..8 圈）
pub const TURN_SPREAD: f64 = 3.0;
/// 瞄准扇区时两侧各留出的比例
const LANDING_MARGIN: f64 = 0.1;

/// 最终旋转角度的生成方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPolicy {
    /// 先按权重抽奖，再让角度落在该奖品的扇区内
    #[default]
    Weighted,
    /// `(5 + u*3) * 360 + u' * 360`，扇区命中概率与宽度成正比，权重抽取只做记录
    Uniform,
}

impl FromStr for RotationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weighted" => Ok(RotationPolicy::Weighted),
            "uniform" => Ok(RotationPolicy::Uniform),
            other => Err(format!("Unknown rotation policy: {other}")),
        }
    }
}

pub fn uniform_rotation<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let turns = MIN_TURNS + rng.gen_range(0.0..1.0) * TURN_SPREAD;
    turns * FULL_TURN + rng.gen_range(0.0..FULL_TURN)
}

/// 5..=7 整圈加上偏移，使指针严格落在 `wedge` 内
pub fn rotation_landing_on<R: Rng + ?Sized>(wedge: usize, wedges: usize, rng: &mut R) -> f64 {
    let turns = MIN_TURNS + rng.gen_range(0..TURN_SPREAD as u32) as f64;
    let (start, _) = wedge_bounds(wedge, wedges);
    let inside = wedge_span(wedges) * rng.gen_range(LANDING_MARGIN..(1.0 - LANDING_MARGIN));
    turns * FULL_TURN + normalize_angle(FULL_TURN - (start + inside))
}

/// 转盘开始时确定的全部结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinPlan {
    pub rotation: f64,
    pub drawn: usize,
}

impl SpinPlan {
    pub fn generate<R: Rng + ?Sized>(
        table: &PrizeTable,
        policy: RotationPolicy,
        rng: &mut R,
    ) -> Result<Self, WheelError> {
        let drawn = draw(table, rng)?;
        let rotation = match policy {
            RotationPolicy::Weighted => rotation_landing_on(drawn, table.len(), rng),
            RotationPolicy::Uniform => uniform_rotation(rng),
        };
        Ok(Self { rotation, drawn })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpinResult {
    pub rotation: f64,
    pub reconciliation: Reconciliation,
    pub prize: Prize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpinState {
    Idle,
    Animating(SpinPlan),
    Settled(SpinResult),
}

/// 单次转盘的 `Idle -> Animating -> Settled` 状态机
///
/// 不支持取消，也不能回到 `Idle`；新的转盘需要新的 sequencer。
#[derive(Debug)]
pub struct SpinSequencer {
    state: SpinState,
    settle_after: Duration,
}

impl SpinSequencer {
    pub fn new(settle_after: Duration) -> Self {
        Self {
            state: SpinState::Idle,
            settle_after,
        }
    }

    pub fn state(&self) -> &SpinState {
        &self.state
    }

    pub fn begin<R: Rng + ?Sized>(
        &mut self,
        table: &PrizeTable,
        policy: RotationPolicy,
        rng: &mut R,
    ) -> Result<SpinPlan, WheelError> {
        if self.state != SpinState::Idle {
            return Err(WheelError::SpinNotIdle);
        }
        let plan = SpinPlan::generate(table, policy, rng)?;
        self.state = SpinState::Animating(plan);
        Ok(plan)
    }

    pub fn settle(&mut self, table: &PrizeTable) -> Result<SpinResult, WheelError> {
        let plan = match &self.state {
            SpinState::Animating(plan) => *plan,
            _ => return Err(WheelError::SpinNotAnimating),
        };
        let visual = resolve_wedge(plan.rotation, table.len())?;
        let reconciliation = reconcile(visual, plan.drawn);
        let prize = table
            .get(reconciliation.delivered)
            .cloned()
            .ok_or(WheelError::EmptyPrizeTable)?;
        let result = SpinResult {
            rotation: plan.rotation,
            reconciliation,
            prize,
        };
        self.state = SpinState::Settled(result.clone());
        Ok(result)
    }

    /// 开始转动，等待结算时长后结算且只结算一次
    pub async fn run(
        &mut self,
        table: &PrizeTable,
        policy: RotationPolicy,
    ) -> Result<SpinResult, WheelError> {
        let plan = self.begin_with_thread_rng(table, policy)?;
        log::debug!(
            "Wheel animating: rotation {:.2}, drawn wedge {}",
            plan.rotation,
            plan.drawn
        );
        tokio::time::sleep(self.settle_after).await;
        self.settle(table)
    }

    fn begin_with_thread_rng(
        &mut self,
        table: &PrizeTable,
        policy: RotationPolicy,
    ) -> Result<SpinPlan, WheelError> {
        let mut rng = rand::thread_rng();
        self.begin(table, policy, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wheel::prize_table::sample_table;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_uniform_rotation_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let theta = uniform_rotation(&mut rng);
            assert!((5.0 * FULL_TURN..9.0 * FULL_TURN).contains(&theta));
        }
    }

    #[test]
    fn test_aimed_rotation_lands_on_target() {
        let mut rng = StdRng::seed_from_u64(11);
        for wedges in 1..=16 {
            for wedge in 0..wedges {
                for _ in 0..50 {
                    let theta = rotation_landing_on(wedge, wedges, &mut rng);
                    assert!(theta >= MIN_TURNS * FULL_TURN);
                    assert_eq!(resolve_wedge(theta, wedges).unwrap(), wedge);
                }
            }
        }
    }

    #[test]
    fn test_weighted_policy_visual_matches_draw() {
        let table = sample_table();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1_000 {
            let mut seq = SpinSequencer::new(Duration::ZERO);
            seq.begin(&table, RotationPolicy::Weighted, &mut rng).unwrap();
            let result = seq.settle(&table).unwrap();
            assert!(result.reconciliation.agreed());
            assert_eq!(
                result.prize,
                table.prizes()[result.reconciliation.drawn].clone()
            );
        }
    }

    #[test]
    fn test_uniform_policy_delivers_visual_wedge() {
        let table = sample_table();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..1_000 {
            let mut seq = SpinSequencer::new(Duration::ZERO);
            let plan = seq.begin(&table, RotationPolicy::Uniform, &mut rng).unwrap();
            let result = seq.settle(&table).unwrap();
            let visual = resolve_wedge(plan.rotation, table.len()).unwrap();
            assert_eq!(result.reconciliation.delivered, visual);
            assert_eq!(result.prize, table.prizes()[visual].clone());
        }
    }

    #[test]
    fn test_state_transitions_are_single_shot() {
        let table = sample_table();
        let mut rng = StdRng::seed_from_u64(1);
        let mut seq = SpinSequencer::new(Duration::ZERO);
        assert_eq!(seq.state(), &SpinState::Idle);
        assert_eq!(seq.settle(&table), Err(WheelError::SpinNotAnimating));

        seq.begin(&table, RotationPolicy::Weighted, &mut rng).unwrap();
        assert!(matches!(seq.state(), SpinState::Animating(_)));
        assert_eq!(
            seq.begin(&table, RotationPolicy::Weighted, &mut rng),
            Err(WheelError::SpinNotIdle)
        );

        let result = seq.settle(&table).unwrap();
        assert_eq!(seq.state(), &SpinState::Settled(result));
        assert_eq!(seq.settle(&table), Err(WheelError::SpinNotAnimating));
        assert_eq!(
            seq.begin(&table, RotationPolicy::Weighted, &mut rng),
            Err(WheelError::SpinNotIdle)
        );
    }

    #[tokio::test]
    async fn test_run_settles_after_delay() {
        let table = sample_table();
        let mut seq = SpinSequencer::new(Duration::from_millis(20));
        let started = std::time::Instant::now();
        let result = seq.run(&table, RotationPolicy::Weighted).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(matches!(seq.state(), SpinState::Settled(_)));
        assert!(table.prizes().contains(&result.prize));
        assert!(seq.run(&table, RotationPolicy::Weighted).await.is_err());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Weighted".parse(), Ok(RotationPolicy::Weighted));
        assert_eq!(" uniform ".parse(), Ok(RotationPolicy::Uniform));
        assert!("random".parse::<RotationPolicy>().is_err());
    }
}
