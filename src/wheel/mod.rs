//! 转盘奖品分配核心
//!
//! 除 [`spin::SpinSequencer::run`] 中的结算计时外，这里全部是纯函数（无 I/O、无存储）。
//! 组合方式:
//!
//! `PrizeTable` -> `draw`（权重信号）+ `angle`（视觉信号）
//! -> `reconciler` 决定实际发放的扇区 -> `spin` 负责状态流转

pub mod angle;
pub mod draw;
pub mod prize_table;
pub mod reconciler;
pub mod spin;

pub use angle::{FULL_TURN, normalize_angle, pointer_position, resolve_wedge, wedge_bounds};
pub use draw::{draw, draw_index};
pub use prize_table::{FULL_WEIGHT, Prize, PrizeTable};
pub use reconciler::{Reconciliation, reconcile};
pub use spin::{RotationPolicy, SpinPlan, SpinResult, SpinSequencer, SpinState};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WheelError {
    #[error("A spin requires at least one prize")]
    EmptyPrizeTable,

    #[error("Prize '{name}' has invalid weight {weight}")]
    InvalidWeight { name: String, weight: f64 },

    #[error("Prize weights sum to {total}, expected 100")]
    UnbalancedWeights { total: f64 },

    #[error("Prize weights sum to zero")]
    ZeroTotalWeight,

    #[error("Wheel needs at least one wedge")]
    NoWedges,

    #[error("Rotation angle {0} is not finite")]
    InvalidAngle(f64),

    #[error("Random value {0} is outside [0, 100)")]
    InvalidRandom(f64),

    #[error("Wheel is already spinning")]
    SpinNotIdle,

    #[error("Wheel is not spinning")]
    SpinNotAnimating,
}

impl WheelError {
    /// 转盘状态机违规（区别于输入或配置错误）
    pub fn is_state_violation(&self) -> bool {
        matches!(self, WheelError::SpinNotIdle | WheelError::SpinNotAnimating)
    }
}
