//! 碰撞恢复（wobble）状态机
//!
//! `Normal` 时碰撞条上升沿进入 `Wobbling(K)`；wobble 期间每个 tick 递减一次，
//! 新的碰撞既不延长也不重置计时，计数耗尽的那个 tick 回到 `Normal`。
//!
//! wobble 动作是固定的倒车 + 左右摆动：
//! - 前半个摆动周期的转向取决于碰撞侧（左侧/正面碰撞向左，右侧碰撞向右）
//! - 每 `K / (2 * shuffles)` 个 tick 换一次方向

use crate::config::RecoveryConfig;
use crate::events::{ControlEvent, EventBuffer};
use kart_driver::BumpSide;
use kart_protocol::{DriveCommand, TurnRadius};
use tracing::debug;

/// 恢复状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryState {
    #[default]
    Normal,
    Wobbling {
        /// 包括当前 tick 在内剩余的 tick 数（始终 > 0）
        ticks_remaining: u32,
        side: BumpSide,
    },
}

impl RecoveryState {
    pub fn is_wobbling(&self) -> bool {
        matches!(self, RecoveryState::Wobbling { .. })
    }
}

/// 碰撞恢复状态机
#[derive(Debug, Clone)]
pub struct RecoveryMachine {
    state: RecoveryState,
    enabled: bool,
    duration_ticks: u32,
    velocity_mm_s: i16,
    radius_mm: i16,
    shuffles: u32,
}

impl RecoveryMachine {
    pub fn new(config: &RecoveryConfig) -> Self {
        Self {
            state: RecoveryState::Normal,
            enabled: config.enabled,
            duration_ticks: config.duration_ticks,
            velocity_mm_s: config.velocity_mm_s,
            radius_mm: config.radius_mm,
            shuffles: config.shuffles,
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 推进一个 tick，返回本 tick 的 wobble 动作（`Normal` 时为 `None`）
    ///
    /// `invulnerable` 为真时碰撞不会进入 wobble，但也不会打断进行中的 wobble。
    pub fn step(
        &mut self,
        bump: Option<BumpSide>,
        invulnerable: bool,
        events: &mut EventBuffer,
    ) -> Option<DriveCommand> {
        match self.state {
            RecoveryState::Wobbling {
                ticks_remaining,
                side,
            } => {
                let next = ticks_remaining - 1;
                if next == 0 {
                    self.state = RecoveryState::Normal;
                    events.push(ControlEvent::RecoveryEnded);
                    return None;
                }
                self.state = RecoveryState::Wobbling {
                    ticks_remaining: next,
                    side,
                };
                Some(self.maneuver(next, side))
            },
            RecoveryState::Normal => {
                let side = match bump {
                    Some(side) if self.enabled => side,
                    _ => return None,
                };
                if invulnerable {
                    events.push(ControlEvent::CollisionShielded { side });
                    return None;
                }
                debug!(?side, ticks = self.duration_ticks, "Entering wobble");
                events.push(ControlEvent::RecoveryStarted {
                    side,
                    ticks: self.duration_ticks,
                });
                self.state = RecoveryState::Wobbling {
                    ticks_remaining: self.duration_ticks,
                    side,
                };
                Some(self.maneuver(self.duration_ticks, side))
            },
        }
    }

    /// 计算 wobble 动作
    fn maneuver(&self, ticks_remaining: u32, side: BumpSide) -> DriveCommand {
        let elapsed = self.duration_ticks.saturating_sub(ticks_remaining);
        let first = match side {
            BumpSide::Left | BumpSide::Both => 1,
            BumpSide::Right => -1,
        };
        let sign = if self.shuffles == 0 {
            first
        } else {
            let phase_len = (self.duration_ticks / self.shuffles.saturating_mul(2)).max(1);
            if (elapsed / phase_len) % 2 == 0 { first } else { -first }
        };
        let radius = TurnRadius::arc_clamped(sign * i32::from(self.radius_mm));
        DriveCommand::clamped(i32::from(self.velocity_mm_s), radius)
    }
}
