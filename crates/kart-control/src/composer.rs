//! 驱动指令组合器
//!
//! 优先级（从高到低）：
//! 1. wobble 动作：完全忽略驾驶意图和道具效果
//! 2. 驾驶意图：净速度 = 前进 - 后退，转向由摇杆换算为转弯半径
//! 3. 道具效果：修改净速度和速度上限
//!
//! 最后一步始终是钳位到 Open Interface 的合法范围。

use crate::config::KartConfig;
use crate::input::DriverIntent;
use crate::item::ItemType;
use kart_protocol::{DriveCommand, RADIUS_MAX_MM, RADIUS_MIN_ARC_MM, TurnRadius};

/// 驱动指令组合器（无状态）
#[derive(Debug, Clone)]
pub struct CommandComposer {
    max_velocity_mm_s: f64,
    max_radius_mm: f64,
    dead_zone: f64,
    speed_boost_velocity_mm_s: f64,
    invincibility_velocity_mm_s: f64,
}

impl CommandComposer {
    pub fn new(config: &KartConfig) -> Self {
        Self {
            max_velocity_mm_s: f64::from(config.drive.max_velocity_mm_s),
            max_radius_mm: f64::from(config.drive.max_radius_mm),
            dead_zone: config.input.dead_zone,
            speed_boost_velocity_mm_s: f64::from(config.items.speed_boost_velocity_mm_s),
            invincibility_velocity_mm_s: f64::from(config.items.invincibility_velocity_mm_s),
        }
    }

    /// 组合本 tick 的驱动指令
    pub fn compose(
        &self,
        intent: &DriverIntent,
        effect: Option<ItemType>,
        maneuver: Option<DriveCommand>,
    ) -> DriveCommand {
        if let Some(cmd) = maneuver {
            return DriveCommand::clamped(i32::from(cmd.velocity_mm_s), cmd.radius);
        }

        // 同时按下两个扳机时相互抵消，而不是相加
        let net = intent.forward.clamp(0.0, 1.0) - intent.backward.clamp(0.0, 1.0);
        let (net, limit) = match effect {
            Some(item) => self.apply_effect(item, net),
            None => (net, self.max_velocity_mm_s),
        };

        let velocity = (net * limit) as i32;
        DriveCommand::clamped(velocity, self.turn_radius(intent.turn))
    }

    /// 道具效果：返回修改后的 (净速度, 速度上限)
    fn apply_effect(&self, item: ItemType, net: f64) -> (f64, f64) {
        match item {
            // 强制全速前进
            ItemType::SpeedBoost => (1.0, self.speed_boost_velocity_mm_s),
            ItemType::Invincibility => (net, self.invincibility_velocity_mm_s),
        }
    }

    /// 转向 → 转弯半径
    ///
    /// 摇杆刚离开死区时半径为 `max_radius_mm`，推到底时约为 `max_radius_mm * dead_zone`。
    /// 转向为正（向左）对应正半径（逆时针）。
    fn turn_radius(&self, turn: f64) -> TurnRadius {
        if turn == 0.0 || !turn.is_finite() {
            return TurnRadius::Straight;
        }
        let t = turn.clamp(-1.0, 1.0);
        // 先钳位幅值再带符号，截断为 0 时也不会改变转向
        let magnitude = ((self.max_radius_mm * (1.0 - t.abs() + self.dead_zone)) as i32)
            .clamp(i32::from(RADIUS_MIN_ARC_MM), i32::from(RADIUS_MAX_MM));
        TurnRadius::arc_clamped(if t > 0.0 { magnitude } else { -magnitude })
    }
}
