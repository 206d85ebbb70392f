//! 手柄读数 → 驾驶意图
//!
//! - 转向：水平轴，死区内归零，左为正
//! - 前进/后退：两个扳机，从 [-1, 1] 归一化到 [0, 1]，低于激活阈值归零
//! - 道具：按键的上升沿（按住不会重复触发）

use crate::config::InputConfig;
use kart_driver::RawControllerState;

/// 单个 tick 的驾驶意图
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriverIntent {
    /// 转向，-1.0 ~ 1.0，左为正
    pub turn: f64,
    /// 前进量，0.0 ~ 1.0
    pub forward: f64,
    /// 后退量，0.0 ~ 1.0
    pub backward: f64,
    /// 本 tick 按下道具键（上升沿）
    pub use_item: bool,
}

impl DriverIntent {
    /// 无任何输入
    pub const IDLE: Self = Self {
        turn: 0.0,
        forward: 0.0,
        backward: 0.0,
        use_item: false,
    };
}

/// 输入映射器
///
/// 唯一的内部状态是上一 tick 道具键是否按下。
#[derive(Debug, Clone)]
pub struct InputMapper {
    dead_zone: f64,
    trigger_threshold: f64,
    button_was_down: bool,
}

impl InputMapper {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            dead_zone: config.dead_zone,
            trigger_threshold: config.trigger_threshold,
            button_was_down: false,
        }
    }

    /// 映射一次读数
    pub fn map(&mut self, raw: &RawControllerState) -> DriverIntent {
        let use_item = raw.item_button && !self.button_was_down;
        self.button_was_down = raw.item_button;

        DriverIntent {
            turn: self.map_axis(raw.turn_axis),
            forward: self.map_trigger(raw.forward_trigger),
            backward: self.map_trigger(raw.backward_trigger),
            use_item,
        }
    }

    fn map_axis(&self, x: f64) -> f64 {
        if !x.is_finite() {
            return 0.0;
        }
        let x = x.clamp(-1.0, 1.0);
        if x.abs() < self.dead_zone {
            return 0.0;
        }
        // 摇杆向右为正，转向左为正
        -x
    }

    fn map_trigger(&self, t: f64) -> f64 {
        if !t.is_finite() {
            return 0.0;
        }
        let magnitude = ((t + 1.0) / 2.0).clamp(0.0, 1.0);
        if magnitude < self.trigger_threshold {
            0.0
        } else {
            magnitude
        }
    }
}
