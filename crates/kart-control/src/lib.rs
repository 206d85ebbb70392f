//! # Kart Control
//!
//! Roomba 卡丁车的控制核心：
//! - 输入映射（手柄 → 驾驶意图）
//! - 道具状态机与碰撞恢复（wobble）状态机
//! - 驱动指令组合
//! - 固定周期控制回路
//!
//! 状态机不做 IO，只产生事件；所有 IO 都经过 `kart-driver` 的 `Transport` / `ControllerSource`。

pub mod composer;
pub mod config;
pub mod control_loop;
mod error;
pub mod events;
pub mod input;
pub mod item;
pub mod metrics;
pub mod recovery;

pub use composer::CommandComposer;
pub use config::{
    ConfigError, ControlConfig, DriveConfig, InputConfig, ItemPolicy, ItemsConfig, KartConfig,
    RecoveryConfig, SendFailurePolicy,
};
pub use control_loop::{ControlLoop, TickReport};
pub use error::ControlError;
pub use events::{ChannelFeedback, ControlEvent, EventBuffer, FeedbackSink, TracingFeedback};
pub use input::{DriverIntent, InputMapper};
pub use item::{
    ActiveEffect, FixedSelector, ItemMachine, ItemSelector, ItemState, ItemTick, ItemType,
    RandomSelector, selector_from_config,
};
pub use metrics::{LoopMetrics, MetricsSnapshot};
pub use recovery::{RecoveryMachine, RecoveryState};
