//! 状态迁移事件
//!
//! 状态机本身不做任何 IO，只把迁移结果写入 [`EventBuffer`]；
//! 控制回路在每个 tick 结束时把事件交给 [`FeedbackSink`]（日志、提示音、UI 等）。

use crate::item::ItemType;
use crossbeam_channel::{Sender, TrySendError};
use kart_driver::BumpSide;
use smallvec::SmallVec;
use tracing::{info, warn};

/// 单个 tick 产生的事件（通常 0~2 个，栈上预留 4 个）
pub type EventBuffer = SmallVec<[ControlEvent; 4]>;

/// 控制回路对外发布的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// 获得道具
    ItemAcquired(ItemType),
    /// 道具槽已满，新道具被丢弃
    ItemDiscarded { held: ItemType },
    /// 使用道具（效果从本 tick 开始生效）
    ItemUsed(ItemType),
    /// 道具效果结束（本 tick 为最后一个生效 tick）
    EffectEnded(ItemType),
    /// 碰撞，开始 wobble
    RecoveryStarted { side: BumpSide, ticks: u32 },
    /// wobble 结束，交还控制权
    RecoveryEnded,
    /// 无敌状态下的碰撞（不触发 wobble）
    CollisionShielded { side: BumpSide },
    /// 手柄连接
    ControllerConnected,
    /// 手柄断开（按完全松开处理）
    ControllerDisconnected,
    /// 驱动指令发送失败
    SendFailed { tick: u64, error: String },
}

/// 事件接收方
pub trait FeedbackSink {
    fn publish(&mut self, event: &ControlEvent);
}

/// 丢弃所有事件
impl FeedbackSink for () {
    fn publish(&mut self, _event: &ControlEvent) {}
}

/// 收集事件（测试用）
impl FeedbackSink for Vec<ControlEvent> {
    fn publish(&mut self, event: &ControlEvent) {
        self.push(event.clone());
    }
}

impl<F: FeedbackSink + ?Sized> FeedbackSink for &mut F {
    fn publish(&mut self, event: &ControlEvent) {
        (**self).publish(event)
    }
}

impl<F: FeedbackSink + ?Sized> FeedbackSink for Box<F> {
    fn publish(&mut self, event: &ControlEvent) {
        (**self).publish(event)
    }
}

/// 以结构化日志输出事件
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFeedback;

impl FeedbackSink for TracingFeedback {
    fn publish(&mut self, event: &ControlEvent) {
        match event {
            ControlEvent::ItemAcquired(item) => info!(item = item.name(), "Item acquired"),
            ControlEvent::ItemDiscarded { held } => {
                info!(held = held.name(), "Item slot full, pickup discarded")
            },
            ControlEvent::ItemUsed(item) => info!(item = item.name(), "Item used"),
            ControlEvent::EffectEnded(item) => info!(item = item.name(), "Item effect ended"),
            ControlEvent::RecoveryStarted { side, ticks } => {
                info!(?side, ticks, "Collision detected, wobbling")
            },
            ControlEvent::RecoveryEnded => info!("Wobble finished, control restored"),
            ControlEvent::CollisionShielded { side } => {
                info!(?side, "Collision ignored (invincible)")
            },
            ControlEvent::ControllerConnected => info!("Controller connected"),
            ControlEvent::ControllerDisconnected => warn!("Controller disconnected"),
            ControlEvent::SendFailed { tick, error } => {
                warn!(tick, error = error.as_str(), "Drive command send failed")
            },
        }
    }
}

/// 把事件转发到另一个线程
///
/// 使用 `try_send`，通道满或接收端已退出时丢弃事件，绝不阻塞控制回路。
#[derive(Debug, Clone)]
pub struct ChannelFeedback {
    tx: Sender<ControlEvent>,
    dropped: u64,
}

impl ChannelFeedback {
    pub fn new(tx: Sender<ControlEvent>) -> Self {
        Self { tx, dropped: 0 }
    }

    /// 被丢弃的事件数
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl FeedbackSink for ChannelFeedback {
    fn publish(&mut self, event: &ControlEvent) {
        match self.tx.try_send(event.clone()) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
            },
        }
    }
}
