//! 玩家提示
//!
//! 控制回路的事件一路写日志，一路通过通道转发给打印线程，
//! 终端输出不会拖慢控制回路。

use crossbeam_channel::{Receiver, bounded};
use kart_control::{ChannelFeedback, ControlEvent, FeedbackSink, ItemType, TracingFeedback};
use std::thread::{self, JoinHandle};

/// 事件通道容量（满时丢弃，控制回路不等待）
const EVENT_CAPACITY: usize = 64;

/// CLI 使用的事件接收方
pub struct CliFeedback {
    tracing: TracingFeedback,
    channel: ChannelFeedback,
}

impl FeedbackSink for CliFeedback {
    fn publish(&mut self, event: &ControlEvent) {
        self.tracing.publish(event);
        self.channel.publish(event);
    }
}

/// 把事件转成给玩家看的一行提示
pub fn player_message(event: &ControlEvent) -> Option<String> {
    let msg = match event {
        ControlEvent::ItemAcquired(ItemType::SpeedBoost) => "🍄 You got a Mushroom!".to_string(),
        ControlEvent::ItemAcquired(ItemType::Invincibility) => "⭐ You got a Star!".to_string(),
        ControlEvent::ItemDiscarded { held } => {
            format!("Item box skipped, already holding {}", held.name())
        },
        ControlEvent::ItemUsed(ItemType::SpeedBoost) => "🍄 Mushroom Boost!".to_string(),
        ControlEvent::ItemUsed(ItemType::Invincibility) => "⭐ INVINCIBILITY activated!".to_string(),
        ControlEvent::EffectEnded(ItemType::Invincibility) => "Invincibility OFF".to_string(),
        ControlEvent::EffectEnded(ItemType::SpeedBoost) => return None,
        ControlEvent::RecoveryStarted { .. } => "💥 Collision detected, get wobbled on.".to_string(),
        ControlEvent::RecoveryEnded => return None,
        ControlEvent::CollisionShielded { .. } => "⭐ Collision shrugged off!".to_string(),
        ControlEvent::ControllerConnected => "🎮 Player connected!".to_string(),
        ControlEvent::ControllerDisconnected => "🎮 Player disconnected".to_string(),
        ControlEvent::SendFailed { .. } => return None,
    };
    Some(msg)
}

/// 创建事件接收方与打印线程
///
/// 控制回路结束并丢弃 `CliFeedback` 后，打印线程随通道关闭退出。
pub fn spawn_printer() -> std::io::Result<(CliFeedback, JoinHandle<()>)> {
    let (tx, rx) = bounded(EVENT_CAPACITY);
    let handle = thread::Builder::new()
        .name("feedback".to_string())
        .spawn(move || print_events(rx))?;
    Ok((
        CliFeedback {
            tracing: TracingFeedback,
            channel: ChannelFeedback::new(tx),
        },
        handle,
    ))
}

fn print_events(rx: Receiver<ControlEvent>) {
    for event in rx {
        if let Some(msg) = player_message(&event) {
            println!("{}", msg);
        }
    }
}
