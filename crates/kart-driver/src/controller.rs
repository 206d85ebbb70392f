//! 手柄输入接口
//!
//! 控制回路每个 tick 调用一次 [`ControllerSource::poll`]。
//! 手柄后端若在独立线程中阻塞读取设备，通过 [`shared_controller`] 创建的
//! 单写单读通道交接最新采样：写端整体替换 `Arc`，读端原子加载，
//! 不存在读到"写了一半"的状态。

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;

/// 手柄原始读数
///
/// - 轴：-1.0（左）~ 1.0（右），0.0 居中
/// - 扳机：-1.0（松开）~ 1.0（按到底）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawControllerState {
    /// 水平轴（转向）
    pub turn_axis: f64,
    /// 前进扳机
    pub forward_trigger: f64,
    /// 后退扳机
    pub backward_trigger: f64,
    /// 道具键
    pub item_button: bool,
}

impl RawControllerState {
    /// 完全松开的手柄
    pub const NEUTRAL: Self = Self {
        turn_axis: 0.0,
        forward_trigger: -1.0,
        backward_trigger: -1.0,
        item_button: false,
    };
}

impl Default for RawControllerState {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// 一次轮询的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerPoll {
    /// 新采样
    Sample(RawControllerState),
    /// 超时内没有新数据（沿用上一次的读数）
    NoData,
    /// 手柄已断开
    Disconnected,
}

/// 手柄后端接口
pub trait ControllerSource {
    /// 轮询当前读数，最多等待 `timeout`
    fn poll(&mut self, timeout: Duration) -> ControllerPoll;
}

impl<C: ControllerSource + ?Sized> ControllerSource for &mut C {
    fn poll(&mut self, timeout: Duration) -> ControllerPoll {
        (**self).poll(timeout)
    }
}

impl<C: ControllerSource + ?Sized> ControllerSource for Box<C> {
    fn poll(&mut self, timeout: Duration) -> ControllerPoll {
        (**self).poll(timeout)
    }
}

#[derive(Debug, Clone, Copy)]
struct ControllerSlot {
    /// 每次写入递增，读端据此判断是否有新数据
    seq: u64,
    connected: bool,
    state: RawControllerState,
}

/// 写端（手柄读取线程持有）
pub struct ControllerPublisher {
    slot: Arc<ArcSwap<ControllerSlot>>,
    seq: u64,
}

impl ControllerPublisher {
    /// 发布新采样
    pub fn publish(&mut self, state: RawControllerState) {
        self.store(true, state);
    }

    /// 标记手柄断开
    pub fn disconnect(&mut self) {
        self.store(false, RawControllerState::NEUTRAL);
    }

    fn store(&mut self, connected: bool, state: RawControllerState) {
        self.seq += 1;
        self.slot.store(Arc::new(ControllerSlot {
            seq: self.seq,
            connected,
            state,
        }));
    }
}

/// 读端（控制回路持有）
pub struct SharedController {
    slot: Arc<ArcSwap<ControllerSlot>>,
    last_seq: u64,
}

impl ControllerSource for SharedController {
    /// 无锁读取，从不阻塞，`timeout` 被忽略
    fn poll(&mut self, _timeout: Duration) -> ControllerPoll {
        let slot = self.slot.load();
        if !slot.connected {
            self.last_seq = slot.seq;
            return ControllerPoll::Disconnected;
        }
        if slot.seq == self.last_seq {
            return ControllerPoll::NoData;
        }
        self.last_seq = slot.seq;
        ControllerPoll::Sample(slot.state)
    }
}

/// 创建单写单读的手柄交接通道
///
/// 初始状态为"断开"，直到写端第一次发布采样。
pub fn shared_controller() -> (ControllerPublisher, SharedController) {
    let slot = Arc::new(ArcSwap::from_pointee(ControllerSlot {
        seq: 0,
        connected: false,
        state: RawControllerState::NEUTRAL,
    }));
    (
        ControllerPublisher {
            slot: slot.clone(),
            seq: 0,
        },
        SharedController { slot, last_seq: 0 },
    )
}
