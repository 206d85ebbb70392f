//! 控制回路运行指标
//!
//! 原子计数器，控制回路线程写入，其他线程（如状态打印）可随时读取快照。

use std::sync::atomic::{AtomicU64, Ordering};

/// 控制回路指标
#[derive(Debug, Default)]
pub struct LoopMetrics {
    /// 已完成的 tick 数
    pub ticks: AtomicU64,
    /// 传感器欠载次数（本 tick 复用了上一次的电平）
    pub sensor_underruns: AtomicU64,
    /// 手柄无新数据的 tick 数
    pub controller_gaps: AtomicU64,
    /// 驱动指令发送失败次数
    pub send_failures: AtomicU64,
    /// tick 超出标称周期的次数
    pub overruns: AtomicU64,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 读取所有计数器
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            sensor_underruns: self.sensor_underruns.load(Ordering::Relaxed),
            controller_gaps: self.controller_gaps.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.sensor_underruns.store(0, Ordering::Relaxed);
        self.controller_gaps.store(0, Ordering::Relaxed);
        self.send_failures.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub sensor_underruns: u64,
    pub controller_gaps: u64,
    pub send_failures: u64,
    pub overruns: u64,
}

impl MetricsSnapshot {
    /// 欠载率（百分比），没有 tick 时返回 0.0
    pub fn underrun_rate(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        (self.sensor_underruns as f64 / self.ticks as f64) * 100.0
    }
}
