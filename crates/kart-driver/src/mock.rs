//! Mock 传输层与手柄（无硬件测试用）
//!
//! `MockTransport` 内部状态用 `Arc<Mutex<..>>` 共享，克隆出的句柄可以在测试中
//! 注入传感器数据包、注入发送失败，并检查控制回路发出的字节。

use crate::controller::{ControllerPoll, ControllerSource};
use crate::error::TransportError;
use crate::transport::{RawSensorPacket, Transport};
use kart_protocol::{DRIVE_COMMAND_LEN, DriveCommand, Opcode};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug)]
struct MockTransportInner {
    /// 待交付的数据包，`None` 表示该次读取欠载
    packets: VecDeque<Option<u8>>,
    /// 队列为空时交付的稳态数据包
    idle_packet: Option<u8>,
    sent: Vec<Vec<u8>>,
    fail_sends: usize,
    closed: bool,
}

/// Mock 传输层
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// 创建 Mock，空队列时交付"无碰撞、无轮落"
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockTransportInner {
                packets: VecDeque::new(),
                idle_packet: Some(0),
                sent: Vec::new(),
                fail_sends: 0,
                closed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        // 测试代码：锁中毒说明另一个测试线程已经 panic
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 排队一个数据包
    pub fn push_packet(&self, byte: u8) {
        self.lock().packets.push_back(Some(byte));
    }

    /// 排队一次欠载
    pub fn push_underrun(&self) {
        self.lock().packets.push_back(None);
    }

    /// 设置队列为空时的稳态数据包（`None` 表示持续欠载）
    pub fn set_idle_packet(&self, byte: Option<u8>) {
        self.lock().idle_packet = byte;
    }

    /// 接下来 `n` 次发送失败
    pub fn fail_next_sends(&self, n: usize) {
        self.lock().fail_sends = n;
    }

    /// 模拟设备拔出
    pub fn close(&self) {
        self.lock().closed = true;
    }

    /// 所有已发送的字节块
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// 已发送的 Drive 指令（解码后）
    pub fn sent_drive_commands(&self) -> Vec<DriveCommand> {
        self.lock()
            .sent
            .iter()
            .filter(|bytes| bytes.len() == DRIVE_COMMAND_LEN && bytes[0] == Opcode::Drive.as_u8())
            .filter_map(|bytes| DriveCommand::try_from(bytes.as_slice()).ok())
            .collect()
    }

    /// 最后一条发送的 Drive 指令
    pub fn last_drive_command(&self) -> Option<DriveCommand> {
        self.sent_drive_commands().last().copied()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(TransportError::Closed);
        }
        if inner.fail_sends > 0 {
            inner.fail_sends -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected send failure").into());
        }
        inner.sent.push(bytes.to_vec());
        Ok(())
    }

    fn receive_sensor_packet(
        &mut self,
        _timeout: Duration,
    ) -> Result<Option<RawSensorPacket>, TransportError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(TransportError::Closed);
        }
        let next = match inner.packets.pop_front() {
            Some(entry) => entry,
            None => inner.idle_packet,
        };
        Ok(next.map(|byte| [byte]))
    }
}

/// 脚本化手柄
///
/// 按顺序交付预先排好的轮询结果，耗尽后返回 `NoData`。
#[derive(Debug, Clone, Default)]
pub struct ScriptedController {
    script: VecDeque<ControllerPoll>,
}

impl ScriptedController {
    pub fn new(script: impl IntoIterator<Item = ControllerPoll>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    pub fn push(&mut self, poll: ControllerPoll) {
        self.script.push_back(poll);
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl ControllerSource for ScriptedController {
    fn poll(&mut self, _timeout: Duration) -> ControllerPoll {
        self.script.pop_front().unwrap_or(ControllerPoll::NoData)
    }
}
