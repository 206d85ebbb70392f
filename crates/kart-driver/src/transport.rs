//! 传输层抽象
//!
//! 控制回路只依赖两个能力：发送原始字节、在有限时间内取回一个传感器数据包。
//! 串口打开与配置（波特率、termios）由上层负责。

use crate::error::TransportError;
use kart_protocol::SensorPacketId;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::trace;

/// 原始传感器数据包（Packet 7，1 字节）
pub type RawSensorPacket = [u8; 1];

/// 传输层接口
pub trait Transport {
    /// 发送原始字节
    ///
    /// 失败必须返回错误，由控制回路决定停机或继续，传输层内部不重试。
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// 在 `timeout` 内取回下一个传感器数据包
    ///
    /// - `Ok(Some(packet))`: 收到完整数据包
    /// - `Ok(None)`: 超时内无数据
    fn receive_sensor_packet(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<RawSensorPacket>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send(bytes)
    }

    fn receive_sensor_packet(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<RawSensorPacket>, TransportError> {
        (**self).receive_sensor_packet(timeout)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send(bytes)
    }

    fn receive_sensor_packet(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<RawSensorPacket>, TransportError> {
        (**self).receive_sensor_packet(timeout)
    }
}

/// 单次 drain 最多读取的次数，防止持续有数据时卡住
const MAX_DRAIN_READS: usize = 64;

/// 基于字节流的传输实现（串口设备文件、socket 等）
///
/// 传感器数据采用"请求-应答"方式：先发送 `[142, 7]`，再在超时内读取 1 字节。
///
/// **注意**：底层流必须是非阻塞读（termios `VMIN = 0, VTIME = 0` 或 `O_NONBLOCK`），
/// 否则读取可能无限阻塞，违反每个 tick 的时间预算。
pub struct StreamTransport<S> {
    stream: S,
    /// 等待应答时的轮询间隔
    poll_interval: Duration,
}

impl<S: Read + Write> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            poll_interval: Duration::from_micros(500),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// 丢弃上一次超时后迟到的应答，避免错位
    fn drain(&mut self) -> Result<usize, TransportError> {
        let mut scratch = [0u8; 16];
        let mut discarded = 0;
        for _ in 0..MAX_DRAIN_READS {
            match self.stream.read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => discarded += n,
                Err(e) if is_would_block(e.kind()) => break,
                Err(e) => return Err(e.into()),
            }
        }
        if discarded > 0 {
            trace!("Discarded {} stale sensor bytes", discarded);
        }
        Ok(discarded)
    }
}

fn is_would_block(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    fn receive_sensor_packet(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<RawSensorPacket>, TransportError> {
        self.drain()?;
        self.send(&SensorPacketId::BumpsAndWheelDrops.request())?;

        let deadline = Instant::now() + timeout;
        let mut packet: RawSensorPacket = [0u8; 1];
        let mut filled = 0;

        loop {
            match self.stream.read(&mut packet[filled..]) {
                Ok(0) => {},
                Ok(n) => {
                    filled += n;
                    if filled == packet.len() {
                        return Ok(Some(packet));
                    }
                },
                Err(e) if is_would_block(e.kind()) => {},
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            spin_sleep::sleep(self.poll_interval);
        }
    }
}
