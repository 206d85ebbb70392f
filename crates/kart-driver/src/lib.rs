//! # Kart Driver
//!
//! 控制核心与外部协作方之间的 IO 边界：
//! - 传输层接口（串口字节流）与请求-应答式的传感器读取
//! - 传感器快照读取器（上升沿检测、欠载降级）
//! - 手柄接口与跨线程的无锁采样交接
//! - Mock 传输层/手柄（`mock` feature）

pub mod controller;
mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod snapshot;
pub mod transport;

pub use controller::{
    ControllerPoll, ControllerPublisher, ControllerSource, RawControllerState, SharedController,
    shared_controller,
};
pub use error::TransportError;
pub use snapshot::{BumpSide, SensorLevels, SensorReader, SensorSnapshot};
pub use transport::{RawSensorPacket, StreamTransport, Transport};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockTransport, ScriptedController};
