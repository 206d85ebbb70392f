//! # Kart Protocol
//!
//! iRobot Create Open Interface（OI）协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `opcodes`: 指令操作码与模式切换指令
//! - `drive`: Drive 指令（137）的构建与编码
//! - `sensors`: 传感器数据包（Packet 7：碰撞与轮落）解析
//!
//! ## 字节序
//!
//! OI 的多字节参数均为高位在前（大端字节序），
//! 本模块提供了字节序转换工具函数。

pub mod drive;
pub mod opcodes;
pub mod sensors;

// 重新导出常用类型
pub use drive::*;
pub use opcodes::*;
pub use sensors::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid packet length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid opcode: {0}")]
    InvalidOpcode(u8),

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: &'static str, value: i32 },
}

/// 大端字节序转 i16
pub fn bytes_to_i16_be(bytes: [u8; 2]) -> i16 {
    i16::from_be_bytes(bytes)
}

/// i16 转大端字节序
pub fn i16_to_bytes_be(value: i16) -> [u8; 2] {
    value.to_be_bytes()
}
