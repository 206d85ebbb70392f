//! 传感器数据包定义
//!
//! 控制回路只使用 Packet 7（Bumps and Wheel Drops，1 字节）。

use crate::{ProtocolError, opcodes::Opcode};
use bilge::prelude::*;

/// 传感器数据包 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SensorPacketId {
    /// 碰撞与轮落（1 字节）
    BumpsAndWheelDrops = 7,
}

impl SensorPacketId {
    /// 数据包长度（字节）
    pub fn data_len(self) -> usize {
        match self {
            SensorPacketId::BumpsAndWheelDrops => 1,
        }
    }

    /// 请求该数据包的指令：`[142, packet_id]`
    pub fn request(self) -> [u8; 2] {
        [Opcode::Sensors.as_u8(), self as u8]
    }
}

/// 碰撞与轮落位域（Packet 7）
///
/// 协议定义（单字节，LSB first）：
/// - Bit 0: 右侧碰撞
/// - Bit 1: 左侧碰撞
/// - Bit 2: 右轮落
/// - Bit 3: 左轮落
/// - Bit 4: 万向轮落（仅 Create 1）
/// - Bit 5-7: 保留
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default, PartialEq, Eq)]
pub struct BumpsAndWheelDrops {
    pub bump_right: bool,        // Bit 0: 右侧碰撞
    pub bump_left: bool,         // Bit 1: 左侧碰撞
    pub wheel_drop_right: bool,  // Bit 2: 右轮落
    pub wheel_drop_left: bool,   // Bit 3: 左轮落
    pub wheel_drop_caster: bool, // Bit 4: 万向轮落
    pub reserved: u3,            // Bit 5-7: 保留
}

impl BumpsAndWheelDrops {
    /// 从原始字节解析
    pub fn from_byte(byte: u8) -> Self {
        Self::from(u8::new(byte))
    }

    /// 编码为原始字节
    pub fn to_byte(self) -> u8 {
        u8::from(self).value()
    }

    /// 任一侧碰撞
    pub fn any_bump(&self) -> bool {
        self.bump_left() || self.bump_right()
    }
}

impl TryFrom<&[u8]> for BumpsAndWheelDrops {
    type Error = ProtocolError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let expected = SensorPacketId::BumpsAndWheelDrops.data_len();
        if bytes.len() != expected {
            return Err(ProtocolError::InvalidLength {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self::from_byte(bytes[0]))
    }
}
