//! Drive 指令（Opcode 137）
//!
//! 线路格式：`[137, vel_hi, vel_lo, rad_hi, rad_lo]`，两个参数均为有符号 16 位大端整数。
//!
//! - 速度：-500 ~ 500 mm/s，正值前进
//! - 转弯半径：-2000 ~ 2000 mm，正值左转
//! - 特殊半径：`0x8000`/`0x7FFF` 直行，`0xFFFF`（-1）原地顺时针，`0x0001` 原地逆时针

use crate::{ProtocolError, bytes_to_i16_be, i16_to_bytes_be, opcodes::Opcode};

/// 最大速度（mm/s）
pub const VELOCITY_MAX_MM_S: i16 = 500;

/// 最小速度（mm/s）
pub const VELOCITY_MIN_MM_S: i16 = -500;

/// 最大转弯半径（mm）
pub const RADIUS_MAX_MM: i16 = 2000;

/// 最小有效弧线半径（mm）
///
/// ±1 被协议保留为原地旋转，因此弧线半径的绝对值至少为 2。
pub const RADIUS_MIN_ARC_MM: i16 = 2;

/// 直行的特殊半径值
pub const RADIUS_STRAIGHT_RAW: u16 = 0x8000;

/// 直行的另一种编码（部分固件使用）
pub const RADIUS_STRAIGHT_ALT_RAW: u16 = 0x7FFF;

/// Drive 指令总长度（opcode + 4 字节参数）
pub const DRIVE_COMMAND_LEN: usize = 5;

/// 转弯半径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TurnRadius {
    /// 直行（`0x8000`）
    #[default]
    Straight,
    /// 原地顺时针旋转（-1）
    SpinClockwise,
    /// 原地逆时针旋转（+1）
    SpinCounterClockwise,
    /// 弧线（mm），正值左转，负值右转
    Arc(i16),
}

impl TurnRadius {
    /// 构建弧线半径，绝对值钳位到 `RADIUS_MIN_ARC_MM..=RADIUS_MAX_MM`
    ///
    /// 0 被视为最小左转半径。
    pub fn arc_clamped(radius_mm: i32) -> Self {
        let magnitude = radius_mm
            .unsigned_abs()
            .clamp(RADIUS_MIN_ARC_MM as u32, RADIUS_MAX_MM as u32) as i16;
        if radius_mm < 0 {
            TurnRadius::Arc(-magnitude)
        } else {
            TurnRadius::Arc(magnitude)
        }
    }

    /// 是否在协议允许范围内
    pub fn is_valid(self) -> bool {
        match self {
            TurnRadius::Arc(r) => (RADIUS_MIN_ARC_MM..=RADIUS_MAX_MM).contains(&r.saturating_abs()),
            _ => true,
        }
    }

    /// 转换为线路上的 i16
    pub fn to_raw(self) -> i16 {
        match self {
            TurnRadius::Straight => RADIUS_STRAIGHT_RAW as i16,
            TurnRadius::SpinClockwise => -1,
            TurnRadius::SpinCounterClockwise => 1,
            TurnRadius::Arc(r) => r,
        }
    }

    /// 从线路上的 i16 解析
    pub fn from_raw(raw: i16) -> Result<Self, ProtocolError> {
        let radius = match raw as u16 {
            RADIUS_STRAIGHT_RAW | RADIUS_STRAIGHT_ALT_RAW => TurnRadius::Straight,
            0xFFFF => TurnRadius::SpinClockwise,
            0x0001 => TurnRadius::SpinCounterClockwise,
            _ => TurnRadius::Arc(raw),
        };
        if !radius.is_valid() {
            return Err(ProtocolError::InvalidValue {
                field: "radius",
                value: raw as i32,
            });
        }
        Ok(radius)
    }
}

/// 差速驱动指令
///
/// 由指令合成器每个 tick 新建一次，构建后不再修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriveCommand {
    /// 速度（mm/s），正值前进
    pub velocity_mm_s: i16,
    /// 转弯半径
    pub radius: TurnRadius,
}

impl DriveCommand {
    /// 停车指令（速度 0，直行）
    pub const STOP: Self = Self {
        velocity_mm_s: 0,
        radius: TurnRadius::Straight,
    };

    /// 创建指令，越界返回错误
    pub fn new(velocity_mm_s: i16, radius: TurnRadius) -> Result<Self, ProtocolError> {
        let cmd = Self {
            velocity_mm_s,
            radius,
        };
        if !(VELOCITY_MIN_MM_S..=VELOCITY_MAX_MM_S).contains(&velocity_mm_s) {
            return Err(ProtocolError::InvalidValue {
                field: "velocity",
                value: velocity_mm_s as i32,
            });
        }
        if !radius.is_valid() {
            return Err(ProtocolError::InvalidValue {
                field: "radius",
                value: radius.to_raw() as i32,
            });
        }
        Ok(cmd)
    }

    /// 创建指令，速度与半径钳位到协议范围
    pub fn clamped(velocity_mm_s: i32, radius: TurnRadius) -> Self {
        let velocity_mm_s =
            velocity_mm_s.clamp(VELOCITY_MIN_MM_S as i32, VELOCITY_MAX_MM_S as i32) as i16;
        let radius = match radius {
            TurnRadius::Arc(r) => TurnRadius::arc_clamped(r as i32),
            other => other,
        };
        Self {
            velocity_mm_s,
            radius,
        }
    }

    /// 直行指令（速度钳位）
    pub fn straight(velocity_mm_s: i32) -> Self {
        Self::clamped(velocity_mm_s, TurnRadius::Straight)
    }

    /// 是否在协议允许范围内
    pub fn is_within_limits(&self) -> bool {
        (VELOCITY_MIN_MM_S..=VELOCITY_MAX_MM_S).contains(&self.velocity_mm_s)
            && self.radius.is_valid()
    }

    /// 编码为线路字节
    ///
    /// # Panics
    ///
    /// 越界指令说明上游钳位逻辑有缺陷，直接 panic。
    pub fn to_bytes(self) -> [u8; DRIVE_COMMAND_LEN] {
        assert!(
            self.is_within_limits(),
            "drive command out of range: {:?}",
            self
        );
        let vel = i16_to_bytes_be(self.velocity_mm_s);
        let rad = i16_to_bytes_be(self.radius.to_raw());
        [Opcode::Drive.as_u8(), vel[0], vel[1], rad[0], rad[1]]
    }
}

impl TryFrom<&[u8]> for DriveCommand {
    type Error = ProtocolError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != DRIVE_COMMAND_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: DRIVE_COMMAND_LEN,
                actual: bytes.len(),
            });
        }
        if bytes[0] != Opcode::Drive.as_u8() {
            return Err(ProtocolError::InvalidOpcode(bytes[0]));
        }
        let velocity_mm_s = bytes_to_i16_be([bytes[1], bytes[2]]);
        let radius = TurnRadius::from_raw(bytes_to_i16_be([bytes[3], bytes[4]]))?;
        Self::new(velocity_mm_s, radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_straight_200() {
        let cmd = DriveCommand::new(200, TurnRadius::Straight).unwrap();
        assert_eq!(cmd.to_bytes(), [137, 0x00, 0xC8, 0x80, 0x00]);
    }

    #[test]
    fn test_encode_stop() {
        assert_eq!(DriveCommand::STOP.to_bytes(), [137, 0, 0, 0x80, 0x00]);
    }

    #[test]
    fn test_encode_wobble_swings() {
        // 倒车 80 mm/s，左右交替 50/-51 mm
        let left = DriveCommand::new(-80, TurnRadius::Arc(50)).unwrap();
        assert_eq!(left.to_bytes(), [137, 255, 176, 0, 50]);

        let right = DriveCommand::new(-80, TurnRadius::Arc(-51)).unwrap();
        assert_eq!(right.to_bytes(), [137, 255, 176, 255, 205]);
    }

    #[test]
    fn test_encode_spin() {
        let cw = DriveCommand::new(100, TurnRadius::SpinClockwise).unwrap();
        assert_eq!(cw.to_bytes(), [137, 0x00, 0x64, 0xFF, 0xFF]);

        let ccw = DriveCommand::new(100, TurnRadius::SpinCounterClockwise).unwrap();
        assert_eq!(ccw.to_bytes(), [137, 0x00, 0x64, 0x00, 0x01]);
    }

    #[test]
    fn test_encode_limits() {
        let cmd = DriveCommand::new(-500, TurnRadius::Arc(-2000)).unwrap();
        assert_eq!(cmd.to_bytes(), [137, 0xFE, 0x0C, 0xF8, 0x30]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_encode_out_of_range_panics() {
        let cmd = DriveCommand {
            velocity_mm_s: 501,
            radius: TurnRadius::Straight,
        };
        let _ = cmd.to_bytes();
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(DriveCommand::new(600, TurnRadius::Straight).is_err());
        assert!(DriveCommand::new(0, TurnRadius::Arc(2001)).is_err());
        assert!(DriveCommand::new(0, TurnRadius::Arc(0)).is_err());
        assert!(DriveCommand::new(0, TurnRadius::Arc(1)).is_err());
    }

    #[test]
    fn test_clamped() {
        let cmd = DriveCommand::clamped(9000, TurnRadius::Arc(i16::MIN));
        assert_eq!(cmd.velocity_mm_s, 500);
        assert_eq!(cmd.radius, TurnRadius::Arc(-2000));

        let cmd = DriveCommand::clamped(-9000, TurnRadius::Arc(0));
        assert_eq!(cmd.velocity_mm_s, -500);
        assert_eq!(cmd.radius, TurnRadius::Arc(RADIUS_MIN_ARC_MM));
        assert!(cmd.is_within_limits());
    }

    #[test]
    fn test_radius_from_raw_specials() {
        assert_eq!(TurnRadius::from_raw(0x8000u16 as i16).unwrap(), TurnRadius::Straight);
        assert_eq!(TurnRadius::from_raw(0x7FFF).unwrap(), TurnRadius::Straight);
        assert_eq!(TurnRadius::from_raw(-1).unwrap(), TurnRadius::SpinClockwise);
        assert_eq!(TurnRadius::from_raw(1).unwrap(), TurnRadius::SpinCounterClockwise);
        assert_eq!(TurnRadius::from_raw(-1700).unwrap(), TurnRadius::Arc(-1700));
        assert!(TurnRadius::from_raw(0).is_err());
        assert!(TurnRadius::from_raw(3000).is_err());
    }

    #[test]
    fn test_decode_drive_bytes() {
        let cmd = DriveCommand::try_from(&[137u8, 0x01, 0x2C, 0x80, 0x00][..]).unwrap();
        assert_eq!(cmd.velocity_mm_s, 300);
        assert_eq!(cmd.radius, TurnRadius::Straight);

        assert!(matches!(
            DriveCommand::try_from(&[142u8, 0, 0, 0, 0][..]),
            Err(ProtocolError::InvalidOpcode(142))
        ));
        assert!(matches!(
            DriveCommand::try_from(&[137u8, 0, 0][..]),
            Err(ProtocolError::InvalidLength { expected: 5, actual: 3 })
        ));
    }

    proptest! {
        /// 任意输入经 `clamped` 后都能编码，且解码出同样的指令
        #[test]
        fn prop_clamped_always_encodes(velocity: i32, radius: i32) {
            let cmd = DriveCommand::clamped(velocity, TurnRadius::arc_clamped(radius));
            prop_assert!(cmd.is_within_limits());
            let bytes = cmd.to_bytes();
            prop_assert_eq!(DriveCommand::try_from(&bytes[..]).unwrap(), cmd);
        }
    }
}
