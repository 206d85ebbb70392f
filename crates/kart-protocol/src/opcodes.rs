//! 操作码定义
//!
//! 只收录控制回路实际使用的 OI 指令。参考 iRobot Create Open Interface
//! 手册第 "Open Interface Command Reference" 节。

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// OI 指令操作码
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    /// 启动 OI，进入 Passive 模式
    Start = 128,
    /// 进入 Safe 模式
    Safe = 131,
    /// 进入 Full 模式（关闭轮落/悬崖保护）
    Full = 132,
    /// 差速驱动（速度 + 转弯半径）
    Drive = 137,
    /// 请求单个传感器数据包
    Sensors = 142,
}

impl Opcode {
    /// 转换为 u8
    pub fn as_u8(self) -> u8 {
        self.into()
    }
}

/// OI 工作模式
///
/// 控制回路需要 Full 模式：Safe 模式下轮落会把机器人打回 Passive，
/// 而轮落正是道具箱（减速带）的触发信号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OiMode {
    Passive,
    Safe,
    #[default]
    Full,
}

/// 构建会话启动指令序列（Start + 目标模式）
///
/// 发送后 OI 需要一段稳定时间（原厂建议约 1 秒）才能接收驱动指令。
pub fn session_start(mode: OiMode) -> Vec<u8> {
    let mut bytes = vec![Opcode::Start.as_u8()];
    match mode {
        OiMode::Passive => {},
        OiMode::Safe => bytes.push(Opcode::Safe.as_u8()),
        OiMode::Full => bytes.push(Opcode::Full.as_u8()),
    }
    bytes
}
