//! 传输层错误类型定义

use thiserror::Error;

/// 传输层错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    /// 串口 IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 传输已关闭（设备拔出）
    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    /// 是否为瞬时错误（超时、中断、暂无数据）
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
