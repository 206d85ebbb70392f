//! 控制层错误类型

use crate::config::ConfigError;
use kart_driver::TransportError;
use thiserror::Error;

/// 控制回路错误
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 发送失败且策略为停机
    #[error("Control loop halted at tick {tick}: {source}")]
    Halted {
        tick: u64,
        #[source]
        source: TransportError,
    },
}
