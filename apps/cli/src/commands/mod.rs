//! 命令模块

pub mod config;
pub mod race;
pub mod stop;

pub use config::ConfigCommand;
pub use race::RaceCommand;
pub use stop::StopCommand;
