//! 停车命令
//!
//! 控制回路异常退出后机器人可能仍在执行最后一条指令，用于手动停车。

use crate::serial::{RoombaModel, open_serial};
use anyhow::Result;
use clap::Args;
use kart_driver::{StreamTransport, Transport};
use kart_protocol::{DriveCommand, OiMode, session_start};
use std::path::PathBuf;

/// 停车命令参数
#[derive(Args, Debug)]
pub struct StopCommand {
    /// 串口设备
    #[arg(short, long)]
    pub port: PathBuf,

    /// 机器人型号
    #[arg(short, long, value_enum, default_value_t = RoombaModel::Create2)]
    pub model: RoombaModel,
}

impl StopCommand {
    pub fn execute(&self) -> Result<()> {
        let serial = open_serial(&self.port, self.model)?;
        let mut transport = StreamTransport::new(serial);
        send_stop(&mut transport)?;
        println!("🛑 Stop command sent");
        Ok(())
    }
}

/// 进入 Full 模式并停车
fn send_stop<T: Transport>(transport: &mut T) -> Result<()> {
    transport.send(&session_start(OiMode::Full))?;
    transport.send(&DriveCommand::STOP.to_bytes())?;
    Ok(())
}
