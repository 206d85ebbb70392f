//! 串口打开与配置
//!
//! 8N1、raw 模式、`VMIN = 0 / VTIME = 0`：读取立即返回（可能为 0 字节），
//! 保证传感器读取不会超出每个 tick 的时间预算。

use anyhow::{Context, Result};
use clap::ValueEnum;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::sys::termios::{
    BaudRate, ControlFlags, FlushArg, SetArg, SpecialCharacterIndices, cfmakeraw, cfsetspeed,
    tcflush, tcgetattr, tcsetattr,
};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tracing::info;

/// 机器人型号（决定波特率）
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoombaModel {
    /// iRobot Create 1（57600 baud）
    Create1,
    /// iRobot Create 2 / Roomba 600 系列（115200 baud）
    Create2,
}

impl RoombaModel {
    pub fn baud(self) -> u32 {
        match self {
            RoombaModel::Create1 => 57_600,
            RoombaModel::Create2 => 115_200,
        }
    }

    fn baud_rate(self) -> BaudRate {
        match self {
            RoombaModel::Create1 => BaudRate::B57600,
            RoombaModel::Create2 => BaudRate::B115200,
        }
    }
}

/// 打开并配置串口
pub fn open_serial(port: &Path, model: RoombaModel) -> Result<File> {
    // O_NONBLOCK 避免在 CLOCAL 生效前等待载波
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags((OFlag::O_NOCTTY | OFlag::O_NONBLOCK).bits())
        .open(port)
        .with_context(|| format!("Failed to open serial port {}", port.display()))?;

    let mut termios = tcgetattr(&file).context("tcgetattr failed")?;
    cfmakeraw(&mut termios);
    cfsetspeed(&mut termios, model.baud_rate()).context("cfsetspeed failed")?;
    termios.control_flags |= ControlFlags::CLOCAL | ControlFlags::CREAD;
    termios.control_flags.remove(ControlFlags::CSTOPB);
    termios.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    termios.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
    tcsetattr(&file, SetArg::TCSANOW, &termios).context("tcsetattr failed")?;
    tcflush(&file, FlushArg::TCIOFLUSH).context("tcflush failed")?;

    // 配置完成后恢复阻塞写；读取由 VMIN/VTIME 保证不阻塞
    fcntl(&file, FcntlArg::F_SETFL(OFlag::empty())).context("fcntl(F_SETFL) failed")?;

    info!(
        port = %port.display(),
        baud = model.baud(),
        "Serial port configured"
    );
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_baud() {
        assert_eq!(RoombaModel::Create1.baud(), 57_600);
        assert_eq!(RoombaModel::Create2.baud(), 115_200);
    }

    #[test]
    fn test_open_missing_port_fails() {
        let err = open_serial(Path::new("/nonexistent/ttyUSB9"), RoombaModel::Create2)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("ttyUSB9"));
    }

    #[test]
    fn test_regular_file_is_not_a_tty() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(open_serial(file.path(), RoombaModel::Create1).is_err());
    }
}
