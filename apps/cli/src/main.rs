//! # Roomba Kart
//!
//! 用手柄驾驶 iRobot Create 1/2，轮落（减速带）获得道具，碰撞触发 wobble。
//!
//! ```bash
//! # 写入默认配置（~/.config/roomba-kart/config.toml）
//! roomba-kart config init
//!
//! # 开始比赛
//! roomba-kart race --port /dev/ttyUSB0 --model create2
//!
//! # 关闭 wobble，DualShock 手柄（L2 为轴 4）
//! roomba-kart race --port /dev/ttyUSB0 --no-wobble --backward-axis 4
//!
//! # 手动停车
//! roomba-kart stop --port /dev/ttyUSB0
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod feedback;
mod joystick;
mod serial;

use commands::{ConfigCommand, RaceCommand, StopCommand};

/// Roomba Kart - 手柄驾驶 Roomba
#[derive(Parser, Debug)]
#[command(name = "roomba-kart")]
#[command(about = "Drive an iRobot Create like a kart with a gamepad", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 开始比赛
    Race {
        #[command(flatten)]
        args: RaceCommand,
    },

    /// 停车
    Stop {
        #[command(flatten)]
        args: StopCommand,
    },

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("roomba_kart=info".parse()?)
                .add_directive("kart_control=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Race { args } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || {
                flag.store(true, Ordering::Relaxed);
            })
            .context("Failed to install Ctrl+C handler")?;
            args.execute(shutdown)
        },

        Commands::Stop { args } => args.execute(),

        Commands::Config(cmd) => cmd.execute(),
    }
}
