//! 比赛命令：打开串口与手柄，运行控制回路直到 Ctrl+C

use crate::commands::config::load_config;
use crate::feedback::spawn_printer;
use crate::joystick::{Bindings, spawn_reader};
use crate::serial::{RoombaModel, open_serial};
use anyhow::{Context, Result};
use clap::Args;
use kart_control::{ControlLoop, KartConfig, selector_from_config};
use kart_driver::{StreamTransport, shared_controller};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// 比赛命令参数
#[derive(Args, Debug)]
pub struct RaceCommand {
    /// 串口设备（如 /dev/ttyUSB0）
    #[arg(short, long)]
    pub port: PathBuf,

    /// 机器人型号
    #[arg(short, long, value_enum, default_value_t = RoombaModel::Create2)]
    pub model: RoombaModel,

    /// 关闭碰撞后的 wobble
    #[arg(long)]
    pub no_wobble: bool,

    /// 手柄设备
    #[arg(short, long, default_value = "/dev/input/js0")]
    pub joystick: PathBuf,

    /// 配置文件（覆盖默认路径）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 控制频率（Hz，覆盖配置）
    #[arg(long)]
    pub tick_rate: Option<f64>,

    /// 道具随机种子（覆盖配置）
    #[arg(long)]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub bindings: Bindings,
}

impl RaceCommand {
    /// 合并配置文件与命令行覆盖项
    pub fn effective_config(&self) -> Result<KartConfig> {
        let mut config = load_config(self.config.as_deref())?;
        if self.no_wobble {
            config.recovery.enabled = false;
        }
        if let Some(rate) = self.tick_rate {
            config.control.tick_rate_hz = rate;
        }
        if let Some(seed) = self.seed {
            config.items.seed = Some(seed);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn execute(&self, shutdown: Arc<AtomicBool>) -> Result<()> {
        let config = self.effective_config()?;
        println!(
            "{}",
            if config.recovery.enabled {
                "Wobble Enabled"
            } else {
                "Wobble Disabled"
            }
        );

        let serial = open_serial(&self.port, self.model)?;
        let transport = StreamTransport::new(serial);

        let (publisher, controller) = shared_controller();
        let joystick = spawn_reader(
            self.joystick.clone(),
            self.bindings.clone(),
            publisher,
            shutdown.clone(),
        )
        .context("Failed to start joystick thread")?;

        let (feedback, printer) = spawn_printer().context("Failed to start feedback thread")?;
        let selector = selector_from_config(&config.items);

        let mut kart = ControlLoop::new(&config, transport, controller, selector, feedback)?;
        kart.start_session()?;
        println!("🏁 Ready! Press Ctrl+C to exit.");
        let result = kart.run(&shutdown);

        // 停止手柄线程，关闭事件通道
        shutdown.store(true, Ordering::Relaxed);
        drop(kart);
        if joystick.join().is_err() {
            warn!("Joystick thread panicked");
        }
        if printer.join().is_err() {
            warn!("Feedback thread panicked");
        }

        let metrics = result?;
        println!(
            "\nExiting... {} ticks, {:.1}% sensor underruns, {} overruns",
            metrics.ticks,
            metrics.underrun_rate(),
            metrics.overruns
        );
        Ok(())
    }
}
