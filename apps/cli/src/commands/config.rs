//! 配置管理命令
//!
//! 默认配置文件：`<config_dir>/roomba-kart/config.toml`（Linux 上为 `~/.config/roomba-kart/config.toml`）

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use kart_control::KartConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// 带注释的默认配置
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Roomba Kart configuration

[control]
# 控制频率（Hz）
tick_rate_hz = 50.0
# 每个 tick 等待传感器/手柄的上限（毫秒），两者之和必须小于 tick 周期
sensor_timeout_ms = 8
controller_timeout_ms = 2
# 进入 Full 模式后的等待（毫秒）
settle_ms = 1000
# 发送失败："halt" 停机，"continue" 继续
on_send_error = "halt"

[recovery]
# 碰撞后倒车摆动（wobble）
enabled = true
duration_ticks = 60
velocity_mm_s = -80
radius_mm = 50
# 不超过 duration_ticks
shuffles = 3

[drive]
max_velocity_mm_s = 300
max_radius_mm = 1700

[items]
# "random" | "speed_boost" | "invincibility"
selection = "random"
speed_boost_velocity_mm_s = 500
speed_boost_ticks = 75
invincibility_velocity_mm_s = 425
invincibility_ticks = 300

[input]
dead_zone = 0.07
trigger_threshold = 0.07
"#;

/// 配置目录
fn config_dir() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("Cannot determine config directory")?;
    path.push("roomba-kart");
    Ok(path)
}

/// 默认配置文件路径
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// 加载配置
///
/// - 指定了路径：文件必须存在
/// - 未指定：默认路径存在则加载，否则使用内置默认值
pub fn load_config(explicit: Option<&Path>) -> Result<KartConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = default_config_path()?;
            if !path.exists() {
                tracing::debug!("No config file at {}, using defaults", path.display());
                return Ok(KartConfig::default());
            }
            path
        },
    };
    let config = KartConfig::load(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 打印默认配置文件路径
    Path,

    /// 打印生效的配置
    Show {
        /// 配置文件（默认使用默认路径）
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 在默认路径写入带注释的默认配置
    Init {
        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },

    /// 校验配置文件
    Check {
        /// 配置文件
        file: PathBuf,
    },
}

impl ConfigCommand {
    pub fn execute(&self) -> Result<()> {
        match self {
            ConfigCommand::Path => {
                println!("{}", default_config_path()?.display());
            },
            ConfigCommand::Show { config } => {
                let config = load_config(config.as_deref())?;
                println!("{:#?}", config);
            },
            ConfigCommand::Init { force } => {
                let path = default_config_path()?;
                write_template(&path, *force)?;
                println!("✅ Wrote {}", path.display());
            },
            ConfigCommand::Check { file } => {
                KartConfig::load(file)
                    .with_context(|| format!("Invalid config {}", file.display()))?;
                println!("✅ {} is valid", file.display());
            },
        }
        Ok(())
    }
}

fn write_template(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    fs::write(path, DEFAULT_CONFIG_TEMPLATE).context("Failed to write config file")?;
    Ok(())
}
