//! # 启动配置
//!
//! 配置在控制回路构建之前加载并校验，非法配置直接拒绝启动。
//!
//! ```toml
//! [control]
//! tick_rate_hz = 50.0
//! on_send_error = "halt"
//!
//! [recovery]
//! enabled = true
//! duration_ticks = 60
//!
//! [items]
//! selection = "random"
//! seed = 42
//! ```
//!
//! 所有字段都有默认值，空文件即默认配置。

use kart_protocol::{RADIUS_MAX_MM, RADIUS_MIN_ARC_MM, VELOCITY_MAX_MM_S};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// 发送失败后的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendFailurePolicy {
    /// 停机（默认）
    #[default]
    Halt,
    /// 记录后继续下一个 tick（不重发本 tick 的字节）
    Continue,
}

/// 道具选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemPolicy {
    /// 均匀随机
    #[default]
    Random,
    /// 固定为加速蘑菇
    SpeedBoost,
    /// 固定为无敌星
    Invincibility,
}

/// 控制回路配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    /// 控制频率（Hz）
    pub tick_rate_hz: f64,
    /// 每个 tick 等待传感器数据包的上限（毫秒）
    pub sensor_timeout_ms: u64,
    /// 每个 tick 等待手柄的上限（毫秒）
    pub controller_timeout_ms: u64,
    /// 进入 Full 模式后的稳定等待（毫秒）
    pub settle_ms: u64,
    /// 发送失败策略
    pub on_send_error: SendFailurePolicy,
    /// 最大 tick 数（None 表示运行到外部终止信号）
    pub max_ticks: Option<u64>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 50.0,
            sensor_timeout_ms: 8,
            controller_timeout_ms: 2,
            settle_ms: 1000,
            on_send_error: SendFailurePolicy::Halt,
            max_ticks: None,
        }
    }
}

impl ControlConfig {
    /// 标称 tick 周期
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_timeout_ms)
    }

    pub fn controller_timeout(&self) -> Duration {
        Duration::from_millis(self.controller_timeout_ms)
    }
}

/// 碰撞恢复（wobble）配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoveryConfig {
    /// 是否启用（启动时确定，运行期间只读）
    pub enabled: bool,
    /// 持续 tick 数 K
    pub duration_ticks: u32,
    /// 倒车速度（mm/s，必须为负）
    pub velocity_mm_s: i16,
    /// 摆动半径（mm）
    pub radius_mm: i16,
    /// 左右摆动次数，0 表示单向
    pub shuffles: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ticks: 60, // 50Hz 下 1.2s
            velocity_mm_s: -80,
            radius_mm: 50,
            shuffles: 3,
        }
    }
}

/// 驾驶限制
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriveConfig {
    /// 无道具时的最大速度（mm/s）
    pub max_velocity_mm_s: i16,
    /// 摇杆刚离开死区时的转弯半径（mm）
    pub max_radius_mm: i16,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_velocity_mm_s: 300,
            max_radius_mm: 1700,
        }
    }
}

/// 道具配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ItemsConfig {
    pub selection: ItemPolicy,
    /// 随机种子（None 时使用系统熵）
    pub seed: Option<u64>,
    /// 加速蘑菇：强制前进速度（mm/s）
    pub speed_boost_velocity_mm_s: i16,
    /// 加速蘑菇持续 tick 数
    pub speed_boost_ticks: u32,
    /// 无敌星：提高后的速度上限（mm/s）
    pub invincibility_velocity_mm_s: i16,
    /// 无敌星持续 tick 数
    pub invincibility_ticks: u32,
}

impl Default for ItemsConfig {
    fn default() -> Self {
        Self {
            selection: ItemPolicy::Random,
            seed: None,
            speed_boost_velocity_mm_s: 500,
            speed_boost_ticks: 75, // 1.5s
            invincibility_velocity_mm_s: 425,
            invincibility_ticks: 300, // 6s
        }
    }
}

/// 手柄映射参数
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// 摇杆死区（防漂移）
    pub dead_zone: f64,
    /// 扳机最小激活量（0~1 归一化后）
    pub trigger_threshold: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dead_zone: 0.07,
            trigger_threshold: 0.07,
        }
    }
}

/// 完整配置
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KartConfig {
    pub control: ControlConfig,
    pub recovery: RecoveryConfig,
    pub drive: DriveConfig,
    pub items: ItemsConfig,
    pub input: InputConfig,
}

impl KartConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: KartConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.control;
        if !c.tick_rate_hz.is_finite() || c.tick_rate_hz <= 0.0 || c.tick_rate_hz > 1000.0 {
            return Err(invalid(
                "control.tick_rate_hz",
                format!("{} (must be in (0, 1000])", c.tick_rate_hz),
            ));
        }
        let period = c.tick_period();
        if c.sensor_timeout() + c.controller_timeout() >= period {
            return Err(invalid(
                "control.sensor_timeout_ms",
                format!(
                    "sensor ({} ms) + controller ({} ms) timeouts must fit in the tick period ({:?})",
                    c.sensor_timeout_ms, c.controller_timeout_ms, period
                ),
            ));
        }

        let r = &self.recovery;
        if r.duration_ticks == 0 {
            return Err(invalid("recovery.duration_ticks", "must be > 0"));
        }
        if r.shuffles > r.duration_ticks {
            return Err(invalid(
                "recovery.shuffles",
                format!("{} (must be <= duration_ticks {})", r.shuffles, r.duration_ticks),
            ));
        }
        if !(-VELOCITY_MAX_MM_S..=-1).contains(&r.velocity_mm_s) {
            return Err(invalid(
                "recovery.velocity_mm_s",
                format!("{} (must be in [-500, -1])", r.velocity_mm_s),
            ));
        }
        if !(RADIUS_MIN_ARC_MM..=RADIUS_MAX_MM).contains(&r.radius_mm) {
            return Err(invalid(
                "recovery.radius_mm",
                format!("{} (must be in [2, 2000])", r.radius_mm),
            ));
        }

        check_velocity("drive.max_velocity_mm_s", self.drive.max_velocity_mm_s)?;
        if !(RADIUS_MIN_ARC_MM..=RADIUS_MAX_MM).contains(&self.drive.max_radius_mm) {
            return Err(invalid(
                "drive.max_radius_mm",
                format!("{} (must be in [2, 2000])", self.drive.max_radius_mm),
            ));
        }

        let i = &self.items;
        check_velocity("items.speed_boost_velocity_mm_s", i.speed_boost_velocity_mm_s)?;
        check_velocity(
            "items.invincibility_velocity_mm_s",
            i.invincibility_velocity_mm_s,
        )?;
        if i.speed_boost_ticks == 0 {
            return Err(invalid("items.speed_boost_ticks", "must be > 0"));
        }
        if i.invincibility_ticks == 0 {
            return Err(invalid("items.invincibility_ticks", "must be > 0"));
        }

        check_fraction("input.dead_zone", self.input.dead_zone)?;
        check_fraction("input.trigger_threshold", self.input.trigger_threshold)?;
        Ok(())
    }
}

fn check_velocity(field: &'static str, value: i16) -> Result<(), ConfigError> {
    if !(0..=VELOCITY_MAX_MM_S).contains(&value) {
        return Err(invalid(field, format!("{} (must be in [0, 500])", value)));
    }
    Ok(())
}

fn check_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..1.0).contains(&value) {
        return Err(invalid(field, format!("{} (must be in [0, 1))", value)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        KartConfig::default().validate().unwrap();
        assert_eq!(
            KartConfig::default().control.tick_period(),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = KartConfig::from_toml_str("").unwrap();
        assert_eq!(config, KartConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = KartConfig::from_toml_str(
            r#"
            [control]
            tick_rate_hz = 25.0
            on_send_error = "continue"

            [recovery]
            enabled = false
            duration_ticks = 10

            [items]
            selection = "invincibility"
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.control.tick_rate_hz, 25.0);
        assert_eq!(config.control.on_send_error, SendFailurePolicy::Continue);
        assert!(!config.recovery.enabled);
        assert_eq!(config.recovery.duration_ticks, 10);
        // 未写的字段保持默认
        assert_eq!(config.recovery.velocity_mm_s, -80);
        assert_eq!(config.items.selection, ItemPolicy::Invincibility);
        assert_eq!(config.items.seed, Some(7));
    }

    #[test]
    fn test_negative_duration_rejected_at_parse() {
        let err = KartConfig::from_toml_str("[recovery]\nduration_ticks = -5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{:?}", err);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = KartConfig::from_toml_str("[recovery]\nwobble = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let mut config = KartConfig::default();
        config.recovery.duration_ticks = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "recovery.duration_ticks",
                ..
            })
        ));
    }

    #[test]
    fn test_shuffles_bounded_by_duration() {
        let mut config = KartConfig::default();
        config.recovery.shuffles = 1 << 31;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "recovery.shuffles",
                ..
            })
        ));

        config.recovery.shuffles = config.recovery.duration_ticks;
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = KartConfig::default();
        config.control.tick_rate_hz = 0.0;
        assert!(config.validate().is_err());

        let mut config = KartConfig::default();
        config.control.tick_rate_hz = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = KartConfig::default();
        config.recovery.velocity_mm_s = 80;
        assert!(config.validate().is_err());

        let mut config = KartConfig::default();
        config.items.speed_boost_velocity_mm_s = 600;
        assert!(config.validate().is_err());

        let mut config = KartConfig::default();
        config.input.dead_zone = 1.0;
        assert!(config.validate().is_err());

        let mut config = KartConfig::default();
        config.drive.max_radius_mm = 2500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeouts_must_fit_in_period() {
        let mut config = KartConfig::default();
        config.control.sensor_timeout_ms = 20;
        let err = config.validate().unwrap_err();
        assert!(format!("{}", err).contains("tick period"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[drive]\nmax_velocity_mm_s = 250").unwrap();
        let config = KartConfig::load(file.path()).unwrap();
        assert_eq!(config.drive.max_velocity_mm_s, 250);

        assert!(matches!(
            KartConfig::load("/nonexistent/kart.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
