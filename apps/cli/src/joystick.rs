//! Linux 手柄（`/dev/input/jsN`）读取
//!
//! 独立线程阻塞读取 8 字节的 `js_event`，把最新读数通过
//! [`ControllerPublisher`] 交给控制回路。设备拔出时发布"断开"，并周期性尝试重新打开。
//!
//! DualSense 默认映射：
//! - 轴 0：左摇杆水平（-1 左 ~ 1 右）
//! - 轴 5：R2 前进（-1 松开 ~ 1 按到底）
//! - 轴 2：L2 后退（DualShock 上为轴 4）
//! - 键 0：× 道具

use clap::Args;
use kart_driver::{ControllerPublisher, RawControllerState};
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

const JS_EVENT_BUTTON: u8 = 0x01;
const JS_EVENT_AXIS: u8 = 0x02;
const JS_EVENT_INIT: u8 = 0x80;

/// `struct js_event` 的大小
pub const JS_EVENT_SIZE: usize = 8;

/// 检查退出标志的间隔
const POLL_INTERVAL_MS: u16 = 100;
/// 设备拔出后重新打开的间隔
const REOPEN_INTERVAL: Duration = Duration::from_secs(1);

/// 一条手柄事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsEvent {
    Button { number: u8, pressed: bool },
    Axis { number: u8, value: i16 },
}

impl JsEvent {
    /// 解析 `js_event`（小端：u32 时间戳、i16 值、u8 类型、u8 编号）
    ///
    /// 初始化事件（`JS_EVENT_INIT`）按普通事件处理；未知类型返回 `None`。
    pub fn parse(raw: &[u8; JS_EVENT_SIZE]) -> Option<Self> {
        let value = i16::from_le_bytes([raw[4], raw[5]]);
        let kind = raw[6] & !JS_EVENT_INIT;
        let number = raw[7];
        match kind {
            JS_EVENT_BUTTON => Some(JsEvent::Button {
                number,
                pressed: value != 0,
            }),
            JS_EVENT_AXIS => Some(JsEvent::Axis { number, value }),
            _ => None,
        }
    }
}

/// 轴/键映射
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct Bindings {
    /// 转向轴
    #[arg(long, default_value_t = 0)]
    pub turn_axis: u8,

    /// 前进扳机轴
    #[arg(long, default_value_t = 5)]
    pub forward_axis: u8,

    /// 后退扳机轴（DualShock 为 4）
    #[arg(long, default_value_t = 2)]
    pub backward_axis: u8,

    /// 道具键
    #[arg(long, default_value_t = 0)]
    pub item_button: u8,
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            turn_axis: 0,
            forward_axis: 5,
            backward_axis: 2,
            item_button: 0,
        }
    }
}

fn normalize_axis(value: i16) -> f64 {
    (f64::from(value) / f64::from(i16::MAX)).clamp(-1.0, 1.0)
}

/// 按映射累积事件得到的手柄状态
#[derive(Debug, Clone)]
pub struct JoystickState {
    bindings: Bindings,
    state: RawControllerState,
}

impl JoystickState {
    pub fn new(bindings: Bindings) -> Self {
        Self {
            bindings,
            state: RawControllerState::NEUTRAL,
        }
    }

    pub fn current(&self) -> RawControllerState {
        self.state
    }

    /// 应用一条事件，返回映射到的读数是否变化
    pub fn apply(&mut self, event: JsEvent) -> bool {
        let before = self.state;
        match event {
            JsEvent::Axis { number, value } => {
                let v = normalize_axis(value);
                if number == self.bindings.turn_axis {
                    self.state.turn_axis = v;
                }
                if number == self.bindings.forward_axis {
                    self.state.forward_trigger = v;
                }
                if number == self.bindings.backward_axis {
                    self.state.backward_trigger = v;
                }
            },
            JsEvent::Button { number, pressed } => {
                if number == self.bindings.item_button {
                    self.state.item_button = pressed;
                }
            },
        }
        self.state != before
    }

    /// 设备断开后重置
    pub fn reset(&mut self) {
        self.state = RawControllerState::NEUTRAL;
    }
}

/// 等待可读，超时返回 `Ok(false)`
fn wait_readable(file: &File, timeout_ms: u16) -> io::Result<bool> {
    let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLIN)];
    let ready = poll(&mut fds, PollTimeout::from(timeout_ms)).map_err(io::Error::from)?;
    Ok(ready > 0)
}

/// 读取一台设备直到出错或收到退出信号
fn pump(
    file: &mut File,
    joystick: &mut JoystickState,
    publisher: &mut ControllerPublisher,
    shutdown: &AtomicBool,
) -> io::Result<()> {
    let mut raw = [0u8; JS_EVENT_SIZE];
    while !shutdown.load(Ordering::Relaxed) {
        if !wait_readable(file, POLL_INTERVAL_MS)? {
            continue;
        }
        file.read_exact(&mut raw)?;
        if let Some(event) = JsEvent::parse(&raw) {
            if joystick.apply(event) {
                publisher.publish(joystick.current());
            }
        }
    }
    Ok(())
}

/// 启动手柄读取线程
pub fn spawn_reader(
    device: PathBuf,
    bindings: Bindings,
    mut publisher: ControllerPublisher,
    shutdown: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("joystick".to_string())
        .spawn(move || {
            let mut joystick = JoystickState::new(bindings);
            let mut reported_missing = false;
            while !shutdown.load(Ordering::Relaxed) {
                match open_device(&device) {
                    Ok(mut file) => {
                        info!(device = %device.display(), "Joystick opened");
                        reported_missing = false;
                        // 打开后立即发布一次，让控制回路知道手柄已连接
                        publisher.publish(joystick.current());
                        if let Err(e) = pump(&mut file, &mut joystick, &mut publisher, &shutdown) {
                            warn!("Joystick read failed: {}", e);
                        }
                        joystick.reset();
                        publisher.disconnect();
                    },
                    Err(e) => {
                        if !reported_missing {
                            warn!(device = %device.display(), "Joystick not available: {}", e);
                            reported_missing = true;
                        }
                        publisher.disconnect();
                    },
                }
                if !shutdown.load(Ordering::Relaxed) {
                    thread::sleep(REOPEN_INTERVAL);
                }
            }
            debug!("Joystick thread exiting");
        })
}

fn open_device(path: &Path) -> io::Result<File> {
    File::open(path)
}
