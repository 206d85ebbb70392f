//! 控制回路
//!
//! 单线程、固定周期。每个 tick 依次执行：
//!
//! 读取传感器快照 → 读取手柄 → 道具状态机 → 碰撞恢复状态机 → 组合指令 → 编码 → 发送
//!
//! 一个 tick 内所有状态机的推进对外不可分割；终止信号只在 tick 边界检查，
//! 退出前总会发送一次停车指令，不会把 wobble 动作停在半途。
//!
//! # 使用场景
//!
//! ```rust,ignore
//! use kart_control::{ControlLoop, KartConfig, TracingFeedback, item::selector_from_config};
//! use std::sync::atomic::AtomicBool;
//!
//! let config = KartConfig::load("config.toml")?;
//! let selector = selector_from_config(&config.items);
//! let mut kart = ControlLoop::new(&config, transport, controller, selector, TracingFeedback)?;
//! kart.start_session()?;
//! let metrics = kart.run(&AtomicBool::new(false))?;
//! ```

use crate::composer::CommandComposer;
use crate::config::{ControlConfig, KartConfig, SendFailurePolicy};
use crate::error::ControlError;
use crate::events::{ControlEvent, EventBuffer, FeedbackSink};
use crate::input::{DriverIntent, InputMapper};
use crate::item::{ActiveEffect, ItemMachine, ItemSelector, ItemState, ItemType};
use crate::metrics::{LoopMetrics, MetricsSnapshot};
use crate::recovery::{RecoveryMachine, RecoveryState};
use kart_driver::{
    ControllerPoll, ControllerSource, RawControllerState, SensorReader, SensorSnapshot, Transport,
};
use kart_protocol::{DriveCommand, OiMode, session_start};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// 单个 tick 的执行结果
#[derive(Debug, Clone)]
pub struct TickReport {
    /// tick 序号（从 0 开始）
    pub tick: u64,
    pub snapshot: SensorSnapshot,
    pub intent: DriverIntent,
    /// 本 tick 生效的道具效果
    pub effect: Option<ItemType>,
    /// 本 tick 发出的驱动指令
    pub command: DriveCommand,
    pub events: EventBuffer,
    /// 指令是否发送成功
    pub sent: bool,
}

/// 控制回路
///
/// - `T`: 传输层（串口）
/// - `C`: 手柄
/// - `S`: 道具选择策略
/// - `F`: 事件接收方
pub struct ControlLoop<T, C, S, F> {
    transport: T,
    controller: C,
    feedback: F,
    control: ControlConfig,
    sensors: SensorReader,
    mapper: InputMapper,
    last_raw: RawControllerState,
    controller_connected: bool,
    items: ItemMachine<S>,
    recovery: RecoveryMachine,
    composer: CommandComposer,
    metrics: Arc<LoopMetrics>,
    tick: u64,
}

impl<T, C, S, F> ControlLoop<T, C, S, F>
where
    T: Transport,
    C: ControllerSource,
    S: ItemSelector,
    F: FeedbackSink,
{
    /// 创建控制回路
    ///
    /// 先校验配置，非法配置在任何 IO 之前被拒绝。
    pub fn new(
        config: &KartConfig,
        transport: T,
        controller: C,
        selector: S,
        feedback: F,
    ) -> Result<Self, ControlError> {
        config.validate()?;
        if !config.recovery.enabled {
            info!("Collision recovery disabled");
        }
        Ok(Self {
            transport,
            controller,
            feedback,
            control: config.control.clone(),
            sensors: SensorReader::new(),
            mapper: InputMapper::new(&config.input),
            last_raw: RawControllerState::NEUTRAL,
            controller_connected: false,
            items: ItemMachine::new(&config.items, selector),
            recovery: RecoveryMachine::new(&config.recovery),
            composer: CommandComposer::new(config),
            metrics: Arc::new(LoopMetrics::new()),
            tick: 0,
        })
    }

    /// 打开 Open Interface 会话（Start + Full），等待机器人稳定
    pub fn start_session(&mut self) -> Result<(), ControlError> {
        info!("Starting Open Interface session (Full mode)");
        self.transport.send(&session_start(OiMode::Full))?;
        spin_sleep::sleep(std::time::Duration::from_millis(self.control.settle_ms));
        Ok(())
    }

    /// 发送停车指令
    pub fn stop(&mut self) -> Result<(), ControlError> {
        self.transport.send(&DriveCommand::STOP.to_bytes())?;
        debug!("Stop command sent");
        Ok(())
    }

    /// 执行一个 tick
    pub fn tick(&mut self) -> Result<TickReport, ControlError> {
        let tick = self.tick;
        let mut events = EventBuffer::new();

        // 1. 传感器（超时/错误退化为欠载，不向上传播）
        let snapshot = self.sensors.read(&mut self.transport, self.control.sensor_timeout());
        if !snapshot.fresh {
            LoopMetrics::incr(&self.metrics.sensor_underruns);
        }

        // 2. 手柄
        let raw = self.poll_controller(&mut events);
        let intent = self.mapper.map(&raw);

        // 3. 道具
        let items = self
            .items
            .step(snapshot.wheel_drop_edge(), intent.use_item, &mut events);

        // 4. 碰撞恢复（无敌期间碰撞不进入 wobble）
        let invulnerable = items.active == Some(ItemType::Invincibility);
        let maneuver = self
            .recovery
            .step(snapshot.bump_edge(), invulnerable, &mut events);

        // 5. 组合 + 编码
        let command = self.composer.compose(&intent, items.active, maneuver);
        let bytes = command.to_bytes();

        // 6. 发送（不重试）
        let failure = match self.transport.send(&bytes) {
            Ok(()) => None,
            Err(e) => {
                LoopMetrics::incr(&self.metrics.send_failures);
                events.push(ControlEvent::SendFailed {
                    tick,
                    error: e.to_string(),
                });
                Some(e)
            },
        };

        let sent = failure.is_none();
        self.tick += 1;
        LoopMetrics::incr(&self.metrics.ticks);
        trace!(tick, ?command, "Tick complete");

        for event in &events {
            self.feedback.publish(event);
        }

        if let Some(source) = failure {
            match self.control.on_send_error {
                SendFailurePolicy::Halt => {
                    return Err(ControlError::Halted { tick, source });
                },
                SendFailurePolicy::Continue => {
                    warn!(tick, "Send failed, continuing: {}", source);
                },
            }
        }

        Ok(TickReport {
            tick,
            snapshot,
            intent,
            effect: items.active,
            command,
            events,
            sent,
        })
    }

    fn poll_controller(&mut self, events: &mut EventBuffer) -> RawControllerState {
        match self.controller.poll(self.control.controller_timeout()) {
            ControllerPoll::Sample(raw) => {
                if !self.controller_connected {
                    self.controller_connected = true;
                    events.push(ControlEvent::ControllerConnected);
                }
                self.last_raw = raw;
            },
            ControllerPoll::NoData => {
                LoopMetrics::incr(&self.metrics.controller_gaps);
            },
            ControllerPoll::Disconnected => {
                if self.controller_connected {
                    self.controller_connected = false;
                    events.push(ControlEvent::ControllerDisconnected);
                }
                self.last_raw = RawControllerState::NEUTRAL;
            },
        }
        self.last_raw
    }

    /// 运行直到 `shutdown` 置位、达到 `max_ticks` 或发送失败停机
    ///
    /// 无论以何种方式退出，都会尝试发送停车指令。
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<MetricsSnapshot, ControlError> {
        let period = self.control.tick_period();
        info!(
            tick_rate_hz = self.control.tick_rate_hz,
            recovery = self.recovery.is_enabled(),
            "Control loop started"
        );

        let mut next_tick = Instant::now();
        let result = loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested");
                break Ok(());
            }
            if let Some(max_ticks) = self.control.max_ticks {
                if self.tick >= max_ticks {
                    break Ok(());
                }
            }

            if let Err(e) = self.tick() {
                break Err(e);
            }

            next_tick += period;
            let now = Instant::now();
            if now < next_tick {
                spin_sleep::sleep(next_tick - now);
            } else {
                LoopMetrics::incr(&self.metrics.overruns);
                debug!(lag = ?(now - next_tick), "Tick overran its period");
                next_tick = now;
            }
        };

        let stopped = self.stop();
        let snapshot = self.metrics.snapshot();
        info!(
            ticks = snapshot.ticks,
            underruns = snapshot.sensor_underruns,
            send_failures = snapshot.send_failures,
            overruns = snapshot.overruns,
            "Control loop stopped"
        );

        match (result, stopped) {
            (Ok(()), Ok(())) => Ok(snapshot),
            (Ok(()), Err(e)) => Err(e),
            (Err(e), stopped) => {
                if let Err(stop_err) = stopped {
                    warn!("Failed to send stop command: {}", stop_err);
                }
                Err(e)
            },
        }
    }

    pub fn item_state(&self) -> ItemState {
        self.items.state()
    }

    pub fn active_effect(&self) -> Option<ActiveEffect> {
        self.items.effect()
    }

    pub fn recovery_state(&self) -> RecoveryState {
        self.recovery.state()
    }

    /// 共享的指标（可交给其他线程读取）
    pub fn metrics(&self) -> Arc<LoopMetrics> {
        self.metrics.clone()
    }

    /// 已执行的 tick 数
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::FixedSelector;
    use kart_driver::{MockTransport, ScriptedController};
    use kart_protocol::TurnRadius;

    const BUMP_LEFT: u8 = 0b0000_0010;
    const DROP_LEFT: u8 = 0b0000_1000;

    fn config() -> KartConfig {
        let mut config = KartConfig::default();
        config.control.settle_ms = 0;
        config.control.tick_rate_hz = 500.0;
        config.control.sensor_timeout_ms = 0;
        config.control.controller_timeout_ms = 0;
        config.recovery.duration_ticks = 4;
        config
    }

    fn forward(trigger: f64) -> ControllerPoll {
        ControllerPoll::Sample(RawControllerState {
            forward_trigger: trigger,
            ..RawControllerState::NEUTRAL
        })
    }

    type TestLoop = ControlLoop<MockTransport, ScriptedController, FixedSelector, Vec<ControlEvent>>;

    fn build(config: &KartConfig, script: Vec<ControllerPoll>) -> (TestLoop, MockTransport) {
        let transport = MockTransport::new();
        let handle = transport.clone();
        let kart = ControlLoop::new(
            config,
            transport,
            ScriptedController::new(script),
            FixedSelector(ItemType::SpeedBoost),
            Vec::new(),
        )
        .unwrap();
        (kart, handle)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = config();
        cfg.recovery.duration_ticks = 0;
        let result = ControlLoop::new(
            &cfg,
            MockTransport::new(),
            ScriptedController::default(),
            FixedSelector(ItemType::SpeedBoost),
            (),
        );
        assert!(matches!(result, Err(ControlError::Config(_))));
    }

    #[test]
    fn test_start_session_sends_start_full() {
        let (mut kart, handle) = build(&config(), vec![]);
        kart.start_session().unwrap();
        assert_eq!(handle.sent(), vec![vec![128u8, 132]]);
    }

    #[test]
    fn test_tick_sends_composed_command() {
        let (mut kart, handle) = build(&config(), vec![forward(1.0)]);
        let report = kart.tick().unwrap();
        assert!(report.sent);
        assert_eq!(report.command, DriveCommand::straight(300));
        assert_eq!(handle.last_drive_command(), Some(DriveCommand::straight(300)));
        assert_eq!(kart.feedback().as_slice(), &[ControlEvent::ControllerConnected]);
    }

    #[test]
    fn test_no_data_reuses_last_reading() {
        let (mut kart, handle) = build(&config(), vec![forward(1.0)]);
        kart.tick().unwrap();
        kart.tick().unwrap();
        assert_eq!(handle.sent_drive_commands(), vec![DriveCommand::straight(300); 2]);
        assert_eq!(kart.metrics().snapshot().controller_gaps, 1);
    }

    #[test]
    fn test_disconnect_releases_controls() {
        let (mut kart, handle) = build(
            &config(),
            vec![forward(1.0), ControllerPoll::Disconnected, ControllerPoll::NoData],
        );
        kart.tick().unwrap();
        kart.tick().unwrap();
        kart.tick().unwrap();
        let sent = handle.sent_drive_commands();
        assert_eq!(sent[1], DriveCommand::STOP);
        assert_eq!(sent[2], DriveCommand::STOP);
        assert!(kart.feedback().contains(&ControlEvent::ControllerDisconnected));
    }

    #[test]
    fn test_bump_overrides_driver() {
        let (mut kart, handle) = build(&config(), vec![forward(1.0)]);
        handle.push_packet(0);
        handle.push_packet(BUMP_LEFT);
        kart.tick().unwrap();
        let report = kart.tick().unwrap();
        assert_eq!(report.command.velocity_mm_s, -80);
        assert_eq!(report.command.radius, TurnRadius::Arc(50));
        assert!(kart.recovery_state().is_wobbling());
    }

    #[test]
    fn test_invincibility_shields_bump() {
        let mut cfg = config();
        cfg.items.invincibility_ticks = 10;
        let transport = MockTransport::new();
        let handle = transport.clone();
        let press = ControllerPoll::Sample(RawControllerState {
            item_button: true,
            ..RawControllerState::NEUTRAL
        });
        let mut kart = ControlLoop::new(
            &cfg,
            transport,
            ScriptedController::new(vec![forward(-1.0), press]),
            FixedSelector(ItemType::Invincibility),
            Vec::new(),
        )
        .unwrap();

        handle.push_packet(0);
        handle.push_packet(DROP_LEFT);
        handle.push_packet(DROP_LEFT | BUMP_LEFT);
        kart.tick().unwrap();
        kart.tick().unwrap();
        let report = kart.tick().unwrap();
        assert_eq!(report.effect, Some(ItemType::Invincibility));
        assert_eq!(kart.recovery_state(), RecoveryState::Normal);
        assert!(
            report
                .events
                .contains(&ControlEvent::CollisionShielded {
                    side: kart_driver::BumpSide::Left
                })
        );
    }

    #[test]
    fn test_send_failure_halts_by_default() {
        let (mut kart, handle) = build(&config(), vec![]);
        handle.fail_next_sends(1);
        let err = kart.tick().unwrap_err();
        assert!(matches!(err, ControlError::Halted { tick: 0, .. }));
        assert_eq!(kart.metrics().snapshot().send_failures, 1);
        assert!(matches!(
            kart.feedback().last(),
            Some(ControlEvent::SendFailed { tick: 0, .. })
        ));
    }

    #[test]
    fn test_send_failure_continue_policy() {
        let mut cfg = config();
        cfg.control.on_send_error = SendFailurePolicy::Continue;
        let (mut kart, handle) = build(&cfg, vec![]);
        handle.fail_next_sends(1);
        let report = kart.tick().unwrap();
        assert!(!report.sent);
        let report = kart.tick().unwrap();
        assert!(report.sent);
        // 失败的那次不重发
        assert_eq!(handle.sent_drive_commands().len(), 1);
    }

    #[test]
    fn test_run_stops_at_max_ticks_and_sends_stop() {
        let mut cfg = config();
        cfg.control.max_ticks = Some(5);
        let (mut kart, handle) = build(&cfg, vec![forward(1.0)]);
        let metrics = kart.run(&AtomicBool::new(false)).unwrap();
        assert_eq!(metrics.ticks, 5);
        let sent = handle.sent_drive_commands();
        assert_eq!(sent.len(), 6);
        assert_eq!(sent.last(), Some(&DriveCommand::STOP));
    }

    #[test]
    fn test_run_honors_shutdown_flag() {
        let (mut kart, handle) = build(&config(), vec![]);
        let metrics = kart.run(&AtomicBool::new(true)).unwrap();
        assert_eq!(metrics.ticks, 0);
        assert_eq!(handle.sent_drive_commands(), vec![DriveCommand::STOP]);
    }

    #[test]
    fn test_run_halts_on_closed_transport() {
        let (mut kart, handle) = build(&config(), vec![]);
        handle.close();
        let err = kart.run(&AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, ControlError::Halted { tick: 0, .. }));
    }
}
