//! 传感器快照读取
//!
//! 把 Packet 7 解码为电平 + 上升沿。上升沿只在某个输入从 false 变为 true 的那个 tick 为真，
//! 比较对象是上一个"被接受"的数据包。
//!
//! 传输层欠载（本 tick 没有新数据包）时复用上一次的电平，并清空所有上升沿：
//! 缺包只会退化成"没有新事件"，永远不会产生错误，也不会重复触发边沿事件。

use crate::transport::{RawSensorPacket, Transport};
use kart_protocol::BumpsAndWheelDrops;
use std::time::Duration;
use tracing::{trace, warn};

/// 触发碰撞的一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpSide {
    Left,
    Right,
    /// 两侧同时触发（正面撞击）
    Both,
}

/// 数字输入的一组布尔值
///
/// 同一结构既用于电平，也用于上升沿。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorLevels {
    pub bump_left: bool,
    pub bump_right: bool,
    pub wheel_drop_left: bool,
    pub wheel_drop_right: bool,
    pub wheel_drop_caster: bool,
}

impl SensorLevels {
    /// 计算相对 `previous` 的上升沿
    pub fn rising_since(&self, previous: &SensorLevels) -> SensorLevels {
        SensorLevels {
            bump_left: self.bump_left && !previous.bump_left,
            bump_right: self.bump_right && !previous.bump_right,
            wheel_drop_left: self.wheel_drop_left && !previous.wheel_drop_left,
            wheel_drop_right: self.wheel_drop_right && !previous.wheel_drop_right,
            wheel_drop_caster: self.wheel_drop_caster && !previous.wheel_drop_caster,
        }
    }

    /// 触发的碰撞侧（无碰撞返回 `None`）
    pub fn bump_side(&self) -> Option<BumpSide> {
        match (self.bump_left, self.bump_right) {
            (true, true) => Some(BumpSide::Both),
            (true, false) => Some(BumpSide::Left),
            (false, true) => Some(BumpSide::Right),
            (false, false) => None,
        }
    }

    /// 驱动轮任一侧落下
    ///
    /// 万向轮不计入：Create 2 没有该传感器，且减速带只会让驱动轮离地。
    pub fn any_wheel_drop(&self) -> bool {
        self.wheel_drop_left || self.wheel_drop_right
    }
}

impl From<BumpsAndWheelDrops> for SensorLevels {
    fn from(packet: BumpsAndWheelDrops) -> Self {
        Self {
            bump_left: packet.bump_left(),
            bump_right: packet.bump_right(),
            wheel_drop_left: packet.wheel_drop_left(),
            wheel_drop_right: packet.wheel_drop_right(),
            wheel_drop_caster: packet.wheel_drop_caster(),
        }
    }
}

/// 单个 tick 的传感器快照（只读）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorSnapshot {
    /// 当前电平
    pub levels: SensorLevels,
    /// 本 tick 的上升沿
    pub edges: SensorLevels,
    /// 本 tick 是否收到新数据包（false 表示复用了上一次的电平）
    pub fresh: bool,
}

impl SensorSnapshot {
    /// 碰撞上升沿
    pub fn bump_edge(&self) -> Option<BumpSide> {
        self.edges.bump_side()
    }

    /// 轮落上升沿（道具箱触发）
    pub fn wheel_drop_edge(&self) -> bool {
        self.edges.any_wheel_drop()
    }
}

/// 传感器快照读取器
///
/// 第一个被接受的数据包只建立基线，不产生上升沿：
/// 开机时已经按下的碰撞条/已经落下的轮子不算事件。
#[derive(Debug, Default)]
pub struct SensorReader {
    last: Option<SensorLevels>,
}

impl SensorReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接受一个新数据包
    pub fn accept(&mut self, packet: RawSensorPacket) -> SensorSnapshot {
        let levels = SensorLevels::from(BumpsAndWheelDrops::from_byte(packet[0]));
        let edges = match &self.last {
            Some(previous) => levels.rising_since(previous),
            None => SensorLevels::default(),
        };
        self.last = Some(levels);
        SensorSnapshot {
            levels,
            edges,
            fresh: true,
        }
    }

    /// 欠载：复用上一次电平，清空上升沿
    pub fn underrun(&self) -> SensorSnapshot {
        SensorSnapshot {
            levels: self.last.unwrap_or_default(),
            edges: SensorLevels::default(),
            fresh: false,
        }
    }

    /// 从传输层读取一个快照
    ///
    /// 超时或读取错误都退化为欠载快照；错误只记录日志，不向上传播。
    pub fn read<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        timeout: Duration,
    ) -> SensorSnapshot {
        match transport.receive_sensor_packet(timeout) {
            Ok(Some(packet)) => {
                let snapshot = self.accept(packet);
                trace!(?snapshot, "Sensor packet accepted");
                snapshot
            },
            Ok(None) => {
                trace!("Sensor packet underrun, reusing last levels");
                self.underrun()
            },
            Err(e) => {
                warn!("Sensor read failed, treating as underrun: {}", e);
                self.underrun()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUMP_RIGHT: u8 = 0b0000_0001;
    const BUMP_LEFT: u8 = 0b0000_0010;
    const DROP_RIGHT: u8 = 0b0000_0100;
    const DROP_LEFT: u8 = 0b0000_1000;
    const DROP_CASTER: u8 = 0b0001_0000;

    #[test]
    fn test_first_packet_is_baseline() {
        let mut reader = SensorReader::new();
        let snapshot = reader.accept([BUMP_LEFT | DROP_RIGHT]);
        assert!(snapshot.levels.bump_left);
        assert!(snapshot.levels.wheel_drop_right);
        assert_eq!(snapshot.edges, SensorLevels::default());
    }

    #[test]
    fn test_rising_edge_only_on_transition() {
        let mut reader = SensorReader::new();
        reader.accept([0]);

        let s = reader.accept([BUMP_RIGHT]);
        assert_eq!(s.bump_edge(), Some(BumpSide::Right));

        // 持续按下：电平为真，但没有上升沿
        let s = reader.accept([BUMP_RIGHT]);
        assert!(s.levels.bump_right);
        assert_eq!(s.bump_edge(), None);

        // 松开再按下
        reader.accept([0]);
        let s = reader.accept([BUMP_RIGHT | BUMP_LEFT]);
        assert_eq!(s.bump_edge(), Some(BumpSide::Both));
    }

    #[test]
    fn test_wheel_drop_edge() {
        let mut reader = SensorReader::new();
        reader.accept([0]);
        assert!(reader.accept([DROP_LEFT]).wheel_drop_edge());
        // 左轮仍落下，右轮新落下：仍是新边沿
        assert!(reader.accept([DROP_LEFT | DROP_RIGHT]).wheel_drop_edge());
        assert!(!reader.accept([DROP_LEFT | DROP_RIGHT]).wheel_drop_edge());
    }

    #[test]
    fn test_caster_drop_is_not_an_item_edge() {
        let mut reader = SensorReader::new();
        reader.accept([0]);
        let s = reader.accept([DROP_CASTER]);
        assert!(s.edges.wheel_drop_caster);
        assert!(!s.wheel_drop_edge());
    }

    #[test]
    fn test_underrun_reuses_levels_and_clears_edges() {
        let mut reader = SensorReader::new();
        reader.accept([0]);
        let s = reader.accept([BUMP_LEFT | DROP_LEFT]);
        assert!(s.bump_edge().is_some() && s.wheel_drop_edge());

        let s = reader.underrun();
        assert!(!s.fresh);
        assert!(s.levels.bump_left && s.levels.wheel_drop_left);
        assert_eq!(s.edges, SensorLevels::default());

        // 欠载后同样电平到达：与上一个被接受的包相比没有变化，不产生边沿
        let s = reader.accept([BUMP_LEFT | DROP_LEFT]);
        assert_eq!(s.edges, SensorLevels::default());
    }

    #[test]
    fn test_underrun_before_any_packet() {
        let reader = SensorReader::new();
        let s = reader.underrun();
        assert_eq!(s, SensorSnapshot::default());
    }
}
