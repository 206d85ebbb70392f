//! 道具状态机
//!
//! 道具槽只有一个：`Empty` 时轮落上升沿获得道具，`Holding` 时再次轮落直接丢弃。
//! 使用道具后槽位立即清空，效果按持续 tick 数由本状态机计时，
//! 组合器每个 tick 只拿到"当前生效的效果"这个值。

use crate::config::{ItemPolicy, ItemsConfig};
use crate::events::{ControlEvent, EventBuffer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 道具种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// 加速蘑菇：强制全速前进
    SpeedBoost,
    /// 无敌星：提高速度上限，碰撞不触发 wobble
    Invincibility,
}

impl ItemType {
    pub const ALL: [ItemType; 2] = [ItemType::SpeedBoost, ItemType::Invincibility];

    pub fn name(&self) -> &'static str {
        match self {
            ItemType::SpeedBoost => "speed_boost",
            ItemType::Invincibility => "invincibility",
        }
    }
}

/// 道具槽
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemState {
    #[default]
    Empty,
    Holding(ItemType),
}

/// 正在生效的道具效果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveEffect {
    pub item: ItemType,
    /// 包括当前 tick 在内还剩几个 tick
    pub ticks_remaining: u32,
}

/// 获得道具时的选择策略
pub trait ItemSelector {
    fn pick(&mut self) -> ItemType;
}

impl<S: ItemSelector + ?Sized> ItemSelector for Box<S> {
    fn pick(&mut self) -> ItemType {
        (**self).pick()
    }
}

/// 均匀随机选择
#[derive(Debug, Clone)]
pub struct RandomSelector<R = StdRng> {
    rng: R,
}

impl RandomSelector<StdRng> {
    /// 固定种子（可复现）
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// 系统熵
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl<R: Rng> ItemSelector for RandomSelector<R> {
    fn pick(&mut self) -> ItemType {
        ItemType::ALL[self.rng.gen_range(0..ItemType::ALL.len())]
    }
}

/// 固定选择
#[derive(Debug, Clone, Copy)]
pub struct FixedSelector(pub ItemType);

impl ItemSelector for FixedSelector {
    fn pick(&mut self) -> ItemType {
        self.0
    }
}

/// 按配置创建选择器
pub fn selector_from_config(config: &ItemsConfig) -> Box<dyn ItemSelector + Send> {
    match config.selection {
        ItemPolicy::SpeedBoost => Box::new(FixedSelector(ItemType::SpeedBoost)),
        ItemPolicy::Invincibility => Box::new(FixedSelector(ItemType::Invincibility)),
        ItemPolicy::Random => match config.seed {
            Some(seed) => Box::new(RandomSelector::seeded(seed)),
            None => Box::new(RandomSelector::from_entropy()),
        },
    }
}

/// 单个 tick 的道具结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemTick {
    /// 本 tick 使用的道具（只在使用的那个 tick 出现一次）
    pub used: Option<ItemType>,
    /// 本 tick 生效的效果
    pub active: Option<ItemType>,
}

/// 道具状态机
#[derive(Debug)]
pub struct ItemMachine<S> {
    state: ItemState,
    effect: Option<ActiveEffect>,
    selector: S,
    speed_boost_ticks: u32,
    invincibility_ticks: u32,
}

impl<S: ItemSelector> ItemMachine<S> {
    pub fn new(config: &ItemsConfig, selector: S) -> Self {
        Self {
            state: ItemState::Empty,
            effect: None,
            selector,
            speed_boost_ticks: config.speed_boost_ticks,
            invincibility_ticks: config.invincibility_ticks,
        }
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn effect(&self) -> Option<ActiveEffect> {
        self.effect
    }

    fn duration_of(&self, item: ItemType) -> u32 {
        match item {
            ItemType::SpeedBoost => self.speed_boost_ticks,
            ItemType::Invincibility => self.invincibility_ticks,
        }
    }

    /// 推进一个 tick
    ///
    /// 顺序：获得/丢弃 → 使用 → 计时。同一 tick 内获得的道具可以立即使用。
    pub fn step(&mut self, wheel_drop_edge: bool, use_item: bool, events: &mut EventBuffer) -> ItemTick {
        if wheel_drop_edge {
            match self.state {
                ItemState::Empty => {
                    let item = self.selector.pick();
                    self.state = ItemState::Holding(item);
                    events.push(ControlEvent::ItemAcquired(item));
                },
                ItemState::Holding(held) => {
                    events.push(ControlEvent::ItemDiscarded { held });
                },
            }
        }

        let mut used = None;
        if use_item {
            if let ItemState::Holding(item) = self.state {
                self.state = ItemState::Empty;
                // 新效果替换仍在生效的旧效果
                self.effect = Some(ActiveEffect {
                    item,
                    ticks_remaining: self.duration_of(item),
                });
                events.push(ControlEvent::ItemUsed(item));
                used = Some(item);
            }
        }

        let active = match self.effect.as_mut() {
            Some(effect) => {
                let item = effect.item;
                effect.ticks_remaining = effect.ticks_remaining.saturating_sub(1);
                if effect.ticks_remaining == 0 {
                    self.effect = None;
                    events.push(ControlEvent::EffectEnded(item));
                }
                Some(item)
            },
            None => None,
        };

        ItemTick { used, active }
    }
}
