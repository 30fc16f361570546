//! Countdown entries managed by the daemon scheduler.

use std::fmt;

/// Kind of subsystem owning a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerTag {
    /// Status LED blink control
    Led,
    /// Buzzer beep sequences
    Beep,
    /// Remote-control link watchdog
    RemoteControl,
    /// RGB strip breathing animation
    RgbStrip,
}

impl fmt::Display for OwnerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerTag::Led => write!(f, "led"),
            OwnerTag::Beep => write!(f, "beep"),
            OwnerTag::RemoteControl => write!(f, "remote-control"),
            OwnerTag::RgbStrip => write!(f, "rgb-strip"),
        }
    }
}

/// Identifies a registered timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub(crate) u32);

impl TimerHandle {
    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Countdown state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// `remaining_ticks > 0`
    Armed,
    /// `remaining_ticks == 0`; dispatched on every tick until rearmed
    Due,
}

/// One soft timer
///
/// Callbacks receive `&mut TimerEntry` and are expected to call
/// [`rearm`](TimerEntry::rearm) unless they want to fire on every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEntry {
    handle: TimerHandle,
    owner_tag: OwnerTag,
    owner_index: u8,
    reload_ticks: u16,
    remaining_ticks: u16,
}

impl TimerEntry {
    pub(crate) fn new(handle: TimerHandle, owner_tag: OwnerTag, owner_index: u8, reload_ticks: u16) -> Self {
        Self {
            handle,
            owner_tag,
            owner_index,
            reload_ticks,
            remaining_ticks: reload_ticks,
        }
    }

    pub fn handle(&self) -> TimerHandle {
        self.handle
    }

    pub fn owner_tag(&self) -> OwnerTag {
        self.owner_tag
    }

    pub fn owner_index(&self) -> u8 {
        self.owner_index
    }

    pub fn reload_ticks(&self) -> u16 {
        self.reload_ticks
    }

    pub fn remaining_ticks(&self) -> u16 {
        self.remaining_ticks
    }

    pub fn state(&self) -> TimerState {
        if self.remaining_ticks == 0 {
            TimerState::Due
        } else {
            TimerState::Armed
        }
    }

    /// Restart the countdown from `reload_ticks`
    pub fn rearm(&mut self) {
        self.remaining_ticks = self.reload_ticks;
    }

    /// Restart the countdown from an arbitrary value
    pub fn set_remaining_ticks(&mut self, ticks: u16) {
        self.remaining_ticks = ticks;
    }

    /// Advance one tick; returns true when the entry is due
    pub(crate) fn advance(&mut self) -> bool {
        self.remaining_ticks = self.remaining_ticks.saturating_sub(1);
        self.remaining_ticks == 0
    }
}
