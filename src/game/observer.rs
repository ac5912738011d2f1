//! Change signals raised by the game while the planner acts
//!
//! Recruiting can fire game events that rewrite recruit lists or move things
//! around. The planner polls these signals after every command and stops the
//! cycle when its assumptions no longer hold.

use std::cell::Cell;
use std::rc::Rc;

/// Signals the planner polls
pub trait ChangeObserver {
    fn recruit_list_changed(&self) -> bool;

    /// Game state changes since the last reset
    fn gamestate_changed_count(&self) -> u32;

    fn reset(&mut self);
}

/// Shared, single-threaded signal cells
///
/// Clones share state, so the game side keeps one handle to notify and the
/// planner gets another to poll.
#[derive(Debug, Clone, Default)]
pub struct ChangeSignals {
    recruit_list_changed: Rc<Cell<bool>>,
    gamestate_changed: Rc<Cell<u32>>,
}

impl ChangeSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify_recruit_list_changed(&self) {
        self.recruit_list_changed.set(true);
    }

    pub fn notify_gamestate_changed(&self) {
        self.gamestate_changed.set(self.gamestate_changed.get() + 1);
    }
}

impl ChangeObserver for ChangeSignals {
    fn recruit_list_changed(&self) -> bool {
        self.recruit_list_changed.get()
    }

    fn gamestate_changed_count(&self) -> u32 {
        self.gamestate_changed.get()
    }

    fn reset(&mut self) {
        self.recruit_list_changed.set(false);
        self.gamestate_changed.set(0);
    }
}
