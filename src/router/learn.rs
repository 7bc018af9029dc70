//! Learn mode: bind the next incoming control to an armed action

use crate::mapping::MappedAction;
use tracing::{debug, info};

/// UI row / action the next event binds to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnTarget {
    pub row: usize,
    pub action: MappedAction,
}

impl LearnTarget {
    pub fn new(row: usize, action: MappedAction) -> Self {
        Self { row, action }
    }
}

/// Result of a successful capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnCapture {
    pub device: String,
    pub control_id: i32,
    pub target: LearnTarget,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum LearnState {
    #[default]
    Idle,
    Learning(LearnTarget),
}

/// Global learn state machine (Idle ⇄ Learning), no timeout
#[derive(Debug, Default)]
pub struct LearnSession {
    state: LearnState,
}

impl LearnSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter Learning; returns the superseded target if one was armed
    pub fn arm(&mut self, target: LearnTarget) -> Option<LearnTarget> {
        info!(row = target.row, action = %target.action.action_name, "Learn armed");
        match std::mem::replace(&mut self.state, LearnState::Learning(target)) {
            LearnState::Learning(previous) => {
                debug!(row = previous.row, "Previous learn target superseded");
                Some(previous)
            }
            LearnState::Idle => None,
        }
    }

    /// Back to Idle; returns the dropped target
    pub fn cancel(&mut self) -> Option<LearnTarget> {
        match std::mem::take(&mut self.state) {
            LearnState::Learning(target) => {
                info!(row = target.row, "Learn cancelled");
                Some(target)
            }
            LearnState::Idle => None,
        }
    }

    /// Consume the armed target for a control; `None` when Idle
    pub fn capture(&mut self, device: &str, control_id: i32) -> Option<LearnCapture> {
        match std::mem::take(&mut self.state) {
            LearnState::Learning(target) => Some(LearnCapture {
                device: device.to_string(),
                control_id,
                target,
            }),
            LearnState::Idle => None,
        }
    }

    pub fn is_learning(&self) -> bool {
        matches!(self.state, LearnState::Learning(_))
    }

    pub fn target(&self) -> Option<&LearnTarget> {
        match &self.state {
            LearnState::Learning(target) => Some(target),
            LearnState::Idle => None,
        }
    }
}
