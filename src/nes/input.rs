//
// Joypad actions and the raw index table the environment speaks.
//

use serde::Serialize;

//
// The standard NES game pad state
//

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Buttons {
    pub left: bool,
    pub down: bool,
    pub up: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
    pub select: bool,
    pub start: bool,
}

/// Every button combination the agent can press during one frame.
///
/// `A` jumps and `B` runs, so the `*Run` variants hold B.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Noop,
    Right,
    RightJump,
    RightRun,
    RightJumpRun,
    Jump,
    Left,
    LeftJump,
    LeftRun,
    LeftJumpRun,
    Down,
    Up,
}

const COMPLEX_MOVEMENT: [Action; 12] = [
    Action::Noop,
    Action::Right,
    Action::RightJump,
    Action::RightRun,
    Action::RightJumpRun,
    Action::Jump,
    Action::Left,
    Action::LeftJump,
    Action::LeftRun,
    Action::LeftJumpRun,
    Action::Down,
    Action::Up,
];

impl Action {
    /// Index of this action in the complex movement table.
    pub fn index(self) -> usize {
        COMPLEX_MOVEMENT
            .iter()
            .position(|&action| action == self)
            .unwrap_or_default()
    }

    pub fn from_index(index: usize) -> Option<Action> {
        COMPLEX_MOVEMENT.get(index).copied()
    }

    pub fn buttons(self) -> Buttons {
        use self::Action::*;

        let (left, right) = match self {
            Right | RightJump | RightRun | RightJumpRun => (false, true),
            Left | LeftJump | LeftRun | LeftJumpRun => (true, false),
            _ => (false, false),
        };
        Buttons {
            left,
            right,
            up: self == Up,
            down: self == Down,
            a: matches!(self, RightJump | RightJumpRun | Jump | LeftJump | LeftJumpRun),
            b: matches!(self, RightRun | RightJumpRun | LeftRun | LeftJumpRun),
            ..Buttons::default()
        }
    }
}
