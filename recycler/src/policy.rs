use crate::grid::GridState;
use crate::stack::StackState;
use crate::wrap::WrapState;
use crate::{ConfigError, LayoutConfig};

/// The active layout policy and its private state.
///
/// A closed set: the window manager owns exactly one variant and dispatches
/// every geometry-dependent decision through it. Policy state has no lifetime
/// of its own; swapping the variant tears the realized window down.
#[derive(Clone, Debug)]
pub(crate) enum LayoutPolicy {
    Stack(StackState),
    Wrap(WrapState),
    Grid(GridState),
}

impl LayoutPolicy {
    pub(crate) fn from_config(config: LayoutConfig) -> Result<Self, ConfigError> {
        Ok(match config {
            LayoutConfig::Stack { reorder_mode } => Self::Stack(StackState::new(reorder_mode)),
            LayoutConfig::Wrap { line_alignment } => Self::Wrap(WrapState::new(line_alignment)),
            LayoutConfig::Grid { stack_count } => {
                if stack_count < 2 {
                    return Err(ConfigError::StackCountTooSmall(stack_count));
                }
                Self::Grid(GridState::new(stack_count))
            }
        })
    }

    /// Wrap and grid virtualize along the flip of the configured orientation.
    pub(crate) fn flips_layout_orientation(&self) -> bool {
        !matches!(self, Self::Stack(_))
    }

    pub(crate) fn config(&self) -> LayoutConfig {
        match self {
            Self::Stack(s) => LayoutConfig::Stack {
                reorder_mode: s.reorder_mode,
            },
            Self::Wrap(w) => LayoutConfig::Wrap {
                line_alignment: w.line_alignment,
            },
            Self::Grid(g) => LayoutConfig::Grid {
                stack_count: g.stack_count,
            },
        }
    }
}
