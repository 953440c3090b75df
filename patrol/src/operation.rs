use std::fmt::{self, Display, Formatter};

/// Externally requested operating state of a route run.
///
/// It is only observed between ticks.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Operation {
    #[default]
    Running,
    Halting,
    Stopping,
}

impl Operation {
    #[inline]
    pub fn halting(&self) -> bool {
        matches!(self, Operation::Halting)
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Running => write!(f, "Running"),
            Operation::Halting => write!(f, "Halting"),
            Operation::Stopping => write!(f, "Stopping"),
        }
    }
}
