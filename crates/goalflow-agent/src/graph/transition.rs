use crate::state::RunState;

/// Where a transition leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Step(String),
    /// Terminal: the run is over.
    Done,
}

impl Target {
    pub fn step(name: impl Into<String>) -> Self {
        Target::Step(name.into())
    }
}

type Predicate = Box<dyn Fn(&RunState) -> bool + Send + Sync>;

/// Outgoing rule of a step. Decisions are pure functions of the state.
pub enum Transition {
    /// Always go to the same place.
    Always(Target),
    /// Two-way branch on a predicate.
    Branch {
        predicate: Predicate,
        if_true: Target,
        if_false: Target,
    },
}

impl Transition {
    pub fn always(to: impl Into<String>) -> Self {
        Transition::Always(Target::step(to))
    }

    /// Branch on `predicate`.
    pub fn when<F>(predicate: F, if_true: Target, if_false: Target) -> Self
    where
        F: Fn(&RunState) -> bool + Send + Sync + 'static,
    {
        Transition::Branch {
            predicate: Box::new(predicate),
            if_true,
            if_false,
        }
    }

    /// Pick the next target for `state`.
    pub fn next(&self, state: &RunState) -> &Target {
        match self {
            Transition::Always(target) => target,
            Transition::Branch {
                predicate,
                if_true,
                if_false,
            } => {
                if predicate(state) {
                    if_true
                } else {
                    if_false
                }
            }
        }
    }

    /// Every target this transition can produce.
    pub fn targets(&self) -> Vec<&Target> {
        match self {
            Transition::Always(target) => vec![target],
            Transition::Branch {
                if_true, if_false, ..
            } => vec![if_true, if_false],
        }
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Always(target) => f.debug_tuple("Always").field(target).finish(),
            Transition::Branch {
                if_true, if_false, ..
            } => f
                .debug_struct("Branch")
                .field("if_true", if_true)
                .field("if_false", if_false)
                .finish_non_exhaustive(),
        }
    }
}
