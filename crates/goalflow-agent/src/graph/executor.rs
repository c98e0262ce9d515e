use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use super::interceptor::StepInterceptor;
use super::step::Step;
use super::transition::{Target, Transition};
use crate::state::{ErrorKind, RunState};

/// Structural faults found while building a graph.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("no entry step set")]
    MissingEntry,

    #[error("entry step '{0}' is not in the graph")]
    UnknownEntry(String),

    #[error("step '{0}' registered twice")]
    DuplicateStep(String),

    #[error("step '{0}' has no transition")]
    MissingTransition(String),

    #[error("transition declared for unknown step '{0}'")]
    OrphanTransition(String),

    #[error("step '{from}' can transition to unknown step '{to}'")]
    UnknownTarget { from: String, to: String },
}

/// Collects steps and transitions, then validates them into a [`StepGraph`].
#[derive(Default)]
pub struct GraphBuilder {
    steps: Vec<Arc<dyn Step>>,
    transitions: Vec<(String, Transition)>,
    entry: Option<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn transition(mut self, from: impl Into<String>, transition: Transition) -> Self {
        self.transitions.push((from.into(), transition));
        self
    }

    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn build(self) -> Result<StepGraph, GraphError> {
        let entry = self.entry.ok_or(GraphError::MissingEntry)?;

        let mut steps: HashMap<String, Arc<dyn Step>> = HashMap::new();
        for step in self.steps {
            let name = step.name().to_string();
            if steps.insert(name.clone(), step).is_some() {
                return Err(GraphError::DuplicateStep(name));
            }
        }
        if !steps.contains_key(&entry) {
            return Err(GraphError::UnknownEntry(entry));
        }

        let mut transitions: HashMap<String, Transition> = HashMap::new();
        for (from, transition) in self.transitions {
            if !steps.contains_key(&from) {
                return Err(GraphError::OrphanTransition(from));
            }
            for target in transition.targets() {
                if let Target::Step(to) = target {
                    if !steps.contains_key(to) {
                        return Err(GraphError::UnknownTarget {
                            from: from.clone(),
                            to: to.clone(),
                        });
                    }
                }
            }
            transitions.insert(from, transition);
        }

        let mut names: Vec<&String> = steps.keys().collect();
        names.sort();
        if let Some(missing) = names.into_iter().find(|n| !transitions.contains_key(*n)) {
            return Err(GraphError::MissingTransition(missing.clone()));
        }

        Ok(StepGraph {
            steps,
            transitions,
            entry,
        })
    }
}

/// A validated step graph.
pub struct StepGraph {
    steps: HashMap<String, Arc<dyn Step>>,
    transitions: HashMap<String, Transition>,
    entry: String,
}

impl StepGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Ceiling on step executions for a run with the given attempt bound.
    ///
    /// Each attempt can visit every step at most once, plus one pass for the
    /// steps ahead of the loop.
    pub fn step_ceiling(&self, max_attempts: u32) -> usize {
        self.steps.len() * (max_attempts as usize + 1)
    }

    /// Walk the graph from the entry step until a transition answers `Done`.
    ///
    /// Never fails. A run that exceeds the step ceiling, or reaches a step
    /// the graph does not know, gets a `Graph` error recorded and stops.
    /// Returns step names in the order they ran.
    pub async fn execute(
        &self,
        state: &mut RunState,
        interceptors: &[Arc<dyn StepInterceptor>],
    ) -> Vec<String> {
        let start = Instant::now();
        let ceiling = self.step_ceiling(state.max_attempts());
        let mut visited: Vec<String> = Vec::new();
        let mut current = self.entry.clone();

        for i in interceptors {
            i.run_started(state);
        }

        loop {
            if visited.len() >= ceiling {
                error!(run_id = state.run_id(), ceiling, "Step ceiling reached, stopping run");
                state.push_error(
                    ErrorKind::Graph,
                    format!("Step ceiling of {} reached", ceiling),
                );
                break;
            }

            let (Some(step), Some(transition)) =
                (self.steps.get(&current), self.transitions.get(&current))
            else {
                error!(run_id = state.run_id(), step = %current, "Step not found in graph");
                state.push_error(ErrorKind::Graph, format!("Unknown step: {}", current));
                break;
            };

            for i in interceptors {
                i.before(&current, state);
            }
            let step_start = Instant::now();
            step.run(state).await;
            let elapsed = step_start.elapsed();
            for i in interceptors {
                i.after(&current, state, elapsed);
            }
            visited.push(current.clone());

            match transition.next(state) {
                Target::Done => {
                    debug!(run_id = state.run_id(), step = %current, "Reached terminal transition");
                    break;
                }
                Target::Step(next) => current = next.clone(),
            }
        }

        info!(
            run_id = state.run_id(),
            steps = visited.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Graph execution complete"
        );

        for i in interceptors {
            i.run_finished(state);
        }
        visited
    }
}
