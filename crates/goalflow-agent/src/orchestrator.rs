use std::sync::Arc;

use goalflow_core::config::AppConfig;
use goalflow_core::traits::Generator;
use goalflow_core::types::RunContext;
use goalflow_tools::HandlerRegistry;

use crate::graph::{GraphError, StepGraph, StepInterceptor};
use crate::state::{RunOutcome, RunState, DEFAULT_MAX_ATTEMPTS};
use crate::steps::DEFAULT_SCOPE_HINT;
use crate::workflow::{build_workflow, WorkflowDeps};

/// Runs goals through the workflow graph.
///
/// Holds no per-run state, so one orchestrator can serve concurrent runs.
pub struct Orchestrator {
    graph: StepGraph,
    interceptors: Vec<Arc<dyn StepInterceptor>>,
    max_attempts: u32,
}

impl Orchestrator {
    pub fn builder(registry: HandlerRegistry) -> OrchestratorBuilder {
        OrchestratorBuilder::new(Arc::new(registry))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run a goal on behalf of an optional user.
    pub async fn run(&self, goal: &str, user_id: Option<&str>) -> RunOutcome {
        self.run_with_context(goal, RunContext::for_user(user_id))
            .await
    }

    /// Run a goal with a pre-seeded context.
    pub async fn run_with_context(&self, goal: &str, context: RunContext) -> RunOutcome {
        let state = RunState::new(goal, self.max_attempts).with_context(context);
        self.run_state(state).await
    }

    /// Drive an already-built state to completion.
    pub async fn run_state(&self, mut state: RunState) -> RunOutcome {
        let steps = self.graph.execute(&mut state, &self.interceptors).await;
        state.into_outcome(steps)
    }
}

/// Assembles an [`Orchestrator`] from its collaborators.
pub struct OrchestratorBuilder {
    registry: Arc<HandlerRegistry>,
    generator: Option<Arc<dyn Generator>>,
    interceptors: Vec<Arc<dyn StepInterceptor>>,
    max_attempts: u32,
    temperature: f32,
    scope_hint: String,
}

impl OrchestratorBuilder {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            generator: None,
            interceptors: Vec::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            temperature: 0.2,
            scope_hint: DEFAULT_SCOPE_HINT.to_string(),
        }
    }

    /// Take attempt bound, temperature and lookup scope from config.
    pub fn with_config(self, config: &AppConfig) -> Self {
        self.max_attempts(config.run.max_attempts)
            .temperature(config.model.temperature)
            .scope_hint(config.search.scope_hint.clone())
    }

    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn maybe_generator(mut self, generator: Option<Arc<dyn Generator>>) -> Self {
        self.generator = generator;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn scope_hint(mut self, hint: impl Into<String>) -> Self {
        self.scope_hint = hint.into();
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn StepInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> Result<Orchestrator, GraphError> {
        let graph = build_workflow(WorkflowDeps {
            generator: self.generator,
            registry: self.registry,
            temperature: self.temperature,
            scope_hint: self.scope_hint,
        })?;
        Ok(Orchestrator {
            graph,
            interceptors: self.interceptors,
            max_attempts: self.max_attempts,
        })
    }
}
