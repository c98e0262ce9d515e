use futures::future::BoxFuture;
use tracing::debug;

use super::DECIDE;
use crate::graph::Step;
use crate::state::RunState;

/// Closes a cycle by counting it. The only place attempts move.
pub struct DecideStep;

impl Step for DecideStep {
    fn name(&self) -> &str {
        DECIDE
    }

    fn run<'a>(&'a self, state: &'a mut RunState) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            state.advance_attempt();
            debug!(
                run_id = state.run_id(),
                attempts = state.attempts(),
                max_attempts = state.max_attempts(),
                accepted = state.accepted(),
                "Cycle closed"
            );
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_one_attempt() {
        let mut state = RunState::new("goal", 3);
        DecideStep.run(&mut state).await;
        DecideStep.run(&mut state).await;
        assert_eq!(state.attempts(), 2);
    }
}
