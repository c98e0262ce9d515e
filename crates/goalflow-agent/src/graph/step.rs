use futures::future::BoxFuture;

use crate::state::RunState;

/// One unit of work in a step graph.
///
/// Steps never fail: anything that goes wrong is recorded on the state's
/// error log and the graph carries on.
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    fn run<'a>(&'a self, state: &'a mut RunState) -> BoxFuture<'a, ()>;
}
