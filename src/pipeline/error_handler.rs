use anyhow::Result;
use log::warn;

use super::error::PipelineError;

/// Pick the one error the caller sees. The sink's error wins (it is what triggered the
/// shutdown); otherwise the first stage failure, e.g. a worker that panicked and silently
/// shortened the result stream.
pub fn check_for_first_error<A>(sink: Result<A>, stages: Result<(), PipelineError>) -> Result<A> {
    match (sink, stages) {
        (Err(e), Err(stage_err)) => {
            if !stage_err.is_cancellation() {
                warn!("also failed during shutdown: {stage_err}");
            }
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(_), Err(stage_err)) => Err(stage_err.into()),
        (Ok(agg), Ok(())) => Ok(agg),
    }
}
