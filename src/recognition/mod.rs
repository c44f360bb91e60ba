//! Recognition workflow.
//!
//! Turns frames from the normal-mode capture device into detect and
//! recognize calls against the remote service, serialized so that no two
//! attempts overlap, and reports each outcome to the presenter.

mod orchestrator;
mod state;

pub use orchestrator::RecognitionOrchestrator;
pub use state::{RecognitionStats, TriggerOutcome, WorkflowState};
