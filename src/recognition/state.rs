//! Workflow states and per-trigger outcomes.

/// Where the recognition workflow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowState {
    /// No device session.
    #[default]
    Idle,
    /// Acquisition in progress.
    DeviceStarting,
    /// Device live, nothing in flight.
    DeviceActive,
    /// Waiting on the detection call.
    Detecting,
    /// Waiting on the recognition call.
    Recognizing,
    /// An outcome is on screen.
    Displaying,
    /// The last attempt failed against the service.
    Error,
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkflowState::Idle => "idle",
            WorkflowState::DeviceStarting => "device-starting",
            WorkflowState::DeviceActive => "device-active",
            WorkflowState::Detecting => "detecting",
            WorkflowState::Recognizing => "recognizing",
            WorkflowState::Displaying => "displaying",
            WorkflowState::Error => "error",
        };
        f.write_str(name)
    }
}

/// How one `trigger_recognition` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Another recognition was in flight; this trigger was dropped.
    Busy,
    /// No frame could be captured.
    CaptureFailed,
    /// The service found no face.
    NoFace,
    Recognized,
    NotRecognized,
    /// A remote call failed.
    Failed,
    /// The device session changed while the call was in flight.
    Discarded,
}

/// Running totals of trigger outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecognitionStats {
    pub attempts: u64,
    pub recognized: u64,
    pub not_recognized: u64,
    pub no_face: u64,
    pub capture_failures: u64,
    pub failures: u64,
    pub dropped: u64,
    pub discarded: u64,
}

impl RecognitionStats {
    pub(crate) fn record(&mut self, outcome: TriggerOutcome) {
        match outcome {
            TriggerOutcome::Busy => {
                self.dropped += 1;
                return;
            }
            TriggerOutcome::CaptureFailed => self.capture_failures += 1,
            TriggerOutcome::NoFace => self.no_face += 1,
            TriggerOutcome::Recognized => self.recognized += 1,
            TriggerOutcome::NotRecognized => self.not_recognized += 1,
            TriggerOutcome::Failed => self.failures += 1,
            TriggerOutcome::Discarded => self.discarded += 1,
        }
        self.attempts += 1;
    }
}
