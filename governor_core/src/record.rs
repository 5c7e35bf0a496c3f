//! Per-cycle output records and the stream that carries them.

/// Actuator read-back for one cycle.
///
/// `ok` is false when the goal write or the position read failed this
/// cycle; `present_position` then holds the last value the bus did
/// deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorStatus {
    pub present_position: u16,
    pub ok: bool,
}

/// One completed control cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleRecord {
    /// Milliseconds since the run began, from the loop's monotonic clock.
    pub timestamp_ms: u64,
    pub rpm: f64,
    pub pressure_bar: f64,
    pub flow_rate: f64,
    /// Goal position commanded this cycle.
    pub goal_position: u16,
    pub actuator: ActuatorStatus,
    /// Mean absolute speed error so far, including this cycle.
    pub average_error: f64,
}

pub type RecordSender = crossbeam_channel::Sender<CycleRecord>;
pub type RecordReceiver = crossbeam_channel::Receiver<CycleRecord>;

/// Bounded stream of cycle records.
///
/// The control loop sends without ever blocking: when the consumer
/// falls behind, fresh records are dropped. A consumer that goes away
/// entirely is ignored. Consumers must treat the stream as
/// incremental, not as a buffered transcript of the whole run.
#[must_use]
pub fn record_channel(capacity: usize) -> (RecordSender, RecordReceiver) {
    crossbeam_channel::bounded(capacity)
}
