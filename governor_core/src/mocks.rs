//! In-memory doubles for exercising the loop without a rig.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use governor_traits::{Servo, TelemetrySource};

/// Telemetry source that replays a fixed set of lines, then goes quiet.
pub struct ScriptedTelemetry {
    lines: VecDeque<Vec<u8>>,
}

impl ScriptedTelemetry {
    pub fn new<I, L>(lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Vec<u8>>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl TelemetrySource for ScriptedTelemetry {
    fn poll_line(
        &mut self,
    ) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.lines.pop_front())
    }
}

/// Telemetry source whose transport fails after a number of lines.
pub struct FailingTelemetry {
    healthy_polls: usize,
}

impl FailingTelemetry {
    pub fn new(healthy_polls: usize) -> Self {
        Self { healthy_polls }
    }
}

impl TelemetrySource for FailingTelemetry {
    fn poll_line(
        &mut self,
    ) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error + Send + Sync>> {
        if self.healthy_polls == 0 {
            return Err("telemetry transport lost".to_string().into());
        }
        self.healthy_polls -= 1;
        Ok(None)
    }
}

/// Every servo call a double observed, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoCall {
    Torque(bool),
    Goal(u16),
    ReadPresent,
}

/// Servo double that records calls through a shared handle and can fail
/// selected operations on demand.
///
/// Successful goal writes move the horn instantly, so a following read
/// returns the commanded position.
pub struct RecordingServo {
    calls: Arc<Mutex<Vec<ServoCall>>>,
    present: u16,
    pub fail_torque: bool,
    pub fail_writes: bool,
    pub fail_reads: bool,
}

impl RecordingServo {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            present: 512,
            fail_torque: false,
            fail_writes: false,
            fail_reads: false,
        }
    }

    /// Call-log handle that stays valid after the servo moves into a
    /// governor.
    pub fn call_log(&self) -> Arc<Mutex<Vec<ServoCall>>> {
        Arc::clone(&self.calls)
    }

    #[must_use]
    pub fn with_present(mut self, position: u16) -> Self {
        self.present = position;
        self
    }

    fn log(&self, call: ServoCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl Default for RecordingServo {
    fn default() -> Self {
        Self::new()
    }
}

impl Servo for RecordingServo {
    fn set_torque(
        &mut self,
        enabled: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.log(ServoCall::Torque(enabled));
        if self.fail_torque {
            return Err("injected torque failure".to_string().into());
        }
        Ok(())
    }

    fn write_goal_position(
        &mut self,
        position: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.log(ServoCall::Goal(position));
        if self.fail_writes {
            return Err("injected write failure".to_string().into());
        }
        self.present = position;
        Ok(())
    }

    fn read_present_position(
        &mut self,
    ) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        self.log(ServoCall::ReadPresent);
        if self.fail_reads {
            return Err("injected read timeout".to_string().into());
        }
        Ok(self.present)
    }
}
