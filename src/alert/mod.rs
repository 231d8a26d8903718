//! Alert debounce state machine.
//!
//! Per-frame detection verdicts go in, side-effect commands come out. The
//! machine never performs side effects itself; a `CommandDispatcher` does.
//!
//! Alarm and notification are tracked by independent flags. Within one
//! incident the alarm starts once and the notification is sent once, no matter
//! how many consecutive frames report fire.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub mod dispatch;

pub use dispatch::{
    AlarmSink, CommandDispatcher, LogAlarm, LogNotifier, Notifier, NotifyConfig,
    RecordingDispatcher, ThreadDispatcher,
};

pub const NOTIFICATION_MESSAGE: &str = "Warning: A Fire Incident Has Been Detected!";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AlertState {
    pub alarm_active: bool,
    pub notified: bool,
    /// Total detected frames observed. Informational only; never reset.
    pub fire_streak: u64,
}

/// How many detected frames it takes to confirm an incident.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmingPolicy {
    #[default]
    Immediate,
    /// N consecutive detected frames. `Streak(0)` and `Streak(1)` behave like
    /// `Immediate`.
    Streak(u32),
}

impl ArmingPolicy {
    fn required(&self) -> u32 {
        match self {
            ArmingPolicy::Immediate => 1,
            ArmingPolicy::Streak(n) => (*n).max(1),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPolicy {
    pub arming: ArmingPolicy,
    /// Clear `notified` on reset so the next incident notifies again.
    pub rearm_notification_on_reset: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AlertCommand {
    AlarmStart,
    AlarmStop,
    SendNotification { message: String },
}

impl AlertCommand {
    pub fn notification() -> Self {
        AlertCommand::SendNotification {
            message: NOTIFICATION_MESSAGE.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AlertStateMachine {
    policy: AlertPolicy,
    state: AlertState,
    consecutive: u32,
    confirmed: bool,
}

impl AlertStateMachine {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    /// Feed one frame verdict. Returns the commands the verdict triggers,
    /// `AlarmStart` before `SendNotification`.
    pub fn observe(&mut self, detected: bool) -> Vec<AlertCommand> {
        if !detected {
            self.consecutive = 0;
            return Vec::new();
        }

        self.state.fire_streak = self.state.fire_streak.saturating_add(1);
        self.consecutive = self.consecutive.saturating_add(1);
        if !self.confirmed {
            if self.consecutive < self.policy.arming.required() {
                log::debug!(
                    "fire seen on {}/{} consecutive frames, not yet confirmed",
                    self.consecutive,
                    self.policy.arming.required()
                );
                return Vec::new();
            }
            self.confirmed = true;
        }

        let mut commands = Vec::new();
        if !self.state.alarm_active {
            self.state.alarm_active = true;
            commands.push(AlertCommand::AlarmStart);
        }
        if !self.state.notified {
            self.state.notified = true;
            commands.push(AlertCommand::notification());
        }
        commands
    }

    /// End the current incident. Re-arms the alarm; re-arms the notification
    /// only when the policy says so.
    pub fn reset(&mut self) -> Vec<AlertCommand> {
        let mut commands = Vec::new();
        if self.state.alarm_active {
            commands.push(AlertCommand::AlarmStop);
        }
        self.state.alarm_active = false;
        if self.policy.rearm_notification_on_reset {
            self.state.notified = false;
        }
        self.consecutive = 0;
        self.confirmed = false;
        commands
    }

    /// Delivery of `SendNotification` failed; allow a retry on the next
    /// detected frame.
    pub fn notification_failed(&mut self) {
        self.state.notified = false;
    }
}

/// Shared, lock-protected state machine. Cloning shares the same state.
#[derive(Clone, Debug, Default)]
pub struct AlertHandle {
    inner: Arc<Mutex<AlertStateMachine>>,
}

impl AlertHandle {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AlertStateMachine::new(policy))),
        }
    }

    // Flags stay consistent even if a holder panicked, so poison is ignored.
    fn lock(&self) -> MutexGuard<'_, AlertStateMachine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn observe(&self, detected: bool) -> Vec<AlertCommand> {
        self.lock().observe(detected)
    }

    pub fn reset(&self) -> Vec<AlertCommand> {
        self.lock().reset()
    }

    pub fn notification_failed(&self) {
        self.lock().notification_failed();
    }

    pub fn state(&self) -> AlertState {
        self.lock().state()
    }

    pub fn policy(&self) -> AlertPolicy {
        self.lock().policy()
    }
}
