//! Command execution.
//!
//! Dispatch is fire-and-forget: `dispatch` never blocks on delivery and never
//! reports failure to the caller. Failures are logged here, and a failed
//! notification re-arms the `notified` flag so the next detection retries.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::alert::{AlertCommand, AlertHandle};
use crate::error::DispatchError;

pub trait CommandDispatcher: Send + Sync {
    fn dispatch(&self, command: AlertCommand);
}

/// Audible alarm output.
pub trait AlarmSink: Send + Sync {
    fn start(&self) -> Result<(), DispatchError>;
    fn stop(&self) -> Result<(), DispatchError>;
}

/// Outbound incident notification channel.
pub trait Notifier: Send + Sync {
    fn send(&self, message: &str) -> Result<(), DispatchError>;
}

/// Alarm that only writes to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAlarm;

impl AlarmSink for LogAlarm {
    fn start(&self) -> Result<(), DispatchError> {
        log::warn!("alarm triggered (sound disabled)");
        Ok(())
    }

    fn stop(&self) -> Result<(), DispatchError> {
        log::info!("alarm stopped");
        Ok(())
    }
}

const PLACEHOLDER_PREFIX: &str = "Enter_";

/// Delivery settings for a notification channel.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct NotifyConfig {
    pub recipient: String,
    pub sender: String,
    pub password: String,
}

impl std::fmt::Debug for NotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyConfig")
            .field("recipient", &self.recipient)
            .field("sender", &self.sender)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl NotifyConfig {
    pub fn validate(&self) -> Result<(), DispatchError> {
        for (name, value) in [
            ("recipient", &self.recipient),
            ("sender", &self.sender),
            ("password", &self.password),
        ] {
            let value = value.trim();
            if value.is_empty() || value.starts_with(PLACEHOLDER_PREFIX) {
                return Err(DispatchError::Configuration(format!(
                    "notifier {} is not configured",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Notifier that validates its delivery settings and logs the message.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier {
    config: NotifyConfig,
}

impl LogNotifier {
    pub fn new(config: NotifyConfig) -> Self {
        Self { config }
    }
}

impl Notifier for LogNotifier {
    fn send(&self, message: &str) -> Result<(), DispatchError> {
        self.config.validate()?;
        log::info!(
            "notification to {} from {}: {}",
            self.config.recipient,
            self.config.sender,
            message
        );
        Ok(())
    }
}

/// Runs every command on its own named background thread.
pub struct ThreadDispatcher {
    alarm: Arc<dyn AlarmSink>,
    notifier: Arc<dyn Notifier>,
    alerts: AlertHandle,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadDispatcher {
    pub fn new(alarm: Arc<dyn AlarmSink>, notifier: Arc<dyn Notifier>, alerts: AlertHandle) -> Self {
        Self {
            alarm,
            notifier,
            alerts,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Block until every command dispatched so far has finished.
    pub fn wait(&self) {
        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for worker in workers {
            if worker.join().is_err() {
                log::error!("alert worker thread panicked");
            }
        }
    }
}

impl CommandDispatcher for ThreadDispatcher {
    fn dispatch(&self, command: AlertCommand) {
        let alarm = self.alarm.clone();
        let notifier = self.notifier.clone();
        let alerts = self.alerts.clone();
        let name = match &command {
            AlertCommand::AlarmStart | AlertCommand::AlarmStop => "firewatch-alarm",
            AlertCommand::SendNotification { .. } => "firewatch-notify",
        };
        let is_notification = matches!(command, AlertCommand::SendNotification { .. });
        let spawned = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || execute(command, alarm.as_ref(), notifier.as_ref(), &alerts));
        match spawned {
            Ok(worker) => self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(worker),
            Err(err) => {
                log::error!("failed to spawn {} thread: {}", name, err);
                if is_notification {
                    self.alerts.notification_failed();
                }
            }
        }
    }
}

/// Execute one command synchronously, absorbing any failure.
pub fn execute(
    command: AlertCommand,
    alarm: &dyn AlarmSink,
    notifier: &dyn Notifier,
    alerts: &AlertHandle,
) {
    match command {
        AlertCommand::AlarmStart => {
            // The alarm flag stays set even if the sink fails.
            if let Err(err) = alarm.start() {
                log::warn!("alarm start failed: {}", err);
            }
        }
        AlertCommand::AlarmStop => {
            if let Err(err) = alarm.stop() {
                log::warn!("alarm stop failed: {}", err);
            }
        }
        AlertCommand::SendNotification { message } => {
            if let Err(err) = notifier.send(&message) {
                log::warn!("notification not delivered: {}", err);
                alerts.notification_failed();
            }
        }
    }
}

/// Collects commands instead of executing them.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    commands: Mutex<Vec<AlertCommand>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<AlertCommand> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take(&self) -> Vec<AlertCommand> {
        std::mem::take(&mut *self.commands.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl CommandDispatcher for RecordingDispatcher {
    fn dispatch(&self, command: AlertCommand) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertPolicy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingAlarm {
        starts: AtomicUsize,
        fail: bool,
    }

    impl AlarmSink for CountingAlarm {
        fn start(&self) -> Result<(), DispatchError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DispatchError::Transient("no audio device".into()));
            }
            Ok(())
        }

        fn stop(&self) -> Result<(), DispatchError> {
            Ok(())
        }
    }

    fn configured() -> NotifyConfig {
        NotifyConfig {
            recipient: "ops@example.org".into(),
            sender: "camera@example.org".into(),
            password: "hunter2".into(),
        }
    }

    #[test]
    fn placeholder_settings_are_configuration_errors() {
        let mut cfg = configured();
        assert!(cfg.validate().is_ok());
        cfg.recipient = "Enter_Recipient_Email".into();
        assert!(matches!(cfg.validate(), Err(DispatchError::Configuration(_))));
        cfg.recipient = "ops@example.org".into();
        cfg.password = "  ".into();
        assert!(matches!(cfg.validate(), Err(DispatchError::Configuration(_))));
    }

    #[test]
    fn debug_output_hides_password() {
        let rendered = format!("{:?}", configured());
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn unconfigured_notifier_rearms_notification() {
        let alerts = AlertHandle::new(AlertPolicy::default());
        let commands = alerts.observe(true);
        let dispatcher = ThreadDispatcher::new(
            Arc::new(LogAlarm),
            Arc::new(LogNotifier::default()),
            alerts.clone(),
        );
        for command in commands {
            dispatcher.dispatch(command);
        }
        dispatcher.wait();
        let state = alerts.state();
        assert!(state.alarm_active);
        assert!(!state.notified);
    }

    #[test]
    fn failed_alarm_keeps_alarm_active() {
        let alerts = AlertHandle::new(AlertPolicy::default());
        let alarm = Arc::new(CountingAlarm {
            fail: true,
            ..CountingAlarm::default()
        });
        let dispatcher = ThreadDispatcher::new(
            alarm.clone(),
            Arc::new(LogNotifier::new(configured())),
            alerts.clone(),
        );
        for command in alerts.observe(true) {
            dispatcher.dispatch(command);
        }
        dispatcher.wait();
        assert_eq!(alarm.starts.load(Ordering::SeqCst), 1);
        let state = alerts.state();
        assert!(state.alarm_active);
        assert!(state.notified);
    }

    #[test]
    fn recording_dispatcher_keeps_order() {
        let rec = RecordingDispatcher::new();
        rec.dispatch(AlertCommand::AlarmStart);
        rec.dispatch(AlertCommand::AlarmStop);
        assert_eq!(rec.commands().len(), 2);
        assert_eq!(
            rec.take(),
            vec![AlertCommand::AlarmStart, AlertCommand::AlarmStop]
        );
        assert!(rec.commands().is_empty());
    }
}
