use crate::error::PollError;
use crate::poller::{ConnectionState, StateObserver};
use std::sync::mpsc::{Receiver, Sender, channel};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    State(ConnectionState),
    Temperatures { cpu: f32, gpu: f32 },
    Fault(String),
}

/// Poller side of the status channel. Sending never blocks.
pub struct StatusPublisher {
    sender: Sender<StatusEvent>,
}

pub fn status_channel() -> (StatusPublisher, Receiver<StatusEvent>) {
    let (sender, receiver) = channel();
    (StatusPublisher { sender }, receiver)
}

impl StatusPublisher {
    fn send(&self, event: StatusEvent) {
        // Consumer gone means nobody is displaying status any more.
        if self.sender.send(event).is_err() {
            debug!("status consumer disconnected");
        }
    }
}

impl StateObserver for StatusPublisher {
    fn on_state_changed(&mut self, state: ConnectionState) {
        self.send(StatusEvent::State(state));
    }

    fn on_debug_temperatures(&mut self, cpu: f32, gpu: f32) {
        self.send(StatusEvent::Temperatures { cpu, gpu });
    }

    fn on_fault(&mut self, fault: &PollError) {
        if matches!(fault, PollError::SensorUnavailable(_)) {
            return;
        }
        self.send(StatusEvent::Fault(fault.to_string()));
    }
}

/// Latest status as a tray or other front end would show it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatusBoard {
    pub state: ConnectionState,
    pub temperatures: Option<(f32, f32)>,
    pub last_fault: Option<String>,
}

impl StatusBoard {
    pub fn apply(&mut self, event: StatusEvent) {
        match event {
            StatusEvent::State(state) => {
                let label = match state {
                    ConnectionState::Connected => "Connected",
                    ConnectionState::Disconnected => "Not Connected",
                };
                info!(status = label, "display status");
                if state == ConnectionState::Connected {
                    self.last_fault = None;
                }
                self.state = state;
            }
            StatusEvent::Temperatures { cpu, gpu } => {
                debug!("CPU Temp: {cpu:.1}°C, GPU Temp: {gpu:.1}°C");
                self.temperatures = Some((cpu, gpu));
            }
            StatusEvent::Fault(fault) => {
                warn!(%fault, "display status degraded");
                self.last_fault = Some(fault);
            }
        }
    }

    /// Applies events until every publisher is dropped.
    pub fn follow(mut self, events: Receiver<StatusEvent>) -> Self {
        for event in events {
            self.apply(event);
        }
        self
    }
}
