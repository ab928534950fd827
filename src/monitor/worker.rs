// SPDX-License-Identifier: GPL-3.0-only
//! Per-display worker
//!
//! Every display gets one worker task that owns its [`DisplayHandle`] and
//! its value records. Requests are handled strictly one after another, so
//! two transactions never overlap on the same bus. The blocking DDC/CI work
//! itself runs on tokio's blocking pool, which keeps a slow or retrying
//! monitor from stalling the others.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::command::Command;
use crate::control::{AudioFeedback, ControlSession, OsdSink, SessionSettings};
use crate::error::{AppError, Result};
use crate::quantize::Direction;
use crate::store::{MemoryStore, PollingMode};

use super::backend::DisplayId;
use super::handle::DisplayHandle;

/// A user action against one display
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    ToggleMute,
    StepVolume {
        direction: Direction,
        small_increment: bool,
    },
    StepBrightness {
        direction: Direction,
        small_increment: bool,
    },
    SetValue {
        command: Command,
        value: u16,
    },
    Sync(Command),
    SetPolling {
        command: Command,
        mode: PollingMode,
        count: u16,
    },
    HideOsd,
}

impl Action {
    /// Actions the user sees an OSD for; the monitor's own OSD is hidden first
    fn shows_osd(&self) -> bool {
        matches!(
            self,
            Action::ToggleMute | Action::StepVolume { .. } | Action::StepBrightness { .. }
        )
    }
}

/// What the host should draw after a control change
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OsdEvent {
    pub display_id: DisplayId,
    pub command: Command,
    pub value: u16,
    pub max: u16,
    pub round_chiclet: bool,
}

/// Forwards OSD requests of one display to the UI channel
struct ChannelOsd<'a> {
    display_id: &'a DisplayId,
    events: &'a mpsc::UnboundedSender<OsdEvent>,
}

impl OsdSink for ChannelOsd<'_> {
    fn show_osd(&mut self, command: Command, value: u16, max: u16, round_chiclet: bool) {
        let event = OsdEvent {
            display_id: self.display_id.clone(),
            command,
            value,
            max,
            round_chiclet,
        };
        if self.events.send(event).is_err() {
            debug!("no OSD listener, dropping event");
        }
    }
}

enum Request {
    Run(Action, oneshot::Sender<Result<()>>),
    Snapshot(oneshot::Sender<MemoryStore>),
}

/// Everything a worker owns
pub struct WorkerState {
    pub handle: DisplayHandle,
    pub store: MemoryStore,
    pub settings: SessionSettings,
    pub feedback: Arc<dyn AudioFeedback + Send + Sync>,
    pub events: mpsc::UnboundedSender<OsdEvent>,
}

impl WorkerState {
    fn run(&mut self, action: Action) -> Result<()> {
        let id = self.handle.id().clone();
        let mut osd = ChannelOsd {
            display_id: &id,
            events: &self.events,
        };
        let mut session = ControlSession::new(
            &mut self.handle,
            &mut self.store,
            &mut osd,
            self.feedback.as_ref(),
            &self.settings,
        );

        if action.shows_osd() {
            let _ = session.hide_display_osd();
        }

        match action {
            Action::ToggleMute => session.toggle_mute(),
            Action::StepVolume {
                direction,
                small_increment,
            } => session.step_volume(direction, small_increment),
            Action::StepBrightness {
                direction,
                small_increment,
            } => session.step_brightness(direction, small_increment),
            Action::SetValue { command, value } => session.set_value(command, value),
            Action::Sync(command) => session.sync_from_hardware(command).map(|_| ()),
            Action::SetPolling {
                command,
                mode,
                count,
            } => {
                session.set_polling(command, mode, count);
                Ok(())
            }
            Action::HideOsd => {
                let diagnostic = session.hide_display_osd();
                debug!(display_id = %id, ?diagnostic, "hide OSD requested");
                Ok(())
            }
        }
    }
}

/// Sending side of a worker
#[derive(Clone, Debug)]
pub struct WorkerHandle {
    id: DisplayId,
    tx: mpsc::UnboundedSender<Request>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::Run(action, _) => write!(f, "Run({:?})", action),
            Request::Snapshot(_) => write!(f, "Snapshot"),
        }
    }
}

impl WorkerHandle {
    pub fn id(&self) -> &DisplayId {
        &self.id
    }

    /// Queue `action` and wait for its outcome
    pub async fn run(&self, action: Action) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Run(action, reply))
            .map_err(|_| AppError::WorkerGone(self.id.clone()))?;
        rx.await.map_err(|_| AppError::WorkerGone(self.id.clone()))?
    }

    /// Copy of the worker's value records
    pub async fn snapshot(&self) -> Result<MemoryStore> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Snapshot(reply))
            .map_err(|_| AppError::WorkerGone(self.id.clone()))?;
        rx.await.map_err(|_| AppError::WorkerGone(self.id.clone()))
    }
}

/// Start the worker for one display
pub fn spawn(state: WorkerState) -> WorkerHandle {
    let id = state.handle.id().clone();
    let (tx, mut rx) = mpsc::unbounded_channel::<Request>();

    let task_id = id.clone();
    tokio::spawn(async move {
        let mut state = Some(state);

        while let Some(request) = rx.recv().await {
            let Some(mut current) = state.take() else {
                break;
            };

            match request {
                Request::Run(action, reply) => {
                    // Ownership moves to the blocking pool and back, no lock needed
                    let joined = tokio::task::spawn_blocking(move || {
                        let result = current.run(action);
                        (current, result)
                    })
                    .await;

                    match joined {
                        Ok((back, result)) => {
                            state = Some(back);
                            let _ = reply.send(result);
                        }
                        Err(e) => {
                            error!(display_id = %task_id, "worker task failed: {e}");
                            let _ = reply.send(Err(AppError::TaskJoin(e.to_string())));
                            break;
                        }
                    }
                }
                Request::Snapshot(reply) => {
                    let _ = reply.send(current.store.clone());
                    state = Some(current);
                }
            }
        }

        debug!(display_id = %task_id, "worker stopped");
    });

    WorkerHandle { id, tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::NoFeedback;
    use crate::monitor::DisplayBackend;
    use crate::protocols::direct::{DirectSettings, DirectTransport};
    use crate::store::ValueStore;
    use crate::testing::MockChannel;

    fn worker(channel: &MockChannel) -> (WorkerHandle, mpsc::UnboundedReceiver<OsdEvent>) {
        let backend = DisplayBackend::Direct(DirectTransport::new(
            Box::new(channel.clone()),
            DirectSettings::default(),
        ));
        let (events, rx) = mpsc::unbounded_channel();
        let state = WorkerState {
            handle: DisplayHandle::new("ddc-w".to_string(), "Worker".to_string(), backend),
            store: MemoryStore::new(),
            settings: SessionSettings::default(),
            feedback: Arc::new(NoFeedback),
            events,
        };
        (spawn(state), rx)
    }

    #[tokio::test]
    async fn test_actions_run_in_order() {
        let channel = MockChannel::default();
        channel.set_register(0x62, 40, 100);
        let (worker, mut events) = worker(&channel);

        worker.run(Action::Sync(Command::AudioSpeakerVolume)).await.unwrap();
        worker
            .run(Action::StepVolume {
                direction: Direction::Up,
                small_increment: false,
            })
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.display_id, "ddc-w");
        assert_eq!(event.command, Command::AudioSpeakerVolume);
        assert_eq!(event.value, 44);

        let snapshot = worker.snapshot().await.unwrap();
        assert_eq!(snapshot.get(&"ddc-w".to_string(), Command::AudioSpeakerVolume), 44);
    }

    #[tokio::test]
    async fn test_errors_are_returned_to_caller() {
        let channel = MockChannel::default();
        let (worker, _events) = worker(&channel);

        let err = worker.run(Action::Sync(Command::Contrast)).await.unwrap_err();
        assert!(err.is_unsupported());

        // The worker keeps serving after a failed action
        worker
            .run(Action::SetValue {
                command: Command::Contrast,
                value: 30,
            })
            .await
            .unwrap();
        assert_eq!(channel.value(0x12), Some(30));
    }
}
