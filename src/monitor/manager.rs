// SPDX-License-Identifier: GPL-3.0-only
//! Centralized display manager
//!
//! Keeps one worker per registered display and routes actions to it. Since
//! each worker exclusively owns its display's transport, only one DDC/CI
//! transaction is ever in flight per physical monitor, while different
//! monitors are driven concurrently.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ddc_osd_control::config::Config;
//! use ddc_osd_control::control::NoFeedback;
//! use ddc_osd_control::monitor::{Action, DisplayManager};
//!
//! # async fn example(handle: ddc_osd_control::monitor::DisplayHandle) {
//! let (manager, mut osd_events) = DisplayManager::new(Config::default(), Arc::new(NoFeedback));
//! manager.register(handle, Default::default()).await;
//!
//! manager.run("display-123", Action::ToggleMute).await.ok();
//! while let Ok(event) = osd_events.try_recv() {
//!     println!("{:?}", event);
//! }
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};

use crate::config::Config;
use crate::control::{AudioFeedback, SessionSettings};
use crate::error::{AppError, Result};
use crate::store::MemoryStore;

use super::backend::DisplayId;
use super::handle::DisplayHandle;
use super::worker::{self, Action, OsdEvent, WorkerHandle, WorkerState};

/// Shared display manager instance
///
/// Cheap to clone; all clones see the same set of workers.
#[derive(Clone)]
pub struct DisplayManager {
    workers: Arc<RwLock<HashMap<DisplayId, WorkerHandle>>>,
    config: Arc<Config>,
    feedback: Arc<dyn AudioFeedback + Send + Sync>,
    events: mpsc::UnboundedSender<OsdEvent>,
}

impl DisplayManager {
    /// Create a manager and the receiving end of its OSD events
    pub fn new(
        config: Config,
        feedback: Arc<dyn AudioFeedback + Send + Sync>,
    ) -> (Self, mpsc::UnboundedReceiver<OsdEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let manager = Self {
            workers: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
            feedback,
            events,
        };
        (manager, rx)
    }

    /// Register a display and start its worker
    ///
    /// `store` holds the persisted records of this display. A display that is
    /// already registered keeps its existing worker.
    pub async fn register(&self, handle: DisplayHandle, store: MemoryStore) {
        let id = handle.id().clone();
        let mut workers = self.workers.write().await;

        if workers.contains_key(&id) {
            debug!("Display {} already registered", id);
            return;
        }

        info!(
            "Display {} ({}) added to manager, {} transport",
            id,
            handle.name(),
            handle.backend().kind()
        );
        let state = WorkerState {
            settings: SessionSettings::from_config(&self.config, &id),
            handle,
            store,
            feedback: self.feedback.clone(),
            events: self.events.clone(),
        };
        workers.insert(id, worker::spawn(state));
    }

    /// Remove a display; its final records are returned for persistence
    ///
    /// An action already queued for the display still completes first.
    pub async fn unregister(&self, id: &str) -> Result<MemoryStore> {
        let worker = self
            .workers
            .write()
            .await
            .remove(id)
            .ok_or_else(|| AppError::DisplayNotFound(id.to_string()))?;
        info!("Display {} removed from manager", id);
        worker.snapshot().await
    }

    /// Run `action` on display `id` and wait for it
    pub async fn run(&self, id: &str, action: Action) -> Result<()> {
        let worker = self
            .workers
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::DisplayNotFound(id.to_string()))?;
        worker.run(action).await
    }

    /// Records of every display, merged into one store
    pub async fn snapshot(&self) -> Result<MemoryStore> {
        let workers: Vec<_> = self.workers.read().await.values().cloned().collect();
        let mut merged = MemoryStore::new();
        for worker in workers {
            merged.merge(worker.snapshot().await?);
        }
        Ok(merged)
    }

    /// Get all display IDs currently managed
    pub async fn get_all_ids(&self) -> Vec<DisplayId> {
        let workers = self.workers.read().await;
        workers.keys().cloned().collect()
    }

    /// Get count of managed displays
    pub async fn count(&self) -> usize {
        self.workers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::control::NoFeedback;
    use crate::monitor::DisplayBackend;
    use crate::protocols::direct::{DirectSettings, DirectTransport};
    use crate::quantize::Direction;
    use crate::store::ValueStore;
    use crate::testing::MockChannel;

    fn handle(id: &str, channel: &MockChannel) -> DisplayHandle {
        let backend = DisplayBackend::Direct(DirectTransport::new(
            Box::new(channel.clone()),
            DirectSettings::default(),
        ));
        DisplayHandle::new(id.to_string(), id.to_uppercase(), backend)
    }

    #[tokio::test]
    async fn test_register_and_route() {
        let (manager, mut events) = DisplayManager::new(Config::default(), Arc::new(NoFeedback));
        let left = MockChannel::default();
        let right = MockChannel::default();

        let mut seeded = MemoryStore::new();
        seeded.set(&"left".to_string(), Command::Brightness, 40);
        manager.register(handle("left", &left), seeded).await;
        manager.register(handle("right", &right), MemoryStore::new()).await;
        assert_eq!(manager.count().await, 2);

        let step = Action::StepBrightness {
            direction: Direction::Up,
            small_increment: false,
        };
        manager.run("left", step).await.unwrap();

        assert_eq!(left.value(0x10), Some(44));
        assert!(right.writes().is_empty());
        assert_eq!(events.recv().await.unwrap().display_id, "left");

        let snapshot = manager.snapshot().await.unwrap();
        assert_eq!(snapshot.get(&"left".to_string(), Command::Brightness), 44);
    }

    #[tokio::test]
    async fn test_mute_round_trip_with_syncs() {
        let (manager, _events) = DisplayManager::new(Config::default(), Arc::new(NoFeedback));
        let channel = MockChannel::default();
        channel.set_register(0x62, 40, 100);
        channel.set_register(0x8D, 2, 2);
        manager.register(handle("desk", &channel), MemoryStore::new()).await;

        // The CLI syncs volume and mute before every mute toggle
        for _ in 0..2 {
            for command in [Command::AudioSpeakerVolume, Command::AudioMuteScreenBlank] {
                manager.run("desk", Action::Sync(command)).await.unwrap();
            }
            manager.run("desk", Action::ToggleMute).await.unwrap();
        }

        assert_eq!(channel.value(0x62), Some(40));
        assert_eq!(channel.value(0x8D), Some(2));
    }

    #[tokio::test]
    async fn test_volume_step_after_mute_starts_from_stored_level() {
        let (manager, _events) = DisplayManager::new(Config::default(), Arc::new(NoFeedback));
        let channel = MockChannel::default();
        channel.set_register(0x62, 40, 100);
        channel.set_register(0x8D, 2, 2);
        manager.register(handle("desk", &channel), MemoryStore::new()).await;

        let syncs = [Command::AudioSpeakerVolume, Command::AudioMuteScreenBlank];
        for command in syncs {
            manager.run("desk", Action::Sync(command)).await.unwrap();
        }
        manager.run("desk", Action::ToggleMute).await.unwrap();

        for command in syncs {
            manager.run("desk", Action::Sync(command)).await.unwrap();
        }
        let step = Action::StepVolume {
            direction: Direction::Up,
            small_increment: false,
        };
        manager.run("desk", step).await.unwrap();

        assert_eq!(channel.value(0x62), Some(44));
        assert_eq!(channel.value(0x8D), Some(2));
    }

    #[tokio::test]
    async fn test_unknown_display() {
        let (manager, _events) = DisplayManager::new(Config::default(), Arc::new(NoFeedback));
        let err = manager.run("missing", Action::ToggleMute).await.unwrap_err();
        assert!(matches!(err, AppError::DisplayNotFound(_)));
    }

    #[tokio::test]
    async fn test_unregister_returns_records() {
        let (manager, _events) = DisplayManager::new(Config::default(), Arc::new(NoFeedback));
        let channel = MockChannel::default();
        manager.register(handle("only", &channel), MemoryStore::new()).await;

        manager
            .run(
                "only",
                Action::SetValue {
                    command: Command::AudioSpeakerVolume,
                    value: 25,
                },
            )
            .await
            .unwrap();

        let records = manager.unregister("only").await.unwrap();
        assert_eq!(records.get(&"only".to_string(), Command::AudioSpeakerVolume), 25);
        assert!(manager.get_all_ids().await.is_empty());
    }
}
