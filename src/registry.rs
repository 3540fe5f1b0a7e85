//! Camera registration and mover dispatch.
//!
//! The registry consumes camera lifecycle events from an explicit channel
//! (nothing here reaches into a process-wide event bus) and keeps one set
//! of tier movers per registered camera: for every subcategory, one mover
//! per adjacent tier pair of the effective chain plus a terminal mover for
//! the last tier. The expansion is pure bookkeeping; chains were already
//! validated at configuration load.

use crate::metadata_store::MetadataStore;
use crate::mover::TierMover;
use crate::tiers::{StorageContext, Subcategory, Tier};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Camera lifecycle notifications from the capture subsystem
#[derive(Debug, Clone)]
pub enum CameraEvent {
    Registered { camera: String },
    Removed { camera: String },
}

/// One mover binding produced by chain expansion
#[derive(Debug, Clone)]
pub struct MoverSpec {
    pub subcategory: Subcategory,
    pub source: Tier,
    /// `None` for the terminal tier of the chain
    pub destination: Option<Tier>,
}

/// Expand the effective chains into one mover spec per tier boundary,
/// including the terminal delete mover for each chain's last tier
pub fn mover_specs(context: &StorageContext) -> Vec<MoverSpec> {
    let mut specs = Vec::new();

    for subcategory in Subcategory::ALL {
        let tiers = context.chain(subcategory).tiers();
        for (index, tier) in tiers.iter().enumerate() {
            specs.push(MoverSpec {
                subcategory,
                source: tier.clone(),
                destination: tiers.get(index + 1).cloned(),
            });
        }
    }

    specs
}

struct CameraMovers {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Dispatches tier movers per registered camera and stops them on camera
/// removal or process shutdown
pub struct TierRegistry {
    context: Arc<StorageContext>,
    store: Arc<MetadataStore>,
    shutdown: CancellationToken,
    cameras: HashMap<String, CameraMovers>,
}

impl TierRegistry {
    pub fn new(
        context: Arc<StorageContext>,
        store: Arc<MetadataStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            context,
            store,
            shutdown,
            cameras: HashMap::new(),
        }
    }

    /// Consume camera events until shutdown, then stop every mover and
    /// wait for their final passes to finish
    pub async fn run(mut self, mut events: mpsc::Receiver<CameraEvent>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(CameraEvent::Registered { camera }) => self.register_camera(&camera),
                    Some(CameraEvent::Removed { camera }) => self.remove_camera(&camera).await,
                    None => break,
                },
            }
        }

        self.stop_all().await;
    }

    /// Spawn one mover per tier boundary for a newly registered camera.
    /// Problems here are isolated to this camera; others keep running.
    fn register_camera(&mut self, camera: &str) {
        if self.cameras.contains_key(camera) {
            warn!(camera, "Camera already registered, ignoring");
            return;
        }

        let token = self.shutdown.child_token();
        let mut handles = Vec::new();

        for spec in mover_specs(&self.context) {
            let mover = TierMover::new(
                camera,
                spec.subcategory,
                spec.source,
                spec.destination.as_ref(),
                Some(self.store.clone()),
                token.clone(),
            );
            handles.push(tokio::spawn(mover.run()));
        }

        info!(camera, movers = handles.len(), "Camera registered");
        self.cameras
            .insert(camera.to_string(), CameraMovers { token, handles });
    }

    async fn remove_camera(&mut self, camera: &str) {
        let Some(movers) = self.cameras.remove(camera) else {
            warn!(camera, "Camera not registered, nothing to remove");
            return;
        };

        movers.token.cancel();
        for result in futures::future::join_all(movers.handles).await {
            if let Err(e) = result {
                warn!(camera, error = %e, "Mover task ended abnormally");
            }
        }
        info!(camera, "Camera movers stopped");
    }

    async fn stop_all(&mut self) {
        let cameras: Vec<String> = self.cameras.keys().cloned().collect();
        for camera in cameras {
            self.remove_camera(&camera).await;
        }
    }
}
