//! Controller registry
//!
//! Maps tenants to their live [`PlaybackController`] and is the entry point
//! for play requests and control signals. Lookups share the lock; creating
//! or removing a controller takes it exclusively.
//!
//! Controllers are created lazily by [`ControllerRegistry::play`] and remove
//! themselves when they drain, fail to join, or are stopped. Removal checks
//! pointer identity so a late teardown never evicts a newer controller for
//! the same tenant.

use super::controller::PlaybackController;
use super::mailbox::Signal;
use crate::config::PlayerSettings;
use crate::error::{Error, Result};
use crate::item::Item;
use crate::transport::Transport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use voxq_common::events::PlaybackEvent;
use voxq_common::{ChannelId, TenantId};

/// What a play request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// A new controller was created and its loop started
    Started,
    /// The item was appended to the running controller's queue
    Enqueued { position: usize },
}

struct RegistryInner {
    controllers: RwLock<HashMap<TenantId, Arc<PlaybackController>>>,
    transport: Arc<dyn Transport>,
    events: broadcast::Sender<PlaybackEvent>,
}

/// Tenant to controller map; cheap to clone
#[derive(Clone)]
pub struct ControllerRegistry {
    inner: Arc<RegistryInner>,
}

impl ControllerRegistry {
    pub fn new(transport: Arc<dyn Transport>, settings: &PlayerSettings) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        Self {
            inner: Arc::new(RegistryInner {
                controllers: RwLock::new(HashMap::new()),
                transport,
                events,
            }),
        }
    }

    /// Subscribe to events from every controller
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.inner.events.subscribe()
    }

    /// Play an item for a tenant
    ///
    /// Starts a controller joined to `voice_channel` if the tenant has none,
    /// otherwise appends to the running controller's queue without touching
    /// its playback state. `text_channel` is where the request came from.
    pub async fn play(
        &self,
        tenant: TenantId,
        voice_channel: ChannelId,
        text_channel: Option<ChannelId>,
        item: Item,
    ) -> PlayOutcome {
        let mut controllers = self.inner.controllers.write().await;

        if let Some(controller) = controllers.get(&tenant) {
            match controller.enqueue(Arc::clone(&item)) {
                Ok(position) => {
                    debug!("Tenant {}: queued {} at {}", tenant, item.title(), position);
                    return PlayOutcome::Enqueued { position };
                }
                Err(e) => {
                    // Unreachable while the lock is held; replace defensively
                    warn!("Tenant {}: replacing dead controller: {}", tenant, e);
                }
            }
        }

        info!(
            "Tenant {}: starting controller for voice channel {} with {}",
            tenant,
            voice_channel,
            item.title()
        );
        let (controller, signals) = PlaybackController::new(
            tenant.clone(),
            voice_channel,
            text_channel,
            item,
            self.inner.events.clone(),
        );
        controllers.insert(tenant, Arc::clone(&controller));

        tokio::spawn(controller.run(
            signals,
            Arc::clone(&self.inner.transport),
            self.clone(),
        ));

        PlayOutcome::Started
    }

    /// Live controller for a tenant
    pub async fn get(&self, tenant: &TenantId) -> Result<Arc<PlaybackController>> {
        self.inner
            .controllers
            .read()
            .await
            .get(tenant)
            .cloned()
            .ok_or_else(|| Error::ControllerNotFound(tenant.clone()))
    }

    pub async fn exists(&self, tenant: &TenantId) -> bool {
        self.inner.controllers.read().await.contains_key(tenant)
    }

    /// Tenants with a live controller, sorted
    pub async fn tenants(&self) -> Vec<TenantId> {
        let mut tenants: Vec<TenantId> =
            self.inner.controllers.read().await.keys().cloned().collect();
        tenants.sort();
        tenants
    }

    pub async fn len(&self) -> usize {
        self.inner.controllers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.controllers.read().await.is_empty()
    }

    /// Unregister a tenant's controller and ask it to stop
    ///
    /// Removing an absent tenant is a no-op.
    pub async fn remove(&self, tenant: &TenantId) {
        let removed = {
            let mut controllers = self.inner.controllers.write().await;
            let removed = controllers.remove(tenant);
            if let Some(controller) = &removed {
                controller.close();
            }
            removed
        };

        if let Some(controller) = removed {
            info!("Tenant {}: controller removed from registry", tenant);
            controller.request_stop();
        }
    }

    /// Forward a control signal to a tenant's controller
    pub async fn signal(&self, tenant: &TenantId, signal: Signal) -> Result<()> {
        let controller = self.get(tenant).await?;
        controller.signal(signal).await
    }

    pub async fn skip(&self, tenant: &TenantId) -> Result<()> {
        self.signal(tenant, Signal::Skip).await
    }

    pub async fn stop(&self, tenant: &TenantId) -> Result<()> {
        self.signal(tenant, Signal::Stop).await
    }

    pub async fn pause(&self, tenant: &TenantId) -> Result<()> {
        self.signal(tenant, Signal::Pause).await
    }

    pub async fn resume(&self, tenant: &TenantId) -> Result<()> {
        self.signal(tenant, Signal::Resume).await
    }

    pub async fn toggle_loop(&self, tenant: &TenantId) -> Result<()> {
        self.signal(tenant, Signal::ToggleLoop).await
    }

    pub async fn toggle_repeat(&self, tenant: &TenantId) -> Result<()> {
        self.signal(tenant, Signal::ToggleRepeat).await
    }

    /// Items queued behind the one currently playing
    pub async fn queue_snapshot(&self, tenant: &TenantId) -> Result<Vec<Item>> {
        self.get(tenant).await?.queue_snapshot()
    }

    pub async fn reorder(&self, tenant: &TenantId, from: usize, to: usize) -> Result<()> {
        self.get(tenant).await?.reorder(from, to)
    }

    pub async fn remove_item(&self, tenant: &TenantId, index: usize) -> Result<Item> {
        self.get(tenant).await?.remove_item(index)
    }

    /// Stop every live controller, returning how many were signalled
    pub async fn shutdown(&self) -> usize {
        let controllers: Vec<Arc<PlaybackController>> =
            self.inner.controllers.read().await.values().cloned().collect();

        let mut stopped = 0;
        for controller in controllers {
            match controller.stop().await {
                Ok(()) => stopped += 1,
                Err(e) => debug!("Skipping shutdown of tenant {}: {}", controller.tenant(), e),
            }
        }
        info!("Shutdown requested for {} controllers", stopped);
        stopped
    }

    // Drain decision: the registry write lock orders it against `play`, and
    // the controller's latch orders it against direct `enqueue` calls.
    pub(crate) async fn retire_if_idle(&self, controller: &Arc<PlaybackController>) -> bool {
        let mut controllers = self.inner.controllers.write().await;
        if !controller.close_if_idle() {
            return false;
        }
        Self::unregister(&mut controllers, controller);
        true
    }

    /// Unconditional removal at teardown
    pub(crate) async fn retire(&self, controller: &Arc<PlaybackController>) {
        let mut controllers = self.inner.controllers.write().await;
        controller.close();
        Self::unregister(&mut controllers, controller);
    }

    fn unregister(
        controllers: &mut HashMap<TenantId, Arc<PlaybackController>>,
        controller: &Arc<PlaybackController>,
    ) {
        let tenant = controller.tenant();
        if controllers
            .get(tenant)
            .is_some_and(|current| Arc::ptr_eq(current, controller))
        {
            controllers.remove(tenant);
            debug!("Tenant {}: controller unregistered", tenant);
        }
    }
}
