//! Variables évènementielles du ContentDirectory : `SystemUpdateID` et
//! `ContainerUpdateIDs`.
//!
//! Le [`UpdateTracker`] consomme les [`ContainerChange`] publiés par le
//! store. Chaque changement incrémente `SystemUpdateID` et met à jour la
//! paire `(container, update_id)` en attente d'envoi dans
//! `ContainerUpdateIDs`.

use std::sync::atomic::{AtomicU32, Ordering};

use cdsstore::{ContainerChange, Store};
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, broadcast, watch};
use tracing::{debug, info, warn};

/// Instantané des variables évènementielles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventedVariables {
    pub system_update_id: u32,
    /// `"id,update_id,id,update_id,…"`
    pub container_update_ids: String,
}

#[derive(Debug)]
pub struct UpdateTracker {
    receiver: AsyncMutex<broadcast::Receiver<ContainerChange>>,
    system_update_id: AtomicU32,
    /// Dernier update_id de chaque container modifié, dans l'ordre
    /// d'apparition
    pending: Mutex<Vec<(u64, u32)>>,
    events: watch::Sender<EventedVariables>,
}

impl UpdateTracker {
    pub fn new(store: &Store) -> Self {
        let (events, _) = watch::channel(EventedVariables::default());
        Self {
            receiver: AsyncMutex::new(store.subscribe()),
            system_update_id: AtomicU32::new(0),
            pending: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Prend en compte un changement de container
    pub fn record(&self, change: ContainerChange) {
        let system_update_id = self.system_update_id.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        {
            let mut pending = self.pending.lock();
            match pending.iter_mut().find(|(id, _)| *id == change.container_id) {
                Some(entry) => entry.1 = change.update_id,
                None => pending.push((change.container_id, change.update_id)),
            }
        }
        debug!(
            container_id = change.container_id,
            update_id = change.update_id,
            system_update_id,
            "🔄 ContentDirectory change recorded"
        );
        self.publish();
    }

    fn record_lag(&self, skipped: u64) {
        warn!(skipped, "Change notifications were dropped");
        let skipped = u32::try_from(skipped).unwrap_or(u32::MAX);
        self.system_update_id.fetch_add(skipped, Ordering::SeqCst);
        self.publish();
    }

    /// Traite les changements déjà publiés, sans attendre
    pub fn sync(&self) {
        let Ok(mut receiver) = self.receiver.try_lock() else {
            // la boucle `run` consomme déjà le canal
            return;
        };
        loop {
            match receiver.try_recv() {
                Ok(change) => self.record(change),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(_) => break,
            }
        }
    }

    /// Boucle de consommation des changements, jusqu'à la fermeture du store
    pub async fn run(&self) {
        let mut receiver = self.receiver.lock().await;
        info!("📡 ContentDirectory update tracking started");
        loop {
            match receiver.recv().await {
                Ok(change) => self.record(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        info!("ContentDirectory update tracking stopped");
    }

    pub fn system_update_id(&self) -> u32 {
        self.sync();
        self.system_update_id.load(Ordering::SeqCst)
    }

    /// Valeur courante de `ContainerUpdateIDs`
    pub fn container_update_ids(&self) -> String {
        self.sync();
        format_container_update_ids(&self.pending.lock())
    }

    /// Renvoie `ContainerUpdateIDs` et vide la liste, une fois l'évènement
    /// envoyé aux abonnés
    pub fn take_container_update_ids(&self) -> String {
        self.sync();
        let taken = std::mem::take(&mut *self.pending.lock());
        self.publish();
        format_container_update_ids(&taken)
    }

    pub fn snapshot(&self) -> EventedVariables {
        EventedVariables {
            system_update_id: self.system_update_id.load(Ordering::SeqCst),
            container_update_ids: format_container_update_ids(&self.pending.lock()),
        }
    }

    /// Abonnement aux changements des variables évènementielles
    pub fn subscribe(&self) -> watch::Receiver<EventedVariables> {
        self.events.subscribe()
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.events.send_replace(snapshot);
    }
}

fn format_container_update_ids(pending: &[(u64, u32)]) -> String {
    pending
        .iter()
        .map(|(id, update_id)| format!("{id},{update_id}"))
        .collect::<Vec<_>>()
        .join(",")
}
