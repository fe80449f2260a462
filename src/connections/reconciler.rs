//! Live roster reconciliation
//!
//! The roster of an actor is sourced from three independently streamed
//! queries: accepted connections, pending connections and (for tutors) the
//! chat-index shortcuts they own. The backend gives no ordering guarantee
//! between those streams, so every snapshot event triggers a full rebuild
//! from the latest snapshot of all sources instead of an incremental patch.
//! Any delivery order converges to the same roster once each source has
//! reported once. Do not replace the rebuild with diffing: without a
//! sequencing layer between the streams that reintroduces ordering bugs.
//!
//! One visibility race is expected and not an error: an accept followed
//! immediately by a decline can briefly show the peer as accepted until the
//! decline's deletion snapshot arrives.

use futures_util::future::join_all;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::ClientOptions;
use crate::error::Error;
use crate::model::{ActorRole, RosterEntry, RosterStatus};
use crate::paths;
use crate::profiles;
use crate::store::{Document, DocumentStore, Query, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Accepted,
    Pending,
    ChatIndex,
}

struct Event {
    source: Source,
    docs: Vec<Document>,
}

/// Handle to a running roster reconciler
///
/// The current roster is observable through [`RosterHandle::current`] and
/// [`RosterHandle::watch`]; `changed().await` on a watch receiver is the
/// re-render trigger. Teardown is idempotent: `detach` may be called any
/// number of times and also runs on drop, because screen unmount and
/// actor-id change both tear down and resubscribe in unspecified order.
pub struct RosterHandle {
    rx: watch::Receiver<Vec<RosterEntry>>,
    subs: Mutex<Vec<Subscription>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RosterHandle {
    /// The latest published roster
    pub fn current(&self) -> Vec<RosterEntry> {
        self.rx.borrow().clone()
    }

    /// A receiver observing every roster rebuild
    pub fn watch(&self) -> watch::Receiver<Vec<RosterEntry>> {
        self.rx.clone()
    }

    /// Detach all subscriptions and stop the driver; safe to call repeatedly
    pub fn detach(&self) {
        if let Ok(mut subs) = self.subs.lock() {
            for sub in subs.drain(..) {
                sub.detach();
            }
        }
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

impl Drop for RosterHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Subscribe to all roster sources for the actor and start the rebuild driver
pub(crate) async fn spawn(
    store: Arc<dyn DocumentStore>,
    options: &ClientOptions,
    actor_id: &str,
    role: ActorRole,
) -> Result<RosterHandle, Error> {
    let mut sources = vec![
        (
            Source::Accepted,
            Query::collection(paths::CONNECTIONS)
                .eq(role.own_field(), actor_id)
                .eq("status", "accepted"),
        ),
        (
            Source::Pending,
            Query::collection(paths::CONNECTIONS)
                .eq(role.own_field(), actor_id)
                .eq("status", "pending"),
        ),
    ];
    // Tutors additionally read their chat shortcuts as a supplementary
    // accepted-peer source; entries may outlive the connection itself.
    if role == ActorRole::Tutor {
        sources.push((
            Source::ChatIndex,
            Query::collection(paths::CHAT_INDEX).eq("ownerId", actor_id),
        ));
    }

    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
    let mut subs = Vec::new();
    let mut tasks = Vec::new();
    for (source, query) in sources {
        let (snap_tx, mut snap_rx) = mpsc::unbounded_channel::<Vec<Document>>();
        subs.push(store.subscribe(query, snap_tx).await?);
        let tx = event_tx.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(docs) = snap_rx.recv().await {
                if tx.send(Event { source, docs }).is_err() {
                    break;
                }
            }
        }));
    }
    drop(event_tx);

    let (roster_tx, roster_rx) = watch::channel(Vec::new());
    let driver = Driver {
        store,
        name_fields: options.profile_name_fields.clone(),
        role,
        names: HashMap::new(),
        accepted: Vec::new(),
        pending: Vec::new(),
        chat: Vec::new(),
    };
    tasks.push(tokio::spawn(driver.run(event_rx, roster_tx)));

    Ok(RosterHandle {
        rx: roster_rx,
        subs: Mutex::new(subs),
        tasks: Mutex::new(tasks),
    })
}

struct Driver {
    store: Arc<dyn DocumentStore>,
    name_fields: Vec<String>,
    role: ActorRole,
    /// Confirmed display names from successful profile reads
    names: HashMap<String, String>,
    accepted: Vec<Document>,
    pending: Vec<Document>,
    chat: Vec<Document>,
}

impl Driver {
    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Event>,
        out: watch::Sender<Vec<RosterEntry>>,
    ) {
        while let Some(event) = rx.recv().await {
            match event.source {
                Source::Accepted => self.accepted = event.docs,
                Source::Pending => self.pending = event.docs,
                Source::ChatIndex => self.chat = event.docs,
            }
            let roster = self.rebuild().await;
            out.send_replace(roster);
        }
    }

    /// Rebuild the whole roster from the latest snapshot of every source
    async fn rebuild(&mut self) -> Vec<RosterEntry> {
        let merged = merge_sources(&self.accepted, &self.pending, &self.chat, self.role);

        // Fan out profile reads for peers we have no confirmed name for.
        // Completion order does not matter; a failed read never aborts the
        // rebuild, the peer just falls back to a cached or raw name.
        let unknown: Vec<String> = merged
            .iter()
            .map(|(id, _)| id.clone())
            .filter(|id| !self.names.contains_key(id))
            .collect();
        let reads = unknown
            .iter()
            .map(|id| profiles::display_name(self.store.as_ref(), &self.name_fields, id));
        for (id, result) in unknown.iter().zip(join_all(reads).await) {
            match result {
                Ok(Some(name)) => {
                    self.names.insert(id.clone(), name);
                }
                Ok(None) => debug!("no profile name for {id}, keeping fallback"),
                Err(err) => warn!("profile read for {id} failed during rebuild: {err}"),
            }
        }

        // Cached peer names from chat shortcuts serve as a second fallback
        // before the raw id.
        let chat_names: HashMap<&str, &str> = self
            .chat
            .iter()
            .filter_map(|doc| Some((doc.str_field("peerId")?, doc.str_field("peerName")?)))
            .collect();

        merged
            .into_iter()
            .map(|(id, status)| {
                let name = self
                    .names
                    .get(&id)
                    .cloned()
                    .or_else(|| chat_names.get(id.as_str()).map(|n| n.to_string()))
                    .unwrap_or_else(|| id.clone());
                RosterEntry { id, name, status }
            })
            .collect()
    }
}

/// Merge the three sources into at most one entry per peer
///
/// Accepted connections win over everything, chat shortcuts count as
/// accepted when no direct connection is visible, and a pending entry is
/// only kept when no accepted source mentions the peer.
fn merge_sources(
    accepted: &[Document],
    pending: &[Document],
    chat: &[Document],
    role: ActorRole,
) -> Vec<(String, RosterStatus)> {
    let mut order: Vec<String> = Vec::new();
    let mut statuses: HashMap<String, RosterStatus> = HashMap::new();
    let mut push = |peer: &str, status: RosterStatus| {
        if !statuses.contains_key(peer) {
            order.push(peer.to_string());
            statuses.insert(peer.to_string(), status);
        } else if status == RosterStatus::Accepted {
            statuses.insert(peer.to_string(), RosterStatus::Accepted);
        }
    };

    for doc in accepted {
        match doc.str_field(role.peer_field()) {
            Some(peer) => push(peer, RosterStatus::Accepted),
            None => debug!("connection {} lacks {}", doc.path, role.peer_field()),
        }
    }
    for doc in chat {
        match doc.str_field("peerId") {
            Some(peer) => push(peer, RosterStatus::Accepted),
            None => debug!("chat entry {} lacks peerId", doc.path),
        }
    }
    for doc in pending {
        match doc.str_field(role.peer_field()) {
            Some(peer) => push(peer, RosterStatus::Pending),
            None => debug!("connection {} lacks {}", doc.path, role.peer_field()),
        }
    }

    order
        .into_iter()
        .map(|peer| {
            let status = statuses[&peer];
            (peer, status)
        })
        .collect()
}
