//! Studylink client core
//!
//! The UI-free core of a tutoring/study-network client: tutor-student
//! connection lifecycle, a live-reconciled peer roster, feed aggregation for
//! shared resources, and tutor rating aggregation. All state lives in a
//! path-addressed document store reached through the [`store::DocumentStore`]
//! contract; the concrete backend is injected, and the bundled
//! [`store::memory::MemoryStore`] backs tests and offline use.

pub mod config;
pub mod connections;
pub mod error;
pub mod feed;
pub mod model;
pub mod paths;
pub mod rating;
pub mod store;

mod profiles;

use std::sync::Arc;

use crate::config::ClientOptions;
use crate::connections::reconciler::{self, RosterHandle};
use crate::connections::ConnectionService;
use crate::error::Error;
use crate::feed::FeedService;
use crate::model::ActorRole;
use crate::rating::RatingService;
use crate::store::DocumentStore;

/// The main entry point for the studylink client core
///
/// Owns the injected document store and configuration and hands out the
/// per-concern services.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use studylink::store::memory::MemoryStore;
/// use studylink::StudyClient;
///
/// let store = Arc::new(MemoryStore::new());
/// let client = StudyClient::new(store);
/// let connections = client.connections();
/// ```
pub struct StudyClient {
    store: Arc<dyn DocumentStore>,
    options: ClientOptions,
}

impl StudyClient {
    /// Create a client with default options
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::new_with_options(store, ClientOptions::default())
    }

    /// Create a client with custom options
    pub fn new_with_options(store: Arc<dyn DocumentStore>, options: ClientOptions) -> Self {
        Self { store, options }
    }

    /// The injected document store
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    /// The active client options
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Connection lifecycle operations (connect, accept, decline, disconnect)
    pub fn connections(&self) -> ConnectionService {
        ConnectionService::new(self.store.clone(), self.options.clone())
    }

    /// Feed operations (page fetch, likes, comments, reports, deletion)
    pub fn feed(&self) -> FeedService {
        FeedService::new(self.store.clone(), self.options.clone())
    }

    /// Rating submission and aggregation
    pub fn ratings(&self) -> RatingService {
        RatingService::new(self.store.clone())
    }

    /// Start a live-reconciled roster for an actor
    ///
    /// Subscribes to the actor's connection and chat-index streams and keeps
    /// a deduplicated roster published until the returned handle is detached
    /// or dropped.
    pub async fn roster(&self, actor_id: &str, role: ActorRole) -> Result<RosterHandle, Error> {
        reconciler::spawn(self.store.clone(), &self.options, actor_id, role).await
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::ClientOptions;
    pub use crate::error::Error;
    pub use crate::model::{ActorRole, ConnectionStatus, RosterEntry, RosterStatus};
    pub use crate::store::DocumentStore;
    pub use crate::StudyClient;
}
