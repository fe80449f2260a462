//! Tutor-student connection lifecycle
//!
//! A connection moves `none -> pending -> accepted`; `pending -> none` on
//! decline and `accepted -> none` on disconnect. There is no way back from
//! accepted to pending. All transitions authorize the acting user against the
//! role fields of the target document before writing anything.

pub mod reconciler;

use log::warn;
use std::sync::Arc;

use crate::config::ClientOptions;
use crate::error::Error;
use crate::model::{Connection, ConnectionStatus};
use crate::paths;
use crate::profiles;
use crate::store::{DocumentStore, Fields};

/// Connection lifecycle operations for one injected store
pub struct ConnectionService {
    store: Arc<dyn DocumentStore>,
    options: ClientOptions,
}

impl ConnectionService {
    pub(crate) fn new(store: Arc<dyn DocumentStore>, options: ClientOptions) -> Self {
        Self { store, options }
    }

    /// Student-initiated connection request
    ///
    /// Idempotent upsert at the composite key `{studentId}_{tutorId}`:
    /// when a document already exists (pending or accepted) nothing is
    /// written and its current status is returned, so repeating the action
    /// never creates a duplicate and never downgrades an accepted
    /// connection back to pending.
    pub async fn connect(
        &self,
        acting_uid: &str,
        student_id: &str,
        tutor_id: &str,
    ) -> Result<ConnectionStatus, Error> {
        if acting_uid != student_id {
            return Err(Error::unauthorized(format!(
                "only the student may request a connection (acting as {acting_uid})"
            )));
        }

        let path = paths::connection(student_id, tutor_id);
        if let Some(existing) = self.store.get(&path).await? {
            let connection: Connection = existing.decode()?;
            return Ok(connection.status);
        }

        self.store
            .set(
                &path,
                Fields::new()
                    .value("studentId", student_id)
                    .value("tutorId", tutor_id)
                    .serialized("status", &ConnectionStatus::Pending)?
                    .server_timestamp("createdAt"),
                true,
            )
            .await?;
        Ok(ConnectionStatus::Pending)
    }

    /// Tutor accepts a pending request
    ///
    /// Upserts `status = accepted`, stamps `acceptedAt`, then writes the chat
    /// roster shortcut on both sides so each party sees the other before any
    /// message exists. The accept upsert is the primary write; the chat-index
    /// fan-out is derived data and its failures are logged, not surfaced.
    pub async fn accept(
        &self,
        acting_uid: &str,
        student_id: &str,
        tutor_id: &str,
    ) -> Result<(), Error> {
        let path = paths::connection(student_id, tutor_id);
        let connection = self.load(&path).await?;
        if connection.tutor_id != acting_uid {
            return Err(Error::unauthorized(format!(
                "only tutor {} may accept this request",
                connection.tutor_id
            )));
        }

        self.store
            .set(
                &path,
                Fields::new()
                    .serialized("status", &ConnectionStatus::Accepted)?
                    .server_timestamp("acceptedAt"),
                true,
            )
            .await?;

        let student_name = self.display_name_or_id(student_id).await;
        let tutor_name = self.display_name_or_id(tutor_id).await;
        self.write_chat_entry(tutor_id, student_id, &student_name).await;
        self.write_chat_entry(student_id, tutor_id, &tutor_name).await;
        Ok(())
    }

    /// Tutor declines a pending request; the document is deleted outright
    pub async fn decline(
        &self,
        acting_uid: &str,
        student_id: &str,
        tutor_id: &str,
    ) -> Result<(), Error> {
        let path = paths::connection(student_id, tutor_id);
        let connection = self.load(&path).await?;
        if connection.tutor_id != acting_uid {
            return Err(Error::unauthorized(format!(
                "only tutor {} may decline this request",
                connection.tutor_id
            )));
        }
        if connection.status != ConnectionStatus::Pending {
            return Err(Error::invalid_input(
                "connection is already accepted; use disconnect instead",
            ));
        }
        self.store.delete(&path).await
    }

    /// Either party unlinks an existing connection
    ///
    /// Deletes the connection document outright. The chat-index shortcuts
    /// written on accept are intentionally left behind; the peer stays
    /// visible in chat history after the relationship is gone.
    pub async fn disconnect(
        &self,
        acting_uid: &str,
        student_id: &str,
        tutor_id: &str,
    ) -> Result<(), Error> {
        let path = paths::connection(student_id, tutor_id);
        let connection = self.load(&path).await?;
        if connection.student_id != acting_uid && connection.tutor_id != acting_uid {
            return Err(Error::unauthorized(format!(
                "{acting_uid} is not a party of this connection"
            )));
        }
        self.store.delete(&path).await
    }

    async fn load(&self, path: &str) -> Result<Connection, Error> {
        match self.store.get(path).await? {
            Some(doc) => doc.decode(),
            None => Err(Error::not_found(path)),
        }
    }

    /// Best-effort display name; a failed or empty profile read falls back
    /// to the raw id so accepting never stalls on profile data.
    async fn display_name_or_id(&self, user_id: &str) -> String {
        match profiles::display_name(
            self.store.as_ref(),
            &self.options.profile_name_fields,
            user_id,
        )
        .await
        {
            Ok(Some(name)) => name,
            Ok(None) => user_id.to_string(),
            Err(err) => {
                warn!("profile read for {user_id} failed, using raw id: {err}");
                user_id.to_string()
            }
        }
    }

    async fn write_chat_entry(&self, owner_id: &str, peer_id: &str, peer_name: &str) {
        let result = self
            .store
            .set(
                &paths::chat_entry(owner_id, peer_id),
                Fields::new()
                    .value("ownerId", owner_id)
                    .value("peerId", peer_id)
                    .value("peerName", peer_name)
                    .server_timestamp("lastMessageAt"),
                true,
            )
            .await;
        if let Err(err) = result {
            warn!("chat index write for {owner_id}/{peer_id} failed: {err}");
        }
    }
}
