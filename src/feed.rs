//! Feed aggregation for shared resources and videos
//!
//! Every fetched page is enriched per item with the uploader's profile, the
//! true comment count and the viewer's like/comment/report state. The
//! comment count is always recomputed from the comments sub-list; the
//! `commentCount` counter on the parent can drift under concurrent edits and
//! is only used as a display hint when the sub-list read itself fails.
//! Like and report flags are marker documents at deterministic paths:
//! existence is the flag, and the counter increment is only issued together
//! with marker creation or deletion, which guards against double counting.

use futures_util::future::join_all;
use log::warn;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::ClientOptions;
use crate::error::Error;
use crate::model::{Resource, ResourceAggregate};
use crate::paths;
use crate::profiles;
use crate::store::{Document, DocumentStore, Fields, Query, SortOrder};

/// Feed and per-resource operations for one injected store
pub struct FeedService {
    store: Arc<dyn DocumentStore>,
    options: ClientOptions,
}

impl FeedService {
    pub(crate) fn new(store: Arc<dyn DocumentStore>, options: ClientOptions) -> Self {
        Self { store, options }
    }

    /// Publish a new resource, returning its id
    pub async fn publish(
        &self,
        owner_id: &str,
        title: &str,
        description: Option<&str>,
        blob_path: Option<&str>,
    ) -> Result<String, Error> {
        let id = Uuid::new_v4().to_string();
        let mut fields = Fields::new()
            .value("ownerId", owner_id)
            .value("title", title)
            .value("likeCount", 0)
            .value("commentCount", 0)
            .value("reportCount", 0)
            .server_timestamp("createdAt");
        if let Some(description) = description {
            fields = fields.value("description", description);
        }
        if let Some(blob_path) = blob_path {
            fields = fields.value("blobPath", blob_path);
        }
        self.store.set(&paths::resource(&id), fields, false).await?;
        Ok(id)
    }

    /// Fetch the most recent page of resources, enriched for the viewer
    ///
    /// Enrichment reads fan out in parallel and are individually
    /// best-effort: a failed profile or marker read degrades that one item
    /// instead of failing the page.
    pub async fn fetch_page(&self, viewer_id: &str) -> Result<Vec<ResourceAggregate>, Error> {
        let query = Query::collection(paths::RESOURCES)
            .order_by("createdAt", SortOrder::Descending)
            .limit(self.options.feed_page_size);
        let docs = self.store.list(&query).await?;
        let enriched = join_all(docs.iter().map(|doc| self.enrich(viewer_id, doc))).await;
        Ok(enriched.into_iter().flatten().collect())
    }

    async fn enrich(&self, viewer_id: &str, doc: &Document) -> Option<ResourceAggregate> {
        let resource: Resource = match doc.decode() {
            Ok(resource) => resource,
            Err(err) => {
                warn!("skipping undecodable resource {}: {err}", doc.path);
                return None;
            }
        };

        let owner_name = match profiles::display_name(
            self.store.as_ref(),
            &self.options.profile_name_fields,
            &resource.owner_id,
        )
        .await
        {
            Ok(Some(name)) => name,
            Ok(None) => resource.owner_id.clone(),
            Err(err) => {
                warn!("uploader profile read for {} failed: {err}", resource.owner_id);
                resource.owner_id.clone()
            }
        };

        let comments = Query::collection(paths::resource_comments(&doc.id));
        let (comment_count, user_commented) = match self.store.list(&comments).await {
            Ok(comments) => (
                comments.len(),
                comments
                    .iter()
                    .any(|c| c.str_field("authorId") == Some(viewer_id)),
            ),
            Err(err) => {
                // Counter hint only when the authoritative sub-list read fails
                warn!("comment list for {} failed, using counter hint: {err}", doc.id);
                (resource.comment_count.max(0) as usize, false)
            }
        };

        let user_liked = self.marker_exists(&paths::like_marker(&doc.id, viewer_id)).await;
        let user_reported = self
            .marker_exists(&paths::report_marker(&doc.id, viewer_id))
            .await;

        Some(ResourceAggregate {
            id: doc.id.clone(),
            resource,
            owner_name,
            comment_count,
            user_liked,
            user_commented,
            user_reported,
        })
    }

    async fn marker_exists(&self, path: &str) -> bool {
        match self.store.get(path).await {
            Ok(marker) => marker.is_some(),
            Err(err) => {
                warn!("marker read for {path} failed, assuming unset: {err}");
                false
            }
        }
    }

    /// Toggle the viewer's like on a resource, returning the new liked state
    ///
    /// The marker document doubles as the idempotency guard: the counter is
    /// only incremented when the marker is created and only decremented when
    /// it is deleted, so toggling twice nets to zero.
    pub async fn toggle_like(&self, viewer_id: &str, resource_id: &str) -> Result<bool, Error> {
        let resource_path = paths::resource(resource_id);
        if self.store.get(&resource_path).await?.is_none() {
            return Err(Error::not_found(&resource_path));
        }

        let marker = paths::like_marker(resource_id, viewer_id);
        if self.store.get(&marker).await?.is_some() {
            self.store.delete(&marker).await?;
            self.store
                .update(&resource_path, Fields::new().increment("likeCount", -1))
                .await?;
            Ok(false)
        } else {
            self.store
                .set(
                    &marker,
                    Fields::new()
                        .value("userId", viewer_id)
                        .server_timestamp("createdAt"),
                    false,
                )
                .await?;
            self.store
                .update(&resource_path, Fields::new().increment("likeCount", 1))
                .await?;
            Ok(true)
        }
    }

    /// Add a comment, returning the comment id
    pub async fn add_comment(
        &self,
        viewer_id: &str,
        resource_id: &str,
        text: &str,
    ) -> Result<String, Error> {
        let resource_path = paths::resource(resource_id);
        if self.store.get(&resource_path).await?.is_none() {
            return Err(Error::not_found(&resource_path));
        }

        let comment_id = Uuid::new_v4().to_string();
        self.store
            .set(
                &paths::comment(resource_id, &comment_id),
                Fields::new()
                    .value("authorId", viewer_id)
                    .value("text", text)
                    .server_timestamp("createdAt"),
                false,
            )
            .await?;
        // Hint counter only; readers recount from the sub-list
        self.store
            .update(&resource_path, Fields::new().increment("commentCount", 1))
            .await?;
        Ok(comment_id)
    }

    /// Report a resource, or edit the reason of an existing report
    ///
    /// A marker that already exists means this viewer reported before: the
    /// reason is updated in place and the report counter is left alone.
    pub async fn submit_report(
        &self,
        viewer_id: &str,
        resource_id: &str,
        reason: &str,
    ) -> Result<(), Error> {
        let resource_path = paths::resource(resource_id);
        if self.store.get(&resource_path).await?.is_none() {
            return Err(Error::not_found(&resource_path));
        }

        let marker = paths::report_marker(resource_id, viewer_id);
        if self.store.get(&marker).await?.is_some() {
            self.store
                .update(&marker, Fields::new().value("reason", reason))
                .await?;
            return Ok(());
        }
        self.store
            .set(
                &marker,
                Fields::new()
                    .value("reporterId", viewer_id)
                    .value("reason", reason)
                    .server_timestamp("createdAt"),
                false,
            )
            .await?;
        self.store
            .update(&resource_path, Fields::new().increment("reportCount", 1))
            .await?;
        Ok(())
    }

    /// Delete a resource with all of its sub-documents and binary blob
    ///
    /// A saga, not a transaction: each sub-list is drained best-effort and a
    /// partial failure there is logged and swallowed; the parent delete is
    /// the primary write and its failure surfaces; the trailing blob delete
    /// is again best-effort with no rollback of the already-deleted metadata.
    pub async fn delete_resource(&self, acting_uid: &str, resource_id: &str) -> Result<(), Error> {
        let resource_path = paths::resource(resource_id);
        let Some(doc) = self.store.get(&resource_path).await? else {
            return Err(Error::not_found(&resource_path));
        };
        let resource: Resource = doc.decode()?;
        if resource.owner_id != acting_uid {
            return Err(Error::unauthorized(format!(
                "only uploader {} may delete this resource",
                resource.owner_id
            )));
        }

        for collection in [
            paths::resource_likes(resource_id),
            paths::resource_comments(resource_id),
            paths::resource_reports(resource_id),
        ] {
            self.drain_collection(&collection).await;
        }

        self.store.delete(&resource_path).await?;

        if let Some(blob_path) = &resource.blob_path {
            if let Err(err) = self.store.delete_blob(blob_path).await {
                warn!("blob delete for {blob_path} failed after metadata delete: {err}");
            }
        }
        Ok(())
    }

    async fn drain_collection(&self, collection: &str) {
        match self.store.list(&Query::collection(collection)).await {
            Ok(docs) => {
                for doc in docs {
                    if let Err(err) = self.store.delete(&doc.path).await {
                        warn!("cascade delete of {} failed: {err}", doc.path);
                    }
                }
            }
            Err(err) => warn!("cascade list of {collection} failed: {err}"),
        }
    }
}
