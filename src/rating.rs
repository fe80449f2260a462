//! Tutor rating aggregation
//!
//! One rating document per (tutor, student), overwritten on resubmission.
//! The tutor's displayed average and count are recomputed from every rating
//! document after each submission and written back to the tutor profile.
//! A full recompute instead of a running average keeps the result correct
//! against lost updates from concurrent submitters; the read-modify-write
//! itself is not transactional and two racing submitters can briefly write
//! stale aggregates. That tradeoff is accepted, not worked around.

use std::sync::Arc;

use crate::error::Error;
use crate::model::RatingSummary;
use crate::paths;
use crate::store::{DocumentStore, Fields, Query};

/// Rating operations for one injected store
pub struct RatingService {
    store: Arc<dyn DocumentStore>,
}

impl RatingService {
    pub(crate) fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Submit or replace the acting student's rating of a tutor
    ///
    /// Returns the freshly recomputed aggregate that was written to the
    /// tutor profile (`rating` and `ratingCount` fields).
    pub async fn submit_rating(
        &self,
        acting_uid: &str,
        tutor_id: &str,
        value: u8,
    ) -> Result<RatingSummary, Error> {
        if !(1..=5).contains(&value) {
            return Err(Error::invalid_input(format!(
                "rating must be between 1 and 5, got {value}"
            )));
        }

        self.store
            .set(
                &paths::rating(tutor_id, acting_uid),
                Fields::new()
                    .value("tutorId", tutor_id)
                    .value("studentId", acting_uid)
                    .value("value", value)
                    .server_timestamp("createdAt"),
                false,
            )
            .await?;

        let summary = self.summarize(tutor_id).await?;
        self.store
            .set(
                &paths::profile(tutor_id),
                Fields::new()
                    .value("rating", summary.average)
                    .value("ratingCount", summary.count as i64),
                true,
            )
            .await?;
        Ok(summary)
    }

    /// Recompute mean and count over all rating documents of a tutor
    pub async fn summarize(&self, tutor_id: &str) -> Result<RatingSummary, Error> {
        let docs = self
            .store
            .list(&Query::collection(paths::tutor_ratings(tutor_id)))
            .await?;
        let values: Vec<f64> = docs
            .iter()
            .filter_map(|doc| doc.data.get("value").and_then(serde_json::Value::as_f64))
            .collect();
        let count = values.len();
        let average = if count == 0 {
            0.0
        } else {
            values.iter().sum::<f64>() / count as f64
        };
        Ok(RatingSummary { average, count })
    }
}
