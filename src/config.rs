//! Configuration options for the studylink client

/// Configuration options for the studylink client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// How many items a single feed page fetches (most recent first)
    pub feed_page_size: usize,

    /// Profile fields tried in order when resolving a display name.
    /// When none of them is present, the raw user id is shown.
    pub profile_name_fields: Vec<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            feed_page_size: 20,
            profile_name_fields: vec![
                "name".to_string(),
                "displayName".to_string(),
                "email".to_string(),
            ],
        }
    }
}

impl ClientOptions {
    /// Set how many items a single feed page fetches
    pub fn with_feed_page_size(mut self, value: usize) -> Self {
        self.feed_page_size = value;
        self
    }

    /// Set the ordered profile fields used to resolve display names
    pub fn with_profile_name_fields(mut self, fields: Vec<String>) -> Self {
        self.profile_name_fields = fields;
        self
    }
}
