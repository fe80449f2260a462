//! Display-name resolution from profile documents

use crate::error::Error;
use crate::paths;
use crate::store::DocumentStore;

/// Read a user's profile and resolve a display name through the configured
/// fallback fields, in order. `Ok(None)` means the profile is missing or has
/// none of the fields; the caller decides what to fall back to (usually the
/// raw id).
pub(crate) async fn display_name(
    store: &dyn DocumentStore,
    name_fields: &[String],
    user_id: &str,
) -> Result<Option<String>, Error> {
    let Some(doc) = store.get(&paths::profile(user_id)).await? else {
        return Ok(None);
    };
    Ok(name_fields.iter().find_map(|field| {
        doc.str_field(field)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }))
}
