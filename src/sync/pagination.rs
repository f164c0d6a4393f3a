//! Complete key listing across pages.

use crate::remote::{
    ProjectApi,
    RemoteError,
};
use crate::types::TranslationKeyRecord;

/// Fetches every page of the key listing, in page order.
///
/// Pages are accumulated locally; if any page fails the partial result is
/// dropped and the error returned, so callers only ever see a complete set.
/// An empty page that still reports more pages is an
/// [`RemoteError::IncompleteListing`].
pub(crate) async fn fetch_all_keys(
    api: &dyn ProjectApi,
    page_size: u32,
) -> Result<Vec<TranslationKeyRecord>, RemoteError> {
    let mut keys = Vec::new();
    let mut page = 0u32;

    loop {
        let batch = api.list_translation_keys(page, page_size).await?;
        tracing::debug!(page, received = batch.keys.len(), has_next = batch.has_next, "Fetched key page");

        // An empty page that claims more would loop forever, and stopping
        // here would commit a truncated set.
        if batch.has_next && batch.keys.is_empty() {
            tracing::warn!(page, "Empty key page reported more pages");
            return Err(RemoteError::IncompleteListing { page });
        }

        keys.extend(batch.keys);
        if !batch.has_next {
            break;
        }
        page += 1;
    }

    tracing::debug!(pages = page + 1, keys = keys.len(), "Fetched all translation keys");
    Ok(keys)
}
