use crate::store::AccountStore;
use crate::types::{IdentifierSet, PostRecords};

/// Identifiers discovered but not yet stored.
pub fn new_identifiers(discovered: &IdentifierSet, store: &AccountStore) -> IdentifierSet {
    discovered
        .iter()
        .filter(|id| !store.contains(id))
        .cloned()
        .collect()
}

/// Bulk-mode records whose identifiers are not yet stored.
pub fn new_records(discovered: PostRecords, store: &AccountStore) -> PostRecords {
    discovered
        .into_iter()
        .filter(|(id, _)| !store.contains(id))
        .collect()
}
