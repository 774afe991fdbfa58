use crate::models::ListingRecord;
use std::collections::HashSet;

/// Collapse records sharing `(name, address)`; the first one seen wins.
///
/// A record whose id was already taken is dropped as well, so ids are unique
/// in the output.
pub fn dedupe(records: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let mut seen_keys: HashSet<(String, String)> = HashSet::with_capacity(records.len());
    let mut seen_ids: HashSet<String> = HashSet::with_capacity(records.len());

    records
        .into_iter()
        .filter(|record| {
            let key = (record.name.clone(), record.address.clone());
            if seen_keys.contains(&key) || seen_ids.contains(&record.id) {
                return false;
            }
            seen_keys.insert(key);
            seen_ids.insert(record.id.clone());
            true
        })
        .collect()
}
