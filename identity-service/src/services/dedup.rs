use std::collections::HashMap;

use crate::models::{AggregatedSearchResult, SearchResult};

/// Identity key of a search hit: lowercased email, else lowercased username,
/// else the source-native id.
///
/// Two different people who share a bare username across directories and
/// have no email on file end up with the same key and are merged.
pub fn dedup_key(record: &SearchResult) -> String {
    if let Some(email) = record.email.as_deref().filter(|e| !e.trim().is_empty()) {
        return fold_case(email);
    }
    if let Some(username) = record.username.as_deref().filter(|u| !u.trim().is_empty()) {
        return fold_case(username);
    }
    record.id.clone()
}

/// Case folding shared by grouping and email correlation.
pub fn fold_case(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Group hits that share an identity key. Output order follows the first
/// appearance of each key; the first record seen for a key supplies the
/// display fields.
pub fn deduplicate(records: Vec<SearchResult>) -> Vec<AggregatedSearchResult> {
    let mut groups: Vec<AggregatedSearchResult> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = dedup_key(&record);
        match index.get(&key) {
            Some(&position) => {
                let group = &mut groups[position];
                if !group.sources.contains(&record.source) {
                    group.sources.push(record.source);
                }
                group.matches.push(record);
            }
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(AggregatedSearchResult {
                    key,
                    display_name: record.display_name.clone(),
                    email: record.email.clone(),
                    username: record.username.clone(),
                    sources: vec![record.source],
                    matches: vec![record],
                });
            }
        }
    }

    groups
}
