use std::cmp::Ordering;
use std::collections::HashMap;

use crate::normalize::{is_generic_affiliation, normalize_name};
use crate::record::{Dataset, PlayerRecord};

/// Records from one dataset, tagged with that dataset's priority
/// (lower is more authoritative).
#[derive(Debug, Clone)]
pub struct DatasetBatch {
    pub dataset: Dataset,
    pub priority: u8,
    pub records: Vec<PlayerRecord>,
}

/// `name|team`, else `name|position|year`, else `name`.
pub fn merge_key(record: &PlayerRecord) -> String {
    let name = normalize_name(&record.name);
    if !is_generic_affiliation(&record.current_team) {
        return format!("{name}|{}", normalize_name(&record.current_team));
    }
    let year = record
        .class_year
        .as_deref()
        .map(normalize_name)
        .filter(|y| !y.is_empty());
    match year {
        Some(year) if !is_generic_affiliation(&record.position) => {
            format!("{name}|{}|{year}", normalize_name(&record.position))
        }
        _ => name,
    }
}

/// Deduplicates across datasets. Output order is first-insertion order after
/// sorting batches by priority, so identical input always gives identical
/// output.
pub fn merge(batches: &[DatasetBatch]) -> Vec<PlayerRecord> {
    let mut ordered: Vec<&DatasetBatch> = batches.iter().collect();
    ordered.sort_by_key(|batch| batch.priority);

    let mut merged: Vec<PlayerRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for batch in ordered {
        for record in &batch.records {
            let mut incoming = record.clone();
            incoming.priority = batch.priority;
            let key = merge_key(&incoming);

            let Some(&slot) = index.get(&key) else {
                index.insert(key, merged.len());
                merged.push(incoming);
                continue;
            };
            let existing = &mut merged[slot];
            match existing.priority.cmp(&incoming.priority) {
                Ordering::Less => {}
                Ordering::Equal => existing.absorb(&incoming),
                Ordering::Greater => *existing = incoming,
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::merge_key;
    use crate::record::{Dataset, PlayerRecord, RawRecord};

    fn player(name: &str, team: Option<&str>, pos: Option<&str>, year: Option<&str>) -> PlayerRecord {
        let raw = RawRecord {
            name: Some(name.to_string()),
            team: team.map(str::to_string),
            position: pos.map(str::to_string),
            class_year: year.map(str::to_string),
            ..RawRecord::default()
        };
        PlayerRecord::from_raw(&raw, Dataset::Roster, "test", 1).unwrap()
    }

    #[test]
    fn key_tiers() {
        assert_eq!(
            merge_key(&player("Cooper Flagg", Some("Duke"), Some("F"), Some("FR"))),
            "cooper flagg|duke"
        );
        assert_eq!(
            merge_key(&player("Cooper Flagg", Some("N/A"), Some("F"), Some("2024"))),
            "cooper flagg|f|2024"
        );
        assert_eq!(merge_key(&player("Cooper Flagg", None, None, Some("2024"))), "cooper flagg");
        assert_eq!(merge_key(&player(" COOPER  flagg ", None, Some("F"), None)), "cooper flagg");
    }
}
