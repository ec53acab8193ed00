//! Cloud Storage tables

use super::{instant_cell, section_block, Block, Table, View};
use crate::download::DownloadReport;
use crate::resource::detail::BucketDefinition;
use crate::resource::model::{BucketSummary, ObjectSummary};
use crate::resource::record::{format_bytes, PLACEHOLDER};
use crate::resource::ListResult;
use std::cmp::Reverse;

/// Sorted ascending by creation time
pub(super) fn buckets(list: &ListResult<BucketSummary>) -> View {
    let mut sorted: Vec<&BucketSummary> = list.items.iter().collect();
    sorted.sort_by_key(|b| b.created.as_ref().map(|c| c.utc()));

    let mut table = Table::new(
        None,
        &["Name", "Location", "Storage Class", "Created", "Updated"],
    );
    for b in sorted {
        table.push_row(vec![
            b.name.clone(),
            b.location.clone(),
            b.storage_class.clone(),
            instant_cell(&b.created),
            instant_cell(&b.updated),
        ]);
    }
    View::listing(vec![table], list.status.as_ref())
}

/// Sorted by last-modified, newest first
pub(super) fn objects(bucket: &str, list: &ListResult<ObjectSummary>) -> View {
    let mut sorted: Vec<&ObjectSummary> = list.items.iter().collect();
    sorted.sort_by_key(|o| Reverse(o.last_modified.as_ref().map(|m| m.utc())));

    let mut table = Table::new(
        Some(&format!("gs://{}", bucket)),
        &["Key", "Size", "Storage Class", "Last Modified"],
    );
    for o in sorted {
        table.push_row(vec![
            o.key.clone(),
            o.size.map(format_bytes).unwrap_or_else(|| PLACEHOLDER.to_string()),
            o.storage_class.clone(),
            instant_cell(&o.last_modified),
        ]);
    }
    View::listing(vec![table], list.status.as_ref())
}

/// Summary, Policy, Versioning, Tags, Encryption, Lifecycle
pub(super) fn definition(def: &BucketDefinition) -> View {
    let s = &def.summary;
    let mut blocks = Vec::with_capacity(7);

    let mut summary = Table::new(
        Some("Summary"),
        &["Name", "Location", "Storage Class", "Created", "Updated"],
    );
    summary.push_row(vec![
        s.name.clone(),
        s.location.clone(),
        s.storage_class.clone(),
        instant_cell(&s.created),
        instant_cell(&s.updated),
    ]);
    blocks.push(Block::Table(summary));

    blocks.push(section_block("Policy", &def.policy, |bindings| {
        let mut table = Table::new(Some("Policy"), &["Role", "Members", "Condition"]);
        for b in bindings {
            table.push_row(vec![
                b.role.clone(),
                b.members.join(", "),
                b.condition.clone().unwrap_or_default(),
            ]);
        }
        Block::Table(table)
    }));

    blocks.push(section_block("Versioning", &def.versioning, |v| {
        Block::Table(Table::key_value("Versioning", vec![("Status", v.status().to_string())]))
    }));

    blocks.push(section_block("Tags", &def.tags, |labels| {
        let mut table = Table::new(Some("Tags"), &["Key", "Value"]);
        for l in labels {
            table.push_row(vec![l.key.clone(), l.value.clone()]);
        }
        Block::Table(table)
    }));

    blocks.push(section_block("Encryption", &def.encryption, |e| {
        Block::Table(Table::key_value(
            "Encryption",
            vec![
                ("KMS Key", e.kms_key.clone()),
                ("Key Ring", e.key_ring.clone()),
                ("Location", e.location.clone()),
            ],
        ))
    }));

    blocks.push(section_block("Lifecycle", &def.lifecycle, |rules| {
        let mut table = Table::new(Some("Lifecycle"), &["Action", "Storage Class", "Condition"]);
        for r in rules {
            table.push_row(vec![r.action.clone(), r.storage_class.clone(), r.condition.clone()]);
        }
        Block::Table(table)
    }));

    if let Some(status) = &def.status {
        blocks.push(Block::notice(None, status));
    }

    View::Compound(blocks)
}

pub(super) fn download(report: &DownloadReport) -> View {
    if report.transfers.is_empty() {
        return match &report.status {
            Some(err) if err.is_error() => View::Error(err.clone()),
            Some(err) => View::Compound(vec![Block::notice(None, err)]),
            None => View::Compound(Vec::new()),
        };
    }

    let mut table = Table::new(
        Some(&format!("Downloaded from gs://{}", report.bucket)),
        &["Source", "Destination", "Size", "Elapsed", "Status"],
    );
    for t in &report.transfers {
        table.push_row(vec![
            t.source.clone(),
            t.destination.display().to_string(),
            format_bytes(t.bytes),
            format!("{} ms", t.elapsed_ms),
            t.error
                .as_ref()
                .map(|e| format!("{} {}", e.severity.label(), e.message))
                .unwrap_or_else(|| "OK".to_string()),
        ]);
    }

    let mut blocks = vec![Block::Table(table)];
    if let Some(status) = &report.status {
        blocks.push(Block::notice(None, status));
    }
    View::Compound(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ClassifiedError;
    use crate::timezone::DisplayZone;
    use serde_json::json;

    fn object(name: &str, updated: &str) -> ObjectSummary {
        ObjectSummary::from_record(
            &json!({"name": name, "updated": updated, "size": "10"}),
            DisplayZone::Utc,
        )
    }

    #[test]
    fn test_objects_sorted_newest_first() {
        let list = ListResult::ok(vec![
            object("old", "2021-01-01T00:00:00Z"),
            object("new", "2021-03-01T00:00:00Z"),
            object("mid", "2021-02-01T00:00:00Z"),
        ]);
        let View::Table(table) = objects("b", &list) else {
            panic!("expected a single table");
        };
        let keys: Vec<&str> = table.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(keys, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_buckets_sorted_by_creation() {
        let bucket = |name: &str, created: &str| {
            BucketSummary::from_record(&json!({"name": name, "timeCreated": created}), DisplayZone::Utc)
        };
        let list = ListResult::ok(vec![
            bucket("b", "2021-02-01T00:00:00Z"),
            bucket("a", "2021-01-01T00:00:00Z"),
        ]);
        let View::Table(table) = buckets(&list) else {
            panic!("expected a single table");
        };
        assert_eq!(table.rows[0][0], "a");
        assert_eq!(table.rows[0][4], "-");
    }

    #[test]
    fn test_limit_marker_kept_beside_table() {
        let mut list = ListResult::ok(vec![object("k", "2021-01-01T00:00:00Z")]);
        list.status = Some(ClassifiedError::empty("more objects exist than the limit of 1"));
        match objects("b", &list) {
            View::Compound(blocks) => {
                assert!(matches!(blocks[0], Block::Table(_)));
                assert!(matches!(blocks[1], Block::Notice { .. }));
            }
            other => panic!("unexpected view {:?}", other),
        }
    }
}
