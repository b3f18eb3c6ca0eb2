//!
//! Response shaping
//! ----------------
//! Turns an upstream catalog record or directory listing into what the caller is
//! allowed to see: entries are sorted, listings are capped, and restricted fields are
//! removed from the JSON when the access decision says the caller may not view them.
//!
//! Everything here is a pure function of its inputs.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::access::AccessDecision;
use crate::record::{CatalogRecord, DirectoryListing, AGENT_ROLES};

/// Hard cap on listing entries returned to the frontend.
pub const TOTAL_ITEM_LIMIT: usize = 1000;

/// Dot-separated field paths removed from each entry kind.
/// `personal` applies to every agent regardless of access; the rest only when the caller
/// may not view restricted data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestrictedFields {
    pub personal: Vec<String>,
    pub record_file: Vec<String>,
    pub record_directory: Vec<String>,
    pub remote_resource: Vec<String>,
    pub listing_file: Vec<String>,
    pub listing_directory: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> { items.iter().map(|s| s.to_string()).collect() }

impl Default for RestrictedFields {
    fn default() -> Self {
        Self {
            personal: strings(&["email", "telephone", "phone"]),
            record_file: strings(&[
                "details.file_path",
                "details.checksum",
                "details.open_access",
                "details.file_storage",
                "details.parent_directory",
            ]),
            record_directory: strings(&["details.directory_path", "details.file_count", "details.parent_directory"]),
            remote_resource: strings(&["access_url", "download_url"]),
            listing_file: strings(&["file_path", "checksum", "open_access", "file_storage", "parent_directory"]),
            listing_directory: strings(&["directory_path", "file_count", "parent_directory"]),
        }
    }
}

impl RestrictedFields {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        serde_json::from_str(&raw).context("restricted fields must be a JSON object of string arrays")
    }
}

// ---- sorting ----

fn value_at<'a>(v: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(v, |cur, key| cur.get(*key))
}

/// Stable ascending sort by the raw string at `path`. Entries without a string there sort first.
pub fn sort_by_key_path(items: &mut [Value], path: &[&str]) {
    items.sort_by(|a, b| {
        let ka = value_at(a, path).and_then(Value::as_str);
        let kb = value_at(b, path).and_then(Value::as_str);
        ka.cmp(&kb)
    });
}

/// Keep the first `limit` entries.
pub fn slice_on_limit(items: &mut Vec<Value>, limit: usize) {
    items.truncate(limit);
}

fn array_at_mut<'a>(v: &'a mut Value, key: &str) -> Option<&'a mut Vec<Value>> {
    v.get_mut(key).and_then(Value::as_array_mut)
}

// ---- redaction ----

/// Remove a dot-separated path from a JSON object; missing intermediate keys are ignored.
pub fn remove_path(v: &mut Value, path: &str) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else { return; };
    let mut cur = v;
    for p in parts {
        match cur.get_mut(p) {
            Some(next) => cur = next,
            None => return,
        }
    }
    if let Some(obj) = cur.as_object_mut() {
        obj.remove(last);
    }
}

fn strip_entries(items: &mut [Value], fields: &[String]) {
    for item in items.iter_mut() {
        for f in fields {
            remove_path(item, f);
        }
    }
}

fn strip_agent(agent: &mut Value, fields: &[String]) {
    for f in fields {
        remove_path(agent, f);
    }
    // organisations nest: member_of -> is_part_of -> ...
    for nested in ["member_of", "is_part_of"] {
        if let Some(inner) = agent.get_mut(nested) {
            strip_agent(inner, fields);
        }
    }
}

fn strip_personal_information(rd: &mut Value, fields: &[String]) {
    for role in AGENT_ROLES {
        match rd.get_mut(role) {
            Some(Value::Array(agents)) => agents.iter_mut().for_each(|a| strip_agent(a, fields)),
            Some(agent @ Value::Object(_)) => strip_agent(agent, fields),
            _ => {}
        }
    }
}

/// Sort record entries the way the dataset page lists them.
pub fn sort_record_entries(record: &mut CatalogRecord) {
    let Some(rd) = record.0.get_mut("research_dataset") else { return; };
    if let Some(items) = array_at_mut(rd, "remote_resources") { sort_by_key_path(items, &["title"]); }
    if let Some(items) = array_at_mut(rd, "directories") { sort_by_key_path(items, &["details", "directory_name"]); }
    if let Some(items) = array_at_mut(rd, "files") { sort_by_key_path(items, &["details", "file_name"]); }
}

/// Shape a catalog record for the caller: sorted entries, personal contact data always
/// removed, and restricted entry fields removed unless `decision.can_view_restricted`.
pub fn shape_record(record: &CatalogRecord, decision: &AccessDecision, fields: &RestrictedFields) -> CatalogRecord {
    let mut out = record.clone();
    sort_record_entries(&mut out);
    let Some(rd) = out.0.get_mut("research_dataset") else { return out; };
    strip_personal_information(rd, &fields.personal);
    if !decision.can_view_restricted {
        if let Some(items) = array_at_mut(rd, "files") { strip_entries(items, &fields.record_file); }
        if let Some(items) = array_at_mut(rd, "directories") { strip_entries(items, &fields.record_directory); }
        if let Some(items) = array_at_mut(rd, "remote_resources") { strip_entries(items, &fields.remote_resource); }
    }
    out
}

/// Shape a directory listing: sort by name, cap each collection at `TOTAL_ITEM_LIMIT`
/// (after sorting, so the cut is deterministic), then strip restricted fields.
pub fn shape_directory_listing(listing: &DirectoryListing, decision: &AccessDecision, fields: &RestrictedFields) -> DirectoryListing {
    let mut out = listing.clone();
    if let Some(dirs) = array_at_mut(&mut out.0, "directories") {
        sort_by_key_path(dirs, &["directory_name"]);
        slice_on_limit(dirs, TOTAL_ITEM_LIMIT);
        if !decision.can_view_restricted { strip_entries(dirs, &fields.listing_directory); }
    }
    if let Some(files) = array_at_mut(&mut out.0, "files") {
        sort_by_key_path(files, &["file_name"]);
        slice_on_limit(files, TOTAL_ITEM_LIMIT);
        if !decision.can_view_restricted { strip_entries(files, &fields.listing_file); }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn denied() -> AccessDecision { AccessDecision { can_view_restricted: false, can_download: false, has_permit: None } }
    fn allowed() -> AccessDecision { AccessDecision { can_view_restricted: true, can_download: true, has_permit: None } }

    fn record() -> CatalogRecord {
        CatalogRecord::new(json!({
            "identifier": "cr-1",
            "research_dataset": {
                "creator": [{"name": "A", "email": "a@x.fi", "member_of": {"name": "Org", "email": "org@x.fi", "telephone": ["1"]}}],
                "publisher": {"name": "P", "phone": "123"},
                "files": [
                    {"title": "b", "details": {"file_name": "b.txt", "file_path": "/secret/b.txt", "byte_size": 2}},
                    {"title": "a", "details": {"file_name": "a.txt", "file_path": "/secret/a.txt", "byte_size": 1}}
                ],
                "directories": [
                    {"title": "d", "details": {"directory_name": "d", "directory_path": "/secret/d", "file_count": 7}}
                ],
                "remote_resources": [
                    {"title": "Zeta", "access_url": {"identifier": "https://z"}},
                    {"title": "Alpha", "download_url": {"identifier": "https://a"}}
                ]
            }
        }))
    }

    #[test]
    fn restricted_fields_removed_without_access() {
        let shaped = shape_record(&record(), &denied(), &RestrictedFields::default());
        let rd = shaped.research_dataset().unwrap();
        for f in rd["files"].as_array().unwrap() {
            assert!(f["details"].get("file_path").is_none());
            assert!(f["details"].get("byte_size").is_some());
        }
        let d = &rd["directories"][0]["details"];
        assert!(d.get("directory_path").is_none());
        assert!(d.get("file_count").is_none());
        for r in rd["remote_resources"].as_array().unwrap() {
            assert!(r.get("access_url").is_none());
            assert!(r.get("download_url").is_none());
        }
    }

    #[test]
    fn restricted_fields_kept_with_access_but_personal_data_never() {
        let shaped = shape_record(&record(), &allowed(), &RestrictedFields::default());
        let rd = shaped.research_dataset().unwrap();
        assert_eq!(rd["files"][0]["details"]["file_path"], "/secret/a.txt");
        assert!(rd["remote_resources"][0].get("download_url").is_some());
        let creator = &rd["creator"][0];
        assert!(creator.get("email").is_none());
        assert!(creator["member_of"].get("email").is_none());
        assert!(creator["member_of"].get("telephone").is_none());
        assert!(rd["publisher"].get("phone").is_none());
        assert_eq!(rd["publisher"]["name"], "P");
    }

    #[test]
    fn record_entries_sorted() {
        let shaped = shape_record(&record(), &allowed(), &RestrictedFields::default());
        let rd = shaped.research_dataset().unwrap();
        assert_eq!(rd["files"][0]["details"]["file_name"], "a.txt");
        assert_eq!(rd["remote_resources"][0]["title"], "Alpha");
    }

    #[test]
    fn shaping_does_not_mutate_input() {
        let original = record();
        let _ = shape_record(&original, &denied(), &RestrictedFields::default());
        assert_eq!(original, record());
    }

    #[test]
    fn sort_is_stable_case_sensitive_and_missing_first() {
        let mut items = vec![
            json!({"n": "b", "i": 0}),
            json!({"n": "B", "i": 1}),
            json!({"i": 2}),
            json!({"n": "b", "i": 3}),
        ];
        sort_by_key_path(&mut items, &["n"]);
        let order: Vec<i64> = items.iter().map(|v| v["i"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![2, 1, 0, 3]);
    }

    #[test]
    fn sort_is_idempotent() {
        let mut items: Vec<Value> = ["c", "a", "b", "a"].iter().enumerate().map(|(i, n)| json!({"file_name": n, "i": i})).collect();
        sort_by_key_path(&mut items, &["file_name"]);
        let once = items.clone();
        sort_by_key_path(&mut items, &["file_name"]);
        assert_eq!(once, items);
    }

    #[test]
    fn listing_capped_after_sort() {
        let files: Vec<Value> = (0..1500).rev().map(|i| json!({"file_name": format!("f{:05}", i), "file_path": "/p"})).collect();
        let dirs: Vec<Value> = (0..10).map(|i| json!({"directory_name": format!("d{}", i)})).collect();
        let listing = DirectoryListing::new(json!({"files": files, "directories": dirs}));
        let shaped = shape_directory_listing(&listing, &denied(), &RestrictedFields::default());
        let files = shaped.files().unwrap();
        assert_eq!(files.len(), TOTAL_ITEM_LIMIT);
        assert_eq!(files[0]["file_name"], "f00000");
        assert_eq!(files[999]["file_name"], "f00999");
        assert!(files.iter().all(|f| f.get("file_path").is_none()));
        assert_eq!(shaped.directories().unwrap().len(), 10);
    }

    #[test]
    fn directories_capped_independently_after_sort() {
        let dirs: Vec<Value> = (0..1200)
            .map(|i| json!({"directory_name": format!("d{:05}", (i * 7919) % 1200), "directory_path": "/p"}))
            .collect();
        let files = vec![json!({"file_name": "only.txt"})];
        let listing = DirectoryListing::new(json!({"files": files, "directories": dirs}));
        let shaped = shape_directory_listing(&listing, &denied(), &RestrictedFields::default());
        let dirs = shaped.directories().unwrap();
        assert_eq!(dirs.len(), TOTAL_ITEM_LIMIT);
        let names: Vec<&str> = dirs.iter().map(|d| d["directory_name"].as_str().unwrap()).collect();
        let expected: Vec<String> = (0..1000).map(|i| format!("d{:05}", i)).collect();
        assert_eq!(names, expected);
        assert!(dirs.iter().all(|d| d.get("directory_path").is_none()));
        assert_eq!(shaped.files().unwrap().len(), 1);
    }

    #[test]
    fn listing_without_collections_passes_through() {
        let listing = DirectoryListing::new(json!({"identifier": "dir-1"}));
        let shaped = shape_directory_listing(&listing, &denied(), &RestrictedFields::default());
        assert_eq!(shaped, listing);
    }

    #[test]
    fn remove_path_ignores_missing_segments() {
        let mut v = json!({"a": {"b": 1}, "c": 2});
        remove_path(&mut v, "a.x.y");
        remove_path(&mut v, "a.b");
        remove_path(&mut v, "c");
        assert_eq!(v, json!({"a": {}}));
    }
}
