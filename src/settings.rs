use crate::error::SyncError;
use crate::models::ProfileEntry;
use chrono::Local;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

pub const SCHEMA_URL: &str = "https://aka.ms/terminal-profiles-schema";

/// Which halves of a sync to run. Remove runs before Add when both are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeMode {
    pub add: bool,
    pub remove: bool,
}

impl MergeMode {
    pub const ADD: Self = Self {
        add: true,
        remove: false,
    };
    pub const REMOVE: Self = Self {
        add: false,
        remove: true,
    };
}

/// What a merge did, by profile name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub removed: Vec<String>,
}

impl MergeReport {
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty())
    }
}

/// A Windows Terminal `settings.json`, kept as raw JSON so that every key
/// this tool does not manage survives a round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDocument {
    path: PathBuf,
    root: Map<String, Value>,
}

impl SettingsDocument {
    /// The minimal document Windows Terminal accepts
    pub fn new_default(path: impl Into<PathBuf>) -> Self {
        let mut root = Map::new();
        root.insert("$schema".to_string(), json!(SCHEMA_URL));
        root.insert(
            "profiles".to_string(),
            json!({ "defaults": {}, "list": [] }),
        );
        root.insert("actions".to_string(), json!([]));
        root.insert("schemes".to_string(), json!([]));
        root.insert("themes".to_string(), json!([]));

        Self {
            path: path.into(),
            root,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self, SyncError> {
        let path = path.into();
        let root = match serde_json::from_str::<Value>(content) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(SyncError::MalformedSettingsDocument {
                    path,
                    reason: "top level is not a JSON object".to_string(),
                })
            }
            Err(e) => {
                return Err(SyncError::MalformedSettingsDocument {
                    path,
                    reason: e.to_string(),
                })
            }
        };

        let mut document = Self { path, root };
        if let Err(reason) = document.validate_profiles() {
            return Err(SyncError::MalformedSettingsDocument {
                path: document.path,
                reason,
            });
        }
        Ok(document)
    }

    /// Read the document at `path`, or `None` when the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>, SyncError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SyncError::SettingsUnreadable {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Self::parse(path, &content).map(Some)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// The profile list, in either the array or the `{ "list": [...] }` layout
    pub fn profiles(&self) -> &[Value] {
        let list = match self.root.get("profiles") {
            Some(Value::Array(list)) => Some(list),
            Some(Value::Object(container)) => container.get("list").and_then(Value::as_array),
            _ => None,
        };
        list.map(Vec::as_slice).unwrap_or_default()
    }

    pub fn find_profile(&self, name: &str) -> Option<&Map<String, Value>> {
        self.profiles()
            .iter()
            .filter_map(Value::as_object)
            .find(|p| p.get("name").and_then(Value::as_str) == Some(name))
    }

    fn validate_profiles(&mut self) -> Result<(), String> {
        self.existing_profile_list().map(|_| ())
    }

    fn existing_profile_list(&mut self) -> Result<Option<&mut Vec<Value>>, String> {
        match self.root.get_mut("profiles") {
            None => Ok(None),
            Some(Value::Array(list)) => Ok(Some(list)),
            Some(Value::Object(container)) => match container.get_mut("list") {
                None => Ok(None),
                Some(Value::Array(list)) => Ok(Some(list)),
                Some(_) => Err("`profiles.list` is not an array".to_string()),
            },
            Some(_) => Err("`profiles` is neither an array nor an object".to_string()),
        }
    }

    fn ensure_profile_list(&mut self) -> Result<&mut Vec<Value>, String> {
        let profiles = self
            .root
            .entry("profiles")
            .or_insert_with(|| json!({ "defaults": {} }));

        match profiles {
            Value::Array(list) => Ok(list),
            Value::Object(container) => match container
                .entry("list")
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                Value::Array(list) => Ok(list),
                _ => Err("`profiles.list` is not an array".to_string()),
            },
            _ => Err("`profiles` is neither an array nor an object".to_string()),
        }
    }

    /// Pretty JSON with four-space indentation and a trailing newline
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.root.serialize(&mut serializer)?;
        buf.push(b'\n');
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write the document to a sibling temp file without touching the target.
    ///
    /// Nothing on disk changes until [`StagedWrite::commit`] renames it into
    /// place; dropping the staged write removes the temp file.
    pub fn stage(&self) -> Result<StagedWrite, SyncError> {
        let write_err = |source: io::Error| SyncError::WriteFailure {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(write_err)?;

        let content = self.to_json().map_err(|e| write_err(e.into()))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(content.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;

        if let Ok(meta) = fs::metadata(&self.path) {
            fs::set_permissions(tmp.path(), meta.permissions()).map_err(write_err)?;
        }

        Ok(StagedWrite {
            tmp,
            path: self.path.clone(),
        })
    }

    /// Replace the file on disk atomically. The original is untouched on failure.
    pub fn save(&self) -> Result<(), SyncError> {
        self.stage()?.commit()
    }
}

/// A fully written temp file waiting to replace the settings file
#[derive(Debug)]
pub struct StagedWrite {
    tmp: NamedTempFile,
    path: PathBuf,
}

impl StagedWrite {
    pub fn commit(self) -> Result<(), SyncError> {
        let StagedWrite { tmp, path } = self;
        if let Err(e) = tmp.persist(&path) {
            return Err(SyncError::WriteFailure {
                path,
                source: e.error,
            });
        }
        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }
}

/// Copy `path` to `<path>.<timestamp>.bak` and return the backup location
pub fn backup(path: &Path) -> Result<PathBuf, SyncError> {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}.bak", Local::now().format("%Y%m%d_%H%M%S")));
    let backup_path = PathBuf::from(name);

    fs::copy(path, &backup_path).map_err(|source| SyncError::WriteFailure {
        path: backup_path.clone(),
        source,
    })?;

    tracing::info!("Backed up settings to {}", backup_path.display());
    Ok(backup_path)
}

fn profile_name(profile: &Value) -> Option<&str> {
    profile.get("name").and_then(Value::as_str)
}

fn new_guid(taken: &mut HashSet<String>) -> String {
    loop {
        let guid = Uuid::new_v4().braced().to_string();
        if taken.insert(guid.to_lowercase()) {
            return guid;
        }
    }
}

/// Merge discovered profiles into `document`.
///
/// Works on a copy: the input is never modified and either the complete
/// result or an error is returned. Profiles are matched by `name`; an
/// existing profile keeps its position, its `guid` and every key this tool
/// does not manage.
pub fn merge(
    document: &SettingsDocument,
    entries: &[ProfileEntry],
    mode: MergeMode,
    exclude: &HashSet<String>,
) -> Result<(SettingsDocument, MergeReport), SyncError> {
    let mut merged = document.clone();
    let mut report = MergeReport::default();
    let malformed = |reason: String| SyncError::MalformedSettingsDocument {
        path: document.path.clone(),
        reason,
    };

    let entries: Vec<&ProfileEntry> = entries
        .iter()
        .filter(|entry| {
            let excluded = exclude.contains(&entry.name);
            if excluded {
                tracing::debug!("Excluding host '{}'", entry.name);
            }
            !excluded
        })
        .collect();

    if mode.remove {
        if let Some(list) = merged.existing_profile_list().map_err(malformed)? {
            let names: HashSet<&str> = entries.iter().map(|e| e.name.as_str()).collect();
            list.retain(|profile| match profile_name(profile) {
                Some(name) if names.contains(name) => {
                    report.removed.push(name.to_string());
                    false
                }
                _ => true,
            });
        }
    }

    if mode.add {
        let list = merged.ensure_profile_list().map_err(malformed)?;
        add_profiles(list, &entries, &mut report);
    }

    Ok((merged, report))
}

fn add_profiles(list: &mut Vec<Value>, entries: &[&ProfileEntry], report: &mut MergeReport) {
    let mut taken: HashSet<String> = list
        .iter()
        .filter_map(|p| p.get("guid").and_then(Value::as_str))
        .map(str::to_lowercase)
        .collect();

    // First match wins; duplicates already in the document are left alone
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, profile) in list.iter().enumerate() {
        if let Some(name) = profile_name(profile) {
            index.entry(name.to_string()).or_insert(i);
        }
    }

    for entry in entries {
        let commandline = Value::String(entry.commandline.clone());
        let hidden = Value::Bool(entry.hidden);

        if let Some(profile) = index.get(&entry.name).and_then(|&i| list[i].as_object_mut()) {
            let mut changed = profile.get("commandline") != Some(&commandline)
                || profile.get("hidden") != Some(&hidden);
            profile.insert("commandline".to_string(), commandline);
            profile.insert("hidden".to_string(), hidden);

            if !matches!(profile.get("guid"), Some(Value::String(_))) {
                profile.insert("guid".to_string(), Value::String(new_guid(&mut taken)));
                changed = true;
            }

            if changed {
                report.updated.push(entry.name.clone());
            } else {
                report.unchanged.push(entry.name.clone());
            }
            continue;
        }

        let guid = match &entry.guid {
            Some(guid) if taken.insert(guid.to_lowercase()) => guid.clone(),
            _ => new_guid(&mut taken),
        };

        list.push(json!({
            "name": entry.name,
            "commandline": commandline,
            "guid": guid,
            "hidden": hidden,
        }));
        index.insert(entry.name.clone(), list.len() - 1);
        report.added.push(entry.name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXISTING: &str = r#"{
    "$schema": "https://aka.ms/terminal-profiles-schema",
    "defaultProfile": "{61c54bbd-c2c6-5271-96e7-009a87ff44bf}",
    "profiles": {
        "defaults": { "fontSize": 11 },
        "list": [
            {
                "guid": "{61c54bbd-c2c6-5271-96e7-009a87ff44bf}",
                "name": "Windows PowerShell",
                "commandline": "powershell.exe",
                "hidden": false
            },
            {
                "name": "Server01",
                "commandline": "ssh -p 2222 MyUserName@1.2.3.4",
                "guid": "G1",
                "hidden": false,
                "colorScheme": "Campbell"
            }
        ]
    },
    "schemes": []
}"#;

    fn existing() -> SettingsDocument {
        SettingsDocument::parse("settings.json", EXISTING).unwrap()
    }

    fn entry(name: &str, commandline: &str) -> ProfileEntry {
        ProfileEntry {
            name: name.to_string(),
            commandline: commandline.to_string(),
            guid: None,
            hidden: false,
        }
    }

    fn names(doc: &SettingsDocument) -> Vec<&str> {
        doc.profiles().iter().filter_map(profile_name).collect()
    }

    #[test]
    fn test_update_keeps_guid_and_position() {
        let entries = vec![entry("Server01", "ssh -p 2200 MyUserName@1.2.3.4")];
        let (merged, report) =
            merge(&existing(), &entries, MergeMode::ADD, &HashSet::new()).unwrap();

        assert_eq!(names(&merged), vec!["Windows PowerShell", "Server01"]);
        let profile = merged.find_profile("Server01").unwrap();
        assert_eq!(profile["commandline"], "ssh -p 2200 MyUserName@1.2.3.4");
        assert_eq!(profile["guid"], "G1");
        assert_eq!(profile["colorScheme"], "Campbell");
        assert_eq!(report.updated, vec!["Server01"]);
        assert!(report.added.is_empty());
    }

    #[test]
    fn test_add_appends_with_fresh_guid() {
        let entries = vec![entry("web", "ssh web.example")];
        let (merged, report) =
            merge(&existing(), &entries, MergeMode::ADD, &HashSet::new()).unwrap();

        assert_eq!(names(&merged), vec!["Windows PowerShell", "Server01", "web"]);
        assert_eq!(report.added, vec!["web"]);

        let profile = merged.find_profile("web").unwrap();
        assert_eq!(profile["hidden"], false);
        let guid = profile["guid"].as_str().unwrap();
        assert!(guid.starts_with('{') && guid.ends_with('}'));
        assert!(Uuid::parse_str(&guid[1..guid.len() - 1]).is_ok());
    }

    #[test]
    fn test_add_is_idempotent() {
        let entries = vec![
            entry("Server01", "ssh -p 2200 MyUserName@1.2.3.4"),
            entry("web", "ssh web.example"),
        ];
        let (first, _) = merge(&existing(), &entries, MergeMode::ADD, &HashSet::new()).unwrap();
        let (second, report) = merge(&first, &entries, MergeMode::ADD, &HashSet::new()).unwrap();

        assert_eq!(first, second);
        assert!(!report.has_changes());
        assert_eq!(report.unchanged, vec!["Server01", "web"]);
    }

    #[test]
    fn test_names_and_guids_stay_unique() {
        let entries = vec![
            entry("a", "ssh a"),
            entry("b", "ssh b"),
            entry("a", "ssh a2"),
        ];
        let (merged, _) = merge(&existing(), &entries, MergeMode::ADD, &HashSet::new()).unwrap();

        let all_names = names(&merged);
        let unique: HashSet<&str> = all_names.iter().copied().collect();
        assert_eq!(all_names.len(), unique.len());

        let guids: Vec<&str> = merged
            .profiles()
            .iter()
            .filter_map(|p| p.get("guid").and_then(Value::as_str))
            .collect();
        let unique: HashSet<&str> = guids.iter().copied().collect();
        assert_eq!(guids.len(), unique.len());
        assert_eq!(merged.find_profile("a").unwrap()["commandline"], "ssh a2");
    }

    #[test]
    fn test_remove_by_name_only() {
        let entries = vec![entry("Server01", "ssh something-else")];
        let (merged, report) =
            merge(&existing(), &entries, MergeMode::REMOVE, &HashSet::new()).unwrap();

        assert_eq!(names(&merged), vec!["Windows PowerShell"]);
        assert_eq!(report.removed, vec!["Server01"]);
    }

    #[test]
    fn test_remove_then_add_restores_fields() {
        let entries = vec![entry("Server01", "ssh -p 2222 MyUserName@1.2.3.4")];
        let original = existing();

        let (removed, _) = merge(&original, &entries, MergeMode::REMOVE, &HashSet::new()).unwrap();
        let (restored, _) = merge(&removed, &entries, MergeMode::ADD, &HashSet::new()).unwrap();

        let before = original.find_profile("Server01").unwrap();
        let after = restored.find_profile("Server01").unwrap();
        assert_eq!(before["commandline"], after["commandline"]);
        assert_eq!(before["hidden"], after["hidden"]);
        assert_ne!(after["guid"], "G1");
    }

    #[test]
    fn test_remove_and_add_together_recreates() {
        let entries = vec![entry("Server01", "ssh -p 2222 MyUserName@1.2.3.4")];
        let mode = MergeMode {
            add: true,
            remove: true,
        };
        let (merged, report) = merge(&existing(), &entries, mode, &HashSet::new()).unwrap();

        assert_eq!(report.removed, vec!["Server01"]);
        assert_eq!(report.added, vec!["Server01"]);
        assert_eq!(names(&merged), vec!["Windows PowerShell", "Server01"]);
        assert!(merged.find_profile("Server01").unwrap().get("colorScheme").is_none());
    }

    #[test]
    fn test_excluded_names_are_untouched() {
        let exclude: HashSet<String> = ["Server01".to_string(), "web".to_string()].into();
        let entries = vec![
            entry("Server01", "ssh -p 2200 MyUserName@1.2.3.4"),
            entry("web", "ssh web.example"),
        ];

        let (added, report) = merge(&existing(), &entries, MergeMode::ADD, &exclude).unwrap();
        assert_eq!(added, existing());
        assert!(!report.has_changes());

        let (removed, _) = merge(&existing(), &entries, MergeMode::REMOVE, &exclude).unwrap();
        assert_eq!(removed, existing());
    }

    #[test]
    fn test_preserves_unrelated_keys_in_order() {
        let entries = vec![entry("web", "ssh web.example")];
        let (merged, _) = merge(&existing(), &entries, MergeMode::ADD, &HashSet::new()).unwrap();

        let keys: Vec<&str> = merged.root().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["$schema", "defaultProfile", "profiles", "schemes"]);
        assert_eq!(merged.root()["profiles"]["defaults"]["fontSize"], 11);
    }

    #[test]
    fn test_array_profiles_layout() {
        let doc = SettingsDocument::parse(
            "settings.json",
            r#"{ "profiles": [ { "name": "keep", "guid": "{k}" } ], "theme": "dark" }"#,
        )
        .unwrap();
        let (merged, _) = merge(
            &doc,
            &[entry("web", "ssh web")],
            MergeMode::ADD,
            &HashSet::new(),
        )
        .unwrap();

        assert!(merged.root()["profiles"].is_array());
        assert_eq!(names(&merged), vec!["keep", "web"]);
        assert_eq!(merged.root()["theme"], "dark");
    }

    #[test]
    fn test_missing_profiles_section_is_created_on_add() {
        let doc = SettingsDocument::parse("settings.json", r#"{ "theme": "dark" }"#).unwrap();

        let (removed, _) = merge(
            &doc,
            &[entry("web", "ssh web")],
            MergeMode::REMOVE,
            &HashSet::new(),
        )
        .unwrap();
        assert_eq!(removed, doc);

        let (added, _) = merge(
            &doc,
            &[entry("web", "ssh web")],
            MergeMode::ADD,
            &HashSet::new(),
        )
        .unwrap();
        assert_eq!(names(&added), vec!["web"]);
        assert!(added.root()["profiles"]["defaults"].is_object());
    }

    #[test]
    fn test_existing_duplicates_only_first_updated() {
        let doc = SettingsDocument::parse(
            "settings.json",
            r#"{ "profiles": [
                { "name": "dup", "commandline": "old1", "guid": "{1}" },
                { "name": "dup", "commandline": "old2", "guid": "{2}" },
                "not-an-object"
            ] }"#,
        )
        .unwrap();
        let (merged, _) = merge(
            &doc,
            &[entry("dup", "ssh dup")],
            MergeMode::ADD,
            &HashSet::new(),
        )
        .unwrap();

        let list = merged.profiles();
        assert_eq!(list[0]["commandline"], "ssh dup");
        assert_eq!(list[1]["commandline"], "old2");
        assert_eq!(list[2], "not-an-object");
    }

    #[test]
    fn test_profile_without_guid_gets_one() {
        let doc = SettingsDocument::parse(
            "settings.json",
            r#"{ "profiles": [ { "name": "web", "commandline": "ssh web" } ] }"#,
        )
        .unwrap();
        let (merged, report) = merge(
            &doc,
            &[entry("web", "ssh web")],
            MergeMode::ADD,
            &HashSet::new(),
        )
        .unwrap();

        assert!(merged.find_profile("web").unwrap()["guid"].is_string());
        assert_eq!(report.updated, vec!["web"]);
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        for content in [
            "{ not json",
            "[]",
            r#"{ "profiles": "nope" }"#,
            r#"{ "profiles": { "list": {} } }"#,
        ] {
            let err = SettingsDocument::parse("settings.json", content).unwrap_err();
            assert!(
                matches!(err, SyncError::MalformedSettingsDocument { .. }),
                "{content}"
            );
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let doc = SettingsDocument::new_default(&path);
        doc.save().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("{\n    \"$schema\""));
        assert!(content.ends_with("}\n"));

        let loaded = SettingsDocument::load(&path).unwrap().unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = SettingsDocument::load(&dir.path().join("missing.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_backup_copies_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{}").unwrap();

        let backup_path = backup(&path).unwrap();

        assert_ne!(backup_path, path);
        assert!(backup_path.to_string_lossy().ends_with(".bak"));
        assert_eq!(fs::read_to_string(backup_path).unwrap(), "{}");
    }

    #[test]
    fn test_save_failure_leaves_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::create_dir_all(path.join("inner")).unwrap();

        let err = SettingsDocument::new_default(&path).save().unwrap_err();

        assert!(matches!(err, SyncError::WriteFailure { .. }));
        assert!(path.join("inner").is_dir());
        let left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, vec!["settings.json"]);
    }

    #[test]
    fn test_dropped_stage_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{}").unwrap();

        let staged = SettingsDocument::new_default(&path).stage().unwrap();
        drop(staged);

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
