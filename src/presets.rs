use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use fd_lock::RwLock;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::{
    error::{LinkError, Result},
    params::ControlValues,
};

pub const DEFAULT_PRESET_FILE: &str = "presets.json";

#[derive(Clone, Debug, PartialEq)]
pub struct Preset {
    pub name: String,
    pub values: ControlValues,
}

/// Named presets persisted as one JSON object of `name -> values`.
///
/// Every save or delete holds an exclusive lock on a `<file>.lock` sidecar
/// for the whole read-modify-write, then replaces the mapping through a
/// uniquely named temporary file and an atomic rename. Writers in separate
/// processes serialize on the lock, and readers only ever see a complete
/// mapping.
#[derive(Clone, Debug)]
pub struct PresetStore {
    path: PathBuf,
}

impl PresetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All presets in insertion order. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<Preset>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(self.corrupt(format!("unreadable: {err}"))),
        };

        let entries: Map<String, Value> = serde_json::from_slice(&bytes)
            .map_err(|err| self.corrupt(format!("invalid JSON: {err}")))?;

        entries
            .into_iter()
            .map(|(name, value)| {
                let values = serde_json::from_value::<ControlValues>(value)
                    .map_err(|err| self.corrupt(format!("preset \"{name}\": {err}")))?;
                Ok(Preset { name, values })
            })
            .collect()
    }

    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self.load()?.into_iter().map(|preset| preset.name).collect())
    }

    pub fn get(&self, name: &str) -> Result<ControlValues> {
        let name = name.trim();
        self.load()?
            .into_iter()
            .find(|preset| preset.name == name)
            .map(|preset| preset.values)
            .ok_or_else(|| LinkError::PresetNotFound(name.to_string()))
    }

    /// Insert or overwrite `name`. An overwritten preset keeps its position.
    pub fn save(&self, name: &str, values: ControlValues) -> Result<()> {
        let name = validate_name(name)?;
        let mut lock = self.open_lock()?;
        let _guard = lock.write().map_err(|source| self.write_error(source))?;

        let mut presets = self.load()?;
        match presets.iter_mut().find(|preset| preset.name == name) {
            Some(existing) => existing.values = values,
            None => presets.push(Preset {
                name: name.to_string(),
                values,
            }),
        }

        self.write_all(&presets)?;
        log::debug!("saved preset \"{name}\" to {}", self.path.display());
        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let name = name.trim();
        let mut lock = self.open_lock()?;
        let _guard = lock.write().map_err(|source| self.write_error(source))?;

        let mut presets = self.load()?;
        let Some(idx) = presets.iter().position(|preset| preset.name == name) else {
            return Err(LinkError::PresetNotFound(name.to_string()));
        };
        presets.remove(idx);

        self.write_all(&presets)?;
        log::debug!("deleted preset \"{name}\" from {}", self.path.display());
        Ok(())
    }

    fn open_lock(&self) -> Result<RwLock<File>> {
        self.create_parent()
            .and_then(|()| {
                OpenOptions::new()
                    .create(true)
                    .truncate(false)
                    .write(true)
                    .open(self.lock_path())
            })
            .map(RwLock::new)
            .map_err(|source| self.write_error(source))
    }

    fn write_all(&self, presets: &[Preset]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&PresetFile(presets))?;
        self.replace_file(&bytes).map_err(|source| self.write_error(source))
    }

    // The temp file lives next to the store so the rename stays on one
    // filesystem; it is removed on drop if anything fails before persisting.
    fn replace_file(&self, bytes: &[u8]) -> io::Result<()> {
        let mut tmp = NamedTempFile::new_in(self.dir())?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }

    fn create_parent(&self) -> io::Result<()> {
        match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => fs::create_dir_all(parent),
            None => Ok(()),
        }
    }

    fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn lock_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| DEFAULT_PRESET_FILE.into());
        file_name.push(".lock");
        self.path.with_file_name(file_name)
    }

    fn write_error(&self, source: io::Error) -> LinkError {
        LinkError::StoreWrite {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupt(&self, reason: String) -> LinkError {
        LinkError::CorruptStore {
            path: self.path.clone(),
            reason,
        }
    }
}

// Serializes straight from f32 so stored tenths stay short (`6.3`, not a
// widened f64).
struct PresetFile<'a>(&'a [Preset]);

impl Serialize for PresetFile<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|preset| (&preset.name, &preset.values)))
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LinkError::InvalidPresetName);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        process::{Command, Stdio},
        sync::{Arc, Barrier},
        thread,
    };
    use tempfile::TempDir;

    struct ScratchDir(TempDir);

    impl ScratchDir {
        fn new() -> Self {
            Self(tempfile::tempdir().unwrap())
        }

        fn store(&self) -> PresetStore {
            PresetStore::new(self.0.path().join(DEFAULT_PRESET_FILE))
        }

        fn file_names(&self) -> Vec<String> {
            let mut names: Vec<String> = fs::read_dir(self.0.path())
                .unwrap()
                .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        }
    }

    fn values(ipd: f32) -> ControlValues {
        ControlValues {
            ipd,
            subviewport_scale: 1.5,
            vr_filter_strength: Some(0.0),
            gyro_sensitive: 50.0,
        }
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = ScratchDir::new();
        assert!(dir.store().load().unwrap().is_empty());
        assert!(dir.store().list().unwrap().is_empty());
    }

    #[test]
    fn save_overwrites_same_name() {
        let dir = ScratchDir::new();
        let store = dir.store();
        store.save("A", values(1.0)).unwrap();
        store.save("A", values(3.5)).unwrap();

        let presets = store.load().unwrap();
        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].name, "A");
        assert_eq!(presets[0].values, values(3.5));
    }

    #[test]
    fn list_keeps_insertion_order() {
        let dir = ScratchDir::new();
        let store = dir.store();
        for name in ["zeta", "alpha", "mid"] {
            store.save(name, values(2.0)).unwrap();
        }
        store.save("zeta", values(4.0)).unwrap();
        assert_eq!(store.list().unwrap(), ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn file_is_a_single_mapping() {
        let dir = ScratchDir::new();
        let store = dir.store();
        store.save("desk", values(2.0)).unwrap();
        store.save("sofa", values(6.3)).unwrap();

        let raw: Value = serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        let object = raw.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["desk"]["ipd"], 2.0);
        assert_eq!(object["sofa"]["subviewport_scale"], 1.5);
        let text = String::from_utf8(fs::read(store.path()).unwrap()).unwrap();
        assert!(text.contains("6.3"));
        assert!(!text.contains("6.300000"));
        assert_eq!(dir.file_names(), ["presets.json", "presets.json.lock"]);
    }

    #[test]
    fn get_returns_values_or_not_found() {
        let dir = ScratchDir::new();
        let store = dir.store();
        store.save("desk", values(2.4)).unwrap();
        assert_eq!(store.get(" desk ").unwrap(), values(2.4));
        assert!(matches!(
            store.get("couch"),
            Err(LinkError::PresetNotFound(name)) if name == "couch"
        ));
    }

    #[test]
    fn delete_removes_entry() {
        let dir = ScratchDir::new();
        let store = dir.store();
        store.save("a", values(1.0)).unwrap();
        store.save("b", values(2.0)).unwrap();
        store.delete("a").unwrap();
        assert_eq!(store.list().unwrap(), ["b"]);
    }

    #[test]
    fn delete_missing_leaves_store_unchanged() {
        let dir = ScratchDir::new();
        let store = dir.store();
        store.save("a", values(1.0)).unwrap();
        let before = fs::read(store.path()).unwrap();

        assert!(matches!(
            store.delete("missing"),
            Err(LinkError::PresetNotFound(_))
        ));
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn corrupt_file_is_reported_and_left_untouched() {
        let dir = ScratchDir::new();
        let store = dir.store();
        fs::write(store.path(), b"{ not json").unwrap();

        assert!(matches!(store.load(), Err(LinkError::CorruptStore { .. })));
        assert!(matches!(
            store.save("a", values(1.0)),
            Err(LinkError::CorruptStore { .. })
        ));
        assert!(matches!(
            store.delete("a"),
            Err(LinkError::CorruptStore { .. })
        ));
        assert_eq!(fs::read(store.path()).unwrap(), b"{ not json");
    }

    #[test]
    fn non_object_file_is_corrupt() {
        let dir = ScratchDir::new();
        let store = dir.store();
        fs::write(store.path(), b"[1, 2, 3]").unwrap();
        assert!(matches!(store.load(), Err(LinkError::CorruptStore { .. })));
    }

    #[test]
    fn preset_without_filter_strength_still_loads() {
        let dir = ScratchDir::new();
        let store = dir.store();
        fs::write(
            store.path(),
            br#"{"old": {"ipd": 2.0, "subviewport_scale": 1.5, "gyro_sensitive": 40}}"#,
        )
        .unwrap();

        let old = store.get("old").unwrap();
        assert_eq!(old.vr_filter_strength, None);
        assert_eq!(old.gyro_sensitive, 40.0);
    }

    #[test]
    fn preset_missing_required_field_is_corrupt() {
        let dir = ScratchDir::new();
        let store = dir.store();
        fs::write(store.path(), br#"{"bad": {"ipd": 2.0}}"#).unwrap();
        assert!(matches!(store.load(), Err(LinkError::CorruptStore { .. })));
    }

    #[test]
    fn empty_name_is_rejected() {
        let dir = ScratchDir::new();
        let store = dir.store();
        assert!(matches!(
            store.save("   ", values(1.0)),
            Err(LinkError::InvalidPresetName)
        ));
        assert!(!store.path().exists());
    }

    #[test]
    fn concurrent_saves_to_different_names_all_persist() {
        let dir = ScratchDir::new();
        let store = dir.store();
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store.save(&format!("preset-{i}"), values(i as f32)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut names = store.list().unwrap();
        names.sort();
        let expected: Vec<String> = (0..8).map(|i| format!("preset-{i}")).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn concurrent_saves_to_same_name_leave_one_entry() {
        let dir = ScratchDir::new();
        let store = dir.store();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [1.0, 9.0]
            .into_iter()
            .map(|ipd| {
                let store = store.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store.save("A", values(ipd)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let presets = store.load().unwrap();
        assert_eq!(presets.len(), 1);
        assert!(presets[0].values == values(1.0) || presets[0].values == values(9.0));
    }

    const CHILD_STORE_ENV: &str = "GESTURE_LINK_TEST_CHILD_STORE";
    const CHILD_PREFIX_ENV: &str = "GESTURE_LINK_TEST_CHILD_PREFIX";
    const WRITER_PROCESSES: usize = 4;
    const SAVES_PER_PROCESS: usize = 25;

    // Body of the writer processes spawned below; returns at once in a
    // normal test run.
    #[test]
    fn child_process_writer() {
        let (Ok(path), Ok(prefix)) = (
            std::env::var(CHILD_STORE_ENV),
            std::env::var(CHILD_PREFIX_ENV),
        ) else {
            return;
        };
        let store = PresetStore::new(path);
        for i in 0..SAVES_PER_PROCESS {
            store.save(&format!("{prefix}-{i}"), values(i as f32)).unwrap();
            store.list().unwrap();
        }
    }

    #[test]
    fn saves_from_separate_processes_all_persist() {
        let dir = ScratchDir::new();
        let store = dir.store();
        let exe = std::env::current_exe().unwrap();

        let children: Vec<_> = (0..WRITER_PROCESSES)
            .map(|writer| {
                Command::new(&exe)
                    .args(["presets::tests::child_process_writer", "--exact"])
                    .env(CHILD_STORE_ENV, store.path())
                    .env(CHILD_PREFIX_ENV, format!("w{writer}"))
                    .stdout(Stdio::null())
                    .spawn()
                    .unwrap()
            })
            .collect();
        for mut child in children {
            assert!(child.wait().unwrap().success());
        }

        let names = store.list().unwrap();
        assert_eq!(names.len(), WRITER_PROCESSES * SAVES_PER_PROCESS);
        for writer in 0..WRITER_PROCESSES {
            for i in 0..SAVES_PER_PROCESS {
                assert!(names.contains(&format!("w{writer}-{i}")));
            }
        }
        assert_eq!(dir.file_names(), ["presets.json", "presets.json.lock"]);
    }
}
