//! Subject and trial persistence
//!
//! Storage is a plain key-value port that reads and writes whole blobs; the
//! repository keeps the ordered subject list under one fixed key and writes
//! the entire list back after every change.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::RecorderError;
use crate::types::{Subject, Trial};

/// Key under which the subject list is stored
pub const SUBJECTS_KEY: &str = "looking-time-recorder-subjects";

/// Whole-blob key-value storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, RecorderError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), RecorderError>;
    fn remove(&mut self, key: &str) -> Result<(), RecorderError>;
}

/// In-memory store, for tests and throwaway sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, RecorderError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), RecorderError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), RecorderError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// The directory is created on the first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, RecorderError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), RecorderError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), RecorderError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Ordered list of subjects backed by a [`KeyValueStore`]
pub struct SubjectRepository<S> {
    store: S,
    subjects: Vec<Subject>,
}

impl<S: KeyValueStore> SubjectRepository<S> {
    /// Load the subject list; a missing key is an empty list, a corrupt blob
    /// is an error.
    pub fn load(store: S) -> Result<Self, RecorderError> {
        let subjects = match store.get(SUBJECTS_KEY)? {
            Some(blob) => serde_json::from_str(&blob)?,
            None => Vec::new(),
        };
        debug!("loaded {} subject(s)", subjects.len());
        Ok(Self { store, subjects })
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn find(&self, id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    /// Case-insensitive lookup by subject name
    pub fn find_by_name(&self, name: &str) -> Option<&Subject> {
        let name = name.trim();
        self.subjects
            .iter()
            .find(|s| s.name.to_lowercase() == name.to_lowercase())
    }

    /// The most recently created subject
    pub fn current_subject(&self) -> Option<&Subject> {
        self.subjects.last()
    }

    pub fn create_subject(
        &mut self,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Subject, RecorderError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RecorderError::EmptyName);
        }
        if self.find_by_name(name).is_some() {
            return Err(RecorderError::DuplicateSubject(name.to_string()));
        }

        let subject = Subject {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at,
            trials: Vec::new(),
        };
        self.subjects.push(subject.clone());
        self.save()?;
        info!("subject created: \"{}\"", subject.name);
        Ok(subject)
    }

    pub fn delete_subject(&mut self, subject_id: &str) -> Result<Subject, RecorderError> {
        let index = self.index_of(subject_id)?;
        let removed = self.subjects.remove(index);
        self.save()?;
        info!("subject deleted: \"{}\"", removed.name);
        Ok(removed)
    }

    /// Name for the subject's next trial: `Trial N`, starting one past the
    /// current trial count and skipping names already taken
    pub fn next_trial_name(&self, subject_id: &str) -> String {
        let Some(subject) = self.find(subject_id) else {
            return "Trial 1".to_string();
        };

        let mut n = subject.trials.len() + 1;
        loop {
            let name = format!("Trial {n}");
            if subject.find_trial(&name).is_none() {
                return name;
            }
            n += 1;
        }
    }

    /// Validate a trial name for `subject_id` before recording under it.
    ///
    /// Returns the trimmed name.
    pub fn check_trial_name(&self, subject_id: &str, name: &str) -> Result<String, RecorderError> {
        let subject = &self.subjects[self.index_of(subject_id)?];
        let name = name.trim();
        if name.is_empty() {
            return Err(RecorderError::EmptyName);
        }
        if subject.find_trial(name).is_some() {
            return Err(RecorderError::DuplicateTrial(name.to_string()));
        }
        Ok(name.to_string())
    }

    /// Append a completed trial. Trial names are unique per subject,
    /// ignoring case.
    pub fn add_trial(&mut self, subject_id: &str, trial: Trial) -> Result<(), RecorderError> {
        self.check_trial_name(subject_id, &trial.name)?;
        let index = self.index_of(subject_id)?;
        let subject = &mut self.subjects[index];

        info!(
            "trial \"{}\" saved for subject \"{}\"",
            trial.name, subject.name
        );
        subject.trials.push(trial);
        self.save()
    }

    pub fn delete_trial(&mut self, subject_id: &str, trial_id: &str) -> Result<Trial, RecorderError> {
        let index = self.index_of(subject_id)?;
        let subject = &mut self.subjects[index];
        let position = subject
            .trials
            .iter()
            .position(|t| t.id == trial_id)
            .ok_or_else(|| RecorderError::TrialNotFound(trial_id.to_string()))?;

        let removed = subject.trials.remove(position);
        self.save()?;
        Ok(removed)
    }

    /// Remove every trial of a subject; returns how many were removed
    pub fn clear_trials(&mut self, subject_id: &str) -> Result<usize, RecorderError> {
        let index = self.index_of(subject_id)?;
        let removed = std::mem::take(&mut self.subjects[index].trials).len();
        self.save()?;
        Ok(removed)
    }

    /// Drop the stored list entirely
    pub fn clear_all(&mut self) -> Result<(), RecorderError> {
        self.subjects.clear();
        self.store.remove(SUBJECTS_KEY)
    }

    fn index_of(&self, subject_id: &str) -> Result<usize, RecorderError> {
        self.subjects
            .iter()
            .position(|s| s.id == subject_id)
            .ok_or_else(|| RecorderError::SubjectNotFound(subject_id.to_string()))
    }

    fn save(&mut self) -> Result<(), RecorderError> {
        let blob = serde_json::to_string(&self.subjects)?;
        self.store.set(SUBJECTS_KEY, &blob)
    }
}

/// Write a trial that could not be stored to `unsaved-<id>.json` in `dir`,
/// so a finished recording survives a failed save.
pub fn keep_unsaved_trial(dir: &Path, trial: &Trial) -> Result<PathBuf, RecorderError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("unsaved-{}.json", trial.id));
    fs::write(&path, serde_json::to_string_pretty(trial)?)?;
    warn!("trial \"{}\" kept at {}", trial.name, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LookingInterval;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 11, 9, 0, 0).unwrap()
    }

    fn trial(name: &str) -> Trial {
        Trial {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: now(),
            total_duration: 1_500,
            intervals: vec![LookingInterval::new(0, 1_200)],
        }
    }

    #[test]
    fn test_empty_store_loads_empty_list() {
        let repo = SubjectRepository::load(MemoryStore::new()).unwrap();
        assert!(repo.subjects().is_empty());
        assert!(repo.current_subject().is_none());
    }

    #[test]
    fn test_create_subject_validates_name() {
        let mut repo = SubjectRepository::load(MemoryStore::new()).unwrap();

        let subject = repo.create_subject("  Subject_001 ", now()).unwrap();
        assert_eq!(subject.name, "Subject_001");

        assert!(matches!(
            repo.create_subject("   ", now()),
            Err(RecorderError::EmptyName)
        ));
        assert!(matches!(
            repo.create_subject("subject_001", now()),
            Err(RecorderError::DuplicateSubject(_))
        ));
        assert_eq!(repo.subjects().len(), 1);
    }

    #[test]
    fn test_trials_round_trip_through_store() {
        let mut repo = SubjectRepository::load(MemoryStore::new()).unwrap();
        let subject = repo.create_subject("S1", now()).unwrap();

        assert_eq!(repo.next_trial_name(&subject.id), "Trial 1");
        repo.add_trial(&subject.id, trial("Trial 1")).unwrap();
        assert_eq!(repo.next_trial_name(&subject.id), "Trial 2");

        let store = repo.store().clone();
        let reloaded = SubjectRepository::load(store).unwrap();
        assert_eq!(reloaded.subjects(), repo.subjects());
        assert_eq!(reloaded.subjects()[0].trials[0].intervals[0].end_time, 1_200);
    }

    #[test]
    fn test_duplicate_trial_name_rejected() {
        let mut repo = SubjectRepository::load(MemoryStore::new()).unwrap();
        let subject = repo.create_subject("S1", now()).unwrap();
        repo.add_trial(&subject.id, trial("Trial 1")).unwrap();

        let result = repo.add_trial(&subject.id, trial("TRIAL 1"));
        assert!(matches!(result, Err(RecorderError::DuplicateTrial(_))));

        let other = repo.create_subject("S2", now()).unwrap();
        repo.add_trial(&other.id, trial("Trial 1")).unwrap();
    }

    #[test]
    fn test_next_trial_name_skips_taken_names() {
        let mut repo = SubjectRepository::load(MemoryStore::new()).unwrap();
        let subject = repo.create_subject("S1", now()).unwrap();
        let first = trial("Trial 1");
        let first_id = first.id.clone();
        repo.add_trial(&subject.id, first).unwrap();
        repo.add_trial(&subject.id, trial("Trial 2")).unwrap();
        repo.delete_trial(&subject.id, &first_id).unwrap();

        let name = repo.next_trial_name(&subject.id);
        assert_eq!(name, "Trial 3");
        repo.add_trial(&subject.id, trial(&name)).unwrap();
        assert_eq!(repo.next_trial_name(&subject.id), "Trial 4");
    }

    #[test]
    fn test_check_trial_name() {
        let mut repo = SubjectRepository::load(MemoryStore::new()).unwrap();
        let subject = repo.create_subject("S1", now()).unwrap();
        repo.add_trial(&subject.id, trial("Trial 1")).unwrap();

        assert_eq!(
            repo.check_trial_name(&subject.id, "  Baseline ").unwrap(),
            "Baseline"
        );
        assert!(matches!(
            repo.check_trial_name(&subject.id, "   "),
            Err(RecorderError::EmptyName)
        ));
        assert!(matches!(
            repo.check_trial_name(&subject.id, " trial 1 "),
            Err(RecorderError::DuplicateTrial(name)) if name == "trial 1"
        ));
        assert!(matches!(
            repo.check_trial_name("missing", "Trial 2"),
            Err(RecorderError::SubjectNotFound(_))
        ));
    }

    #[test]
    fn test_blank_trial_name_rejected_on_add() {
        let mut repo = SubjectRepository::load(MemoryStore::new()).unwrap();
        let subject = repo.create_subject("S1", now()).unwrap();
        assert!(matches!(
            repo.add_trial(&subject.id, trial(" ")),
            Err(RecorderError::EmptyName)
        ));
        assert!(repo.find(&subject.id).unwrap().trials.is_empty());
    }

    #[test]
    fn test_keep_unsaved_trial() {
        let dir = std::env::temp_dir().join(format!("looktime-unsaved-{}", Uuid::new_v4()));
        let kept = trial("Trial 1");

        let path = keep_unsaved_trial(&dir, &kept).unwrap();
        assert!(path.ends_with(format!("unsaved-{}.json", kept.id)));
        let restored: Trial = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(restored, kept);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_delete_and_clear() {
        let mut repo = SubjectRepository::load(MemoryStore::new()).unwrap();
        let subject = repo.create_subject("S1", now()).unwrap();
        let first = trial("Trial 1");
        let first_id = first.id.clone();
        repo.add_trial(&subject.id, first).unwrap();
        repo.add_trial(&subject.id, trial("Trial 2")).unwrap();

        let removed = repo.delete_trial(&subject.id, &first_id).unwrap();
        assert_eq!(removed.name, "Trial 1");
        assert!(matches!(
            repo.delete_trial(&subject.id, &first_id),
            Err(RecorderError::TrialNotFound(_))
        ));

        assert_eq!(repo.clear_trials(&subject.id).unwrap(), 1);
        assert!(repo.find(&subject.id).unwrap().trials.is_empty());

        repo.delete_subject(&subject.id).unwrap();
        assert!(matches!(
            repo.delete_subject(&subject.id),
            Err(RecorderError::SubjectNotFound(_))
        ));
    }

    #[test]
    fn test_current_subject_is_most_recent() {
        let mut repo = SubjectRepository::load(MemoryStore::new()).unwrap();
        repo.create_subject("A", now()).unwrap();
        repo.create_subject("B", now()).unwrap();
        assert_eq!(repo.current_subject().unwrap().name, "B");
        assert_eq!(repo.find_by_name("a").unwrap().name, "A");
    }

    #[test]
    fn test_corrupt_blob_is_an_error() {
        let mut store = MemoryStore::new();
        store.set(SUBJECTS_KEY, "not json").unwrap();
        assert!(matches!(
            SubjectRepository::load(store),
            Err(RecorderError::Json(_))
        ));
    }

    #[test]
    fn test_file_store() {
        let dir = std::env::temp_dir().join(format!("looktime-test-{}", Uuid::new_v4()));
        let mut store = FileStore::new(&dir);

        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "[1,2]").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("[1,2]"));
        assert!(store.path_for("k").ends_with("k.json"));
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_clear_all_removes_key() {
        let mut repo = SubjectRepository::load(MemoryStore::new()).unwrap();
        repo.create_subject("A", now()).unwrap();
        repo.clear_all().unwrap();
        assert_eq!(repo.store().get(SUBJECTS_KEY).unwrap(), None);
    }
}
