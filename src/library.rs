// Saved-pattern library
//
// Named patterns under `saved_patterns`, last writer wins. Writes report
// success as a bool and log the failure, reads fall back to an empty list.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::PATTERNS_KEY;
use crate::error::StoreError;
use crate::pattern::MovementPattern;
use crate::store::{get_json, set_json, KeyValueStore};

pub struct PatternLibrary {
    kv: Box<dyn KeyValueStore>,
}

impl PatternLibrary {
    pub fn new(kv: impl KeyValueStore + 'static) -> Self {
        Self { kv: Box::new(kv) }
    }

    /// All saved patterns, empty if nothing is stored or the data is unreadable
    pub fn list(&self) -> Vec<MovementPattern> {
        match self.load() {
            Ok(patterns) => patterns,
            Err(e) => {
                warn!("Error loading patterns: {}", e);
                Vec::new()
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<MovementPattern> {
        self.list().into_iter().find(|p| p.name == name)
    }

    /// Save, replacing any pattern with the same name
    pub fn save(&self, pattern: MovementPattern) -> bool {
        let result = self.load().and_then(|mut patterns| {
            match patterns.iter_mut().find(|p| p.name == pattern.name) {
                Some(existing) => *existing = pattern,
                None => patterns.push(pattern),
            }
            self.store(&patterns)
        });
        report("saving", result)
    }

    pub fn delete(&self, name: &str) -> bool {
        let result = self.load().and_then(|mut patterns| {
            patterns.retain(|p| p.name != name);
            self.store(&patterns)
        });
        report("deleting", result)
    }

    /// Merge a JSON array of patterns; imported names replace existing ones
    pub fn import_from(&self, text: &str) -> bool {
        let result = serde_json::from_str::<Vec<MovementPattern>>(text)
            .map_err(StoreError::from)
            .and_then(|imported| {
                let mut merged: Vec<MovementPattern> = self
                    .load()?
                    .into_iter()
                    .filter(|existing| !imported.iter().any(|p| p.name == existing.name))
                    .collect();
                info!("Importing {} patterns", imported.len());
                merged.extend(imported);
                self.store(&merged)
            });
        report("importing", result)
    }

    /// Pretty-printed JSON array of every saved pattern
    pub fn export_to(&self) -> Option<String> {
        match serde_json::to_string_pretty(&self.list()) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Error exporting patterns: {}", e);
                None
            }
        }
    }

    fn load(&self) -> Result<Vec<MovementPattern>, StoreError> {
        Ok(get_json(self.kv.as_ref(), PATTERNS_KEY)?.unwrap_or_default())
    }

    fn store(&self, patterns: &[MovementPattern]) -> Result<(), StoreError> {
        set_json(self.kv.as_ref(), PATTERNS_KEY, &patterns)
    }
}

/// File name for an export made at `now`
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("servo_patterns_{}.json", now.format("%Y-%m-%d"))
}

fn report(action: &str, result: Result<(), StoreError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Error {} pattern: {}", action, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{MovementPoint, PointStyle};
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn pattern(name: &str, angle: f64) -> MovementPattern {
        MovementPattern::flat(name, PointStyle::Smooth, vec![MovementPoint::new(angle, 100)])
    }

    #[test]
    fn test_save_overwrites_by_name() {
        let library = PatternLibrary::new(MemoryStore::new());
        assert!(library.list().is_empty());
        assert!(library.save(pattern("wave", 10.0)));
        assert!(library.save(pattern("wave", 20.0)));
        assert_eq!(library.list().len(), 1);
        assert_eq!(library.get("wave").unwrap().flatten()[0].angle, 20.0);
    }

    #[test]
    fn test_delete() {
        let library = PatternLibrary::new(MemoryStore::new());
        library.save(pattern("a", 10.0));
        library.save(pattern("b", 10.0));
        assert!(library.delete("a"));
        assert!(library.delete("missing"));
        let names: Vec<_> = library.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn test_import_merges_and_imported_names_win() {
        let library = PatternLibrary::new(MemoryStore::new());
        library.save(pattern("keep", 1.0));
        library.save(pattern("shared", 2.0));

        let incoming = serde_json::to_string(&vec![pattern("shared", 99.0), pattern("new", 3.0)]).unwrap();
        assert!(library.import_from(&incoming));

        let patterns = library.list();
        let names: Vec<_> = patterns.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["keep", "shared", "new"]);
        assert_eq!(library.get("shared").unwrap().flatten()[0].angle, 99.0);
    }

    #[test]
    fn test_bad_import_changes_nothing() {
        let library = PatternLibrary::new(MemoryStore::new());
        library.save(pattern("keep", 1.0));
        assert!(!library.import_from("{\"not\": \"a list\"}"));
        assert_eq!(library.list().len(), 1);
    }

    #[test]
    fn test_export_round_trips_through_import() {
        let source = PatternLibrary::new(MemoryStore::new());
        source.save(pattern("a", 10.0));
        source.save(pattern("b", 20.0));
        let text = source.export_to().unwrap();
        assert!(text.contains('\n'));

        let target = PatternLibrary::new(MemoryStore::new());
        assert!(target.import_from(&text));
        assert_eq!(target.list(), source.list());
    }

    #[test]
    fn test_corrupt_storage_reads_empty() {
        let kv = MemoryStore::new();
        kv.set(PATTERNS_KEY, "[oops").unwrap();
        let library = PatternLibrary::new(kv);
        assert!(library.list().is_empty());
        assert!(!library.save(pattern("a", 1.0)));
    }

    #[test]
    fn test_export_file_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(export_file_name(now), "servo_patterns_2024-03-09.json");
    }
}
