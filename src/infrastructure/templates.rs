//! Narrative template files on disk: `template_NN_<name>.txt` in one
//! directory, plus one-time conversion of older `.docx` templates.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::domain::alert::{
    display_name, next_template_number, numbered_name, template_number, TemplateDocument,
    TemplateEntry, TEMPLATE_EXTENSION, TEMPLATE_FILE_PREFIX,
};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::documents::read_docx_paragraphs;
use crate::infrastructure::storage::ensure_dir;

pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    /// Opens the store, creating the directory and converting legacy
    /// `.docx` templates that have no `.txt` sibling yet.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        ensure_dir(&dir).map_err(|e| {
            AppError::IoError(format!(
                "Failed to create template directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        let store = Self { dir };
        let converted = store.convert_legacy_docx();
        if converted > 0 {
            info!(converted, dir = %store.dir.display(), "Converted legacy templates");
        }
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, full_name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", full_name, TEMPLATE_EXTENSION))
    }

    fn file_stems(&self, extension: &str) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            AppError::IoError(format!(
                "Failed to read template directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut stems = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| ext.eq_ignore_ascii_case(extension));
            if !matches {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_string());
            }
        }
        Ok(stems)
    }

    /// Converts each `.docx` without a sibling `.txt`. Failures are logged
    /// and skipped. Returns the number converted.
    pub fn convert_legacy_docx(&self) -> usize {
        let stems = match self.file_stems("docx") {
            Ok(stems) => stems,
            Err(err) => {
                warn!(error = %err, "Could not scan for legacy templates");
                return 0;
            }
        };

        let mut converted = 0;
        for stem in stems {
            let txt_path = self.path_for(&stem);
            if txt_path.exists() {
                continue;
            }
            let docx_path = self.dir.join(format!("{}.docx", stem));
            let result = read_docx_paragraphs(&docx_path).and_then(|text| {
                fs::write(&txt_path, text).map_err(AppError::from)
            });
            match result {
                Ok(()) => {
                    debug!(template = %stem, "Converted docx template");
                    converted += 1;
                }
                Err(err) => {
                    warn!(template = %stem, error = %err, "Failed to convert docx template");
                }
            }
        }
        converted
    }

    /// Every stored template, numbered ones first in number order; the
    /// rest keep directory order.
    pub fn list(&self) -> Result<Vec<TemplateEntry>> {
        let mut entries: Vec<TemplateEntry> = self
            .file_stems(TEMPLATE_EXTENSION)?
            .into_iter()
            .map(|full_name| TemplateEntry {
                display_name: display_name(&full_name),
                full_name,
            })
            .collect();
        entries.sort_by_key(|entry| template_number(&entry.full_name).unwrap_or(i64::MAX));
        Ok(entries)
    }

    /// Resolves a display name (or a full stem) to the stem on disk.
    pub fn resolve(&self, name: &str) -> Result<TemplateEntry> {
        let name = name.trim();
        let entries = self.list()?;
        entries
            .iter()
            .find(|entry| entry.display_name == name)
            .or_else(|| entries.iter().find(|entry| entry.full_name == name))
            .cloned()
            .ok_or_else(|| AppError::NotFound("Selected template not found.".to_string()))
    }

    pub fn load(&self, name: &str) -> Result<TemplateDocument> {
        let entry = self.resolve(name)?;
        let content = fs::read_to_string(self.path_for(&entry.full_name))?;
        Ok(TemplateDocument {
            display_name: entry.display_name,
            full_name: entry.full_name,
            content,
        })
    }

    fn next_full_name(&self, name: &str) -> Result<String> {
        if name.starts_with(TEMPLATE_FILE_PREFIX) {
            return Ok(name.to_string());
        }
        let taken: Vec<i64> = self
            .file_stems(TEMPLATE_EXTENSION)?
            .iter()
            .filter(|stem| stem.starts_with(TEMPLATE_FILE_PREFIX))
            .filter_map(|stem| template_number(stem))
            .collect();
        Ok(numbered_name(next_template_number(&taken), name))
    }

    /// Creates or updates a template. `editing` is the display name of the
    /// template being edited; renaming allocates a new numbered file and
    /// removes the old one.
    pub fn save(
        &self,
        name: &str,
        content: &str,
        editing: Option<&str>,
    ) -> Result<TemplateDocument> {
        let name = name.trim();
        let content = content.trim();
        if name.is_empty() {
            return Err(AppError::ValidationError(
                "Please enter a template name.".to_string(),
            ));
        }
        if content.is_empty() {
            return Err(AppError::ValidationError(
                "Please enter template content.".to_string(),
            ));
        }
        if name.contains(['/', '\\']) {
            return Err(AppError::ValidationError(
                "Template names cannot contain path separators.".to_string(),
            ));
        }

        let existing = editing
            .map(str::trim)
            .filter(|editing| !editing.is_empty())
            .map(|editing| self.resolve(editing))
            .transpose()?;

        let full_name = match &existing {
            Some(entry) if entry.display_name == name => entry.full_name.clone(),
            _ => self.next_full_name(name)?,
        };

        fs::write(self.path_for(&full_name), content)?;

        if let Some(entry) = existing {
            if entry.full_name != full_name {
                let old_path = self.path_for(&entry.full_name);
                if old_path.exists() {
                    fs::remove_file(&old_path)?;
                }
                info!(from = %entry.full_name, to = %full_name, "Renamed template");
            }
        }

        info!(template = %full_name, "Saved template");
        Ok(TemplateDocument {
            display_name: display_name(&full_name),
            full_name,
            content: content.to_string(),
        })
    }

    pub fn delete(&self, name: &str) -> Result<TemplateEntry> {
        let entry = self.resolve(name)?;
        fs::remove_file(self.path_for(&entry.full_name))?;
        info!(template = %entry.full_name, "Deleted template");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::documents::write_docx;

    fn store() -> (tempfile::TempDir, TemplateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::open(dir.path().join("alert_templates")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_save_allocates_numbers_and_lists_in_order() {
        let (_dir, store) = store();
        let first = store.save("Structuring", "Customer {customer_id}", None).unwrap();
        let second = store.save("Wire", "Wire for {customer_name}", None).unwrap();
        fs::write(store.dir().join("Legacy.txt"), "old").unwrap();

        assert_eq!(first.full_name, "template_01_Structuring");
        assert_eq!(second.full_name, "template_02_Wire");

        let names: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|entry| entry.display_name)
            .collect();
        assert_eq!(names, vec!["Structuring", "Wire", "Legacy"]);
    }

    #[test]
    fn test_save_reuses_lowest_free_number() {
        let (_dir, store) = store();
        store.save("A", "a", None).unwrap();
        store.save("B", "b", None).unwrap();
        store.delete("A").unwrap();
        let saved = store.save("C", "c", None).unwrap();
        assert_eq!(saved.full_name, "template_01_C");
    }

    #[test]
    fn test_edit_same_name_overwrites() {
        let (_dir, store) = store();
        store.save("Wire", "v1", None).unwrap();
        let saved = store.save("Wire", "  v2  ", Some("Wire")).unwrap();
        assert_eq!(saved.full_name, "template_01_Wire");
        assert_eq!(store.load("Wire").unwrap().content, "v2");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_edit_with_new_name_renames() {
        let (_dir, store) = store();
        store.save("Wire", "body", None).unwrap();
        let saved = store.save("Outgoing Wire", "body", Some("Wire")).unwrap();
        assert_eq!(saved.display_name, "Outgoing Wire");
        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].display_name, "Outgoing Wire");
        assert!(matches!(store.load("Wire"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_save_validation_messages() {
        let (_dir, store) = store();
        let err = store.save("  ", "content", None).unwrap_err();
        assert_eq!(err.message(), "Please enter a template name.");
        let err = store.save("Name", "\n\t", None).unwrap_err();
        assert_eq!(err.message(), "Please enter template content.");
    }

    #[test]
    fn test_delete_resolves_display_name() {
        let (_dir, store) = store();
        store.save("Structuring", "x", None).unwrap();
        let removed = store.delete("Structuring").unwrap();
        assert_eq!(removed.full_name, "template_01_Structuring");
        assert!(store.list().unwrap().is_empty());
        assert!(store.delete("Structuring").is_err());
    }

    #[test]
    fn test_legacy_docx_is_converted_once() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("alert_templates");
        fs::create_dir_all(&templates).unwrap();
        write_docx(&templates.join("template_03_Legacy.docx"), None, "Line one\nLine two")
            .unwrap();
        fs::write(templates.join("broken.docx"), b"not a zip").unwrap();

        let store = TemplateStore::open(&templates).unwrap();
        let doc = store.load("Legacy").unwrap();
        assert_eq!(doc.full_name, "template_03_Legacy");
        assert!(doc.content.contains("Line one"));
        assert!(!templates.join("broken.txt").exists());
        assert_eq!(store.convert_legacy_docx(), 0);
    }
}
