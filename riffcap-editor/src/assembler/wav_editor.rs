use std::collections::HashMap;
use std::path::{Path, PathBuf};

use riffcap_core::WavContainer;

use super::labels;
use crate::models::error::EditorError;
use crate::models::file_id::FileSetId;
use crate::models::file_set::{WavFileDescriptor, WavFileSet};

/// Ordered collection of file sets with stable ids.
///
/// ```text
/// add_file_set("song.wav")
///   ├─ probe song.wav
///   ├─ probe song.1.wav, song.2.wav, … until the first missing number
///   └─ parse song.wav.txt labels, if present
/// ```
///
/// Every operation validates its input before touching the collection, so a
/// failed call leaves the editor unchanged.
#[derive(Debug, Default)]
pub struct WavEditor {
    sets: HashMap<u16, WavFileSet>,
    order: Vec<u16>,
    last_id: u16,
}

impl WavEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recording and its continuations. Returns the new set id.
    pub fn add_file_set(&mut self, path: impl AsRef<Path>) -> Result<u16, EditorError> {
        let path = path.as_ref();
        let file = probe(path)?;

        let mut extensions = Vec::new();
        for n in 1u32.. {
            let ext_path = extension_path(path, n);
            if !ext_path.is_file() {
                break;
            }
            if extensions.len() >= 0x7FFE {
                return Err(EditorError::InvalidSetting {
                    field: "extensions",
                    reason: format!("too many continuation files for {}", path.display()),
                });
            }
            let ext = probe(&ext_path)?;
            check_extension(&file, &ext)?;
            extensions.push(ext);
        }

        let meta_path = metadata_path(path);
        let (metadata_path, labels) = if meta_path.is_file() {
            match labels::load_labels(&meta_path) {
                Ok(labels) => (Some(meta_path), labels),
                Err(e) => {
                    log::warn!("ignoring labels in {}: {}", meta_path.display(), e);
                    (None, Vec::new())
                }
            }
        } else {
            (None, Vec::new())
        };

        let id = self.allocate_id()?;
        log::debug!(
            "added file set {} ({} + {} extensions, {} labels)",
            id,
            path.display(),
            extensions.len(),
            labels.len()
        );
        self.sets.insert(id, WavFileSet { id, file, extensions, metadata_path, labels });
        self.order.push(id);
        Ok(id)
    }

    fn allocate_id(&mut self) -> Result<u16, EditorError> {
        for _ in 0..u16::MAX {
            self.last_id = self.last_id.wrapping_add(1);
            if self.last_id == 0 {
                self.last_id = 1;
            }
            if !self.sets.contains_key(&self.last_id) {
                return Ok(self.last_id);
            }
        }
        Err(EditorError::IdsExhausted)
    }

    /// Attach a label file to a set, replacing any existing labels.
    pub fn set_metadata(&mut self, set: u16, path: impl AsRef<Path>) -> Result<(), EditorError> {
        if !self.sets.contains_key(&set) {
            return Err(EditorError::UnknownId(set as u32));
        }
        let path = path.as_ref();
        let labels = labels::load_labels(path)?;
        if let Some(entry) = self.sets.get_mut(&set) {
            entry.metadata_path = Some(path.to_path_buf());
            entry.labels = labels;
        }
        Ok(())
    }

    pub fn remove(&mut self, id: FileSetId) -> Result<(), EditorError> {
        let set = self.sets.get_mut(&id.set()).ok_or(EditorError::UnknownId(id.to_raw()))?;
        match id {
            FileSetId::Set(set_id) => {
                self.sets.remove(&set_id);
                self.order.retain(|&s| s != set_id);
            }
            FileSetId::Extension { index, .. } => {
                if index as usize >= set.extensions.len() {
                    return Err(EditorError::UnknownId(id.to_raw()));
                }
                set.extensions.remove(index as usize);
            }
            FileSetId::Metadata(_) => {
                set.metadata_path = None;
                set.labels.clear();
            }
        }
        Ok(())
    }

    /// Drop every continuation file of a set.
    pub fn remove_extensions(&mut self, set: u16) -> Result<(), EditorError> {
        let entry = self.sets.get_mut(&set).ok_or(EditorError::UnknownId(set as u32))?;
        entry.extensions.clear();
        Ok(())
    }

    /// Move each selected item up one slot unless the slot above is also selected.
    pub fn move_up(&mut self, ids: &[FileSetId]) -> Result<(), EditorError> {
        self.shift(ids, Direction::Up)
    }

    /// Move each selected item down one slot unless the slot below is also selected.
    pub fn move_down(&mut self, ids: &[FileSetId]) -> Result<(), EditorError> {
        self.shift(ids, Direction::Down)
    }

    fn shift(&mut self, ids: &[FileSetId], dir: Direction) -> Result<(), EditorError> {
        let mut sets = Vec::new();
        let mut extensions: HashMap<u16, Vec<usize>> = HashMap::new();
        for &id in ids {
            let entry = self.sets.get(&id.set()).ok_or(EditorError::UnknownId(id.to_raw()))?;
            match id {
                FileSetId::Set(s) => sets.push(s),
                FileSetId::Extension { set, index } => {
                    if index as usize >= entry.extensions.len() {
                        return Err(EditorError::UnknownId(id.to_raw()));
                    }
                    extensions.entry(set).or_default().push(index as usize);
                }
                FileSetId::Metadata(_) => {}
            }
        }

        let selected: Vec<bool> = self.order.iter().map(|s| sets.contains(s)).collect();
        shift_selected(&mut self.order, selected, dir);

        for (set, indices) in extensions {
            if let Some(entry) = self.sets.get_mut(&set) {
                let selected = (0..entry.extensions.len()).map(|i| indices.contains(&i)).collect();
                shift_selected(&mut entry.extensions, selected, dir);
            }
        }
        Ok(())
    }

    /// Replace the display order. `ids` must name every set exactly once.
    pub fn order(&mut self, ids: &[u16]) -> Result<(), EditorError> {
        if ids.len() != self.order.len() {
            return Err(EditorError::InvalidSetting {
                field: "order",
                reason: format!("expected {} ids, got {}", self.order.len(), ids.len()),
            });
        }
        for (i, id) in ids.iter().enumerate() {
            if !self.sets.contains_key(id) {
                return Err(EditorError::UnknownId(*id as u32));
            }
            if ids[..i].contains(id) {
                return Err(EditorError::InvalidSetting { field: "order", reason: format!("duplicate id {}", id) });
            }
        }
        self.order = ids.to_vec();
        Ok(())
    }

    pub fn by_id(&self, id: u16) -> Option<&WavFileSet> {
        self.sets.get(&id)
    }

    pub fn by_index(&self, index: usize) -> Option<&WavFileSet> {
        self.order.get(index).and_then(|id| self.sets.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Set ids in display order.
    pub fn ids(&self) -> &[u16] {
        &self.order
    }

    /// Sets in display order.
    pub fn iter(&self) -> impl Iterator<Item = &WavFileSet> {
        self.order.iter().filter_map(|id| self.sets.get(id))
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Up,
    Down,
}

/// Block-preserving one-slot move of the selected items.
fn shift_selected<T>(items: &mut [T], mut selected: Vec<bool>, dir: Direction) {
    let n = items.len();
    match dir {
        Direction::Up => {
            for i in 1..n {
                if selected[i] && !selected[i - 1] {
                    items.swap(i, i - 1);
                    selected.swap(i, i - 1);
                }
            }
        }
        Direction::Down => {
            for i in (0..n.saturating_sub(1)).rev() {
                if selected[i] && !selected[i + 1] {
                    items.swap(i, i + 1);
                    selected.swap(i, i + 1);
                }
            }
        }
    }
}

fn probe(path: &Path) -> Result<WavFileDescriptor, EditorError> {
    let wav = WavContainer::open(path)?;
    Ok(WavFileDescriptor { path: path.to_path_buf(), spec: wav.spec(), samples: wav.total_samples() })
}

fn check_extension(primary: &WavFileDescriptor, ext: &WavFileDescriptor) -> Result<(), EditorError> {
    if ext.spec.channels != primary.spec.channels {
        return Err(EditorError::InvalidSetting {
            field: "extension",
            reason: format!(
                "{} has {} channels, {} has {}",
                ext.path.display(),
                ext.spec.channels,
                primary.path.display(),
                primary.spec.channels
            ),
        });
    }
    Ok(())
}

/// `<dir>/<stem>.<n>.<ext>` for continuation `n`.
pub fn extension_path(path: &Path, n: u32) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}.{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}.{}", stem, n),
    };
    path.with_file_name(name)
}

/// Label file path for a recording: the full name plus `.txt`.
pub fn metadata_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".txt");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use riffcap_core::{SampleFormat, SaveOptions, WavSpec};
    use std::fs;

    fn write_wav(path: &Path, channels: u16, frames: usize) {
        let spec = WavSpec { format: SampleFormat::Pcm, channels, sample_rate: 44100, bits_per_sample: 16 };
        let batches = vec![vec![0.25; frames]; channels as usize];
        WavContainer::new(spec).save(path, &batches, &SaveOptions::pcm(16)).unwrap();
    }

    fn editor_with(dir: &Path, names: &[&str]) -> (WavEditor, Vec<u16>) {
        let mut editor = WavEditor::new();
        let ids = names
            .iter()
            .map(|n| {
                let p = dir.join(n);
                write_wav(&p, 1, 10);
                editor.add_file_set(&p).unwrap()
            })
            .collect();
        (editor, ids)
    }

    #[test]
    fn detects_extensions_until_gap() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("song.wav");
        write_wav(&main, 2, 100);
        write_wav(&dir.path().join("song.1.wav"), 2, 50);
        write_wav(&dir.path().join("song.2.wav"), 2, 25);
        write_wav(&dir.path().join("song.4.wav"), 2, 25);

        let mut editor = WavEditor::new();
        let id = editor.add_file_set(&main).unwrap();
        let set = editor.by_id(id).unwrap();
        assert_ne!(id, 0);
        assert_eq!(set.extensions.len(), 2);
        assert_eq!(set.total_samples(), 175);
        assert!(set.metadata_path.is_none());
    }

    #[test]
    fn extension_channel_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("a.wav");
        write_wav(&main, 2, 10);
        write_wav(&dir.path().join("a.1.wav"), 1, 10);
        let mut editor = WavEditor::new();
        assert!(editor.add_file_set(&main).is_err());
        assert!(editor.is_empty());
    }

    #[test]
    fn loads_sibling_labels() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("take.wav");
        write_wav(&main, 1, 10);
        fs::write(dir.path().join("take.wav.txt"), "0.1 0.1 [7: intro]\n").unwrap();

        let mut editor = WavEditor::new();
        let id = editor.add_file_set(&main).unwrap();
        let set = editor.by_id(id).unwrap();
        assert_eq!(set.labels.len(), 1);
        assert_eq!(set.label(7).unwrap().text, "intro");
    }

    #[test]
    fn bad_labels_leave_metadata_absent() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("take.wav");
        write_wav(&main, 1, 10);
        fs::write(dir.path().join("take.wav.txt"), "0.1 0.1 [7: intro]\nnonsense\n").unwrap();

        let mut editor = WavEditor::new();
        let id = editor.add_file_set(&main).unwrap();
        let set = editor.by_id(id).unwrap();
        assert!(set.labels.is_empty());
        assert!(set.metadata_path.is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut editor = WavEditor::new();
        assert!(editor.add_file_set(dir.path().join("nope.wav")).is_err());
        assert_eq!(editor.len(), 0);
    }

    #[test]
    fn move_up_keeps_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let (mut editor, ids) = editor_with(dir.path(), &["a.wav", "b.wav", "c.wav", "d.wav"]);
        editor.move_up(&[FileSetId::Set(ids[2]), FileSetId::Set(ids[3])]).unwrap();
        assert_eq!(editor.ids(), &[ids[0], ids[2], ids[3], ids[1]]);

        // The first item is pinned; its selected neighbour stays behind it.
        editor.move_up(&[FileSetId::Set(ids[0]), FileSetId::Set(ids[2])]).unwrap();
        assert_eq!(editor.ids(), &[ids[0], ids[2], ids[3], ids[1]]);
    }

    #[test]
    fn move_down_keeps_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let (mut editor, ids) = editor_with(dir.path(), &["a.wav", "b.wav", "c.wav"]);
        editor.move_down(&[FileSetId::Set(ids[0]), FileSetId::Set(ids[1])]).unwrap();
        assert_eq!(editor.ids(), &[ids[2], ids[0], ids[1]]);
        editor.move_down(&[FileSetId::Set(ids[1])]).unwrap();
        assert_eq!(editor.ids(), &[ids[2], ids[0], ids[1]]);
    }

    #[test]
    fn move_extensions_within_set() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("s.wav");
        write_wav(&main, 1, 10);
        for (n, frames) in [(1, 11), (2, 12), (3, 13)] {
            write_wav(&dir.path().join(format!("s.{}.wav", n)), 1, frames);
        }
        let mut editor = WavEditor::new();
        let id = editor.add_file_set(&main).unwrap();
        editor.move_up(&[FileSetId::Extension { set: id, index: 2 }]).unwrap();
        let lens: Vec<u64> = editor.by_id(id).unwrap().extensions.iter().map(|e| e.samples).collect();
        assert_eq!(lens, vec![11, 13, 12]);
    }

    #[test]
    fn remove_variants() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("r.wav");
        write_wav(&main, 1, 10);
        write_wav(&dir.path().join("r.1.wav"), 1, 10);
        write_wav(&dir.path().join("r.2.wav"), 1, 10);
        fs::write(dir.path().join("r.wav.txt"), "1 1 [1: x]\n").unwrap();

        let mut editor = WavEditor::new();
        let id = editor.add_file_set(&main).unwrap();
        editor.remove(FileSetId::Extension { set: id, index: 0 }).unwrap();
        assert_eq!(editor.by_id(id).unwrap().extensions.len(), 1);
        editor.remove(FileSetId::Metadata(id)).unwrap();
        assert!(editor.by_id(id).unwrap().labels.is_empty());
        editor.remove_extensions(id).unwrap();
        assert!(editor.by_id(id).unwrap().extensions.is_empty());
        editor.remove(FileSetId::Set(id)).unwrap();
        assert!(editor.is_empty());
        assert!(matches!(editor.remove(FileSetId::Set(id)), Err(EditorError::UnknownId(_))));
    }

    #[test]
    fn order_requires_permutation() {
        let dir = tempfile::tempdir().unwrap();
        let (mut editor, ids) = editor_with(dir.path(), &["a.wav", "b.wav"]);
        assert!(editor.order(&[ids[0]]).is_err());
        assert!(editor.order(&[ids[0], ids[0]]).is_err());
        assert!(editor.order(&[ids[0], 999]).is_err());
        editor.order(&[ids[1], ids[0]]).unwrap();
        assert_eq!(editor.by_index(0).unwrap().id, ids[1]);
        assert_eq!(editor.iter().map(|s| s.id).collect::<Vec<_>>(), vec![ids[1], ids[0]]);
    }

    #[test]
    fn ids_are_unique_and_non_zero() {
        let dir = tempfile::tempdir().unwrap();
        let (mut editor, ids) = editor_with(dir.path(), &["a.wav", "b.wav"]);
        assert!(ids.iter().all(|&id| id != 0));
        assert_ne!(ids[0], ids[1]);
        editor.remove(FileSetId::Set(ids[0])).unwrap();
        let again = editor.add_file_set(dir.path().join("a.wav")).unwrap();
        assert_ne!(again, ids[1]);
        assert_ne!(again, 0);
    }

    #[test]
    fn manual_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let (mut editor, ids) = editor_with(dir.path(), &["a.wav"]);
        let labels = dir.path().join("custom.txt");
        fs::write(&labels, "2 2 [1: loop]\n").unwrap();
        editor.set_metadata(ids[0], &labels).unwrap();
        assert_eq!(editor.by_id(ids[0]).unwrap().metadata_path.as_deref(), Some(labels.as_path()));

        fs::write(&labels, "oops\n").unwrap();
        assert!(editor.set_metadata(ids[0], &labels).is_err());
        assert_eq!(editor.by_id(ids[0]).unwrap().labels.len(), 1);
    }

    #[test]
    fn extension_naming() {
        assert_eq!(extension_path(Path::new("/x/song.wav"), 3), PathBuf::from("/x/song.3.wav"));
        assert_eq!(metadata_path(Path::new("/x/song.wav")), PathBuf::from("/x/song.wav.txt"));
    }
}
