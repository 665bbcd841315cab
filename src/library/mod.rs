//! Library Store
//!
//! Three ordered collections of sound prints over a keyed store:
//! `public` (unbounded), `private` (capacity 6) and `trash` (capacity 3),
//! each most-recent-first. A print is in exactly one collection at a time.
//! Capacity conflicts never surface as errors; they resolve by eviction:
//! private overflow pushes its oldest entry into trash, and trash overflow
//! discards its oldest entry together with its blobs.
//!
//! Every operation is a synchronous read-modify-write of the collection
//! records. Single-threaded access is assumed.

mod print;
mod store;

pub use print::{Collection, Privacy, PrintMeta, SoundPrint, PRIVATE_CAPACITY, TRASH_CAPACITY};
pub use store::{FileStore, KeyValueStore, MemoryStore};

use std::collections::HashSet;
use std::io;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::capture::{checksum, Artifact};
use crate::error::{Result, RitualError};

pub struct Library<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Library<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Prints in `collection`, most recent first
    pub fn list(&self, collection: Collection) -> Result<Vec<SoundPrint>> {
        match self.store.get(&collection.store_key())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Locate a print and the collection holding it
    pub fn find(&self, id: &Uuid) -> Result<Option<(Collection, SoundPrint)>> {
        for collection in Collection::ALL {
            if let Some(print) = self.list(collection)?.into_iter().find(|p| p.id == *id) {
                return Ok(Some((collection, print)));
            }
        }
        Ok(None)
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<SoundPrint>> {
        Ok(self.find(id)?.map(|(_, print)| print))
    }

    /// Load a print's blobs, verifying them against its checksum
    pub fn load_blobs(&self, print: &SoundPrint) -> Result<(Vec<u8>, Option<Vec<u8>>)> {
        let image = self.store.get(&print.image_key)?.ok_or_else(|| missing_blob(&print.image_key))?;
        let audio = match print.audio_key.as_deref() {
            Some(key) => Some(self.store.get(key)?.ok_or_else(|| missing_blob(key))?),
            None => None,
        };

        if checksum(&image, audio.as_deref()) != print.checksum {
            return Err(RitualError::Integrity {
                key: print.image_key.clone(),
            });
        }
        Ok((image, audio))
    }

    pub fn load_image(&self, print: &SoundPrint) -> Result<Vec<u8>> {
        Ok(self.load_blobs(print)?.0)
    }

    pub fn load_audio(&self, print: &SoundPrint) -> Result<Option<Vec<u8>>> {
        Ok(self.load_blobs(print)?.1)
    }

    /// Rebuild the artifact a print was made from
    pub fn load_artifact(&self, print: &SoundPrint) -> Result<Artifact> {
        let (image, audio) = self.load_blobs(print)?;
        Ok(Artifact {
            id: print.id,
            image,
            audio,
            duration_secs: print.duration_secs,
            created_at: print.timestamp,
            checksum: print.checksum.clone(),
            final_eq: print.final_eq.clone(),
        })
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Persist a freshly crystallized artifact as a new print
    pub fn ingest(&mut self, artifact: &Artifact, meta: PrintMeta, privacy: Privacy) -> Result<SoundPrint> {
        let image_key = SoundPrint::image_key_for(&artifact.id);
        self.store.put(&image_key, &artifact.image)?;

        let audio_key = match artifact.audio.as_deref() {
            Some(audio) if !audio.is_empty() => {
                let key = SoundPrint::audio_key_for(&artifact.id);
                self.store.put(&key, audio)?;
                Some(key)
            }
            _ => None,
        };

        let print = SoundPrint {
            id: artifact.id,
            name: meta.name,
            tribe: meta.tribe,
            title: meta.title,
            image_key,
            audio_key,
            timestamp: artifact.created_at,
            duration_secs: artifact.duration_secs,
            privacy,
            deleted_at: None,
            checksum: artifact.checksum.clone(),
            final_eq: artifact.final_eq.clone(),
        };
        self.save(print.clone(), privacy)?;
        Ok(print)
    }

    /// Insert at the head of the collection for `privacy`.
    ///
    /// A full private collection first evicts its oldest entry into trash.
    pub fn save(&mut self, mut print: SoundPrint, privacy: Privacy) -> Result<()> {
        self.detach(&print.id)?;
        print.privacy = privacy;
        print.deleted_at = None;

        let collection = Collection::for_privacy(privacy);
        let mut prints = self.list(collection)?;
        if let Some(capacity) = collection.capacity() {
            while prints.len() >= capacity {
                let Some(evicted) = prints.pop() else { break };
                info!("[LIBRARY] {} full, moving oldest print {} to trash", collection, evicted.id);
                self.move_to_trash(evicted)?;
            }
        }

        debug!("[LIBRARY] Saved {} as {}", print.id, privacy);
        prints.insert(0, print);
        self.write(collection, &prints)
    }

    /// Insert at the head of trash, stamping the deletion time.
    ///
    /// The print leaves whichever collection held it. A full trash
    /// permanently discards its oldest entry first.
    pub fn move_to_trash(&mut self, mut print: SoundPrint) -> Result<()> {
        self.detach(&print.id)?;
        let mut trash = self.list(Collection::Trash)?;
        while trash.len() >= TRASH_CAPACITY {
            let Some(discarded) = trash.pop() else { break };
            info!("[LIBRARY] Trash full, permanently discarding {}", discarded.id);
            self.discard_blobs(&discarded)?;
        }

        print.deleted_at = Some(Utc::now());
        trash.insert(0, print);
        self.write(Collection::Trash, &trash)
    }

    /// Move a print between public and private. Returns its new privacy.
    pub fn toggle_privacy(&mut self, id: &Uuid) -> Result<Privacy> {
        for collection in [Collection::Public, Collection::Private] {
            let mut prints = self.list(collection)?;
            if let Some(index) = prints.iter().position(|p| p.id == *id) {
                let print = prints.remove(index);
                self.write(collection, &prints)?;
                let privacy = print.privacy.opposite();
                self.save(print, privacy)?;
                return Ok(privacy);
            }
        }
        Err(RitualError::PrintNotFound { id: id.to_string() })
    }

    /// Remove from `from`. Outside trash this moves the print to trash; in
    /// trash it is a permanent discard.
    pub fn delete(&mut self, id: &Uuid, from: Collection) -> Result<()> {
        let mut prints = self.list(from)?;
        let index = prints
            .iter()
            .position(|p| p.id == *id)
            .ok_or_else(|| RitualError::NotInCollection {
                id: id.to_string(),
                collection: from.to_string(),
            })?;
        let print = prints.remove(index);
        self.write(from, &prints)?;

        match from {
            Collection::Trash => {
                info!("[LIBRARY] Permanently deleted {}", print.id);
                self.discard_blobs(&print)
            }
            _ => self.move_to_trash(print),
        }
    }

    /// Take a print out of trash and save it as public
    pub fn restore(&mut self, id: &Uuid) -> Result<()> {
        let mut trash = self.list(Collection::Trash)?;
        let index = trash
            .iter()
            .position(|p| p.id == *id)
            .ok_or_else(|| RitualError::NotInCollection {
                id: id.to_string(),
                collection: Collection::Trash.to_string(),
            })?;
        let print = trash.remove(index);
        self.write(Collection::Trash, &trash)?;
        self.save(print, Privacy::Public)
    }

    /// Remove blobs that no print in any collection references.
    ///
    /// Returns the number of keys removed.
    pub fn prune_orphaned_blobs(&mut self) -> Result<usize> {
        let mut referenced = HashSet::new();
        for collection in Collection::ALL {
            for print in self.list(collection)? {
                referenced.extend(print.blob_keys().map(str::to_string));
            }
        }

        let mut removed = 0;
        for key in self.store.keys()? {
            if key.starts_with("blobs/") && !referenced.contains(&key) && self.store.remove(&key)? {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("[LIBRARY] Pruned {} orphaned blobs", removed);
        }
        Ok(removed)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn write(&mut self, collection: Collection, prints: &[SoundPrint]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(prints)?;
        self.store.put(&collection.store_key(), &bytes)
    }

    /// Remove `id` from whichever collection holds it, keeping its blobs
    fn detach(&mut self, id: &Uuid) -> Result<()> {
        for collection in Collection::ALL {
            let mut prints = self.list(collection)?;
            let before = prints.len();
            prints.retain(|p| p.id != *id);
            if prints.len() != before {
                self.write(collection, &prints)?;
            }
        }
        Ok(())
    }

    fn discard_blobs(&mut self, print: &SoundPrint) -> Result<()> {
        for key in print.blob_keys() {
            self.store.remove(key)?;
        }
        Ok(())
    }
}

fn missing_blob(key: &str) -> RitualError {
    RitualError::Storage {
        key: key.to_string(),
        source: io::Error::new(io::ErrorKind::NotFound, "blob missing"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::FinalEqState;

    fn artifact(seed: u8) -> Artifact {
        Artifact::assemble(vec![seed; 32], Vec::new(), None, 1.0, FinalEqState::new())
    }

    fn library() -> Library<MemoryStore> {
        Library::new(MemoryStore::new())
    }

    fn ids(library: &Library<MemoryStore>, collection: Collection) -> Vec<Uuid> {
        library.list(collection).unwrap().iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_public_is_unbounded() {
        let mut lib = library();
        for seed in 0..10 {
            lib.ingest(&artifact(seed), PrintMeta::default(), Privacy::Public).unwrap();
        }
        assert_eq!(lib.list(Collection::Public).unwrap().len(), 10);
        assert!(lib.list(Collection::Trash).unwrap().is_empty());
    }

    #[test]
    fn test_newest_first() {
        let mut lib = library();
        let a = lib.ingest(&artifact(1), PrintMeta::default(), Privacy::Public).unwrap();
        let b = lib.ingest(&artifact(2), PrintMeta::default(), Privacy::Public).unwrap();
        assert_eq!(ids(&lib, Collection::Public), vec![b.id, a.id]);
    }

    #[test]
    fn test_private_overflow_cascades_into_full_trash() {
        let mut lib = library();
        let mut private = Vec::new();
        for seed in 0..6 {
            private.push(lib.ingest(&artifact(seed), PrintMeta::default(), Privacy::Private).unwrap());
        }
        for seed in 10..13 {
            let print = lib.ingest(&artifact(seed), PrintMeta::default(), Privacy::Public).unwrap();
            lib.delete(&print.id, Collection::Public).unwrap();
        }
        let oldest_trash = *ids(&lib, Collection::Trash).last().unwrap();

        lib.ingest(&artifact(99), PrintMeta::default(), Privacy::Private).unwrap();

        let trash = ids(&lib, Collection::Trash);
        assert_eq!(trash.len(), 3);
        assert_eq!(trash[0], private[0].id);
        assert!(!trash.contains(&oldest_trash));
        assert!(lib.get(&oldest_trash).unwrap().is_none());
    }

    #[test]
    fn test_toggle_moves_between_collections() {
        let mut lib = library();
        let print = lib.ingest(&artifact(1), PrintMeta::default(), Privacy::Public).unwrap();

        assert_eq!(lib.toggle_privacy(&print.id).unwrap(), Privacy::Private);
        assert_eq!(lib.find(&print.id).unwrap().unwrap().0, Collection::Private);
        assert!(lib.list(Collection::Public).unwrap().is_empty());
    }

    #[test]
    fn test_move_to_trash_leaves_source_collection() {
        let mut lib = library();
        let public = lib.ingest(&artifact(1), PrintMeta::default(), Privacy::Public).unwrap();
        let private = lib.ingest(&artifact(2), PrintMeta::default(), Privacy::Private).unwrap();

        lib.move_to_trash(public.clone()).unwrap();
        lib.move_to_trash(private.clone()).unwrap();

        assert!(ids(&lib, Collection::Public).is_empty());
        assert!(ids(&lib, Collection::Private).is_empty());
        assert_eq!(ids(&lib, Collection::Trash), vec![private.id, public.id]);
    }

    #[test]
    fn test_toggle_trashed_print_fails() {
        let mut lib = library();
        let print = lib.ingest(&artifact(1), PrintMeta::default(), Privacy::Public).unwrap();
        lib.delete(&print.id, Collection::Public).unwrap();
        let err = lib.toggle_privacy(&print.id).unwrap_err();
        assert_eq!(err.error_code(), "PRINT_NOT_FOUND");
    }

    #[test]
    fn test_delete_from_wrong_collection() {
        let mut lib = library();
        let print = lib.ingest(&artifact(1), PrintMeta::default(), Privacy::Public).unwrap();
        let err = lib.delete(&print.id, Collection::Private).unwrap_err();
        assert_eq!(err.error_code(), "NOT_IN_COLLECTION");
    }

    #[test]
    fn test_delete_stamps_and_restore_clears() {
        let mut lib = library();
        let print = lib.ingest(&artifact(1), PrintMeta::default(), Privacy::Private).unwrap();
        lib.delete(&print.id, Collection::Private).unwrap();

        let (collection, trashed) = lib.find(&print.id).unwrap().unwrap();
        assert_eq!(collection, Collection::Trash);
        assert!(trashed.is_deleted());

        lib.restore(&print.id).unwrap();
        let (collection, restored) = lib.find(&print.id).unwrap().unwrap();
        assert_eq!(collection, Collection::Public);
        assert_eq!(restored.privacy, Privacy::Public);
        assert!(!restored.is_deleted());
    }

    #[test]
    fn test_permanent_delete_removes_blobs() {
        let mut lib = library();
        let print = lib.ingest(&artifact(1), PrintMeta::default(), Privacy::Public).unwrap();
        lib.delete(&print.id, Collection::Public).unwrap();
        lib.delete(&print.id, Collection::Trash).unwrap();

        assert!(lib.get(&print.id).unwrap().is_none());
        assert_eq!(lib.store().get(&print.image_key).unwrap(), None);
    }

    #[test]
    fn test_blobs_verified_on_load() {
        let mut lib = library();
        let print = lib.ingest(&artifact(7), PrintMeta::default(), Privacy::Public).unwrap();
        assert_eq!(lib.load_image(&print).unwrap(), vec![7; 32]);
        assert_eq!(lib.load_audio(&print).unwrap(), None);

        let mut store = lib.into_store();
        store.put(&print.image_key, &[0; 32]).unwrap();
        let lib = Library::new(store);
        let err = lib.load_image(&print).unwrap_err();
        assert_eq!(err.error_code(), "INTEGRITY");
    }

    #[test]
    fn test_prune_orphaned_blobs() {
        let mut lib = library();
        let kept = lib.ingest(&artifact(1), PrintMeta::default(), Privacy::Public).unwrap();
        let mut store = lib.into_store();
        store.put("blobs/stray/image.png", b"x").unwrap();
        let mut lib = Library::new(store);

        assert_eq!(lib.prune_orphaned_blobs().unwrap(), 1);
        assert_eq!(lib.prune_orphaned_blobs().unwrap(), 0);
        assert!(lib.load_image(&kept).is_ok());
    }

    #[test]
    fn test_load_artifact_roundtrip() {
        let mut lib = library();
        let original = artifact(3);
        let print = lib.ingest(&original, PrintMeta::default(), Privacy::Public).unwrap();
        let loaded = lib.load_artifact(&print).unwrap();
        assert_eq!(loaded.id, original.id);
        assert!(loaded.verify());
    }
}
