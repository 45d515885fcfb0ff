//! Persistent inverted index from fingerprint address to track postings.
//!
//! The on-disk format is a self-describing little-endian binary stream,
//! written atomically (temp file + rename) and validated strictly on load.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{AfpError, Result};

const MAGIC: &[u8; 8] = b"AFP\0v001";

/// A single occurrence of an address in a learned track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub track_id: u32,
    pub t_anchor: u32,
}

#[derive(Debug, Clone)]
struct Track {
    name: String,
    fingerprint_count: u32,
}

/// Summary of a stored track, as returned by [`FingerprintStore::tracks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub track_id: u32,
    pub name: String,
    pub fingerprint_count: u32,
}

/// The fingerprint database: an address -> postings index plus a track
/// table. Mutated only during `insert`; read-only during matching.
#[derive(Debug, Clone, Default)]
pub struct FingerprintStore {
    tracks: HashMap<u32, Track>,
    index: HashMap<u32, Vec<Posting>>,
    next_track_id: u32,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a store whose assigned `track_id`s start at `offset`.
    /// Sharded batch learners use this to keep each worker's ids disjoint
    /// before a final [`FingerprintStore::merge_disjoint`].
    pub fn new_with_id_offset(offset: u32) -> Self {
        Self {
            next_track_id: offset,
            ..Default::default()
        }
    }

    /// Insert a newly learned track's fingerprints, returning its assigned
    /// id. Every fingerprint is attributed to this one track; no cross-track
    /// pairing ever happens here or upstream.
    pub fn insert(&mut self, track_name: &str, fps: &[(u32, u32)]) -> u32 {
        let track_id = self.next_track_id;
        self.next_track_id += 1;

        for &(address, t_anchor) in fps {
            self.index.entry(address).or_default().push(Posting { track_id, t_anchor });
        }

        self.tracks.insert(
            track_id,
            Track {
                name: track_name.to_string(),
                fingerprint_count: fps.len() as u32,
            },
        );

        track_id
    }

    /// Postings recorded under `address`, in insertion order.
    pub fn recall(&self, address: u32) -> impl Iterator<Item = Posting> + '_ {
        self.index.get(&address).into_iter().flatten().copied()
    }

    pub fn tracks(&self) -> impl Iterator<Item = TrackInfo> + '_ {
        let mut ids: Vec<&u32> = self.tracks.keys().collect();
        ids.sort();
        ids.into_iter().map(move |id| {
            let t = &self.tracks[id];
            TrackInfo {
                track_id: *id,
                name: t.name.clone(),
                fingerprint_count: t.fingerprint_count,
            }
        })
    }

    pub fn track_name(&self, track_id: u32) -> Option<&str> {
        self.tracks.get(&track_id).map(|t| t.name.as_str())
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Merge another store whose `track_id`s are known to be disjoint from
    /// this one's, concatenating postings per address without re-hashing.
    /// Intended for sharded batch learning (see the concurrency model).
    pub fn merge_disjoint(&mut self, other: FingerprintStore) {
        for (id, track) in other.tracks {
            self.tracks.insert(id, track);
        }
        for (address, postings) in other.index {
            self.index.entry(address).or_default().extend(postings);
        }
        self.next_track_id = self.next_track_id.max(other.next_track_id);
    }

    /// Load a store from `path`. A missing file yields an empty store; any
    /// other error, or a file that fails validation, yields `IndexCorrupt`
    /// (propagated as `IndexIoError` for genuine I/O failures).
    pub fn load(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(err) => return Err(AfpError::IndexIoError(err.to_string())),
        };
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader).map_err(|e| match e {
            AfpError::IndexCorrupt(_) => e,
            other => AfpError::IndexCorrupt(other.to_string()),
        })
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 8];
        reader
            .read_exact(&mut magic)
            .map_err(|e| AfpError::IndexCorrupt(format!("truncated header: {}", e)))?;
        if &magic != MAGIC {
            return Err(AfpError::IndexCorrupt("bad magic header".to_string()));
        }

        let num_tracks = read_u32(reader)?;
        let mut tracks = HashMap::with_capacity(num_tracks as usize);
        let mut max_id = 0u32;
        for _ in 0..num_tracks {
            let track_id = read_u32(reader)?;
            let name_len = read_u16(reader)? as usize;
            let mut name_bytes = vec![0u8; name_len];
            reader
                .read_exact(&mut name_bytes)
                .map_err(|e| AfpError::IndexCorrupt(format!("truncated track name: {}", e)))?;
            let name = String::from_utf8(name_bytes)
                .map_err(|e| AfpError::IndexCorrupt(format!("track name is not utf8: {}", e)))?;
            let fingerprint_count = read_u32(reader)?;
            max_id = max_id.max(track_id.saturating_add(1));
            tracks.insert(track_id, Track { name, fingerprint_count });
        }

        let num_addresses = read_u32(reader)?;
        let mut index = HashMap::with_capacity(num_addresses as usize);
        for _ in 0..num_addresses {
            let address = read_u32(reader)?;
            let posting_count = read_u32(reader)?;
            let mut postings = Vec::with_capacity(posting_count as usize);
            for _ in 0..posting_count {
                let track_id = read_u32(reader)?;
                let t_anchor = read_u32(reader)?;
                postings.push(Posting { track_id, t_anchor });
            }
            index.insert(address, postings);
        }

        Ok(Self {
            tracks,
            index,
            next_track_id: max_id,
        })
    }

    /// Write the store to `path` via a temp file in the same directory,
    /// renamed into place so a reader never observes a partial write.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let tmp_path = dir.join(format!(
            ".{}.tmp",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("afp-store")
        ));

        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            self.write_to(&mut writer)?;
            writer.flush()?;
        }

        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(MAGIC)?;

        writer.write_u32::<LittleEndian>(self.tracks.len() as u32)?;
        let mut ids: Vec<&u32> = self.tracks.keys().collect();
        ids.sort();
        for id in ids {
            let track = &self.tracks[id];
            writer.write_u32::<LittleEndian>(*id)?;
            let name_bytes = track.name.as_bytes();
            writer.write_u16::<LittleEndian>(name_bytes.len() as u16)?;
            writer.write_all(name_bytes)?;
            writer.write_u32::<LittleEndian>(track.fingerprint_count)?;
        }

        writer.write_u32::<LittleEndian>(self.index.len() as u32)?;
        let mut addresses: Vec<&u32> = self.index.keys().collect();
        addresses.sort();
        for address in addresses {
            let postings = &self.index[address];
            writer.write_u32::<LittleEndian>(*address)?;
            writer.write_u32::<LittleEndian>(postings.len() as u32)?;
            for posting in postings {
                writer.write_u32::<LittleEndian>(posting.track_id)?;
                writer.write_u32::<LittleEndian>(posting.t_anchor)?;
            }
        }

        Ok(())
    }
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    reader
        .read_u32::<LittleEndian>()
        .map_err(|e| AfpError::IndexCorrupt(format!("truncated u32: {}", e)))
}

fn read_u16<R: Read>(reader: &mut R) -> Result<u16> {
    reader
        .read_u16::<LittleEndian>()
        .map_err(|e| AfpError::IndexCorrupt(format!("truncated u16: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn insert_assigns_sequential_ids() {
        let mut store = FingerprintStore::new();
        let a = store.insert("one", &[(1, 0)]);
        let b = store.insert("two", &[(2, 0)]);
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn recall_finds_postings_by_address() {
        let mut store = FingerprintStore::new();
        store.insert("track", &[(42, 5), (42, 9), (7, 0)]);
        let hits: Vec<Posting> = store.recall(42).collect();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].t_anchor, 5);
        assert_eq!(hits[1].t_anchor, 9);
    }

    #[test]
    fn recall_of_unknown_address_is_empty() {
        let store = FingerprintStore::new();
        assert_eq!(store.recall(999).count(), 0);
    }

    #[test]
    fn tracks_lists_names_and_counts_in_id_order() {
        let mut store = FingerprintStore::new();
        store.insert("b-track", &[(1, 0), (2, 0)]);
        store.insert("a-track", &[(3, 0)]);
        let infos: Vec<TrackInfo> = store.tracks().collect();
        assert_eq!(infos[0].name, "b-track");
        assert_eq!(infos[0].fingerprint_count, 2);
        assert_eq!(infos[1].name, "a-track");
        assert_eq!(infos[1].fingerprint_count, 1);
    }

    #[test]
    fn missing_file_loads_as_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.afp");
        let store = FingerprintStore::load(&path).unwrap();
        assert_eq!(store.track_count(), 0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.afp");

        let mut store = FingerprintStore::new();
        store.insert("track one", &[(10, 0), (10, 3), (20, 1)]);
        store.insert("track two", &[(10, 2)]);
        store.save(&path).unwrap();

        let loaded = FingerprintStore::load(&path).unwrap();
        assert_eq!(loaded.track_count(), 2);
        assert_eq!(loaded.track_name(0), Some("track one"));
        assert_eq!(loaded.recall(10).count(), 3);
    }

    #[test]
    fn bad_magic_is_index_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.afp");
        std::fs::write(&path, b"NOTAFPFILE").unwrap();
        let err = FingerprintStore::load(&path).unwrap_err();
        assert!(matches!(err, AfpError::IndexCorrupt(_)));
    }

    #[test]
    fn truncated_file_is_index_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("truncated.afp");
        std::fs::write(&path, MAGIC).unwrap();
        let err = FingerprintStore::load(&path).unwrap_err();
        assert!(matches!(err, AfpError::IndexCorrupt(_)));
    }

    #[test]
    fn merge_disjoint_combines_postings_without_rehashing() {
        let mut a = FingerprintStore::new();
        a.insert("a", &[(1, 0)]);

        let mut b = FingerprintStore::new_with_id_offset(1);
        b.insert("b", &[(1, 1)]);

        a.merge_disjoint(b);
        assert_eq!(a.recall(1).count(), 2);
        assert_eq!(a.track_count(), 2);
        assert_eq!(a.track_name(1), Some("b"));
    }
}
