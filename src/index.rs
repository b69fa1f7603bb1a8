//! # Vector indexes and their metadata tables
//!
//! Each searchable field has two pre-built artifacts in the vector storage
//! directory:
//!
//! | field      | index file      | metadata file |
//! |------------|-----------------|---------------|
//! | `incoming` | `index_q.hnsw`  | `meta_q.json` |
//! | `reply`    | `index_a.hnsw`  | `meta_a.json` |
//!
//! The index is a [HNSW](https://arxiv.org/abs/1603.09320) dump written by the
//! `hora` crate, with every node id equal to the row position of its entry in
//! the metadata table. The metadata table is a JSON array of `{q, a}` objects.
//!
//! Nothing here builds or updates an index; files are only read, and they are
//! read again on every search.

use std::{
    fmt,
    fs::{self, File},
    io::Read,
    panic,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use hora::core::ann_index::{ANNIndex, SerializableIndex};
use hora::core::node::Node;
use hora::index::hnsw_idx::HNSWIndex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ReplyError, Result};

/// Which historical corpus to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    /// Historical incoming documents.
    Incoming,
    /// Historical replies.
    Reply,
}

impl SearchField {
    pub fn index_file(self) -> &'static str {
        match self {
            SearchField::Incoming => "index_q.hnsw",
            SearchField::Reply => "index_a.hnsw",
        }
    }

    pub fn metadata_file(self) -> &'static str {
        match self {
            SearchField::Incoming => "meta_q.json",
            SearchField::Reply => "meta_a.json",
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchField::Incoming => f.write_str("incoming"),
            SearchField::Reply => f.write_str("reply"),
        }
    }
}

/// One metadata row: a historical incoming document and the reply it received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub q: String,
    pub a: String,
}

/// A neighbor reported by an index. `position` is `None` for sentinel slots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: Option<usize>,
    pub distance: f32,
}

/// A read-only nearest-neighbor index.
pub trait VectorIndex: Send + Sync {
    /// Length of the vectors the index was built with.
    fn dimension(&self) -> usize;

    /// Number of stored vectors, if the index can report it.
    fn vector_count(&self) -> Option<usize> {
        None
    }

    /// Up to `top_k` neighbors of `query`, nearest first.
    fn nearest(&self, query: &[f32], top_k: usize) -> Vec<Neighbor>;
}

/// A `hora` HNSW dump opens with the dimension and the item count, each a
/// little-endian `u64`.
const HORA_HEADER_LEN: usize = 16;

/// [`VectorIndex`] over a `hora` HNSW dump.
pub struct HoraIndex {
    inner: HNSWIndex<f32, usize>,
    vectors: usize,
}

impl HoraIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let index_err = |message: String| ReplyError::Index {
            path: path.to_path_buf(),
            message,
        };
        let path_str = path
            .to_str()
            .ok_or_else(|| index_err("path is not valid UTF-8".to_string()))?;
        if !path.is_file() {
            return Err(index_err("file not found".to_string()));
        }
        let vectors = read_item_count(path).map_err(index_err)?;

        // hora unwraps its own decode errors, so a damaged dump panics inside `load`.
        let inner = match panic::catch_unwind(|| HNSWIndex::<f32, usize>::load(path_str)) {
            Ok(Ok(inner)) => inner,
            Ok(Err(e)) => return Err(index_err(e.to_string())),
            Err(_) => return Err(index_err("not a readable hora HNSW dump".to_string())),
        };
        debug!("Loaded hora index with {} vectors", vectors);
        Ok(Self { inner, vectors })
    }
}

fn read_item_count(path: &Path) -> std::result::Result<usize, String> {
    let mut header = [0u8; HORA_HEADER_LEN];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .map_err(|e| format!("unable to read index header: {e}"))?;
    let mut count = [0u8; 8];
    count.copy_from_slice(&header[8..]);
    usize::try_from(u64::from_le_bytes(count))
        .map_err(|_| "index item count does not fit in usize".to_string())
}

impl VectorIndex for HoraIndex {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn vector_count(&self) -> Option<usize> {
        Some(self.vectors)
    }

    fn nearest(&self, query: &[f32], top_k: usize) -> Vec<Neighbor> {
        let mut neighbors: Vec<Neighbor> = self
            .inner
            .search_nodes(query, top_k)
            .into_iter()
            .map(|(node, distance): (Node<f32, usize>, f32)| Neighbor {
                position: *node.idx(),
                distance,
            })
            .collect();
        // nearest first
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors
    }
}

/// A vector index together with its position-aligned metadata table.
pub struct IndexPair {
    pub field: SearchField,
    pub index: Box<dyn VectorIndex>,
    pub entries: Vec<IndexEntry>,
}

impl IndexPair {
    /// Pair an index with its metadata, refusing tables whose length differs from
    /// the index's vector count.
    pub fn new(
        field: SearchField,
        index: Box<dyn VectorIndex>,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        if let Some(vectors) = index.vector_count() {
            if vectors != entries.len() {
                return Err(ReplyError::Misaligned {
                    field,
                    rows: entries.len(),
                    vectors,
                });
            }
        }
        Ok(Self {
            field,
            index,
            entries,
        })
    }

    /// Metadata row at `position`.
    pub fn entry(&self, position: usize) -> Result<&IndexEntry> {
        self.entries
            .get(position)
            .ok_or(ReplyError::PositionOutOfRange {
                position,
                rows: self.entries.len(),
            })
    }
}

/// Source of [`IndexPair`]s.
pub trait IndexStore: Send + Sync {
    fn load(&self, field: SearchField) -> Result<IndexPair>;
}

/// [`IndexStore`] reading `hora` dumps and JSON metadata from a directory.
pub struct DirectoryIndexStore {
    root: PathBuf,
}

impl DirectoryIndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl IndexStore for DirectoryIndexStore {
    fn load(&self, field: SearchField) -> Result<IndexPair> {
        let index_path = self.root.join(field.index_file());
        let metadata_path = self.root.join(field.metadata_file());
        debug!(
            "Loading {} index from {} and {}",
            field,
            index_path.display(),
            metadata_path.display()
        );

        let index = HoraIndex::load(&index_path)?;
        let entries = load_metadata(&metadata_path)?;
        IndexPair::new(field, Box::new(index), entries)
    }
}

/// Read a JSON metadata table.
pub fn load_metadata(path: &Path) -> Result<Vec<IndexEntry>> {
    let content = fs::read_to_string(path).map_err(|source| ReplyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ReplyError::Metadata {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hora::core::metrics::Metric;
    use hora::index::hnsw_params::HNSWParams;
    use serde_json::json;

    struct CountedIndex(usize);

    impl VectorIndex for CountedIndex {
        fn dimension(&self) -> usize {
            2
        }
        fn vector_count(&self) -> Option<usize> {
            Some(self.0)
        }
        fn nearest(&self, _query: &[f32], _top_k: usize) -> Vec<Neighbor> {
            Vec::new()
        }
    }

    fn entries(n: usize) -> Vec<IndexEntry> {
        (0..n)
            .map(|i| IndexEntry {
                q: format!("主旨：來文{i}說明：內容{i}"),
                a: format!("回文{i}"),
            })
            .collect()
    }

    fn write_store(dir: &Path, field: SearchField, vectors: &[[f32; 3]]) {
        let mut index = HNSWIndex::<f32, usize>::new(3, &HNSWParams::default());
        for (id, v) in vectors.iter().enumerate() {
            index.add(v, id).unwrap();
        }
        index.build(Metric::Euclidean).unwrap();
        index
            .dump(dir.join(field.index_file()).to_str().unwrap())
            .unwrap();
        fs::write(
            dir.join(field.metadata_file()),
            serde_json::to_string(&entries(vectors.len())).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_misaligned_pair_is_rejected() {
        let err = IndexPair::new(SearchField::Reply, Box::new(CountedIndex(3)), entries(2))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ReplyError::Misaligned {
                field: SearchField::Reply,
                rows: 2,
                vectors: 3
            }
        ));
    }

    #[test]
    fn test_entry_out_of_range() {
        let pair =
            IndexPair::new(SearchField::Incoming, Box::new(CountedIndex(2)), entries(2)).unwrap();
        assert_eq!(pair.entry(1).unwrap().a, "回文1");
        assert!(matches!(
            pair.entry(2),
            Err(ReplyError::PositionOutOfRange { position: 2, rows: 2 })
        ));
    }

    #[test]
    fn test_directory_store_loads_hora_dump() {
        let dir = tempfile::tempdir().unwrap();
        write_store(
            dir.path(),
            SearchField::Incoming,
            &[[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
        );

        let store = DirectoryIndexStore::new(dir.path());
        let pair = store.load(SearchField::Incoming).unwrap();

        assert_eq!(pair.index.dimension(), 3);
        assert_eq!(pair.index.vector_count(), Some(3));
        assert_eq!(pair.entries.len(), 3);

        let neighbors = pair.index.nearest(&[0.0, 0.9, 0.1], 2);
        assert!(!neighbors.is_empty() && neighbors.len() <= 2);
        assert_eq!(neighbors[0].position, Some(1));
        assert!(
            neighbors
                .windows(2)
                .all(|w| w[0].distance <= w[1].distance)
        );
    }

    #[test]
    fn test_hora_dump_with_longer_metadata_is_misaligned() {
        let dir = tempfile::tempdir().unwrap();
        write_store(dir.path(), SearchField::Incoming, &[[0.0, 0.0, 1.0], [0.0, 1.0, 0.0]]);
        fs::write(
            dir.path().join(SearchField::Incoming.metadata_file()),
            serde_json::to_string(&entries(5)).unwrap(),
        )
        .unwrap();

        let err = DirectoryIndexStore::new(dir.path())
            .load(SearchField::Incoming)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ReplyError::Misaligned {
                field: SearchField::Incoming,
                rows: 5,
                vectors: 2
            }
        ));
    }

    #[test]
    fn test_corrupt_index_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("meta_q.json"), "[]").unwrap();
        let index_path = dir.path().join(SearchField::Incoming.index_file());
        let store = DirectoryIndexStore::new(dir.path());

        fs::write(&index_path, b"not a hora dump").unwrap();
        let err = store.load(SearchField::Incoming).err().unwrap();
        assert!(matches!(err, ReplyError::Index { .. }));

        // a plausible header with nothing behind it
        let mut truncated = 3u64.to_le_bytes().to_vec();
        truncated.extend_from_slice(&2u64.to_le_bytes());
        fs::write(&index_path, truncated).unwrap();
        let err = store.load(SearchField::Incoming).err().unwrap();
        assert!(matches!(err, ReplyError::Index { .. }));
    }

    #[test]
    fn test_missing_index_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryIndexStore::new(dir.path());
        let err = store.load(SearchField::Reply).err().unwrap();
        assert!(matches!(err, ReplyError::Index { .. }));
    }

    #[test]
    fn test_metadata_must_be_q_a_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta_a.json");
        fs::write(&path, json!([{"question": "x"}]).to_string()).unwrap();
        assert!(matches!(
            load_metadata(&path),
            Err(ReplyError::Metadata { .. })
        ));
    }

    #[test]
    fn test_field_file_names() {
        assert_eq!(SearchField::Incoming.index_file(), "index_q.hnsw");
        assert_eq!(SearchField::Incoming.metadata_file(), "meta_q.json");
        assert_eq!(SearchField::Reply.index_file(), "index_a.hnsw");
        assert_eq!(SearchField::Reply.metadata_file(), "meta_a.json");
    }
}
