use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use search_model::DocumentChunk;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{cosine_similarity, FilterClause, ScoredRecord, StoreError, StoreStats, VectorRecord};

const META_FILE: &str = "meta.json";
const RECORDS_FILE: &str = "records.json";
const VECTORS_FILE: &str = "vectors.bin";

/// Durable brute-force similarity index over one directory.
///
/// The whole state (aggregate metadata, the record index, the vector table)
/// is rewritten as a snapshot after every mutating call and reloaded at
/// startup. Snapshots are written to temp files and renamed into place, so a
/// crash mid-write never leaves partially-visible records behind.
///
/// One `RwLock` guards both the in-memory tables and the persist step:
/// reads see the state before or after a mutation, never a torn mix, and
/// mutations are serialized relative to each other.
pub struct LocalVectorStore {
    dir: PathBuf,
    inner: RwLock<State>,
}

struct State {
    /// Records in insertion order; `vectors[i]` is the embedding for
    /// `records[i]`.
    records: Vec<VectorRecord>,
    vectors: Vec<Vec<f32>>,
    /// 0 until the first insert fixes the dimension.
    dimension: usize,
    created_at: String,
    last_updated: String,
}

impl State {
    fn empty() -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            records: Vec::new(),
            vectors: Vec::new(),
            dimension: 0,
            created_at: now.clone(),
            last_updated: now,
        }
    }

    fn distinct_documents(&self) -> usize {
        let mut seen = std::collections::HashSet::new();
        for rec in &self.records {
            seen.insert(rec.document_id.as_str());
        }
        seen.len()
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            total_documents: self.distinct_documents(),
            total_vectors: self.records.len(),
            dimension: self.dimension,
            created_at: self.created_at.clone(),
            last_updated: self.last_updated.clone(),
        }
    }
}

impl LocalVectorStore {
    /// Open a store at `dir`, creating the directory if needed. A missing or
    /// unreadable snapshot is treated as a cold start, never an error.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let state = match load_snapshot(&dir) {
            Some(state) => state,
            None => State::empty(),
        };
        info!(
            path = %dir.display(),
            vectors = state.records.len(),
            "opened local vector store"
        );
        Ok(Self { dir, inner: RwLock::new(state) })
    }

    /// Insert one document's fragments and embeddings. Returns the generated
    /// vector ids in input order. Nothing is persisted when validation fails;
    /// a failed persist propagates and the write must not be assumed durable.
    pub fn add_document(
        &self,
        document_id: &str,
        chunks: &[DocumentChunk],
        vectors: &[Vec<f32>],
    ) -> Result<Vec<String>, StoreError> {
        if chunks.len() != vectors.len() {
            return Err(StoreError::LengthMismatch { chunks: chunks.len(), vectors: vectors.len() });
        }
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.inner.write();
        let expected = if state.dimension == 0 { vectors[0].len() } else { state.dimension };
        for v in vectors {
            if v.len() != expected {
                return Err(StoreError::DimensionMismatch { expected, actual: v.len() });
            }
        }
        state.dimension = expected;

        let now = Utc::now().to_rfc3339();
        let mut vector_ids = Vec::with_capacity(chunks.len());
        for (i, (chunk, vector)) in chunks.iter().zip(vectors.iter()).enumerate() {
            let vector_id = format!("{document_id}:{i}:{}", Uuid::new_v4());
            state.records.push(VectorRecord {
                vector_id: vector_id.clone(),
                document_id: document_id.to_string(),
                chunk_index: i,
                content: chunk.content.clone(),
                title: chunk.title.clone(),
                metadata: chunk.metadata.clone(),
                created_at: now.clone(),
            });
            state.vectors.push(vector.clone());
            vector_ids.push(vector_id);
        }
        state.last_updated = now;
        save_snapshot(&self.dir, &state)?;

        info!(document_id, vectors = vector_ids.len(), "added document vectors");
        Ok(vector_ids)
    }

    /// Brute-force cosine search over every live record, with conjunctive
    /// equality filters applied before scoring. Empty store yields an empty
    /// sequence.
    pub fn search_similar(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filters: &[FilterClause],
    ) -> Vec<ScoredRecord> {
        if top_k == 0 {
            return Vec::new();
        }
        let state = self.inner.read();
        let mut hits: Vec<ScoredRecord> = Vec::new();
        for (record, vector) in state.records.iter().zip(state.vectors.iter()) {
            if !filters.iter().all(|f| f.matches(record)) {
                continue;
            }
            let similarity = cosine_similarity(query_vector, vector);
            hits.push(ScoredRecord { record: record.clone(), similarity });
        }
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(top_k);
        debug!(hits = hits.len(), "similarity search completed");
        hits
    }

    /// Remove every record belonging to `document_id`. Returns `false` as a
    /// no-op when nothing matched (nothing is persisted in that case).
    pub fn delete_document(&self, document_id: &str) -> Result<bool, StoreError> {
        let mut guard = self.inner.write();
        let state = &mut *guard;
        let before = state.records.len();
        let mut kept_records = Vec::with_capacity(before);
        let mut kept_vectors = Vec::with_capacity(before);
        for (record, vector) in state.records.drain(..).zip(state.vectors.drain(..)) {
            if record.document_id != document_id {
                kept_records.push(record);
                kept_vectors.push(vector);
            }
        }
        state.records = kept_records;
        state.vectors = kept_vectors;
        let removed = before - state.records.len();
        if removed == 0 {
            warn!(document_id, "no vectors found for document");
            return Ok(false);
        }
        state.last_updated = Utc::now().to_rfc3339();
        save_snapshot(&self.dir, state)?;
        info!(document_id, removed, "deleted document vectors");
        Ok(true)
    }

    /// Counters always reflect the last persisted state.
    pub fn get_stats(&self) -> StoreStats {
        self.inner.read().stats()
    }

    /// Empty the store and remove its snapshot files. Used for full
    /// reindex scenarios.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        let mut state = self.inner.write();
        *state = State::empty();
        for name in [META_FILE, RECORDS_FILE, VECTORS_FILE] {
            let path = self.dir.join(name);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        info!("cleared all vector data");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

// ------------------------------
// Snapshot persistence
// ------------------------------

fn save_snapshot(dir: &Path, state: &State) -> Result<(), StoreError> {
    let meta = state.stats();
    write_replace(dir, META_FILE, &serde_json::to_vec_pretty(&meta)?)?;
    write_replace(dir, RECORDS_FILE, &serde_json::to_vec(&state.records)?)?;

    let mut buf: Vec<u8> = Vec::new();
    // binary: [u32 dim][f32..] repeated
    for v in &state.vectors {
        let dim = v.len() as u32;
        buf.extend_from_slice(&dim.to_le_bytes());
        buf.extend_from_slice(bytemuck::cast_slice(&v[..]));
    }
    write_replace(dir, VECTORS_FILE, &buf)?;
    Ok(())
}

fn write_replace(dir: &Path, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = dir.join(format!("{name}.tmp"));
    {
        let mut w = fs::File::create(&tmp)?;
        w.write_all(bytes)?;
        w.sync_all()?;
    }
    fs::rename(tmp, dir.join(name))?;
    Ok(())
}

/// Load the snapshot, or `None` on any read/parse problem (cold start).
fn load_snapshot(dir: &Path) -> Option<State> {
    if !dir.join(META_FILE).exists() {
        return None;
    }
    match try_load(dir) {
        Ok(state) => Some(state),
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "failed to load snapshot, starting empty");
            None
        }
    }
}

fn try_load(dir: &Path) -> Result<State, StoreError> {
    let meta: StoreStats = serde_json::from_slice(&fs::read(dir.join(META_FILE))?)?;
    let records: Vec<VectorRecord> = serde_json::from_slice(&fs::read(dir.join(RECORDS_FILE))?)?;

    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(records.len());
    let mut r = std::io::BufReader::new(fs::File::open(dir.join(VECTORS_FILE))?);
    loop {
        let mut len_buf = [0u8; 4];
        if r.read_exact(&mut len_buf).is_err() {
            break;
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut vbytes = vec![0u8; 4 * len];
        r.read_exact(&mut vbytes)?;
        // pod_collect_to_vec tolerates the u8 buffer's alignment
        vectors.push(bytemuck::pod_collect_to_vec(&vbytes));
    }
    if vectors.len() != records.len() {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("vector table has {} entries, index has {}", vectors.len(), records.len()),
        )));
    }
    Ok(State {
        records,
        vectors,
        dimension: meta.dimension,
        created_at: meta.created_at,
        last_updated: meta.last_updated,
    })
}
