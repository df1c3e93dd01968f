//! The object database accessor: one entry point that resolves an object id
//! to a typed byte stream, transparently handling loose objects, pack
//! lookups, offset deltas and reference deltas.

pub mod loose;

use std::{
    fs::File,
    io::{self, BufReader, Cursor, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::{FutureExt, future::BoxFuture};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::{
        buffer::BufferPool,
        delta::delta_decode,
        object::types::ObjectType,
        pack::{
            PACK_HEADER_LEN, cache::StreamCache, check_header,
            entry::{EntryHeader, read_entry_header},
            idx::IndexFile,
        },
        stream::{MemoizedStream, RangedStream, SharedStream},
        sync::FifoMutex,
        zlib::InflateReader,
    },
};

/// A resolved object: its type and a lazy stream over the decoded payload.
///
/// The caller owns the stream; dropping it releases the underlying
/// descriptor (or cache handle).
pub struct ObjectStream {
    pub kind: ObjectType,
    reader: Box<dyn Read + Send>,
}

impl ObjectStream {
    /// Drain the stream into a buffer.
    pub fn read_to_vec(mut self) -> Result<Vec<u8>, GitError> {
        let mut out = Vec::new();
        self.reader.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl Read for ObjectStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Unified hash-to-stream accessor over one repository's object store.
///
/// Owns the lazily built pack-index catalogue and the decoded-stream cache;
/// both are flushed when the repository handle closes.
pub struct ObjectStore {
    git_dir: PathBuf,
    buffers: Arc<BufferPool>,
    indices: FifoMutex<Option<Arc<Vec<Arc<IndexFile>>>>>,
    cache: StreamCache,
    closed: AtomicBool,
}

impl ObjectStore {
    pub fn new(git_dir: PathBuf) -> Self {
        ObjectStore {
            git_dir,
            buffers: Arc::new(BufferPool::new()),
            indices: FifoMutex::new(None),
            cache: StreamCache::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn buffers(&self) -> &Arc<BufferPool> {
        &self.buffers
    }

    /// Resolve `hash` to a typed stream.
    ///
    /// Loose storage wins over packs. `allow_cache` opts the read in or out
    /// of the decoded-stream cache; single-use reads (tree walks) pass
    /// `false` to keep hot delta bases resident instead.
    pub async fn open(
        &self,
        hash: &ObjectHash,
        allow_cache: bool,
    ) -> Result<Option<ObjectStream>, GitError> {
        self.ensure_open()?;

        if let Some(obj) = loose::read_loose_object(&self.git_dir, hash, &self.buffers)? {
            return Ok(Some(ObjectStream {
                kind: obj.kind,
                reader: obj.body,
            }));
        }

        let indices = self.pack_indices().await?;
        for idx in indices.iter() {
            if let Some(entry) = idx.lookup(hash) {
                let (kind, stream) = self
                    .open_pack_at(&idx.pack_path, entry.offset, allow_cache)
                    .await?;
                return Ok(Some(ObjectStream {
                    kind,
                    reader: Box::new(stream),
                }));
            }
        }
        Ok(None)
    }

    /// Resolve and fully materialise an object.
    pub async fn read_object(
        &self,
        hash: &ObjectHash,
        allow_cache: bool,
    ) -> Result<Option<(ObjectType, Vec<u8>)>, GitError> {
        match self.open(hash, allow_cache).await? {
            Some(stream) => {
                let kind = stream.kind;
                Ok(Some((kind, stream.read_to_vec()?)))
            }
            None => Ok(None),
        }
    }

    /// Drop the pack-index catalogue and every cached stream. Subsequent
    /// calls observe [`GitError::Disposed`].
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut slot = self.indices.lock().await;
        *slot = None;
        drop(slot);
        self.cache.flush();
    }

    fn ensure_open(&self) -> Result<(), GitError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GitError::Disposed);
        }
        Ok(())
    }

    /// The parsed `.idx` catalogue, scanned once per repository handle.
    pub async fn pack_indices(&self) -> Result<Arc<Vec<Arc<IndexFile>>>, GitError> {
        let mut slot = self.indices.lock().await;
        if let Some(list) = slot.as_ref() {
            return Ok(Arc::clone(list));
        }

        let pack_dir = self.git_dir.join("objects").join("pack");
        let mut idx_paths = Vec::new();
        match std::fs::read_dir(&pack_dir) {
            Ok(entries) => {
                for entry in entries {
                    let path = entry?.path();
                    if path.extension().and_then(|e| e.to_str()) == Some("idx") {
                        idx_paths.push(path);
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(GitError::IOError(e)),
        }
        idx_paths.sort();

        let mut list = Vec::with_capacity(idx_paths.len());
        for path in idx_paths {
            let parsed = IndexFile::parse(&path)?;
            tracing::debug!(idx = %path.display(), objects = parsed.object_count(), "pack index loaded");
            list.push(Arc::new(parsed));
        }
        let list = Arc::new(list);
        *slot = Some(Arc::clone(&list));
        Ok(list)
    }

    /// Decode the entry at `(pack, offset)`, recursing through delta bases.
    ///
    /// Every produced stream is seekable: plain entries are memoized so they
    /// can serve as delta bases, delta results are materialised buffers.
    fn open_pack_at<'a>(
        &'a self,
        pack: &'a Path,
        offset: u64,
        allow_cache: bool,
    ) -> BoxFuture<'a, Result<(ObjectType, SharedStream), GitError>> {
        async move {
            if allow_cache
                && let Some(hit) = self.cache.get(pack, offset)
            {
                return Ok(hit);
            }

            if offset < PACK_HEADER_LEN {
                return Err(GitError::InvalidPackFile(format!(
                    "{}: entry offset {offset} inside header",
                    pack.display()
                )));
            }
            let file = File::open(pack)?;
            let mut reader = BufReader::new(file);
            check_header(&mut reader)?;
            reader.seek(SeekFrom::Start(offset))?;

            match read_entry_header(&mut reader)? {
                EntryHeader::Base { kind, size } => {
                    let inflate = InflateReader::new(reader);
                    let body = RangedStream::new(inflate, size);
                    let shared = SharedStream::new(MemoizedStream::new(body, size));
                    if allow_cache {
                        self.cache.insert(pack, offset, kind, &shared);
                    }
                    Ok((kind, shared))
                }
                EntryHeader::OfsDelta { size, base_rel } => {
                    let base_offset = offset.checked_sub(base_rel).ok_or_else(|| {
                        GitError::InvalidObjectInfo("Invalid OffsetDelta offset".to_string())
                    })?;
                    let (kind, mut base) =
                        self.open_pack_at(pack, base_offset, allow_cache).await?;
                    let shared = apply_delta(reader, size, &mut base)?;
                    if allow_cache {
                        self.cache.insert(pack, offset, kind, &shared);
                    }
                    Ok((kind, shared))
                }
                EntryHeader::RefDelta { size, base } => {
                    let (kind, mut base_stream) = self
                        .open_seekable(&base)
                        .await?
                        .ok_or_else(|| GitError::NotFoundHashValue(base.to_string()))?;
                    let shared = apply_delta(reader, size, &mut base_stream)?;
                    if allow_cache {
                        self.cache.insert(pack, offset, kind, &shared);
                    }
                    Ok((kind, shared))
                }
            }
        }
        .boxed()
    }

    /// Resolve `hash` to a seekable stream, wrapping loose bodies in a
    /// memoized view. Used for ref-delta bases.
    async fn open_seekable(
        &self,
        hash: &ObjectHash,
    ) -> Result<Option<(ObjectType, SharedStream)>, GitError> {
        if let Some(obj) = loose::read_loose_object(&self.git_dir, hash, &self.buffers)? {
            let memoized = MemoizedStream::new(obj.body, obj.size);
            return Ok(Some((obj.kind, SharedStream::new(memoized))));
        }
        let indices = self.pack_indices().await?;
        for idx in indices.iter() {
            if let Some(entry) = idx.lookup(hash) {
                let resolved = self.open_pack_at(&idx.pack_path, entry.offset, true).await?;
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }
}

/// Inflate the delta payload at the reader's position and apply it to the
/// seekable base, producing a new shared stream of the reconstructed bytes.
fn apply_delta(
    reader: BufReader<File>,
    delta_size: u64,
    base: &mut SharedStream,
) -> Result<SharedStream, GitError> {
    let mut delta = RangedStream::new(InflateReader::new(reader), delta_size);
    let bytes = delta_decode(&mut delta, base)?;
    Ok(SharedStream::new(Cursor::new(bytes)))
}
