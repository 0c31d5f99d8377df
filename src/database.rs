use crate::access::btree::BTreeFile;
use crate::access::heap::HeapFile;
use crate::access::scan::Scan;
use crate::access::tuple::{Tuple, TupleDesc, TupleId};
use crate::storage::buffer::BufferPool;
use crate::storage::disk::DiskFile;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageData;
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Either kind of tuple file, exposing the capability set the query layer
/// consumes: insert, delete, point read, cursor iteration, and raw page I/O.
pub enum DbFile {
    Heap(HeapFile),
    BTree(BTreeFile),
}

impl DbFile {
    pub fn name(&self) -> &str {
        match self {
            DbFile::Heap(f) => f.name(),
            DbFile::BTree(f) => f.name(),
        }
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        match self {
            DbFile::Heap(f) => f.tuple_desc(),
            DbFile::BTree(f) => f.tuple_desc(),
        }
    }

    pub fn num_pages(&self) -> usize {
        match self {
            DbFile::Heap(f) => f.num_pages(),
            DbFile::BTree(f) => f.num_pages(),
        }
    }

    pub fn disk(&self) -> &Arc<DiskFile> {
        match self {
            DbFile::Heap(f) => f.disk(),
            DbFile::BTree(f) => f.disk(),
        }
    }

    pub fn read_page(&self, buf: &mut PageData, page_no: usize) -> StorageResult<()> {
        self.disk().read_page(buf, page_no)
    }

    pub fn write_page(&self, buf: &PageData, page_no: usize) -> StorageResult<()> {
        self.disk().write_page(buf, page_no)
    }

    pub fn insert_tuple(&mut self, pool: &mut BufferPool, t: &Tuple) -> Result<()> {
        match self {
            DbFile::Heap(f) => f.insert_tuple(pool, t),
            DbFile::BTree(f) => f.insert_tuple(pool, t),
        }
    }

    pub fn delete_tuple(&mut self, pool: &mut BufferPool, it: TupleId) -> Result<()> {
        match self {
            DbFile::Heap(f) => f.delete_tuple(pool, it),
            DbFile::BTree(_) => bail!("Delete is not supported on a B+tree file"),
        }
    }

    pub fn get_tuple(&self, pool: &mut BufferPool, it: TupleId) -> Result<Tuple> {
        match self {
            DbFile::Heap(f) => f.get_tuple(pool, it),
            DbFile::BTree(f) => f.get_tuple(pool, it),
        }
    }

    pub fn next(&self, pool: &mut BufferPool, it: &mut TupleId) -> Result<()> {
        match self {
            DbFile::Heap(f) => f.next(pool, it),
            DbFile::BTree(f) => f.next(pool, it),
        }
    }

    pub fn begin(&self, pool: &mut BufferPool) -> Result<TupleId> {
        match self {
            DbFile::Heap(f) => f.begin(pool),
            DbFile::BTree(f) => f.begin(pool),
        }
    }

    pub fn end(&self) -> TupleId {
        match self {
            DbFile::Heap(f) => f.end(),
            DbFile::BTree(f) => f.end(),
        }
    }
}

/// Owner of the buffer pool and the name-to-file registry. Files live as
/// long as their registry entry; adding an existing name flushes and
/// replaces it.
pub struct Database {
    buffer_pool: BufferPool,
    files: HashMap<String, DbFile>,
}

impl Database {
    pub fn new() -> Self {
        Self {
            buffer_pool: BufferPool::new(),
            files: HashMap::new(),
        }
    }

    pub fn with_buffer_capacity(num_frames: usize) -> Self {
        Self {
            buffer_pool: BufferPool::with_capacity(num_frames),
            files: HashMap::new(),
        }
    }

    pub fn buffer_pool(&mut self) -> &mut BufferPool {
        &mut self.buffer_pool
    }

    pub fn add(&mut self, file: DbFile) -> Result<()> {
        let name = file.name().to_string();
        if self.files.contains_key(&name) {
            self.remove(&name)?;
        }

        self.buffer_pool.register_file(file.disk().clone());
        self.files.insert(name, file);
        Ok(())
    }

    /// Flush the file's dirty pages, drop its cached pages, and hand the
    /// file back to the caller.
    pub fn remove(&mut self, name: &str) -> Result<DbFile> {
        let file = self
            .files
            .remove(name)
            .ok_or_else(|| StorageError::UnknownFile(name.to_string()))?;

        self.buffer_pool.flush_file(name)?;
        self.buffer_pool.discard_file(name);
        self.buffer_pool.unregister_file(name);

        Ok(file)
    }

    pub fn get(&self, name: &str) -> Result<&DbFile> {
        self.files
            .get(name)
            .ok_or_else(|| StorageError::UnknownFile(name.to_string()).into())
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut DbFile> {
        self.files
            .get_mut(name)
            .ok_or_else(|| StorageError::UnknownFile(name.to_string()).into())
    }

    pub fn insert_tuple(&mut self, name: &str, t: &Tuple) -> Result<()> {
        let file = self
            .files
            .get_mut(name)
            .ok_or_else(|| StorageError::UnknownFile(name.to_string()))?;
        file.insert_tuple(&mut self.buffer_pool, t)
    }

    pub fn delete_tuple(&mut self, name: &str, it: TupleId) -> Result<()> {
        let file = self
            .files
            .get_mut(name)
            .ok_or_else(|| StorageError::UnknownFile(name.to_string()))?;
        file.delete_tuple(&mut self.buffer_pool, it)
    }

    pub fn get_tuple(&mut self, name: &str, it: TupleId) -> Result<Tuple> {
        let file = self
            .files
            .get(name)
            .ok_or_else(|| StorageError::UnknownFile(name.to_string()))?;
        file.get_tuple(&mut self.buffer_pool, it)
    }

    pub fn scan(&mut self, name: &str) -> Result<Scan<'_>> {
        let file = self
            .files
            .get(name)
            .ok_or_else(|| StorageError::UnknownFile(name.to_string()))?;
        Scan::new(file, &mut self.buffer_pool)
    }

    pub fn flush_file(&mut self, name: &str) -> Result<()> {
        self.buffer_pool.flush_file(name)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
