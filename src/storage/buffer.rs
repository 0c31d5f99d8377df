pub mod lru;

use crate::storage::disk::DiskFile;
use crate::storage::error::StorageError;
use crate::storage::page::{PageData, PageId};
use crate::storage::PAGE_SIZE;
use anyhow::Result;
use lru::{LruReplacer, Replacer};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const DEFAULT_NUM_PAGES: usize = 50;

pub type FrameId = usize;

/// Fixed-capacity page cache shared by every file of the database.
///
/// Each frame holds one page. A hit promotes the frame to most recently used;
/// a miss takes a free frame or evicts the least recently used one, writing
/// it back first when dirty. The pool issues all I/O on behalf of files, via
/// the `DiskFile` handles registered per file name.
///
/// A caller holding the buffer returned by `get_page` must not issue another
/// `get_page` that could evict it; the borrow on the pool enforces this.
pub struct BufferPool {
    frames: Vec<Box<PageData>>,
    pid_to_frame: HashMap<PageId, FrameId>,
    frame_to_pid: Vec<Option<PageId>>,
    dirty: HashSet<FrameId>,
    replacer: Box<dyn Replacer>,
    free: Vec<FrameId>,
    files: HashMap<String, Arc<DiskFile>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_NUM_PAGES)
    }

    pub fn with_capacity(num_frames: usize) -> Self {
        Self {
            frames: (0..num_frames).map(|_| Box::new([0u8; PAGE_SIZE])).collect(),
            pid_to_frame: HashMap::new(),
            frame_to_pid: vec![None; num_frames],
            dirty: HashSet::new(),
            replacer: Box::new(LruReplacer::new()),
            free: (0..num_frames).rev().collect(),
            files: HashMap::new(),
        }
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Make a file's I/O handle available for read-through and write-back.
    pub fn register_file(&mut self, file: Arc<DiskFile>) {
        self.files.insert(file.name().to_string(), file);
    }

    pub fn unregister_file(&mut self, name: &str) -> Option<Arc<DiskFile>> {
        self.files.remove(name)
    }

    /// Fetch a page, reading it from disk on a miss. The returned buffer is
    /// valid until the next call that can evict.
    pub fn get_page(&mut self, pid: &PageId) -> Result<&mut PageData> {
        if !self.pid_to_frame.contains_key(pid) {
            self.load_page(pid)?;
        }

        let frame = self.pid_to_frame[pid];
        self.replacer.touch(frame);
        Ok(self.frames[frame].as_mut())
    }

    fn load_page(&mut self, pid: &PageId) -> Result<()> {
        let frame = match self.free.pop() {
            Some(frame) => frame,
            None => self.evict_lru()?,
        };

        let file = match self.files.get(&pid.file) {
            Some(file) => Arc::clone(file),
            None => {
                self.free.push(frame);
                return Err(StorageError::UnknownFile(pid.file.clone()).into());
            }
        };
        if let Err(e) = file.read_page(self.frames[frame].as_mut(), pid.page_no) {
            self.free.push(frame);
            return Err(e.into());
        }

        self.pid_to_frame.insert(pid.clone(), frame);
        self.frame_to_pid[frame] = Some(pid.clone());
        Ok(())
    }

    /// Take the least recently used frame, writing its page back when dirty.
    fn evict_lru(&mut self) -> Result<FrameId> {
        let frame = self
            .replacer
            .evict()
            .ok_or_else(|| anyhow::anyhow!("No frame available for eviction"))?;

        if let Some(pid) = self.frame_to_pid[frame].take() {
            if self.dirty.remove(&frame) {
                let file = self
                    .files
                    .get(&pid.file)
                    .ok_or_else(|| StorageError::UnknownFile(pid.file.clone()))?;
                file.write_page(&self.frames[frame], pid.page_no)?;
            }
            self.pid_to_frame.remove(&pid);
        }

        Ok(frame)
    }

    /// No-op when the page is not resident.
    pub fn mark_dirty(&mut self, pid: &PageId) {
        if let Some(&frame) = self.pid_to_frame.get(pid) {
            self.dirty.insert(frame);
        }
    }

    pub fn is_dirty(&self, pid: &PageId) -> bool {
        self.pid_to_frame
            .get(pid)
            .is_some_and(|frame| self.dirty.contains(frame))
    }

    pub fn contains(&self, pid: &PageId) -> bool {
        self.pid_to_frame.contains_key(pid)
    }

    /// Drop a resident page without writing it back.
    pub fn discard_page(&mut self, pid: &PageId) {
        if let Some(frame) = self.pid_to_frame.remove(pid) {
            self.frame_to_pid[frame] = None;
            self.dirty.remove(&frame);
            self.replacer.remove(frame);
            self.free.push(frame);
        }
    }

    /// Drop every resident page belonging to `name` without writing back.
    pub fn discard_file(&mut self, name: &str) {
        let to_discard: Vec<PageId> = self
            .pid_to_frame
            .keys()
            .filter(|pid| pid.file == name)
            .cloned()
            .collect();

        for pid in to_discard {
            self.discard_page(&pid);
        }
    }

    /// Write a resident dirty page back and mark it clean. Idempotent.
    pub fn flush_page(&mut self, pid: &PageId) -> Result<()> {
        if let Some(&frame) = self.pid_to_frame.get(pid) {
            if self.dirty.remove(&frame) {
                let file = self
                    .files
                    .get(&pid.file)
                    .ok_or_else(|| StorageError::UnknownFile(pid.file.clone()))?;
                file.write_page(&self.frames[frame], pid.page_no)?;
            }
        }
        Ok(())
    }

    /// Flush every resident dirty page belonging to `name`.
    pub fn flush_file(&mut self, name: &str) -> Result<()> {
        let to_flush: Vec<PageId> = self
            .dirty
            .iter()
            .filter_map(|&frame| self.frame_to_pid[frame].clone())
            .filter(|pid| pid.file == name)
            .collect();

        for pid in to_flush {
            self.flush_page(&pid)?;
        }
        Ok(())
    }

    pub fn flush_all(&mut self) -> Result<()> {
        let to_flush: Vec<PageId> = self
            .dirty
            .iter()
            .filter_map(|&frame| self.frame_to_pid[frame].clone())
            .collect();

        for pid in to_flush {
            self.flush_page(&pid)?;
        }
        Ok(())
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        // Best effort flush on drop
        let _ = self.flush_all();
    }
}
