use crate::storage::error::StorageResult;
use crate::storage::page::PageData;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const PAGE_SIZE: usize = 4096;

/// Page-granular positional I/O over a single backing file.
///
/// A single mutex guards the file handle, the page count, and the audit
/// trails, so reads and writes can be issued through a shared handle. Reading
/// past the end of the file yields zeros; the page count only grows when a
/// caller appends a page.
pub struct DiskFile {
    name: String,
    inner: Mutex<Inner>,
}

struct Inner {
    file: File,
    num_pages: usize,
    reads: Vec<usize>,
    writes: Vec<usize>,
}

impl DiskFile {
    /// Open the file at `name`, creating it if missing. Existing contents are
    /// kept; the initial page count is the file length in whole pages.
    pub fn open(name: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(Path::new(name))
            .with_context(|| format!("Failed to open file: {}", name))?;

        let len = file.metadata()?.len();

        Ok(Self {
            name: name.to_string(),
            inner: Mutex::new(Inner {
                file,
                num_pages: (len / PAGE_SIZE as u64) as usize,
                reads: Vec::new(),
                writes: Vec::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read page `page_no` into `buf`. A short read (an unallocated tail
    /// page) fills the remainder with zeros.
    pub fn read_page(&self, buf: &mut PageData, page_no: usize) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        inner.reads.push(page_no);

        let offset = (page_no * PAGE_SIZE) as u64;
        inner.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = inner.file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf[filled..].fill(0);

        Ok(())
    }

    /// Write page `page_no` from `buf`. Writing past the current end extends
    /// the file; a short write is an error.
    pub fn write_page(&self, buf: &PageData, page_no: usize) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        inner.writes.push(page_no);

        let offset = (page_no * PAGE_SIZE) as u64;
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(buf)?;

        Ok(())
    }

    pub fn num_pages(&self) -> usize {
        self.inner.lock().num_pages
    }

    /// Record that the caller appended one page. The heap and tree files call
    /// this after materializing a new trailing page.
    pub fn bump_num_pages(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.num_pages += 1;
        inner.num_pages
    }

    /// Page numbers read so far, in order.
    pub fn reads(&self) -> Vec<usize> {
        self.inner.lock().reads.clone()
    }

    /// Page numbers written so far, in order.
    pub fn writes(&self) -> Vec<usize> {
        self.inner.lock().writes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn path_str(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn test_open_new_file() -> Result<()> {
        let dir = tempdir()?;
        let path = path_str(&dir, "test.db");

        let file = DiskFile::open(&path)?;
        assert_eq!(file.num_pages(), 0);
        assert_eq!(file.name(), path);

        Ok(())
    }

    #[test]
    fn test_write_and_read_page() -> Result<()> {
        let dir = tempdir()?;
        let file = DiskFile::open(&path_str(&dir, "test.db"))?;

        let mut page = [0u8; PAGE_SIZE];
        page[0] = 42;
        page[PAGE_SIZE - 1] = 24;
        file.write_page(&page, 0)?;

        let mut read_buf = [0u8; PAGE_SIZE];
        file.read_page(&mut read_buf, 0)?;

        assert_eq!(read_buf[0], 42);
        assert_eq!(read_buf[PAGE_SIZE - 1], 24);

        Ok(())
    }

    #[test]
    fn test_read_past_end_is_zeros() -> Result<()> {
        let dir = tempdir()?;
        let file = DiskFile::open(&path_str(&dir, "test.db"))?;

        let mut buf = [0xAAu8; PAGE_SIZE];
        file.read_page(&mut buf, 10)?;
        assert!(buf.iter().all(|&b| b == 0));

        Ok(())
    }

    #[test]
    fn test_page_boundary() -> Result<()> {
        let dir = tempdir()?;
        let file = DiskFile::open(&path_str(&dir, "test.db"))?;

        file.write_page(&[1u8; PAGE_SIZE], 0)?;
        file.write_page(&[2u8; PAGE_SIZE], 1)?;

        let mut buf = [0u8; PAGE_SIZE];
        file.read_page(&mut buf, 0)?;
        assert!(buf.iter().all(|&b| b == 1));

        file.read_page(&mut buf, 1)?;
        assert!(buf.iter().all(|&b| b == 2));

        Ok(())
    }

    #[test]
    fn test_num_pages_at_open() -> Result<()> {
        let dir = tempdir()?;
        let path = path_str(&dir, "test.db");

        {
            let file = DiskFile::open(&path)?;
            file.write_page(&[7u8; PAGE_SIZE], 0)?;
            file.write_page(&[8u8; PAGE_SIZE], 1)?;
            file.write_page(&[9u8; PAGE_SIZE], 2)?;
        }

        let file = DiskFile::open(&path)?;
        assert_eq!(file.num_pages(), 3);

        Ok(())
    }

    #[test]
    fn test_bump_num_pages() -> Result<()> {
        let dir = tempdir()?;
        let file = DiskFile::open(&path_str(&dir, "test.db"))?;

        assert_eq!(file.num_pages(), 0);
        assert_eq!(file.bump_num_pages(), 1);
        assert_eq!(file.bump_num_pages(), 2);
        assert_eq!(file.num_pages(), 2);

        Ok(())
    }

    #[test]
    fn test_audit_trails() -> Result<()> {
        let dir = tempdir()?;
        let file = DiskFile::open(&path_str(&dir, "test.db"))?;

        let page = [0u8; PAGE_SIZE];
        let mut buf = [0u8; PAGE_SIZE];

        file.write_page(&page, 0)?;
        file.write_page(&page, 3)?;
        file.read_page(&mut buf, 0)?;
        file.read_page(&mut buf, 3)?;
        file.read_page(&mut buf, 0)?;

        assert_eq!(file.writes(), vec![0, 3]);
        assert_eq!(file.reads(), vec![0, 3, 0]);

        Ok(())
    }

    #[test]
    fn test_persistence_across_open() -> Result<()> {
        let dir = tempdir()?;
        let path = path_str(&dir, "test.db");

        {
            let file = DiskFile::open(&path)?;
            file.write_page(&[99u8; PAGE_SIZE], 0)?;
        }

        let file = DiskFile::open(&path)?;
        let mut buf = [0u8; PAGE_SIZE];
        file.read_page(&mut buf, 0)?;
        assert_eq!(buf[0], 99);

        Ok(())
    }
}
