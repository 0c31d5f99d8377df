use crate::access::tuple::{Tuple, TupleDesc, TupleId};
use crate::storage::buffer::BufferPool;
use crate::storage::disk::DiskFile;
use crate::storage::error::StorageError;
use crate::storage::page::{HeapPage, PageId};
use anyhow::{bail, Result};
use std::sync::Arc;

/// An unordered sequence of bitmap-directory heap pages.
///
/// Inserts land in the last page when it has room, otherwise in a fresh
/// trailing page materialized through the buffer pool (a page past the end
/// of the file reads as zeros and only reaches disk on flush). Iteration is
/// in page-then-slot order.
pub struct HeapFile {
    name: String,
    td: TupleDesc,
    disk: Arc<DiskFile>,
}

impl HeapFile {
    pub fn open(name: &str, td: TupleDesc) -> Result<Self> {
        let disk = Arc::new(DiskFile::open(name)?);
        Ok(Self {
            name: name.to_string(),
            td,
            disk,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    pub fn num_pages(&self) -> usize {
        self.disk.num_pages()
    }

    pub fn disk(&self) -> &Arc<DiskFile> {
        &self.disk
    }

    fn pid(&self, page_no: usize) -> PageId {
        PageId::new(self.name.clone(), page_no)
    }

    pub fn insert_tuple(&mut self, pool: &mut BufferPool, t: &Tuple) -> Result<()> {
        if !self.td.compatible(t) {
            return Err(StorageError::SchemaMismatch.into());
        }

        let num_pages = self.disk.num_pages();

        if num_pages > 0 {
            let pid = self.pid(num_pages - 1);
            let inserted = {
                let data = pool.get_page(&pid)?;
                HeapPage::new(data, &self.td).insert_tuple(t)?
            };
            if inserted {
                pool.mark_dirty(&pid);
                return Ok(());
            }
        }

        // The last page is full (or there is none); start a fresh one.
        let pid = self.pid(num_pages);
        let inserted = {
            let data = pool.get_page(&pid)?;
            HeapPage::new(data, &self.td).insert_tuple(t)?
        };
        if !inserted {
            bail!("Failed to insert into an empty page");
        }
        pool.mark_dirty(&pid);
        self.disk.bump_num_pages();

        Ok(())
    }

    pub fn delete_tuple(&mut self, pool: &mut BufferPool, it: TupleId) -> Result<()> {
        if it.page_no >= self.disk.num_pages() {
            return Err(StorageError::PageOutOfRange {
                page: it.page_no,
                num_pages: self.disk.num_pages(),
            }
            .into());
        }

        let pid = self.pid(it.page_no);
        {
            let data = pool.get_page(&pid)?;
            HeapPage::new(data, &self.td).delete_tuple(it.slot)?;
        }
        pool.mark_dirty(&pid);

        Ok(())
    }

    pub fn get_tuple(&self, pool: &mut BufferPool, it: TupleId) -> Result<Tuple> {
        if it.page_no >= self.disk.num_pages() {
            return Err(StorageError::PageOutOfRange {
                page: it.page_no,
                num_pages: self.disk.num_pages(),
            }
            .into());
        }

        let data = pool.get_page(&self.pid(it.page_no))?;
        let tuple = HeapPage::new(data, &self.td).get_tuple(it.slot)?;
        Ok(tuple)
    }

    /// Advance to the next occupied slot, moving across pages as needed.
    pub fn next(&self, pool: &mut BufferPool, it: &mut TupleId) -> Result<()> {
        let num_pages = self.disk.num_pages();
        if it.page_no >= num_pages {
            *it = self.end();
            return Ok(());
        }

        {
            let data = pool.get_page(&self.pid(it.page_no))?;
            let page = HeapPage::new(data, &self.td);
            let mut slot = it.slot;
            page.next(&mut slot);
            if slot != page.end() {
                it.slot = slot;
                return Ok(());
            }
        }

        for page_no in it.page_no + 1..num_pages {
            let data = pool.get_page(&self.pid(page_no))?;
            let page = HeapPage::new(data, &self.td);
            let begin = page.begin();
            if begin != page.end() {
                *it = TupleId::new(page_no, begin);
                return Ok(());
            }
        }

        *it = self.end();
        Ok(())
    }

    /// First occupied slot of the file, or `end()` when there is none.
    pub fn begin(&self, pool: &mut BufferPool) -> Result<TupleId> {
        for page_no in 0..self.disk.num_pages() {
            let data = pool.get_page(&self.pid(page_no))?;
            let page = HeapPage::new(data, &self.td);
            let begin = page.begin();
            if begin != page.end() {
                return Ok(TupleId::new(page_no, begin));
            }
        }
        Ok(self.end())
    }

    pub fn end(&self) -> TupleId {
        TupleId::new(self.disk.num_pages(), 0)
    }
}
