use crate::access::tuple::{Tuple, TupleDesc, TupleId};
use crate::access::value::{DataType, Value};
use crate::storage::buffer::BufferPool;
use crate::storage::disk::DiskFile;
use crate::storage::error::StorageError;
use crate::storage::page::leaf_page::NO_NEXT_LEAF;
use crate::storage::page::{IndexPage, LeafPage, PageData, PageId};
use crate::storage::PAGE_SIZE;
use anyhow::{bail, Result};
use std::sync::Arc;

const ROOT_PAGE_NO: usize = 0;

/// A B+tree over tuples ordered by an i32 key column.
///
/// Page 0 is always the root and always an index page; leaves hang off the
/// lowest index level and chain left to right through their next-leaf links.
/// Inserts are upserts: an existing key is overwritten in place. A leaf
/// splits only when an insert finds it full, after which the pending tuple
/// is retried in the correct half and the separator bubbles up the recorded
/// descent path, splitting index pages as they fill and rebuilding the root
/// in place when the split reaches it.
pub struct BTreeFile {
    name: String,
    td: TupleDesc,
    key_index: usize,
    disk: Arc<DiskFile>,
}

/// Index pages visited from the root down to the parent of the target leaf.
struct DescentPath {
    index_pages: Vec<usize>,
    leaf: usize,
}

/// Smallest child slot whose separator exceeds `key`; equal keys go right.
fn choose_child_slot(ip: &IndexPage<'_>, key: i32) -> usize {
    (0..ip.size())
        .find(|&i| ip.key_at(i) > key)
        .unwrap_or(ip.size())
}

impl BTreeFile {
    pub fn open(name: &str, td: TupleDesc, key_index: usize) -> Result<Self> {
        if key_index >= td.num_fields() || td.field_type(key_index) != DataType::Int {
            bail!("Key column {} must be an INT field", key_index);
        }

        let disk = Arc::new(DiskFile::open(name)?);
        let file = Self {
            name: name.to_string(),
            td,
            key_index,
            disk,
        };
        file.ensure_root_initialized()?;
        Ok(file)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    pub fn key_index(&self) -> usize {
        self.key_index
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

    /// Format page 0 as an empty root pointing at a fresh empty leaf. Runs
    /// once, when the backing file is empty.
    fn ensure_root_initialized(&self) -> Result<()> {
        if self.disk.num_pages() > 0 {
            return Ok(());
        }

        let mut root_buf = Box::new([0u8; PAGE_SIZE]);
        {
            let mut root = IndexPage::new(&mut root_buf);
            root.set_index_children(false);
            root.set_child_at(0, 1);
        }

        let mut leaf_buf = Box::new([0u8; PAGE_SIZE]);
        {
            let mut leaf = LeafPage::new(&mut leaf_buf, &self.td, self.key_index);
            leaf.set_next_leaf(None);
        }

        self.disk.write_page(&root_buf, ROOT_PAGE_NO)?;
        self.disk.bump_num_pages();
        self.disk.write_page(&leaf_buf, 1)?;
        self.disk.bump_num_pages();

        Ok(())
    }

    /// Extend the file with a zeroed page and return its number.
    fn allocate_empty_page(&self) -> Result<usize> {
        let page_no = self.disk.num_pages();
        self.disk.write_page(&[0u8; PAGE_SIZE], page_no)?;
        self.disk.bump_num_pages();
        Ok(page_no)
    }

    fn descend_path(&self, pool: &mut BufferPool, key: i32) -> Result<DescentPath> {
        let mut index_pages = Vec::new();
        let mut page_no = ROOT_PAGE_NO;

        loop {
            let (child, is_index) = {
                let data = pool.get_page(&self.pid(page_no))?;
                let ip = IndexPage::new(data);
                (ip.child_at(choose_child_slot(&ip, key)), ip.index_children())
            };
            index_pages.push(page_no);

            if !is_index {
                return Ok(DescentPath { index_pages, leaf: child });
            }
            page_no = child;
        }
    }

    pub fn insert_tuple(&mut self, pool: &mut BufferPool, t: &Tuple) -> Result<()> {
        if !self.td.compatible(t) {
            return Err(StorageError::SchemaMismatch.into());
        }
        let key = match t.get(self.key_index) {
            Value::Int(k) => *k,
            _ => return Err(StorageError::SchemaMismatch.into()),
        };

        let path = self.descend_path(pool, key)?;
        let leaf_pid = self.pid(path.leaf);

        let (full, present) = {
            let data = pool.get_page(&leaf_pid)?;
            let mut leaf = LeafPage::new(data, &self.td, self.key_index);
            let full = leaf.insert_tuple(t)?;
            (full, leaf.contains_key(key))
        };
        if !full || present {
            // The tuple landed (or replaced an existing key); a full page is
            // left as is and splits on the next new key.
            pool.mark_dirty(&leaf_pid);
            return Ok(());
        }

        // The leaf had no room for a new key. Split it, link the halves,
        // retry the insert, and push the separator up the path.
        let new_leaf_id = self.allocate_empty_page()?;
        let mut scratch = Box::new([0u8; PAGE_SIZE]);
        let split_key = {
            let data = pool.get_page(&leaf_pid)?;
            let mut left = LeafPage::new(data, &self.td, self.key_index);
            let mut right = LeafPage::new(&mut scratch, &self.td, self.key_index);
            let split_key = left.split(&mut right)?;
            left.set_next_leaf(Some(new_leaf_id));
            split_key
        };
        pool.mark_dirty(&leaf_pid);

        let new_leaf_pid = self.pid(new_leaf_id);
        {
            let data = pool.get_page(&new_leaf_pid)?;
            data.copy_from_slice(scratch.as_ref());
        }
        pool.mark_dirty(&new_leaf_pid);

        let target_pid = if key < split_key {
            leaf_pid
        } else {
            new_leaf_pid
        };
        {
            let data = pool.get_page(&target_pid)?;
            LeafPage::new(data, &self.td, self.key_index).insert_tuple(t)?;
        }
        pool.mark_dirty(&target_pid);

        self.propagate_split(pool, &path.index_pages, split_key, new_leaf_id)
    }

    /// Insert `(up_key, right_child)` into the deepest index page on the
    /// path, splitting upward while pages fill.
    fn propagate_split(
        &self,
        pool: &mut BufferPool,
        index_pages: &[usize],
        up_key: i32,
        right_child: usize,
    ) -> Result<()> {
        let mut carry = (up_key, right_child);

        for (depth, &page_no) in index_pages.iter().enumerate().rev() {
            let pid = self.pid(page_no);
            let full = {
                let data = pool.get_page(&pid)?;
                IndexPage::new(data).insert(carry.0, carry.1)
            };
            pool.mark_dirty(&pid);
            if !full {
                return Ok(());
            }

            let new_index_id = self.allocate_empty_page()?;
            let mut scratch = Box::new([0u8; PAGE_SIZE]);
            let promoted = {
                let data = pool.get_page(&pid)?;
                let mut left = IndexPage::new(data);
                let mut right = IndexPage::new(&mut scratch);
                left.split(&mut right)
            };
            pool.mark_dirty(&pid);

            let new_index_pid = self.pid(new_index_id);
            {
                let data = pool.get_page(&new_index_pid)?;
                data.copy_from_slice(scratch.as_ref());
            }
            pool.mark_dirty(&new_index_pid);

            if depth == 0 {
                return self.rebuild_root(pool, promoted, new_index_id);
            }
            carry = (promoted, new_index_id);
        }

        Ok(())
    }

    /// The root split. Move its remaining contents to a fresh page and
    /// reformat page 0 with the promoted key over the two halves, keeping
    /// the root's page number stable.
    fn rebuild_root(&self, pool: &mut BufferPool, up_key: i32, right_child: usize) -> Result<()> {
        let left_child = self.allocate_empty_page()?;
        let root_pid = self.pid(ROOT_PAGE_NO);

        let old_root: Box<PageData> = {
            let data = pool.get_page(&root_pid)?;
            Box::new(*data)
        };
        let left_pid = self.pid(left_child);
        {
            let data = pool.get_page(&left_pid)?;
            data.copy_from_slice(old_root.as_ref());
        }
        pool.mark_dirty(&left_pid);

        {
            let data = pool.get_page(&root_pid)?;
            data.fill(0);
            let mut root = IndexPage::new(data);
            root.set_index_children(true);
            root.set_child_at(0, left_child);
            root.insert(up_key, right_child);
        }
        pool.mark_dirty(&root_pid);

        Ok(())
    }

    /// First tuple of the leftmost non-empty leaf.
    pub fn begin(&self, pool: &mut BufferPool) -> Result<TupleId> {
        let mut page_no = ROOT_PAGE_NO;
        let leaf = loop {
            let data = pool.get_page(&self.pid(page_no))?;
            let ip = IndexPage::new(data);
            let child = ip.child_at(0);
            if !ip.index_children() {
                break child;
            }
            page_no = child;
        };
        self.first_at_or_after(pool, leaf)
    }

    /// Position on slot 0 of the first non-empty leaf at or after `leaf_id`.
    fn first_at_or_after(&self, pool: &mut BufferPool, mut leaf_id: usize) -> Result<TupleId> {
        loop {
            if leaf_id == NO_NEXT_LEAF {
                return Ok(self.end());
            }
            let data = pool.get_page(&self.pid(leaf_id))?;
            let leaf = LeafPage::new(data, &self.td, self.key_index);
            if leaf.size() > 0 {
                return Ok(TupleId::new(leaf_id, 0));
            }
            leaf_id = leaf.next_leaf().unwrap_or(NO_NEXT_LEAF);
        }
    }

    /// Advance within the leaf, then along the leaf chain.
    pub fn next(&self, pool: &mut BufferPool, it: &mut TupleId) -> Result<()> {
        if it.page_no == NO_NEXT_LEAF {
            return Ok(());
        }

        let next_leaf = {
            let data = pool.get_page(&self.pid(it.page_no))?;
            let leaf = LeafPage::new(data, &self.td, self.key_index);
            if it.slot + 1 < leaf.size() {
                it.slot += 1;
                return Ok(());
            }
            leaf.next_leaf().unwrap_or(NO_NEXT_LEAF)
        };

        *it = self.first_at_or_after(pool, next_leaf)?;
        Ok(())
    }

    pub fn get_tuple(&self, pool: &mut BufferPool, it: TupleId) -> Result<Tuple> {
        if it.page_no == NO_NEXT_LEAF {
            return Err(StorageError::PageOutOfRange {
                page: it.page_no,
                num_pages: self.disk.num_pages(),
            }
            .into());
        }

        let data = pool.get_page(&self.pid(it.page_no))?;
        let tuple = LeafPage::new(data, &self.td, self.key_index).get_tuple(it.slot)?;
        Ok(tuple)
    }

    pub fn end(&self) -> TupleId {
        TupleId::new(NO_NEXT_LEAF, 0)
    }
}
