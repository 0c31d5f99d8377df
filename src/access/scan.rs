use crate::access::tuple::{Tuple, TupleId};
use crate::database::DbFile;
use crate::storage::buffer::BufferPool;
use anyhow::Result;

/// Iterator over every tuple of a file, in the file's native order: page
/// then slot for a heap file, ascending key for a tree file.
///
/// The scan drives the file's cursor API and fuses on the first error.
pub struct Scan<'a> {
    file: &'a DbFile,
    pool: &'a mut BufferPool,
    cursor: TupleId,
    end: TupleId,
}

impl<'a> Scan<'a> {
    pub fn new(file: &'a DbFile, pool: &'a mut BufferPool) -> Result<Self> {
        let cursor = file.begin(pool)?;
        let end = file.end();
        Ok(Self {
            file,
            pool,
            cursor,
            end,
        })
    }
}

impl Iterator for Scan<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == self.end {
            return None;
        }

        let tuple = match self.file.get_tuple(self.pool, self.cursor) {
            Ok(t) => t,
            Err(e) => {
                self.cursor = self.end;
                return Some(Err(e));
            }
        };
        if let Err(e) = self.file.next(self.pool, &mut self.cursor) {
            self.cursor = self.end;
            return Some(Err(e));
        }

        Some(Ok(tuple))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::heap::HeapFile;
    use crate::access::tuple::TupleDesc;
    use crate::access::value::{DataType, Value};
    use tempfile::tempdir;

    fn test_td() -> TupleDesc {
        TupleDesc::new(&[(DataType::Int, "id"), (DataType::Char, "name")]).unwrap()
    }

    fn tuple(id: i32, name: &str) -> Tuple {
        Tuple::new(vec![Value::Int(id), Value::Char(name.to_string())])
    }

    #[test]
    fn test_scan_collects_all_tuples() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("t.db").to_string_lossy().into_owned();

        let mut pool = BufferPool::new();
        let mut file = HeapFile::open(&path, test_td())?;
        pool.register_file(file.disk().clone());

        for id in 0..5 {
            file.insert_tuple(&mut pool, &tuple(id, "s"))?;
        }

        let file = DbFile::Heap(file);
        let tuples: Result<Vec<Tuple>> = Scan::new(&file, &mut pool)?.collect();
        let tuples = tuples?;

        assert_eq!(tuples.len(), 5);
        assert_eq!(tuples[0], tuple(0, "s"));
        assert_eq!(tuples[4], tuple(4, "s"));

        Ok(())
    }

    #[test]
    fn test_scan_of_empty_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("t.db").to_string_lossy().into_owned();

        let mut pool = BufferPool::new();
        let file = HeapFile::open(&path, test_td())?;
        pool.register_file(file.disk().clone());

        let file = DbFile::Heap(file);
        assert_eq!(Scan::new(&file, &mut pool)?.count(), 0);

        Ok(())
    }
}
