use crate::access::value::{DataType, Value, CHAR_SIZE};
use crate::storage::error::{StorageError, StorageResult};
use std::collections::HashMap;

/// Cursor position within a file: a page number and a slot within the page.
/// The file-specific end sentinels compare equal like any other position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleId {
    pub page_no: usize,
    pub slot: usize,
}

impl TupleId {
    pub fn new(page_no: usize, slot: usize) -> Self {
        Self { page_no, slot }
    }
}

/// An ordered sequence of field values.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, i: usize) -> &Value {
        &self.values[i]
    }

    pub fn field_type(&self, i: usize) -> DataType {
        self.values[i].data_type()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Schema of a fixed-width record: field types, unique names, and
/// precomputed byte offsets.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    types: Vec<DataType>,
    names: Vec<String>,
    offsets: Vec<usize>,
    length: usize,
    name_to_index: HashMap<String, usize>,
}

impl TupleDesc {
    pub fn new(fields: &[(DataType, &str)]) -> StorageResult<Self> {
        let mut name_to_index = HashMap::with_capacity(fields.len());
        let mut types = Vec::with_capacity(fields.len());
        let mut names = Vec::with_capacity(fields.len());
        let mut offsets = Vec::with_capacity(fields.len());

        let mut offset = 0;
        for (i, (ty, name)) in fields.iter().enumerate() {
            if name_to_index.insert(name.to_string(), i).is_some() {
                return Err(StorageError::DuplicateField(name.to_string()));
            }
            types.push(*ty);
            names.push(name.to_string());
            offsets.push(offset);
            offset += ty.size();
        }

        Ok(Self {
            types,
            names,
            offsets,
            length: offset,
            name_to_index,
        })
    }

    /// Number of fields.
    pub fn num_fields(&self) -> usize {
        self.types.len()
    }

    /// Serialized record width in bytes.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn field_type(&self, i: usize) -> DataType {
        self.types[i]
    }

    pub fn field_name(&self, i: usize) -> &str {
        &self.names[i]
    }

    pub fn offset_of(&self, i: usize) -> usize {
        self.offsets[i]
    }

    pub fn index_of(&self, name: &str) -> StorageResult<usize> {
        self.name_to_index
            .get(name)
            .copied()
            .ok_or_else(|| StorageError::UnknownField(name.to_string()))
    }

    /// True when the tuple's field types match this schema exactly.
    pub fn compatible(&self, t: &Tuple) -> bool {
        t.size() == self.types.len()
            && (0..self.types.len()).all(|i| t.field_type(i) == self.types[i])
    }

    /// Serialize `t` into the first `length()` bytes of `buf`. CHAR fields
    /// are truncated to `CHAR_SIZE` and null-padded.
    pub fn serialize(&self, buf: &mut [u8], t: &Tuple) -> StorageResult<()> {
        if !self.compatible(t) {
            return Err(StorageError::SchemaMismatch);
        }

        for (i, value) in t.values().iter().enumerate() {
            let off = self.offsets[i];
            match value {
                Value::Int(v) => buf[off..off + 4].copy_from_slice(&v.to_le_bytes()),
                Value::Double(v) => buf[off..off + 8].copy_from_slice(&v.to_le_bytes()),
                Value::Char(s) => {
                    let bytes = s.as_bytes();
                    let n = bytes.len().min(CHAR_SIZE);
                    buf[off..off + n].copy_from_slice(&bytes[..n]);
                    buf[off + n..off + CHAR_SIZE].fill(0);
                }
            }
        }
        Ok(())
    }

    /// Read a record back. CHAR fields stop at the first NUL.
    pub fn deserialize(&self, buf: &[u8]) -> Tuple {
        let values = self
            .types
            .iter()
            .zip(&self.offsets)
            .map(|(ty, &off)| match ty {
                DataType::Int => {
                    Value::Int(i32::from_le_bytes(buf[off..off + 4].try_into().unwrap()))
                }
                DataType::Double => {
                    Value::Double(f64::from_le_bytes(buf[off..off + 8].try_into().unwrap()))
                }
                DataType::Char => {
                    let field = &buf[off..off + CHAR_SIZE];
                    let len = field.iter().position(|&b| b == 0).unwrap_or(CHAR_SIZE);
                    Value::Char(String::from_utf8_lossy(&field[..len]).into_owned())
                }
            })
            .collect();

        Tuple::new(values)
    }

    /// Concatenate two schemas, keeping field order.
    pub fn merge(a: &TupleDesc, b: &TupleDesc) -> StorageResult<TupleDesc> {
        let fields: Vec<(DataType, &str)> = a
            .types
            .iter()
            .zip(&a.names)
            .chain(b.types.iter().zip(&b.names))
            .map(|(&ty, name)| (ty, name.as_str()))
            .collect();
        TupleDesc::new(&fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn test_td() -> TupleDesc {
        TupleDesc::new(&[
            (DataType::Int, "id"),
            (DataType::Double, "score"),
            (DataType::Char, "name"),
        ])
        .unwrap()
    }

    #[test]
    fn test_layout() {
        let td = test_td();
        assert_eq!(td.num_fields(), 3);
        assert_eq!(td.length(), 76);
        assert_eq!(td.offset_of(0), 0);
        assert_eq!(td.offset_of(1), 4);
        assert_eq!(td.offset_of(2), 12);
        assert_eq!(td.field_type(1), DataType::Double);
        assert_eq!(td.field_name(2), "name");
    }

    #[test]
    fn test_duplicate_field_name() {
        let result = TupleDesc::new(&[(DataType::Int, "a"), (DataType::Char, "a")]);
        assert!(matches!(result, Err(StorageError::DuplicateField(_))));
    }

    #[test]
    fn test_index_of() -> Result<()> {
        let td = test_td();
        assert_eq!(td.index_of("score")?, 1);
        assert!(matches!(
            td.index_of("missing"),
            Err(StorageError::UnknownField(_))
        ));
        Ok(())
    }

    #[test]
    fn test_compatible() {
        let td = test_td();

        let ok = Tuple::new(vec![
            Value::Int(1),
            Value::Double(0.5),
            Value::Char("x".into()),
        ]);
        assert!(td.compatible(&ok));

        let wrong_type = Tuple::new(vec![
            Value::Double(1.0),
            Value::Double(0.5),
            Value::Char("x".into()),
        ]);
        assert!(!td.compatible(&wrong_type));

        let wrong_arity = Tuple::new(vec![Value::Int(1)]);
        assert!(!td.compatible(&wrong_arity));
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let td = test_td();
        let t = Tuple::new(vec![
            Value::Int(-7),
            Value::Double(2.25),
            Value::Char("hello".into()),
        ]);

        let mut buf = vec![0u8; td.length()];
        td.serialize(&mut buf, &t)?;
        assert_eq!(td.deserialize(&buf), t);

        Ok(())
    }

    #[test]
    fn test_char_truncation_and_padding() -> Result<()> {
        let td = TupleDesc::new(&[(DataType::Char, "name")])?;

        let long = "x".repeat(CHAR_SIZE + 10);
        let t = Tuple::new(vec![Value::Char(long)]);
        let mut buf = vec![0u8; td.length()];
        td.serialize(&mut buf, &t)?;

        let back = td.deserialize(&buf);
        assert_eq!(back.get(0), &Value::Char("x".repeat(CHAR_SIZE)));

        // A short value is padded with NULs that deserialization strips.
        let t = Tuple::new(vec![Value::Char("ab".into())]);
        td.serialize(&mut buf, &t)?;
        assert_eq!(buf[2..CHAR_SIZE].iter().filter(|&&b| b != 0).count(), 0);
        assert_eq!(td.deserialize(&buf).get(0), &Value::Char("ab".into()));

        Ok(())
    }

    #[test]
    fn test_serialize_rejects_incompatible_tuple() {
        let td = test_td();
        let bad = Tuple::new(vec![Value::Int(1)]);
        let mut buf = vec![0u8; td.length()];

        assert!(matches!(
            td.serialize(&mut buf, &bad),
            Err(StorageError::SchemaMismatch)
        ));
    }

    #[test]
    fn test_merge() -> Result<()> {
        let a = TupleDesc::new(&[(DataType::Int, "id")])?;
        let b = TupleDesc::new(&[(DataType::Char, "name")])?;

        let merged = TupleDesc::merge(&a, &b)?;
        assert_eq!(merged.num_fields(), 2);
        assert_eq!(merged.length(), a.length() + b.length());
        assert_eq!(merged.index_of("name")?, 1);

        // Colliding names are rejected.
        assert!(TupleDesc::merge(&a, &a).is_err());

        Ok(())
    }
}
