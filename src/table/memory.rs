//! In-memory table for tests.

use std::collections::HashMap;

use serde_json::Value;

use super::Dataset;
use crate::{
    error::{Error, Result},
    reading::FixedRecord,
};

#[derive(Debug)]
pub struct MemoryDataset<R> {
    pub rows: Vec<R>,
    pub attrs: HashMap<String, Value>,
    /// Every write, resize and attribute change bumps this.
    pub writes: usize,
}

impl<R> Default for MemoryDataset<R> {
    fn default() -> Self {
        MemoryDataset {
            rows: Vec::new(),
            attrs: HashMap::new(),
            writes: 0,
        }
    }
}

impl<R: FixedRecord + Clone + Default> Dataset for MemoryDataset<R> {
    type Record = R;

    fn len(&self) -> u64 {
        self.rows.len() as u64
    }

    fn resize(&mut self, len: u64) -> Result<()> {
        self.rows.resize(len as usize, R::default());
        self.writes += 1;
        Ok(())
    }

    fn write_slab(&mut self, offset: u64, records: &[R]) -> Result<()> {
        let offset = offset as usize;
        let end = offset + records.len();
        if end > self.rows.len() {
            return Err(Error::Store(format!("slab past end {}", self.rows.len())));
        }
        self.rows[offset..end].clone_from_slice(records);
        self.writes += 1;
        Ok(())
    }

    fn read(&self, index: u64) -> Result<R> {
        self.rows
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Error::Store(format!("row {} out of range", index)))
    }

    fn attr(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.attrs.get(name).cloned())
    }

    fn set_attr(&mut self, name: &str, value: Value) -> Result<()> {
        self.attrs.insert(name.to_string(), value);
        self.writes += 1;
        Ok(())
    }

    fn delete_attr(&mut self, name: &str) -> Result<()> {
        self.attrs.remove(name);
        self.writes += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
