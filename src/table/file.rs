//! Local store: a directory holding a record file and a commit file per table.
//!
//! ```text
//! ghcn.store/
//!   manifest.json          format, version, record width per table
//!   data.rec               fixed-width day records
//!   data.attrs.json        {"length": n, "attrs": {"_row_marker": [2020, 3]}}
//!   stations.rec
//!   stations.attrs.json
//! ```
//!
//! The `.attrs.json` file is the commit record. It is replaced atomically on
//! every attribute write and carries the table length at that moment, so
//! records written after the last attribute write are discarded when the
//! table is next opened.

use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::{Dataset, DATA_CHUNK_RECORDS, DATA_TABLE, STATIONS_TABLE};
use crate::{
    error::{Error, Result},
    reading::{DayRecord, FixedRecord, StationRecord},
};

pub const MANIFEST_FILE: &str = "manifest.json";
const FORMAT: &str = "ghcn-store";
const VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format: String,
    version: u32,
    datasets: BTreeMap<String, DatasetLayout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DatasetLayout {
    record_width: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chunk_records: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct Commit {
    length: u64,
    #[serde(default)]
    attrs: BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct CommitRef<'a> {
    length: u64,
    attrs: &'a BTreeMap<String, Value>,
}

pub struct FileDataset<R> {
    name: String,
    dir: PathBuf,
    records: File,
    length: u64,
    attrs: BTreeMap<String, Value>,
    _record: PhantomData<R>,
}

fn record_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.rec", name))
}

fn commit_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.attrs.json", name))
}

fn create_dataset(dir: &Path, name: &str) -> Result<()> {
    File::create(record_path(dir, name))?;
    write_commit(dir, &commit_path(dir, name), 0, &BTreeMap::new())
}

impl<R: FixedRecord> FileDataset<R> {
    fn open(dir: &Path, name: &str) -> Result<Self> {
        let commit: Commit = serde_json::from_slice(&fs::read(commit_path(dir, name))?)?;
        let records = OpenOptions::new()
            .read(true)
            .write(true)
            .open(record_path(dir, name))?;

        let on_disk = records.metadata()?.len();
        let committed = commit.length * R::WIDTH as u64;
        if on_disk > committed {
            warn!(
                "{}: discarding {} uncommitted records",
                name,
                (on_disk - committed) / R::WIDTH as u64
            );
            records.set_len(committed)?;
        } else if on_disk < committed {
            return Err(Error::Store(format!(
                "{}: {} bytes on disk, {} records committed",
                name, on_disk, commit.length
            )));
        }

        Ok(FileDataset {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            records,
            length: commit.length,
            attrs: commit.attrs,
            _record: PhantomData,
        })
    }

    fn commit(&mut self) -> Result<()> {
        self.records.sync_data()?;
        write_commit(
            &self.dir,
            &commit_path(&self.dir, &self.name),
            self.length,
            &self.attrs,
        )
    }
}

fn write_commit(
    dir: &Path,
    path: &Path,
    length: u64,
    attrs: &BTreeMap<String, Value>,
) -> Result<()> {
    let body = serde_json::to_vec_pretty(&CommitRef { length, attrs })?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

impl<R: FixedRecord> Dataset for FileDataset<R> {
    type Record = R;

    fn len(&self) -> u64 {
        self.length
    }

    fn resize(&mut self, len: u64) -> Result<()> {
        debug!("{}: resize {} -> {}", self.name, self.length, len);
        self.records.set_len(len * R::WIDTH as u64)?;
        self.length = len;
        Ok(())
    }

    fn write_slab(&mut self, offset: u64, records: &[R]) -> Result<()> {
        let end = offset + records.len() as u64;
        if end > self.length {
            return Err(Error::Store(format!(
                "{}: slab {}..{} past end {}",
                self.name, offset, end, self.length
            )));
        }

        let mut buf = vec![0u8; records.len() * R::WIDTH];
        for (record, slot) in records.iter().zip(buf.chunks_exact_mut(R::WIDTH)) {
            record.encode(slot);
        }

        self.records.seek(SeekFrom::Start(offset * R::WIDTH as u64))?;
        self.records.write_all(&buf)?;
        Ok(())
    }

    fn read(&self, index: u64) -> Result<R> {
        if index >= self.length {
            return Err(Error::Store(format!(
                "{}: row {} out of range {}",
                self.name, index, self.length
            )));
        }

        let mut buf = vec![0u8; R::WIDTH];
        let mut file = &self.records;
        file.seek(SeekFrom::Start(index * R::WIDTH as u64))?;
        file.read_exact(&mut buf)?;
        Ok(R::decode(&buf))
    }

    fn attr(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.attrs.get(name).cloned())
    }

    fn set_attr(&mut self, name: &str, value: Value) -> Result<()> {
        self.attrs.insert(name.to_string(), value);
        self.commit()
    }

    fn delete_attr(&mut self, name: &str) -> Result<()> {
        if self.attrs.remove(name).is_some() {
            self.commit()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.commit()
    }
}

/// The `data` and `stations` tables of one store directory.
pub struct FileStore {
    pub root: PathBuf,
    pub data: FileDataset<DayRecord>,
    pub stations: FileDataset<StationRecord>,
}

impl FileStore {
    /// Creates the store and any missing table. Existing tables are left as
    /// they are.
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;

        let mut manifest = match read_manifest(root) {
            Ok(m) => m,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Store {} not found, will initialize", root.display());
                Manifest {
                    format: FORMAT.to_string(),
                    version: VERSION,
                    datasets: BTreeMap::new(),
                }
            }
            Err(e) => return Err(e),
        };

        let tables = [
            (DATA_TABLE, DayRecord::WIDTH, Some(DATA_CHUNK_RECORDS)),
            (STATIONS_TABLE, StationRecord::WIDTH, None),
        ];
        for (name, record_width, chunk_records) in tables {
            if manifest.datasets.contains_key(name) {
                continue;
            }
            info!("Creating dataset: {}", name);
            create_dataset(root, name)?;
            manifest.datasets.insert(
                name.to_string(),
                DatasetLayout {
                    record_width,
                    chunk_records,
                },
            );
        }

        let mut tmp = NamedTempFile::new_in(root)?;
        tmp.write_all(&serde_json::to_vec_pretty(&manifest)?)?;
        tmp.persist(root.join(MANIFEST_FILE)).map_err(|e| e.error)?;

        Self::open(root)
    }

    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let manifest = read_manifest(root)?;
        if manifest.format != FORMAT || manifest.version != VERSION {
            return Err(Error::Store(format!(
                "{}: unsupported format {} v{}",
                root.display(),
                manifest.format,
                manifest.version
            )));
        }

        check_layout::<DayRecord>(&manifest, DATA_TABLE)?;
        check_layout::<StationRecord>(&manifest, STATIONS_TABLE)?;

        Ok(FileStore {
            root: root.to_path_buf(),
            data: FileDataset::open(root, DATA_TABLE)?,
            stations: FileDataset::open(root, STATIONS_TABLE)?,
        })
    }
}

fn read_manifest(root: &Path) -> Result<Manifest> {
    let raw = fs::read(root.join(MANIFEST_FILE))?;
    Ok(serde_json::from_slice(&raw)?)
}

fn check_layout<R: FixedRecord>(manifest: &Manifest, name: &str) -> Result<()> {
    match manifest.datasets.get(name) {
        Some(layout) if layout.record_width == R::WIDTH => Ok(()),
        Some(layout) => Err(Error::Store(format!(
            "{}: record width {} but {} expected",
            name,
            layout.record_width,
            R::WIDTH
        ))),
        None => Err(Error::Store(format!("{}: table not found", name))),
    }
}

// -- Tests -------------------------------------------------------------------
