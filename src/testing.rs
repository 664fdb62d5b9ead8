//! Test doubles shared across modules.

use std::{collections::HashMap, sync::Mutex};

use crate::{
    config::Config,
    download::{ObjectMeta, ObjectStore},
    error::FetchError,
};

pub const BUCKET: &str = "noaa-ghcn-pds";

pub fn config_fixture() -> Config {
    Config {
        filename: Some("ghcn.store".to_string()),
        log_level: "DEBUG".to_string(),
        block_size: 10 * 1024 * 1024,
        ghcn_bucket: BUCKET.to_string(),
        ghcn_path: "csv/by_year/".to_string(),
        stations_key: "ghcnd-stations.txt".to_string(),
        start_year: 2020,
        last_year: Some(2021),
        polling_interval: 1,
        run_forever: false,
        object_endpoint: "http://localhost".to_string(),
        hsds_endpoint: None,
        hsds_username: None,
        hsds_password: None,
    }
}

/// Objects held in memory, with a log of the requests made against them.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    failing: Mutex<Vec<String>>,
    lost: Mutex<Vec<String>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn put(&self, key: &str, body: &[u8], etag: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (body.to_vec(), etag.to_string()));
    }

    /// Makes every GET of `key` fail as if the connection dropped.
    pub fn fail_gets(&self, key: &str) {
        self.failing.lock().unwrap().push(key.to_string());
    }

    /// Makes every GET of `key` miss while HEAD still finds it, as when the
    /// object is deleted between the two requests.
    pub fn lose_gets(&self, key: &str) {
        self.lost.lock().unwrap().push(key.to_string());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn log(&self, request: String) {
        self.requests.lock().unwrap().push(request);
    }

    fn body(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FetchError> {
        if bucket != BUCKET {
            return Err(FetchError::NotFound);
        }
        if self.failing.lock().unwrap().iter().any(|k| k == key) {
            return Err(FetchError::Status(503));
        }
        if self.lost.lock().unwrap().iter().any(|k| k == key) {
            return Err(FetchError::NotFound);
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(body, _)| body.clone())
            .ok_or(FetchError::NotFound)
    }
}

impl ObjectStore for MemoryStore {
    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>, FetchError> {
        self.log(format!("HEAD {}", key));
        if bucket != BUCKET {
            return Ok(None);
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(body, etag)| ObjectMeta {
                length: body.len() as u64,
                etag: Some(etag.clone()),
            }))
    }

    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, FetchError> {
        self.log(format!("GET {} {}-{}", key, start, end));
        let body = self.body(bucket, key)?;
        let len = body.len() as u64;
        if start >= len {
            return Err(FetchError::InvalidRange);
        }
        let end = end.min(len - 1);
        Ok(body[start as usize..=end as usize].to_vec())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FetchError> {
        self.log(format!("GET {}", key));
        self.body(bucket, key)
    }
}
