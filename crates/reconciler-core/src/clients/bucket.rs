//! Storage-bucket client (`spec.md` §4.B "Bucket client").
//!
//! Buckets have an asynchronous `deleting`/`creating`/`active` lifecycle;
//! both upsert and delete poll for a terminal state rather than trusting the
//! initial response.

use std::time::{Duration, Instant};

use reconciler_types::RespError;
use serde_json::Value;

use crate::transport::Transport;

use super::UpsertOutcome;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const POLL_MAX_RETRIES: u32 = 15;
const POLL_MAX_ELAPSED: Duration = Duration::from_secs(5 * 60);
const TRANSIENT_STATUSES: &[&str] = &["deleting", "creating"];

pub struct BucketClient<'a> {
    transport: &'a Transport,
}

impl<'a> BucketClient<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    fn path(bucket_name: &str) -> String {
        format!("/platform/storage/management/v1/bucket-definitions/{bucket_name}")
    }

    pub fn get(&self, bucket_name: &str) -> Result<Value, RespError> {
        let path = Self::path(bucket_name);
        let response = self.transport.get(&path)?;
        response.json().map_err(|e| RespError {
            status: response.status,
            headers: response.headers,
            body: e.to_string(),
            request_info: path,
        })
    }

    pub fn upsert(&self, bucket_name: &str, payload: &Value) -> Result<UpsertOutcome, RespError> {
        let path = Self::path(bucket_name);
        let existing = self.transport.get(&path);
        let created = matches!(existing, Err(ref e) if e.status == 404);
        self.transport.put(&path, payload)?;
        self.poll_until_settled(bucket_name)?;
        Ok(if created {
            UpsertOutcome::Created {
                id: bucket_name.to_string(),
            }
        } else {
            UpsertOutcome::Updated {
                id: bucket_name.to_string(),
            }
        })
    }

    pub fn delete(&self, bucket_name: &str) -> Result<(), RespError> {
        let path = Self::path(bucket_name);
        match self.transport.delete(&path) {
            Ok(_) => {}
            Err(err) if err.status == 404 => return Ok(()),
            Err(err) => return Err(err),
        }
        self.poll_until_deleted(bucket_name)
    }

    fn poll_until_settled(&self, bucket_name: &str) -> Result<(), RespError> {
        let started = Instant::now();
        for _ in 0..POLL_MAX_RETRIES {
            if started.elapsed() >= POLL_MAX_ELAPSED {
                break;
            }
            let body = self.get(bucket_name)?;
            let status = body.get("status").and_then(Value::as_str).unwrap_or("active");
            if !TRANSIENT_STATUSES.contains(&status) {
                return Ok(());
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }

    fn poll_until_deleted(&self, bucket_name: &str) -> Result<(), RespError> {
        let started = Instant::now();
        loop {
            match self.transport.get(&Self::path(bucket_name)) {
                Err(err) if err.status == 404 => return Ok(()),
                Err(err) => return Err(err),
                Ok(_) if started.elapsed() >= POLL_MAX_ELAPSED => return Ok(()),
                Ok(_) => std::thread::sleep(POLL_INTERVAL),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_targets_bucket_definitions() {
        assert_eq!(
            BucketClient::path("logs_raw"),
            "/platform/storage/management/v1/bucket-definitions/logs_raw"
        );
    }

    #[test]
    fn transient_statuses_cover_documented_set() {
        assert!(TRANSIENT_STATUSES.contains(&"deleting"));
        assert!(TRANSIENT_STATUSES.contains(&"creating"));
        assert!(!TRANSIENT_STATUSES.contains(&"active"));
    }
}
