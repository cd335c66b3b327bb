//! In-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{ExportError, Result};
use crate::transport::Transport;

/// Answers GETs from queued replies keyed by a URL substring and serves
/// files from a map. Unknown files are 404.
#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    replies: Mutex<Vec<(String, VecDeque<(u16, String)>)>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<String>>,
    downloads: AtomicUsize,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next GET whose URL contains `needle`.
    pub(crate) fn reply(&self, needle: &str, status: u16, body: &str) {
        let mut replies = self.replies.lock().unwrap();
        match replies.iter_mut().find(|(n, _)| n == needle) {
            Some((_, queue)) => queue.push_back((status, body.to_string())),
            None => replies.push((
                needle.to_string(),
                VecDeque::from([(status, body.to_string())]),
            )),
        }
    }

    pub(crate) fn file(&self, url: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes.to_vec());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl Transport for FakeTransport {
    fn get_text(&self, url: &str) -> Result<(u16, String)> {
        self.calls.lock().unwrap().push(url.to_string());
        let mut replies = self.replies.lock().unwrap();
        let reply = replies
            .iter_mut()
            .find(|(needle, queue)| url.contains(needle.as_str()) && !queue.is_empty())
            .and_then(|(_, queue)| queue.pop_front());
        Ok(reply.unwrap_or((404, "not found".to_string())))
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let bytes = self.files.lock().unwrap().get(url).cloned();
        let Some(bytes) = bytes else {
            return Err(ExportError::HttpStatus {
                url: url.to_string(),
                status: 404,
            });
        };
        std::fs::write(dest, &bytes).map_err(|source| ExportError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        Ok(bytes.len() as u64)
    }
}
