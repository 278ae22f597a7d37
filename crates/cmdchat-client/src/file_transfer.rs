//! Client-side file transfer manager (component R, §4.19/§3 supplement).
//! Tracks in-flight transfers by `file_id`, reassembles chunks in strict
//! index order once all have arrived, and writes the result with
//! collision-safe naming.
//!
//! Grounded on the original's `lib/file_transfer.py::FileTransferManager`:
//! `generate_file_id`'s hash-of-name-plus-random-bytes scheme,
//! `calculate_chunks`'s ceiling division, and `complete_transfer`'s
//! `_1`, `_2`, ... collision suffixing are all reproduced structurally.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Chunk size used when splitting an outgoing file, in bytes.
pub const FILE_CHUNK_SIZE: usize = 32 * 1024;

struct IncomingTransfer {
    filename: String,
    total_chunks: i64,
    chunks: HashMap<i64, Vec<u8>>,
}

#[derive(Default)]
pub struct FileTransferManager {
    transfers: HashMap<String, IncomingTransfer>,
}

impl FileTransferManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A 16-hex-character id derived from the sender name, filename, and 8
    /// random bytes, matching the original's collision-avoidance scheme.
    pub fn generate_file_id(client_name: &str, filename: &str) -> String {
        let mut random_bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut random_bytes);
        let mut hasher = Sha256::new();
        hasher.update(client_name.as_bytes());
        hasher.update(filename.as_bytes());
        hasher.update(hex::encode(random_bytes).as_bytes());
        let digest = hasher.finalize();
        hex::encode(digest)[..16].to_string()
    }

    /// Ceiling-division chunk count for a file of `filesize` bytes.
    pub fn calculate_chunks(filesize: i64, chunk_size: usize) -> i64 {
        let chunk_size = chunk_size as i64;
        (filesize + chunk_size - 1) / chunk_size
    }

    pub fn start_transfer(&mut self, file_id: String, filename: String, total_chunks: i64) {
        self.transfers.insert(
            file_id,
            IncomingTransfer {
                filename,
                total_chunks,
                chunks: HashMap::new(),
            },
        );
    }

    /// Records one chunk. Returns `(received_count, total_chunks)`; the
    /// caller checks for completion by comparing the two.
    pub fn add_chunk(&mut self, file_id: &str, chunk_index: i64, chunk_data: Vec<u8>) -> Option<(usize, i64)> {
        let transfer = self.transfers.get_mut(file_id)?;
        transfer.chunks.entry(chunk_index).or_insert(chunk_data);
        Some((transfer.chunks.len(), transfer.total_chunks))
    }

    pub fn is_complete(&self, file_id: &str) -> bool {
        self.transfers
            .get(file_id)
            .map(|t| t.chunks.len() as i64 >= t.total_chunks)
            .unwrap_or(false)
    }

    /// Writes the reassembled file under `dest_dir`, using the original
    /// filename with a numeric `_1`, `_2`, ... suffix on collision, and
    /// removes the transfer from tracking.
    pub fn complete_transfer(&mut self, file_id: &str, dest_dir: &Path) -> anyhow::Result<PathBuf> {
        let transfer = self
            .transfers
            .remove(file_id)
            .ok_or_else(|| anyhow::anyhow!("unknown file transfer {file_id}"))?;

        std::fs::create_dir_all(dest_dir)?;

        let sanitized_name = cmdchat_core::sanitize::sanitize_filename(&transfer.filename);
        let candidate = dest_dir.join(&sanitized_name);
        let final_path = Self::avoid_collision(&candidate);

        let mut bytes = Vec::new();
        for index in 0..transfer.total_chunks {
            if let Some(chunk) = transfer.chunks.get(&index) {
                bytes.extend_from_slice(chunk);
            }
        }
        std::fs::write(&final_path, bytes)?;
        Ok(final_path)
    }

    fn avoid_collision(path: &Path) -> PathBuf {
        if !path.exists() {
            return path.to_path_buf();
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file").to_string();
        let extension = path.extension().and_then(|s| s.to_str());
        let parent = path.parent().unwrap_or_else(|| Path::new("."));

        let mut counter = 1;
        loop {
            let candidate_name = match extension {
                Some(ext) => format!("{stem}_{counter}.{ext}"),
                None => format!("{stem}_{counter}"),
            };
            let candidate = parent.join(candidate_name);
            if !candidate.exists() {
                return candidate;
            }
            counter += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculate_chunks_rounds_up() {
        assert_eq!(FileTransferManager::calculate_chunks(1, 32768), 1);
        assert_eq!(FileTransferManager::calculate_chunks(32768, 32768), 1);
        assert_eq!(FileTransferManager::calculate_chunks(32769, 32768), 2);
    }

    #[test]
    fn file_id_is_sixteen_hex_characters() {
        let id = FileTransferManager::generate_file_id("alice", "report.pdf");
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn transfer_completes_only_once_every_chunk_has_arrived() {
        let mut manager = FileTransferManager::new();
        manager.start_transfer("f1".to_string(), "a.txt".to_string(), 2);
        assert!(!manager.is_complete("f1"));
        manager.add_chunk("f1", 0, b"hello ".to_vec());
        assert!(!manager.is_complete("f1"));
        manager.add_chunk("f1", 1, b"world".to_vec());
        assert!(manager.is_complete("f1"));
    }

    #[test]
    fn reassembly_preserves_chunk_order_regardless_of_arrival_order() {
        let dir = std::env::temp_dir().join(format!("cmdchat-ft-test-{}", std::process::id()));
        let mut manager = FileTransferManager::new();
        manager.start_transfer("f2".to_string(), "out.txt".to_string(), 2);
        manager.add_chunk("f2", 1, b"world".to_vec());
        manager.add_chunk("f2", 0, b"hello ".to_vec());

        let path = manager.complete_transfer("f2", &dir).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "hello world");

        std::fs::remove_dir_all(dir).ok();
    }
}
