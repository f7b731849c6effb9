// src/watch/hash.rs

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;
use walkdir::WalkDir;

use crate::pipeline::context::relative_str;
use crate::watch::patterns::WatchRule;

/// Remembers the last aggregate content hash per watch rule.
///
/// The ledger lives for one dev session; the first check for a rule always
/// reports a change so the initial trigger is never swallowed.
#[derive(Debug, Default)]
pub struct HashLedger {
    seen: HashMap<String, String>,
}

impl HashLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the aggregate hash for the rule's files and compare it with
    /// the stored one. Updates the ledger when the hash moved.
    pub fn changed(&mut self, rule: &WatchRule, root: &Path) -> Result<bool> {
        let hash = aggregate_hash(rule, root)?;
        match self.seen.get(rule.label()) {
            Some(previous) if *previous == hash => {
                debug!(rule = rule.label(), "content hash unchanged");
                Ok(false)
            }
            _ => {
                self.seen.insert(rule.label().to_string(), hash);
                Ok(true)
            }
        }
    }
}

/// Hash the contents of every file under `root` the rule matches.
///
/// Paths are sorted before hashing so the result is independent of walk
/// order, and each relative path is mixed in ahead of its contents so
/// renames register as changes.
fn aggregate_hash(rule: &WatchRule, root: &Path) -> Result<String> {
    let mut files: Vec<(String, std::path::PathBuf)> = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.with_context(|| format!("walking {:?}", root))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(rel) = relative_str(root, entry.path()) {
            if rule.matches(&rel) {
                files.push((rel, entry.path().to_path_buf()));
            }
        }
    }

    files.sort();

    let mut hasher = Hasher::new();
    for (rel, path) in files {
        hasher.update(rel.as_bytes());
        hasher.update(&[0]);

        let mut file =
            File::open(&path).with_context(|| format!("opening file for hashing: {:?}", path))?;
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(rule = rule.label(), hash = %hash, "computed aggregate hash");
    Ok(hash)
}
