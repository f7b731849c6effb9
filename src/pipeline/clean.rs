// src/pipeline/clean.rs

use std::fs;
use std::io;

use anyhow::{Context, Result};
use tracing::debug;

use crate::pipeline::context::BuildContext;

/// Remove the output directory and everything under it.
///
/// A missing output directory is success (there is nothing to remove);
/// any other error, such as a permission failure, propagates.
///
/// Returns 1 when a directory was removed, 0 when it was already absent.
pub fn remove_output(ctx: &BuildContext) -> Result<usize> {
    let output_root = &ctx.paths.output_root;

    match fs::remove_dir_all(output_root) {
        Ok(()) => {
            debug!(path = ?output_root, "removed output directory");
            Ok(1)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = ?output_root, "output directory already absent");
            Ok(0)
        }
        Err(err) => {
            Err(err).with_context(|| format!("removing output directory {:?}", output_root))
        }
    }
}
