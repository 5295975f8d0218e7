//! Safety utilities to prevent clobbering the input table.
//!
//! Checkpoints are written next to (or into the same directory as) the song
//! table, so every output path is validated before it is overwritten.

use anyhow::{bail, Result};
use std::path::Path;

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output filename must contain the required pattern (e.g., "MissedSongs")
/// - Output cannot be the same as any of the provided source paths
///
/// # Arguments
/// * `output` - The output path that will be created/overwritten
/// * `required_pattern` - Pattern that must appear in the output filename
/// * `source_paths` - Slice of source paths that must not match the output
pub fn validate_output_path(
    output: &Path,
    required_pattern: &str,
    source_paths: &[&Path],
) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.contains(required_pattern) {
        bail!(
            "Safety check failed: output file '{}' must contain '{}' in the name",
            output.display(),
            required_pattern
        );
    }

    for source in source_paths {
        if output == *source || same_file(output, source) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    Ok(())
}

// Catches "./a.csv" vs "a.csv" once both exist
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
