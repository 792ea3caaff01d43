use std::path::Path;
use std::io::Write;

use tempfile::{NamedTempFile, TempDir};

pub fn create_tempfile<P: AsRef<Path>>(name: &str, dir: P, random: usize) -> Result<NamedTempFile, std::io::Error> {
    tempfile::Builder::new()
        .prefix(".")
        .rand_bytes(random)
        .suffix(name)
        .tempfile_in(dir)
}

pub fn save_to_tempfile<P: AsRef<Path>>(name: &str, dir: P, random: usize, content: &[u8]) -> Result<NamedTempFile, std::io::Error> {
    let mut tempfile = create_tempfile(name, dir, random)?;
    tempfile.write_all(content)?;
    tempfile.as_file().sync_all()?;
    Ok(tempfile)
}

/// Scoped working directory, removed when the guard drops
pub fn create_workspace(prefix: &str, temp_root: Option<&Path>) -> Result<TempDir, std::io::Error> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    match temp_root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
}
