use std::os::unix::prelude::PermissionsExt;
use std::path::Path;

pub fn secure_directory<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    std::fs::set_permissions(path.as_ref(), std::fs::Permissions::from_mode(0o700))
}

pub fn secure_file<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    std::fs::set_permissions(path.as_ref(), std::fs::Permissions::from_mode(0o600))
}

/// Missing directories count as empty.
pub fn is_empty_directory<P: AsRef<Path>>(path: P) -> std::io::Result<bool> {
    match std::fs::read_dir(path.as_ref()) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}
