//! Input validation utilities
//!
//! Remote paths travel inside FTP command lines, so anything that could split
//! a command is rejected before a connection is touched.

use crate::error::Error;

/// True when the string carries no line breaks or NUL.
pub fn is_valid_input(input: &str) -> bool {
    !input.contains('\0') && !input.contains('\r') && !input.contains('\n')
}

/// Check a remote path argument.
pub fn validate_remote_path(path: &str) -> Result<(), Error> {
    if is_valid_input(path) {
        Ok(())
    } else {
        Err(Error::InvalidPath(path.escape_debug().to_string()))
    }
}

/// Check a remote file name: non-empty, a single path component.
pub fn validate_file_name(name: &str) -> Result<(), Error> {
    validate_remote_path(name)?;
    if name.trim().is_empty() || name.contains('/') {
        return Err(Error::InvalidPath(name.to_string()));
    }
    Ok(())
}
