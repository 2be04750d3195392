// SPDX-License-Identifier: MIT

//! Wide-string and path conversion routines shared by the sandbox modules.

use std::ffi::{OsStr, OsString};
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

/// Convert the OS string into a null-terminated wide (16-bit) C string.
pub fn as_c_str_w(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

/// Read a null-terminated wide C string out of an OS-owned buffer.
///
/// # Safety
/// `ptr` must point at a valid, NUL-terminated UTF-16 buffer.
pub unsafe fn from_c_str_w(ptr: *const u16) -> OsString {
    let mut len = 0;
    while unsafe { *ptr.add(len) } != 0 {
        len += 1;
    }
    OsString::from_wide(unsafe { std::slice::from_raw_parts(ptr, len) })
}

/// Get the canonical Win32 path, not the extended-length path that
/// canonicalize() generates.  The named-object security APIs reject relative
/// paths, and several of them mishandle the `\\?\` prefix.
pub fn full_path(path: &Path) -> Result<PathBuf, std::io::Error> {
    let resolved = path.canonicalize()?;
    let raw = resolved.as_os_str().as_encoded_bytes();
    if raw.starts_with(br"\\?\") {
        Ok(PathBuf::from(unsafe {
            OsStr::from_encoded_bytes_unchecked(&raw[4..])
        }))
    } else {
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_c_str_w_appends_terminator() {
        let wide = as_c_str_w(OsStr::new("ab"));
        assert_eq!(wide, vec!['a' as u16, 'b' as u16, 0]);
    }

    #[test]
    fn full_path_strips_extended_length_prefix() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resolved = full_path(dir.path()).expect("resolution should succeed");
        assert!(!resolved.as_os_str().as_encoded_bytes().starts_with(br"\\?\"));
        assert!(resolved.is_absolute());
    }

    #[test]
    fn full_path_rejects_missing_target() {
        assert!(full_path(Path::new(r"definitely\not\a\real\path")).is_err());
    }
}
