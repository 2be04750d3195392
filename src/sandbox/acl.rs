// SPDX-License-Identifier: MIT

//! Mandatory integrity labels and discretionary access rules for the
//! filesystem locations a sandboxed process is allowed to touch.

use std::path::{Path, PathBuf};

use windows::Win32::Foundation::{
    ERROR_INSUFFICIENT_BUFFER, GetLastError, HLOCAL, LocalFree,
};
use windows::Win32::Security::Authorization::{
    EXPLICIT_ACCESS_W, GetNamedSecurityInfoW, NO_MULTIPLE_TRUSTEE, SE_FILE_OBJECT,
    SetEntriesInAclW, SetNamedSecurityInfoW, TRUSTEE_IS_SID, TRUSTEE_IS_UNKNOWN, TRUSTEE_W,
};
use windows::Win32::Security::{
    ACE_FLAGS, ACL, ACL_REVISION, AddMandatoryAce, CreateWellKnownSid,
    DACL_SECURITY_INFORMATION, InitializeAcl, LABEL_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR,
    PSID, WELL_KNOWN_SID_TYPE,
};
use windows::Win32::Storage::FileSystem::FILE_ACCESS_RIGHTS;
use windows::Win32::System::SystemServices::SYSTEM_MANDATORY_LABEL_NO_WRITE_UP;
use windows::core::{PCWSTR, PWSTR};

pub use windows::Win32::Security::Authorization::ACCESS_MODE;

use super::conv::{as_c_str_w, full_path};
use super::error::SecurityDescriptorError;

// Plenty for a single mandatory-label ACE; computing the exact minimum from
// the SID layout is not worth the arithmetic.
const LABEL_ACL_SIZE: usize = 1024;

/// Stamp a mandatory integrity label onto a file or directory.
///
/// The existing label is always cleared by writing an empty ACL first.
/// Windows reports success but leaves the old label in place when a label
/// is rewritten without that clear, so the clear happens on every call.
pub fn set_integrity_level(
    path: &Path,
    level: WELL_KNOWN_SID_TYPE,
    inheritance: ACE_FLAGS,
) -> Result<(), SecurityDescriptorError> {
    let path = resolve(path)?;
    let path_w = as_c_str_w(path.as_os_str());
    let fail = |operation: &'static str, source: windows::core::Error| {
        SecurityDescriptorError::Object {
            operation,
            path: path.clone(),
            source,
        }
    };

    // Materialize the integrity-level SID: size query first, then fill.
    let mut sid_len = 0u32;
    match unsafe { CreateWellKnownSid(level, None, None, &mut sid_len) } {
        Ok(()) => (),
        Err(e) => {
            if unsafe { GetLastError() } != ERROR_INSUFFICIENT_BUFFER {
                return Err(fail("size well-known SID", e));
            }
        }
    }
    let mut sid_buf = vec![0u8; sid_len as usize];
    let level_sid = PSID(sid_buf.as_mut_ptr() as *mut _);
    unsafe { CreateWellKnownSid(level, None, Some(level_sid), &mut sid_len) }
        .map_err(|e| fail("create well-known SID", e))?;

    let mut acl_buf = vec![0u8; LABEL_ACL_SIZE];
    let acl = acl_buf.as_mut_ptr() as *mut ACL;
    unsafe { InitializeAcl(acl, LABEL_ACL_SIZE as u32, ACL_REVISION) }
        .map_err(|e| fail("initialize label ACL", e))?;

    // The ACL is still empty here; writing it drops whatever label the
    // object already carries.
    write_label(&path_w, acl).map_err(|e| fail("clear existing label", e))?;

    unsafe {
        AddMandatoryAce(
            acl,
            ACL_REVISION,
            inheritance,
            SYSTEM_MANDATORY_LABEL_NO_WRITE_UP as u32,
            level_sid,
        )
    }
    .map_err(|e| fail("add mandatory label ACE", e))?;

    write_label(&path_w, acl).map_err(|e| fail("write label", e))?;
    Ok(())
}

/// Append one discretionary access rule to a file.
pub fn add_file_ace(
    path: &Path,
    identity: PSID,
    rights: FILE_ACCESS_RIGHTS,
    access: ACCESS_MODE,
) -> Result<(), SecurityDescriptorError> {
    add_object_ace(path, identity, rights, ACE_FLAGS(0), access)
}

/// Append one discretionary access rule to a directory, propagated to its
/// children according to `inheritance`.
pub fn add_directory_ace(
    path: &Path,
    identity: PSID,
    rights: FILE_ACCESS_RIGHTS,
    inheritance: ACE_FLAGS,
    access: ACCESS_MODE,
) -> Result<(), SecurityDescriptorError> {
    add_object_ace(path, identity, rights, inheritance, access)
}

/// Read the object's DACL, merge one new rule in, write it back.  Not atomic
/// against concurrent external ACL edits on the same object; this crate's
/// usage is single-writer.
fn add_object_ace(
    path: &Path,
    identity: PSID,
    rights: FILE_ACCESS_RIGHTS,
    inheritance: ACE_FLAGS,
    access: ACCESS_MODE,
) -> Result<(), SecurityDescriptorError> {
    let path = resolve(path)?;
    let path_w = as_c_str_w(path.as_os_str());
    let fail = |operation: &'static str, source: windows::core::Error| {
        SecurityDescriptorError::Object {
            operation,
            path: path.clone(),
            source,
        }
    };

    let mut old_dacl: *mut ACL = std::ptr::null_mut();
    let mut descriptor = PSECURITY_DESCRIPTOR::default();
    unsafe {
        GetNamedSecurityInfoW(
            PCWSTR(path_w.as_ptr()),
            SE_FILE_OBJECT,
            DACL_SECURITY_INFORMATION,
            None,                // owner not wanted
            None,                // group not wanted
            Some(&mut old_dacl), // current DACL, owned by the descriptor
            None,                // SACL not wanted
            &mut descriptor,
        )
        .ok()
    }
    .map_err(|e| fail("read security descriptor", e))?;

    let entry = EXPLICIT_ACCESS_W {
        grfAccessPermissions: rights.0,
        grfAccessMode: access,
        grfInheritance: inheritance,
        Trustee: TRUSTEE_W {
            pMultipleTrustee: std::ptr::null_mut(),
            MultipleTrusteeOperation: NO_MULTIPLE_TRUSTEE,
            TrusteeForm: TRUSTEE_IS_SID,
            TrusteeType: TRUSTEE_IS_UNKNOWN,
            ptstrName: PWSTR(identity.0 as *mut u16),
        },
    };

    let mut new_dacl: *mut ACL = std::ptr::null_mut();
    let written = unsafe { SetEntriesInAclW(Some(&[entry]), Some(old_dacl), &mut new_dacl) }
        .ok()
        .and_then(|()| unsafe {
            SetNamedSecurityInfoW(
                PCWSTR(path_w.as_ptr()),
                SE_FILE_OBJECT,
                DACL_SECURITY_INFORMATION,
                None,           // owner untouched
                None,           // group untouched
                Some(new_dacl), // merged DACL
                None,           // SACL untouched
            )
            .ok()
        });

    // Both LocalAlloc results are released before any error surfaces.
    unsafe {
        if !descriptor.is_invalid() {
            let _ = LocalFree(Some(HLOCAL(descriptor.0)));
        }
        if !new_dacl.is_null() {
            let _ = LocalFree(Some(HLOCAL(new_dacl as *mut _)));
        }
    }
    written.map_err(|e| fail("write access rule", e))
}

fn resolve(path: &Path) -> Result<PathBuf, SecurityDescriptorError> {
    full_path(path).map_err(|e| SecurityDescriptorError::Path {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_label(path_w: &[u16], acl: *const ACL) -> windows::core::Result<()> {
    unsafe {
        SetNamedSecurityInfoW(
            PCWSTR(path_w.as_ptr()),
            SE_FILE_OBJECT,
            LABEL_SECURITY_INFORMATION,
            None,      // owner untouched
            None,      // group untouched
            None,      // DACL untouched
            Some(acl), // the label rides in the SACL slot
        )
        .ok()
    }
}
