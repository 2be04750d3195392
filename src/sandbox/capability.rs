// SPDX-License-Identifier: MIT

//! Capability SIDs granted to a sandboxed process.
//!
//! The list is handed to the OS by address inside a SECURITY_CAPABILITIES
//! structure, so the backing array must keep a single fixed address from
//! construction until disposal.

use std::ffi::OsStr;

use windows::Win32::Security::{PSID, SE_GROUP_ENABLED, SID_AND_ATTRIBUTES};

use super::conv::as_c_str_w;
use super::error::SecurityDescriptorError;

/// A single named permission grantable to an app container identity.
///
/// Capabilities override the container's otherwise maximally restrictive
/// defaults; a container with none declared gets none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    InternetClient,
    InternetClientServer,
    PrivateNetworkClientServer,
    PicturesLibrary,
    VideosLibrary,
    MusicLibrary,
    DocumentsLibrary,
    RemovableStorage,
    /// Any other capability, by its SDDL SID string.
    Custom(String),
}

impl Capability {
    /// Canonical SDDL string form of the capability SID.
    pub fn sid_string(&self) -> &str {
        match self {
            Capability::InternetClient => "S-1-15-3-1",
            Capability::InternetClientServer => "S-1-15-3-2",
            Capability::PrivateNetworkClientServer => "S-1-15-3-3",
            Capability::PicturesLibrary => "S-1-15-3-4",
            Capability::VideosLibrary => "S-1-15-3-5",
            Capability::MusicLibrary => "S-1-15-3-6",
            Capability::DocumentsLibrary => "S-1-15-3-7",
            Capability::RemovableStorage => "S-1-15-3-10",
            Capability::Custom(sid) => sid,
        }
    }
}

/// An ordered set of (SID, attribute) pairs in the native layout process
/// creation expects, one entry per declared capability.
///
/// Each identity goes through its string form and the OS string-to-SID
/// conversion rather than hand-built SID binary layout; the conversion cost
/// is trivial next to a process launch.
pub struct SidAndAttributeList {
    // Boxed slice: the array address must not move while the OS holds it.
    entries: Box<[SID_AND_ATTRIBUTES]>,
}

impl SidAndAttributeList {
    /// Convert each capability into a native SID entry.  A failure part-way
    /// through frees every SID already converted before the error leaves.
    pub fn new(capabilities: &[Capability]) -> Result<Self, SecurityDescriptorError> {
        let mut entries: Vec<SID_AND_ATTRIBUTES> = Vec::with_capacity(capabilities.len());
        for capability in capabilities {
            match string_to_sid(capability.sid_string()) {
                Ok(sid) => entries.push(SID_AND_ATTRIBUTES {
                    Sid: sid,
                    Attributes: SE_GROUP_ENABLED as u32,
                }),
                Err(e) => {
                    for converted in &entries {
                        free_converted_sid(converted.Sid);
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self {
            entries: entries.into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pointer usable directly in SECURITY_CAPABILITIES.  Valid until drop;
    /// the OS only reads through it.
    pub(crate) fn as_ptr(&self) -> *mut SID_AND_ATTRIBUTES {
        self.entries.as_ptr() as *mut SID_AND_ATTRIBUTES
    }
}

impl Drop for SidAndAttributeList {
    fn drop(&mut self) {
        for entry in &*self.entries {
            free_converted_sid(entry.Sid);
        }
    }
}

/// Convert an SDDL SID string into a native SID.
/// The windows crate does not surface this routine, so go through winapi.
pub(crate) fn string_to_sid(sid: &str) -> Result<PSID, SecurityDescriptorError> {
    let sid_w = as_c_str_w(OsStr::new(sid));
    let mut raw: winapi::um::winnt::PSID = std::ptr::null_mut();
    let converted =
        unsafe { winapi::shared::sddl::ConvertStringSidToSidW(sid_w.as_ptr(), &mut raw) };
    if converted == 0 {
        Err(SecurityDescriptorError::SidConversion {
            sid: sid.to_string(),
            source: windows::core::Error::from_win32(),
        })
    } else {
        Ok(PSID(raw as *mut _))
    }
}

/// String-converted SIDs are LocalAlloc allocations; FreeSid is only for
/// SIDs from the allocate/profile APIs.
pub(crate) fn free_converted_sid(sid: PSID) {
    if !sid.0.is_null() {
        unsafe { winapi::um::winbase::LocalFree(sid.0 as *mut _) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_capability_sid_strings() {
        assert_eq!(Capability::InternetClient.sid_string(), "S-1-15-3-1");
        assert_eq!(Capability::InternetClientServer.sid_string(), "S-1-15-3-2");
        assert_eq!(
            Capability::PrivateNetworkClientServer.sid_string(),
            "S-1-15-3-3"
        );
        assert_eq!(Capability::RemovableStorage.sid_string(), "S-1-15-3-10");
    }

    #[test]
    fn custom_capability_passes_through() {
        let capability = Capability::Custom("S-1-15-3-12".to_string());
        assert_eq!(capability.sid_string(), "S-1-15-3-12");
    }

    #[test]
    fn list_converts_every_entry() {
        let list = SidAndAttributeList::new(&[
            Capability::InternetClient,
            Capability::PrivateNetworkClientServer,
        ])
        .expect("conversion should succeed");
        assert_eq!(list.len(), 2);
        assert!(!list.is_empty());
        assert!(!list.as_ptr().is_null());
    }

    #[test]
    fn empty_list_is_valid() {
        let list = SidAndAttributeList::new(&[]).expect("empty list should build");
        assert!(list.is_empty());
    }

    #[test]
    fn invalid_custom_sid_fails() {
        let err = SidAndAttributeList::new(&[Capability::Custom("not-a-sid".to_string())])
            .expect_err("conversion should fail");
        assert!(matches!(
            err,
            SecurityDescriptorError::SidConversion { ref sid, .. } if sid == "not-a-sid"
        ));
    }

    #[test]
    fn failure_after_partial_conversion_unwinds() {
        // The first entry converts and must be freed again when the second
        // entry's conversion fails.
        let err = SidAndAttributeList::new(&[
            Capability::InternetClient,
            Capability::Custom("garbage".to_string()),
        ])
        .expect_err("conversion should fail on the second entry");
        assert!(matches!(
            err,
            SecurityDescriptorError::SidConversion { ref sid, .. } if sid == "garbage"
        ));
    }
}
