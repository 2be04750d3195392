// SPDX-License-Identifier: MIT

//! Wrapper for the AppContainer profile work.
//! Windows hands the container SID out as a raw allocation, so the wrapper
//! implements Drop to keep the allocate/free pairing in one place.

use std::ffi::OsStr;

use tracing::debug;
use windows::Win32::Foundation::ERROR_ALREADY_EXISTS;
use windows::Win32::Security::{self, Isolation};
use windows::core::PCWSTR;

use super::conv::{as_c_str_w, from_c_str_w};
use super::error::SandboxError;

/// An isolated execution identity, keyed by a profile name.
///
/// Creation is idempotent per name: a second create degrades to a lookup,
/// so two values may resolve to the same underlying profile.  Dropping a
/// value frees only the in-process SID; the OS-side profile registration
/// stays until [`AppContainer::delete_profile`] removes it explicitly.
pub struct AppContainer {
    name: String,
    sid: Security::PSID,
}

impl AppContainer {
    /// Resolve an existing container profile from its name.
    pub fn get(name: &str) -> Result<Self, SandboxError> {
        let name_w = as_c_str_w(OsStr::new(name));
        match unsafe {
            Isolation::DeriveAppContainerSidFromAppContainerName(PCWSTR(name_w.as_ptr()))
        } {
            Ok(sid) => Ok(Self {
                name: name.to_string(),
                sid,
            }),
            Err(e) => Err(SandboxError::ProfileNotFound {
                name: name.to_string(),
                source: e,
            }),
        }
    }

    /// Create the container profile, or look it up if it already exists.
    pub fn get_or_create(
        name: &str,
        display_name: &str,
        description: &str,
    ) -> Result<Self, SandboxError> {
        let name_w = as_c_str_w(OsStr::new(name));
        let display_w = as_c_str_w(OsStr::new(display_name));
        let description_w = as_c_str_w(OsStr::new(description));
        match unsafe {
            Isolation::CreateAppContainerProfile(
                PCWSTR(name_w.as_ptr()),        // pszAppContainerName: identifies the profile
                PCWSTR(display_w.as_ptr()),     // pszDisplayName: human-readable
                PCWSTR(description_w.as_ptr()), // pszDescription
                None,                           // pCapabilities: declared at launch time instead
            )
        } {
            Ok(sid) => {
                debug!(container = name, "created app container profile");
                Ok(Self {
                    name: name.to_string(),
                    sid,
                })
            }
            Err(e) if e.code() == ERROR_ALREADY_EXISTS.to_hresult() => {
                debug!(container = name, "profile already exists, deriving its SID");
                Self::get(name)
            }
            Err(e) => Err(SandboxError::ProfileCreate {
                name: name.to_string(),
                source: e,
            }),
        }
    }

    /// Remove the OS-side profile registration.  Dropping an `AppContainer`
    /// never does this; deletion is always a separate, explicit step.
    pub fn delete_profile(name: &str) -> Result<(), SandboxError> {
        let name_w = as_c_str_w(OsStr::new(name));
        unsafe { Isolation::DeleteAppContainerProfile(PCWSTR(name_w.as_ptr())) }.map_err(|e| {
            SandboxError::ProfileDelete {
                name: name.to_string(),
                source: e,
            }
        })
    }

    /// The profile name this identity was resolved from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw container SID, valid for the life of this value.
    pub fn sid(&self) -> Security::PSID {
        self.sid
    }

    /// SDDL string form of the container SID.
    ///
    /// The windows crate does not surface ConvertSidToStringSidW, so this
    /// goes through winapi; the OS allocates the string and it is freed here.
    pub fn sid_string(&self) -> Result<String, SandboxError> {
        let mut buf: *mut u16 = std::ptr::null_mut();
        let converted =
            unsafe { winapi::shared::sddl::ConvertSidToStringSidW(self.sid.0 as _, &mut buf) };
        if converted == 0 {
            return Err(SandboxError::SidString {
                name: self.name.clone(),
                source: windows::core::Error::from_win32(),
            });
        }
        let rendered = unsafe { from_c_str_w(buf) };
        unsafe { winapi::um::winbase::LocalFree(buf as *mut _) };
        Ok(rendered.to_string_lossy().into_owned())
    }
}

impl PartialEq for AppContainer {
    /// Two containers are equal when they resolve to the same SID, whatever
    /// name each was reached through.
    fn eq(&self, other: &Self) -> bool {
        match (self.sid_string(), other.sid_string()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Debug for AppContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContainer")
            .field("name", &self.name)
            .finish()
    }
}

impl Drop for AppContainer {
    fn drop(&mut self) {
        // Profile SIDs come from the profile APIs and take FreeSid, unlike
        // string-converted SIDs which are LocalAlloc-backed.
        let _ = unsafe { Security::FreeSid(self.sid) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let name = "appjail-test-idempotent";
        let first = AppContainer::get_or_create(name, "appjail test", "appjail test container")
            .expect("first create should succeed");
        let second = AppContainer::get_or_create(name, "appjail test", "appjail test container")
            .expect("second create should degrade to a lookup");
        assert_eq!(first, second);

        drop(first);
        drop(second);
        AppContainer::delete_profile(name).expect("cleanup should succeed");
    }

    #[test]
    fn get_missing_profile_fails() {
        let err = AppContainer::get("appjail-test-no-such-profile")
            .expect_err("lookup of a missing profile should fail");
        assert!(matches!(err, SandboxError::ProfileNotFound { .. }));
    }

    #[test]
    fn sid_string_is_appcontainer_shaped() {
        let name = "appjail-test-sid-string";
        let container = AppContainer::get_or_create(name, "appjail test", "appjail test container")
            .expect("create should succeed");
        let sid = container.sid_string().expect("sid should render");
        // App container SIDs live under the S-1-15-2 authority.
        assert!(sid.starts_with("S-1-15-2-"), "unexpected SID {sid}");

        drop(container);
        AppContainer::delete_profile(name).expect("cleanup should succeed");
    }
}
