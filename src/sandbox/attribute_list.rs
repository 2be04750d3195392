//! Process/Thread attribute list carrying the security-capabilities
//! attribute.  Because much of Windows requires explicit add/remove actions,
//! the list is wrapped in a struct that implements Drop.
//!
//! Both the list buffer and the SECURITY_CAPABILITIES it points at stay at
//! fixed addresses from construction until the wrapper drops; CreateProcess
//! reads them by pointer.

use std::marker::PhantomData;

use windows::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, GetLastError};
use windows::Win32::Security::SECURITY_CAPABILITIES;
use windows::Win32::System::Threading::{
    DeleteProcThreadAttributeList, InitializeProcThreadAttributeList,
    LPPROC_THREAD_ATTRIBUTE_LIST, PROC_THREAD_ATTRIBUTE_SECURITY_CAPABILITIES,
    UpdateProcThreadAttribute,
};

use super::appcontainer::AppContainer;
use super::capability::SidAndAttributeList;
use super::error::LaunchError;

pub struct ProcThreadAttributeList<'a> {
    // Boxed so the address handed to UpdateProcThreadAttribute cannot move.
    _capabilities: Box<SECURITY_CAPABILITIES>,
    // The attribute list lives inside this buffer until Drop deletes it.
    _buf: Vec<u8>,
    list: LPPROC_THREAD_ATTRIBUTE_LIST,
    // The SECURITY_CAPABILITIES points into the container SID and the
    // capability array; neither may drop before this list does.
    _owners: PhantomData<&'a ()>,
}

impl<'a> ProcThreadAttributeList<'a> {
    /// Build a one-attribute list binding the container identity and its
    /// capability set to an upcoming process creation.
    pub fn security_capabilities(
        container: &'a AppContainer,
        capabilities: Option<&'a SidAndAttributeList>,
    ) -> Result<Self, LaunchError> {
        let caps = Box::new(SECURITY_CAPABILITIES {
            AppContainerSid: container.sid(),
            Capabilities: capabilities.map_or(std::ptr::null_mut(), |list| list.as_ptr()),
            CapabilityCount: capabilities.map_or(0, |list| list.len() as u32),
            Reserved: 0,
        });

        unsafe {
            // Get the expected size.  This call reports insufficient buffer
            // by design; anything else is a real failure.
            let mut size = 0usize;
            match InitializeProcThreadAttributeList(
                None,      // query buffer size
                1,         // number of attributes to set
                Some(0),   // must be 0
                &mut size, // output required size in bytes
            ) {
                Ok(()) => (), // Unexpected, but we'll allow it.
                Err(e) => {
                    if GetLastError() != ERROR_INSUFFICIENT_BUFFER {
                        return Err(LaunchError::AttributeList(e));
                    }
                }
            }

            let mut buf = vec![0u8; size];
            let list = LPPROC_THREAD_ATTRIBUTE_LIST(buf.as_mut_ptr().cast());
            InitializeProcThreadAttributeList(
                Some(list), // allocated buffer
                1,          // matches number of attributes to set
                Some(0),    // must be 0
                &mut size,  // the computed size from the previous call
            )
            .map_err(LaunchError::AttributeList)?;

            if let Err(e) = UpdateProcThreadAttribute(
                list,
                0, // dwFlags must be 0
                PROC_THREAD_ATTRIBUTE_SECURITY_CAPABILITIES as usize,
                Some((caps.as_ref() as *const SECURITY_CAPABILITIES).cast()),
                std::mem::size_of::<SECURITY_CAPABILITIES>(),
                None, // previous value not wanted
                None, // nor its size
            ) {
                DeleteProcThreadAttributeList(list);
                return Err(LaunchError::AttributeList(e));
            }

            Ok(Self {
                _capabilities: caps,
                _buf: buf,
                list,
                _owners: PhantomData,
            })
        }
    }

    pub(crate) fn as_ptr(&self) -> LPPROC_THREAD_ATTRIBUTE_LIST {
        self.list
    }
}

impl Drop for ProcThreadAttributeList<'_> {
    fn drop(&mut self) {
        unsafe { DeleteProcThreadAttributeList(self.list) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::capability::Capability;

    #[test]
    fn builds_with_and_without_capabilities() {
        let name = "appjail-test-attribute-list";
        let container = AppContainer::get_or_create(name, "appjail test", "appjail test container")
            .expect("container should resolve");

        let bare = ProcThreadAttributeList::security_capabilities(&container, None)
            .expect("list without capabilities should build");
        assert!(!bare.as_ptr().0.is_null());
        drop(bare);

        let caps = SidAndAttributeList::new(&[Capability::InternetClient])
            .expect("capability list should build");
        let with_caps = ProcThreadAttributeList::security_capabilities(&container, Some(&caps))
            .expect("list with capabilities should build");
        assert!(!with_caps.as_ptr().0.is_null());
        drop(with_caps);

        drop(container);
        AppContainer::delete_profile(name).expect("cleanup should succeed");
    }
}
