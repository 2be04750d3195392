// SPDX-License-Identifier: MIT

//! Spawn the child process described by a launch context.

use std::ffi::c_void;
use std::mem;

use tracing::debug;
use windows::Win32::System::Threading::{
    CREATE_UNICODE_ENVIRONMENT, CreateProcessW, EXTENDED_STARTUPINFO_PRESENT,
    PROCESS_INFORMATION, STARTUPINFOEXW,
};
use windows::core::{PCWSTR, PWSTR};

use super::attribute_list::ProcThreadAttributeList;
use super::capability::SidAndAttributeList;
use super::context::ProcessLaunchContext;
use super::conv::as_c_str_w;
use super::error::LaunchError;
use super::launch_quote;
use super::process::ProcessHandle;

/// Launch the target image.  Exactly one attempt is made; retry policy
/// belongs to the caller.
///
/// Everything allocated on the way in (capability SIDs, the attribute list)
/// is dropped on the way out, error or not; only the returned handle pair
/// outlives the call.
pub fn start(context: &ProcessLaunchContext<'_>) -> Result<ProcessHandle, LaunchError> {
    let image_w = as_c_str_w(context.image.as_os_str());
    let mut cmdline = launch_quote::build_command_line(&context.image, &context.args)?;
    let cwd_w = context
        .working_directory
        .as_ref()
        .map(|dir| as_c_str_w(dir.as_os_str()));
    let env_block = match &context.environment {
        Some(pairs) => Some(launch_quote::encode_env_block(pairs)?),
        None => None,
    };

    // Capability plumbing only exists when the child gets a container
    // identity.  A container without capabilities is valid: the structure
    // then declares an empty set.
    let capability_list = match context.app_container {
        Some(_) if !context.capabilities.is_empty() => {
            Some(SidAndAttributeList::new(&context.capabilities)?)
        }
        _ => None,
    };
    let attributes = match context.app_container {
        Some(container) => Some(ProcThreadAttributeList::security_capabilities(
            container,
            capability_list.as_ref(),
        )?),
        None => None,
    };

    let mut startup: STARTUPINFOEXW = unsafe { mem::zeroed() };
    startup.StartupInfo.cb = mem::size_of::<STARTUPINFOEXW>() as u32;
    if let Some(list) = &attributes {
        startup.lpAttributeList = list.as_ptr();
    }

    let mut creation_flags = context.creation_flags | EXTENDED_STARTUPINFO_PRESENT;
    if env_block.is_some() {
        creation_flags |= CREATE_UNICODE_ENVIRONMENT;
    }

    let mut info: PROCESS_INFORMATION = unsafe { mem::zeroed() };
    unsafe {
        CreateProcessW(
            PCWSTR(image_w.as_ptr()),               // application name: the resolved image
            Some(PWSTR(cmdline.as_mut_ptr())),      // command line, mutable per the API contract
            None,                                   // process security attributes
            None,                                   // thread security attributes
            false,                                  // no handle inheritance
            creation_flags,
            env_block.as_ref().map(|block| block.as_ptr() as *const c_void),
            cwd_w
                .as_ref()
                .map_or(PCWSTR::null(), |dir| PCWSTR(dir.as_ptr())),
            &startup.StartupInfo,
            &mut info,
        )
    }
    .map_err(|e| LaunchError::Spawn {
        image: context.image.clone(),
        source: e,
    })?;

    debug!(
        image = %context.image.display(),
        pid = info.dwProcessId,
        container = context.app_container.map(|c| c.name()),
        "spawned child process",
    );

    // The attribute list was only needed for the creation call and drops at
    // the end of this scope, along with the capability list it referenced.
    Ok(ProcessHandle::new(info.hProcess, info.hThread))
}
