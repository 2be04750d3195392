// SPDX-License-Identifier: MIT

//! Plain configuration value describing what to launch.

use std::ffi::OsString;
use std::path::PathBuf;

use windows::Win32::System::Threading::PROCESS_CREATION_FLAGS;

use super::appcontainer::AppContainer;
use super::capability::Capability;

/// Everything [`crate::sandbox::start`] needs to spawn one child.
///
/// Argument content is never interpreted, only escaped.  A container with an
/// empty capability set is valid and means no declared capabilities.
pub struct ProcessLaunchContext<'a> {
    /// Fully-resolved image path.  No PATH search is performed.
    pub image: PathBuf,
    /// Arguments appended after the image on the command line.
    pub args: Vec<OsString>,
    /// Extra creation flags.  EXTENDED_STARTUPINFO_PRESENT is always merged
    /// in by the launcher.
    pub creation_flags: PROCESS_CREATION_FLAGS,
    /// Child working directory; inherits the parent's when None.
    pub working_directory: Option<PathBuf>,
    /// Explicit environment; inherits the parent's when None.
    pub environment: Option<Vec<(OsString, OsString)>>,
    /// Sandbox identity the child runs under, if any.
    pub app_container: Option<&'a AppContainer>,
    /// Capabilities declared for the container; ignored without one.
    pub capabilities: Vec<Capability>,
}

impl<'a> ProcessLaunchContext<'a> {
    pub fn new(image: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            args: Vec::new(),
            creation_flags: PROCESS_CREATION_FLAGS(0),
            working_directory: None,
            environment: None,
            app_container: None,
            capabilities: Vec::new(),
        }
    }
}
