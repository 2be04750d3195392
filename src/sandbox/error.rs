// SPDX-License-Identifier: MIT

//! Typed errors for the sandbox subsystem.
//!
//! Every variant that wraps an OS failure keeps the originating
//! [`windows::core::Error`] as its source, so callers can diagnose
//! privilege, policy, or resource failures without this crate interpreting
//! error codes itself.

use std::path::PathBuf;

use thiserror::Error;

/// App container profile creation or lookup failure.
///
/// "Already exists" during creation is not represented here; it degrades to
/// a lookup inside [`crate::sandbox::AppContainer::get_or_create`].
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("no app container profile named {name:?}")]
    ProfileNotFound {
        name: String,
        #[source]
        source: windows::core::Error,
    },

    #[error("failed to create app container profile {name:?}")]
    ProfileCreate {
        name: String,
        #[source]
        source: windows::core::Error,
    },

    #[error("failed to delete app container profile {name:?}")]
    ProfileDelete {
        name: String,
        #[source]
        source: windows::core::Error,
    },

    #[error("failed to render the SID of app container {name:?}")]
    SidString {
        name: String,
        #[source]
        source: windows::core::Error,
    },
}

/// ACL, SID, or integrity-label manipulation failure.
#[derive(Debug, Error)]
pub enum SecurityDescriptorError {
    #[error("cannot resolve {}", path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} failed for {}", path.display())]
    Object {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: windows::core::Error,
    },

    #[error("failed to convert SID string {sid:?}")]
    SidConversion {
        sid: String,
        #[source]
        source: windows::core::Error,
    },
}

/// Process-creation failure, from command-line construction through the
/// spawn call itself.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("argument contains an embedded NUL character")]
    InvalidArgument,

    #[error("failed to build the capability list")]
    Capabilities(#[from] SecurityDescriptorError),

    #[error("failed to build the process attribute list")]
    AttributeList(#[source] windows::core::Error),

    #[error("failed to spawn {}", image.display())]
    Spawn {
        image: PathBuf,
        #[source]
        source: windows::core::Error,
    },
}

/// The blocking wait primitive reported a hard failure instead of a signal.
/// Non-fatal to the watched process; the waiter still signals completion.
#[derive(Debug, Error)]
#[error("wait on process handles failed")]
pub struct WaitError(#[source] pub(crate) windows::core::Error);
