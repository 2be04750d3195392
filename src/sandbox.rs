// SPDX-License-Identifier: MIT

//! Sandboxed process launch and lifecycle.
//!
//! A caller resolves or creates an [`AppContainer`], optionally hardens the
//! directories the child will need with the ACL helpers, describes the
//! launch in a [`ProcessLaunchContext`], and hands it to [`start`].  The
//! returned [`ProcessHandle`] can be wrapped in a [`ProcessWaiter`] to be
//! notified of, or cancel waiting for, process termination.

pub mod error;

mod acl;
mod appcontainer;
mod attribute_list;
mod capability;
mod context;
mod conv;
mod launch;
mod launch_quote;
mod process;
mod waiter;

pub use acl::{ACCESS_MODE, add_directory_ace, add_file_ace, set_integrity_level};
pub use appcontainer::AppContainer;
pub use capability::{Capability, SidAndAttributeList};
pub use context::ProcessLaunchContext;
pub use launch::start;
pub use process::ProcessHandle;
pub use waiter::ProcessWaiter;
