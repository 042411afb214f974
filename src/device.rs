//! Execution device tracking and the scoped "run on device" operation.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::ir::builder::BuildContext;

/// Memory space / execution place. Used both for the current execution
/// device of a build and for an array's residency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Device {
    Host,
    Gpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Host => write!(f, "host"),
            Device::Gpu => write!(f, "gpu"),
        }
    }
}

/// Exclusive borrow of a context whose device is set to `Gpu`.
/// Dropping it puts the context back on `Host`, whether the scope ended
/// normally, through `?`, or by unwinding.
pub struct DeviceScope<'a> {
    ctx: &'a mut BuildContext,
}

impl<'a> DeviceScope<'a> {
    fn enter(ctx: &'a mut BuildContext) -> Self {
        log::trace!("device: {} -> gpu", ctx.device);
        ctx.device = Device::Gpu;
        Self { ctx }
    }
}

impl Deref for DeviceScope<'_> {
    type Target = BuildContext;

    fn deref(&self) -> &BuildContext {
        self.ctx
    }
}

impl DerefMut for DeviceScope<'_> {
    fn deref_mut(&mut self) -> &mut BuildContext {
        self.ctx
    }
}

impl Drop for DeviceScope<'_> {
    fn drop(&mut self) {
        log::trace!("device: {} -> host", self.ctx.device);
        self.ctx.device = Device::Host;
    }
}

impl BuildContext {
    /// Run `action` with the execution device set to `Gpu`.
    ///
    /// The device is reset to `Host` when `action` returns, and also if
    /// it panics. Nested calls reset to `Host` when the inner one ends.
    pub fn run_on_device<T>(&mut self, action: impl FnOnce(&mut BuildContext) -> T) -> T {
        let mut scope = DeviceScope::enter(self);
        action(&mut *scope)
    }

    /// Same as [`BuildContext::run_on_device`], exposed as a guard for
    /// callers that want to hold the device scope across several calls.
    pub fn device_scope(&mut self) -> DeviceScope<'_> {
        DeviceScope::enter(self)
    }
}
