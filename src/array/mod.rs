//! Array entities and the live-array registry.
//!
//! Arrays live in an arena owned by the build context and are addressed
//! by [`ArrayId`]. Releasing an array takes it out of the live registry
//! but keeps its slot, so a stale handle is reported instead of pointing
//! at some other array.

pub mod lower;

use crate::device::Device;
use crate::error::BuildError;
use crate::ir::builder::BuildContext;
use crate::ir::{ElemType, Expr, Scalar, Stmt, Ty};
use crate::runtime;
use crate::shape::Shape;

/// Stable handle to an array declared in a build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(u32);

impl ArrayId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Build-time bookkeeping for one array.
#[derive(Clone, Debug)]
pub struct ArrayDesc {
    pub name: String,
    pub elem: ElemType,
    pub shape: Shape,
    /// Host buffer handle (a run-time pointer).
    pub host: Expr,
    /// Device buffer handle, once allocated.
    pub device: Option<Expr>,
    /// Where the valid data currently lives.
    pub residency: Device,
    /// Host buffer was allocated by the build (and is freed on release).
    pub owns_host: bool,
    /// Value every element holds after a scalar fill, until overwritten.
    pub constant: Option<Scalar>,
    pub released: bool,
}

impl ArrayDesc {
    pub fn total_size(&self) -> usize {
        self.shape.total_size()
    }

    /// Buffer size in bytes.
    pub fn bytes(&self) -> usize {
        self.elem.size() * self.total_size()
    }

    pub fn device_allocated(&self) -> bool {
        self.device.is_some()
    }

    /// Buffer that reads and stores use when executing on `device`.
    pub fn buffer(&self, device: Device) -> Result<&Expr, BuildError> {
        match device {
            Device::Host => Ok(&self.host),
            Device::Gpu => self.device.as_ref().ok_or_else(|| BuildError::NoDeviceBuffer {
                array: self.name.clone(),
            }),
        }
    }
}

/// Arena of array descriptors plus the ordered live registry.
#[derive(Default)]
pub struct ArrayArena {
    slots: Vec<ArrayDesc>,
    live: Vec<ArrayId>,
}

impl ArrayArena {
    fn insert(&mut self, desc: ArrayDesc) -> ArrayId {
        let id = ArrayId(self.slots.len() as u32);
        self.slots.push(desc);
        self.live.push(id);
        id
    }

    /// Descriptor of a live array.
    pub fn get(&self, id: ArrayId) -> Result<&ArrayDesc, BuildError> {
        match self.slots.get(id.index()) {
            Some(desc) if desc.released => Err(BuildError::ReleasedArray(desc.name.clone())),
            Some(desc) => Ok(desc),
            None => Err(BuildError::ForeignNode),
        }
    }

    pub fn get_mut(&mut self, id: ArrayId) -> Result<&mut ArrayDesc, BuildError> {
        match self.slots.get_mut(id.index()) {
            Some(desc) if desc.released => Err(BuildError::ReleasedArray(desc.name.clone())),
            Some(desc) => Ok(desc),
            None => Err(BuildError::ForeignNode),
        }
    }

    /// Live arrays in declaration order.
    pub fn live(&self) -> &[ArrayId] {
        &self.live
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl BuildContext {
    fn declare_array(
        &mut self,
        name: &str,
        elem: ElemType,
        shape: Shape,
        host: Expr,
        owns_host: bool,
    ) -> ArrayId {
        self.arrays.insert(ArrayDesc {
            name: name.to_string(),
            elem,
            shape,
            host,
            device: None,
            residency: Device::Host,
            owns_host,
            constant: None,
            released: false,
        })
    }

    /// Every extent is positive and the buffer size in bytes fits a
    /// `usize`. Returns that size.
    fn check_extents(name: &str, elem: ElemType, shape: &Shape) -> Result<usize, BuildError> {
        if shape.dims().contains(&0) {
            return Err(BuildError::InvalidExtent {
                array: name.to_string(),
                shape: shape.clone(),
            });
        }
        shape
            .checked_total_size()
            .and_then(|n| n.checked_mul(elem.size()))
            .ok_or_else(|| BuildError::BufferTooLarge {
                array: name.to_string(),
                shape: shape.clone(),
            })
    }

    /// Allocate a fresh host buffer of `shape` elements.
    pub fn alloc_array(
        &mut self,
        name: &str,
        elem: ElemType,
        shape: impl Into<Shape>,
    ) -> Result<ArrayId, BuildError> {
        let shape = shape.into();
        let bytes = Self::check_extents(name, elem, &shape)?;
        let init = runtime::allocate(&self.config.runtime, bytes);
        let var = self.unique_name(name);
        self.emit(Stmt::Decl {
            name: var.clone(),
            ty: Ty::Ptr(elem),
            init,
        });
        log::debug!("alloc {} {} ({} bytes)", var, shape, bytes);
        Ok(self.declare_array(name, elem, shape, Expr::Var(var), true))
    }

    /// Wrap a caller-supplied buffer. The build never frees it.
    pub fn wrap_array(
        &mut self,
        name: &str,
        buffer: Expr,
        elem: ElemType,
        shape: impl Into<Shape>,
    ) -> Result<ArrayId, BuildError> {
        let shape = shape.into();
        Self::check_extents(name, elem, &shape)?;
        log::debug!("wrap {} as {} {}", buffer, name, shape);
        Ok(self.declare_array(name, elem, shape, buffer, false))
    }

    pub fn array(&self, id: ArrayId) -> Result<&ArrayDesc, BuildError> {
        self.arrays.get(id)
    }

    pub fn shape(&self, id: ArrayId) -> Result<&Shape, BuildError> {
        Ok(&self.arrays.get(id)?.shape)
    }

    /// Allocate the device buffer once; copy host → device unless the
    /// data already lives on the device.
    pub fn to_device(&mut self, id: ArrayId) -> Result<(), BuildError> {
        let desc = self.arrays.get(id)?;
        let bytes = desc.bytes();
        let name = desc.name.clone();
        let elem = desc.elem;
        let residency = desc.residency;

        if !desc.device_allocated() {
            let init = runtime::allocate_device(&self.config.runtime, bytes);
            let var = self.unique_name(&format!("{}_dev", name));
            self.emit(Stmt::Decl {
                name: var.clone(),
                ty: Ty::Ptr(elem),
                init,
            });
            let dev = Expr::Var(var);
            self.arrays.get_mut(id)?.device = Some(dev);
            log::debug!("device buffer for {} ({} bytes)", name, bytes);
        }

        if residency == Device::Gpu {
            return Ok(());
        }

        let desc = self.arrays.get(id)?;
        let dst = desc.buffer(Device::Gpu)?.clone();
        let src = desc.host.clone();
        let copy = runtime::copy_to_device(&self.config.runtime, dst, src, bytes);
        self.emit(Stmt::Call(copy));
        self.arrays.get_mut(id)?.residency = Device::Gpu;
        log::debug!("{} -> gpu", name);
        Ok(())
    }

    /// Copy device → host unless the data already lives on the host.
    pub fn to_host(&mut self, id: ArrayId) -> Result<(), BuildError> {
        let desc = self.arrays.get(id)?;
        if desc.residency == Device::Host {
            return Ok(());
        }
        let bytes = desc.bytes();
        let src = desc.buffer(Device::Gpu)?.clone();
        let dst = desc.host.clone();
        let name = desc.name.clone();
        let copy = runtime::copy_to_host(&self.config.runtime, dst, src, bytes);
        self.emit(Stmt::Call(copy));
        self.arrays.get_mut(id)?.residency = Device::Host;
        log::debug!("{} -> host", name);
        Ok(())
    }

    /// Record that code emitted by hand on the current device wrote the
    /// array's data. The array needs a buffer on that device.
    pub fn mark_written(&mut self, id: ArrayId) -> Result<(), BuildError> {
        let device = self.device;
        self.arrays.get(id)?.buffer(device)?;
        let desc = self.arrays.get_mut(id)?;
        desc.constant = None;
        desc.residency = device;
        Ok(())
    }

    /// End an array's lifetime: drop it from the live registry and free
    /// the buffers the build allocated for it.
    pub fn release(&mut self, id: ArrayId) -> Result<(), BuildError> {
        self.arrays.get(id)?;
        self.release_live(id);
        Ok(())
    }

    pub(crate) fn release_live(&mut self, id: ArrayId) {
        let Some(desc) = self.arrays.slots.get_mut(id.index()) else {
            return;
        };
        if desc.released {
            return;
        }
        desc.released = true;
        let owns_host = desc.owns_host;
        let host = desc.host.clone();
        let device = desc.device.clone();
        let name = desc.name.clone();
        self.arrays.live.retain(|live| *live != id);

        if let Some(dev) = device {
            let call = runtime::free_device(&self.config.runtime, dev);
            self.emit(Stmt::Call(call));
        }
        if owns_host {
            let call = runtime::free(&self.config.runtime, host);
            self.emit(Stmt::Call(call));
        }
        log::debug!("released {}", name);
    }
}
