//! Handle registry: maps opaque descriptor handles to open descriptions.

use crate::context::VfsConfig;
use crate::descriptor::Descriptor;
use crate::flags::DescriptorFlags;
use crate::fs::Fs;
use crate::handle::OpenDescription;
use crate::ids::DescriptorHandle;
use crate::node::DescriptorType;
use crate::{Errno, VfsError, VfsResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Liveness and teardown primitives consumed by the descriptor layer.
pub trait HandleRegistry: Send + Sync {
    fn is_open(&self, handle: DescriptorHandle) -> bool;
    /// Returns whether a live handle was closed.
    fn close(&self, handle: DescriptorHandle) -> bool;
}

#[derive(Debug)]
struct TableInner {
    entries: HashMap<DescriptorHandle, Arc<OpenDescription>>,
    /// Next raw handle; `0` once the handle space is used up.
    next: u32,
}

/// Descriptor table owned by a host and shared by its descriptors.
///
/// Handles are allocated monotonically and never reused within one table.
#[derive(Debug)]
pub struct DescriptorTable {
    config: VfsConfig,
    inner: RwLock<TableInner>,
}

impl DescriptorTable {
    pub fn new(config: VfsConfig) -> VfsResult<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            inner: RwLock::new(TableInner {
                entries: HashMap::new(),
                next: 1,
            }),
        }))
    }

    pub fn with_defaults() -> Arc<Self> {
        Arc::new(Self {
            config: VfsConfig::default(),
            inner: RwLock::new(TableInner {
                entries: HashMap::new(),
                next: 1,
            }),
        })
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bind the root of `fs` to a new directory descriptor.
    pub fn preopen(self: &Arc<Self>, fs: &dyn Fs, access: DescriptorFlags) -> VfsResult<Descriptor> {
        let root = fs.root();
        if root.file_type() != DescriptorType::Directory {
            return Err(VfsError::new(Errno::NotDir, "registry.preopen"));
        }
        tracing::debug!(provider = fs.provider_name(), device = fs.device(), "preopen");
        self.insert(OpenDescription::new(root, None, access.access()))
    }

    pub(crate) fn insert(self: &Arc<Self>, ofd: OpenDescription) -> VfsResult<Descriptor> {
        let mut inner = self.inner.write();
        if inner.entries.len() >= self.config.max_open_handles {
            return Err(VfsError::new(Errno::MFile, "registry.insert.limit"));
        }
        let handle = DescriptorHandle::new(inner.next)
            .ok_or_else(|| VfsError::new(Errno::NFile, "registry.insert.exhausted"))?;
        inner.next = inner.next.wrapping_add(1);
        inner.entries.insert(handle, Arc::new(ofd));
        tracing::trace!(fd = %handle, "descriptor allocated");
        Ok(Descriptor::new(handle, self.clone()))
    }

    pub(crate) fn get(&self, handle: DescriptorHandle) -> VfsResult<Arc<OpenDescription>> {
        self.inner
            .read()
            .entries
            .get(&handle)
            .cloned()
            .ok_or_else(|| VfsError::new(Errno::BadF, "registry.get"))
    }

    #[cfg(test)]
    fn set_next_raw(&self, raw: u32) {
        self.inner.write().next = raw;
    }
}

impl HandleRegistry for DescriptorTable {
    fn is_open(&self, handle: DescriptorHandle) -> bool {
        self.inner.read().entries.contains_key(&handle)
    }

    fn close(&self, handle: DescriptorHandle) -> bool {
        let removed = self.inner.write().entries.remove(&handle).is_some();
        tracing::trace!(fd = %handle, removed, "descriptor closed");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::Mode;
    use crate::ids::{Device, INode};
    use crate::node::{
        CreateFile, FsHandle, FsNode, MkdirOptions, NodeMetadata, ReadDirBatch, VfsDirCookie,
    };
    use crate::timestamp::NewTimestamp;

    #[derive(Debug)]
    struct EmptyDir;

    impl FsNode for EmptyDir {
        fn inode(&self) -> INode {
            1
        }
        fn file_type(&self) -> DescriptorType {
            DescriptorType::Directory
        }
        fn device(&self) -> Device {
            9
        }
        fn metadata(&self) -> VfsResult<NodeMetadata> {
            Ok(NodeMetadata {
                inode: 1,
                file_type: DescriptorType::Directory,
                mode: Mode::all(),
                nlink: 2,
                size: 0,
                atim: 0,
                mtim: 0,
                ctim: 0,
            })
        }
        fn set_times(&self, _atim: NewTimestamp, _mtim: NewTimestamp) -> VfsResult<()> {
            Ok(())
        }
        fn lookup(&self, _name: &[u8]) -> VfsResult<Arc<dyn FsNode>> {
            Err(VfsError::new(Errno::NoEnt, "empty.lookup"))
        }
        fn create_file(&self, _name: &[u8], _opts: CreateFile) -> VfsResult<Arc<dyn FsNode>> {
            Err(VfsError::new(Errno::RoFS, "empty.create_file"))
        }
        fn mkdir(&self, _name: &[u8], _opts: MkdirOptions) -> VfsResult<Arc<dyn FsNode>> {
            Err(VfsError::new(Errno::RoFS, "empty.mkdir"))
        }
        fn unlink(&self, _name: &[u8]) -> VfsResult<()> {
            Err(VfsError::new(Errno::NoEnt, "empty.unlink"))
        }
        fn rmdir(&self, _name: &[u8]) -> VfsResult<()> {
            Err(VfsError::new(Errno::NoEnt, "empty.rmdir"))
        }
        fn read_dir(&self, _cursor: Option<VfsDirCookie>, _max: usize) -> VfsResult<ReadDirBatch> {
            Ok(ReadDirBatch::default())
        }
        fn rename(&self, _old: &[u8], _parent: &dyn FsNode, _new: &[u8]) -> VfsResult<()> {
            Err(VfsError::new(Errno::NoEnt, "empty.rename"))
        }
        fn open(&self, _access: DescriptorFlags) -> VfsResult<Arc<dyn FsHandle>> {
            Err(VfsError::new(Errno::IsDir, "empty.open"))
        }
    }

    fn open_root(table: &Arc<DescriptorTable>) -> VfsResult<Descriptor> {
        table.insert(OpenDescription::new(Arc::new(EmptyDir), None, DescriptorFlags::READ))
    }

    #[test]
    fn close_then_is_open_is_false() {
        let table = DescriptorTable::with_defaults();
        let desc = open_root(&table).expect("open");
        let handle = desc.handle();
        assert!(table.is_open(handle));
        assert!(table.close(handle));
        assert!(!table.is_open(handle));
        assert!(!table.close(handle));
        assert_eq!(table.get(handle).unwrap_err().errno(), Errno::BadF);
    }

    #[test]
    fn handles_are_not_reused() {
        let table = DescriptorTable::with_defaults();
        let first = open_root(&table).expect("first").handle();
        table.close(first);
        let second = open_root(&table).expect("second").handle();
        assert!(second.get() > first.get());
    }

    #[test]
    fn open_limit_and_exhaustion() {
        let config = VfsConfig {
            max_open_handles: 2,
            ..VfsConfig::default()
        };
        let table = DescriptorTable::new(config).expect("table");
        let _a = open_root(&table).expect("a");
        let _b = open_root(&table).expect("b");
        assert_eq!(open_root(&table).unwrap_err().errno(), Errno::MFile);

        let table = DescriptorTable::with_defaults();
        table.set_next_raw(u32::MAX);
        let last = open_root(&table).expect("last handle");
        assert_eq!(last.handle().get(), u32::MAX);
        assert_eq!(open_root(&table).unwrap_err().errno(), Errno::NFile);
    }
}
