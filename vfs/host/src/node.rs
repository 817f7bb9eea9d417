use std::sync::Arc;

use vfs_core::{
    CreateFile, DescriptorFlags, DescriptorType, Device, Errno, FsHandle, FsNode, INode,
    MkdirOptions, NewTimestamp, NodeMetadata, OFlags, ReadDirBatch, VfsDirCookie, VfsDirEntry,
    VfsError, VfsResult,
};

use crate::fs::HostFsInner;
use crate::handle::HostHandle;
use crate::platform::{self, DirEntryInfo};

/// Object inside a [`crate::HostFs`].
#[derive(Debug)]
pub struct HostNode {
    pub(crate) fs: Arc<HostFsInner>,
    pub(crate) inode: INode,
    pub(crate) kind: HostNodeKind,
}

#[derive(Debug)]
pub(crate) enum HostNodeKind {
    Dir(Arc<HostDir>),
    Entry {
        file_type: DescriptorType,
        locator: Locator,
    },
}

#[derive(Debug)]
pub(crate) struct HostDir {
    pub(crate) dir: platform::DirHandle,
    pub(crate) locator: Locator,
}

/// Where an object was found: parent directory handle plus name.
#[derive(Clone, Debug)]
pub(crate) struct Locator {
    pub(crate) parent: Option<Arc<HostDir>>,
    pub(crate) name: Option<Vec<u8>>,
}

impl Locator {
    pub(crate) fn root() -> Self {
        Self {
            parent: None,
            name: None,
        }
    }
}

impl HostNode {
    fn is_read_only(&self) -> bool {
        self.fs.config.read_only
    }

    fn ensure_writable(&self, context: &'static str) -> VfsResult<()> {
        if self.is_read_only() {
            return Err(crate::readonly_error(context));
        }
        Ok(())
    }

    fn ensure_dir(&self) -> VfsResult<&Arc<HostDir>> {
        match &self.kind {
            HostNodeKind::Dir(dir) => Ok(dir),
            HostNodeKind::Entry { .. } => {
                Err(VfsError::new(Errno::NotDir, "host.node.ensure_dir"))
            }
        }
    }

    fn locator(&self) -> &Locator {
        match &self.kind {
            HostNodeKind::Dir(dir) => &dir.locator,
            HostNodeKind::Entry { locator, .. } => locator,
        }
    }

    fn locate_parent(&self, context: &'static str) -> VfsResult<(&Arc<HostDir>, &[u8])> {
        let locator = self.locator();
        let parent = locator
            .parent
            .as_ref()
            .ok_or_else(|| VfsError::new(Errno::Inval, context))?;
        let name = locator
            .name
            .as_deref()
            .ok_or_else(|| VfsError::new(Errno::Inval, context))?;
        Ok((parent, name))
    }

    /// Build the node for `name` in `dir`, opening it when it is a directory.
    fn child(&self, dir: &Arc<HostDir>, name: &[u8], context: &'static str) -> VfsResult<Arc<HostNode>> {
        let stat = crate::io_result(context, platform::stat_at(&dir.dir, name))?;
        let locator = Locator {
            parent: Some(dir.clone()),
            name: Some(name.to_vec()),
        };
        let kind = match stat.file_type {
            DescriptorType::Directory => {
                let handle = crate::io_result(context, platform::open_dir_at(&dir.dir, name))?;
                HostNodeKind::Dir(Arc::new(HostDir {
                    dir: handle,
                    locator,
                }))
            }
            file_type => HostNodeKind::Entry { file_type, locator },
        };
        Ok(Arc::new(HostNode {
            fs: self.fs.clone(),
            inode: stat.inode,
            kind,
        }))
    }

    fn sibling<'a>(&self, other: &'a dyn FsNode, context: &'static str) -> VfsResult<&'a HostNode> {
        let other = other
            .as_any()
            .downcast_ref::<HostNode>()
            .ok_or_else(|| VfsError::new(Errno::XDev, context))?;
        if !Arc::ptr_eq(&self.fs, &other.fs) {
            return Err(VfsError::new(Errno::XDev, context));
        }
        Ok(other)
    }
}

impl FsNode for HostNode {
    fn inode(&self) -> INode {
        self.inode
    }

    fn file_type(&self) -> DescriptorType {
        match &self.kind {
            HostNodeKind::Dir(_) => DescriptorType::Directory,
            HostNodeKind::Entry { file_type, .. } => *file_type,
        }
    }

    fn device(&self) -> Device {
        self.fs.device
    }

    fn metadata(&self) -> VfsResult<NodeMetadata> {
        let stat = match &self.kind {
            HostNodeKind::Dir(dir) => crate::io_result(
                "host.metadata.dir",
                platform::stat_fd(dir.dir.as_raw_fd()),
            )?,
            HostNodeKind::Entry { .. } => {
                let (parent, name) = self.locate_parent("host.metadata.locator")?;
                crate::io_result("host.metadata.entry", platform::stat_at(&parent.dir, name))?
            }
        };
        Ok(metadata_from_stat(&stat))
    }

    fn set_times(&self, atim: NewTimestamp, mtim: NewTimestamp) -> VfsResult<()> {
        self.ensure_writable("host.set_times.read_only")?;
        match &self.kind {
            HostNodeKind::Dir(dir) => crate::io_result(
                "host.set_times.dir",
                platform::futimens(dir.dir.as_raw_fd(), atim, mtim),
            ),
            HostNodeKind::Entry { .. } => {
                let (parent, name) = self.locate_parent("host.set_times.locator")?;
                crate::io_result(
                    "host.set_times.entry",
                    platform::utimens_at(&parent.dir, name, atim, mtim),
                )
            }
        }
    }

    fn lookup(&self, name: &[u8]) -> VfsResult<Arc<dyn FsNode>> {
        let dir = self.ensure_dir()?;
        let node: Arc<dyn FsNode> = self.child(dir, name, "host.lookup")?;
        Ok(node)
    }

    fn create_file(&self, name: &[u8], opts: CreateFile) -> VfsResult<Arc<dyn FsNode>> {
        self.ensure_writable("host.create_file.read_only")?;
        let dir = self.ensure_dir()?;
        match platform::stat_at(&dir.dir, name) {
            Ok(stat) => {
                if opts.exclusive {
                    return Err(VfsError::new(Errno::Exist, "host.create_file.exists"));
                }
                if stat.file_type == DescriptorType::Directory {
                    return Err(VfsError::new(Errno::IsDir, "host.create_file.isdir"));
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                crate::io_result(
                    "host.create_file.create",
                    platform::open_file_at(
                        &dir.dir,
                        name,
                        DescriptorFlags::empty(),
                        OFlags::CREATE | OFlags::EXCL,
                        opts.mode,
                    ),
                )?;
            }
            Err(err) => return Err(crate::map_io_error("host.create_file.stat", err)),
        }
        let node: Arc<dyn FsNode> = self.child(dir, name, "host.create_file.stat")?;
        Ok(node)
    }

    fn mkdir(&self, name: &[u8], opts: MkdirOptions) -> VfsResult<Arc<dyn FsNode>> {
        self.ensure_writable("host.mkdir.read_only")?;
        let dir = self.ensure_dir()?;
        crate::io_result("host.mkdir", platform::mkdir_at(&dir.dir, name, opts.mode))?;
        let node: Arc<dyn FsNode> = self.child(dir, name, "host.mkdir.open")?;
        Ok(node)
    }

    fn unlink(&self, name: &[u8]) -> VfsResult<()> {
        self.ensure_writable("host.unlink.read_only")?;
        let dir = self.ensure_dir()?;
        crate::io_result("host.unlink", platform::unlink_at(&dir.dir, name)).map_err(|err| {
            // Linux reports EISDIR, other unixes EPERM.
            match platform::stat_at(&dir.dir, name) {
                Ok(stat) if stat.file_type == DescriptorType::Directory => {
                    VfsError::new(Errno::IsDir, "host.unlink.isdir")
                }
                _ => err,
            }
        })
    }

    fn rmdir(&self, name: &[u8]) -> VfsResult<()> {
        self.ensure_writable("host.rmdir.read_only")?;
        let dir = self.ensure_dir()?;
        crate::io_result("host.rmdir", platform::rmdir_at(&dir.dir, name)).map_err(|err| {
            if err.errno() == Errno::Exist {
                VfsError::new(Errno::NotEmpty, "host.rmdir.not_empty")
            } else {
                err
            }
        })
    }

    fn read_dir(&self, cursor: Option<VfsDirCookie>, max: usize) -> VfsResult<ReadDirBatch> {
        let dir = self.ensure_dir()?;
        let mut entries: Vec<DirEntryInfo> =
            crate::io_result("host.read_dir", platform::read_dir(&dir.dir))?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let start = match &cursor {
            Some(cookie) => entries.partition_point(|entry| entry.name <= cookie.0),
            None => 0,
        };
        let end = entries.len().min(start.saturating_add(max.max(1)));
        let more = end < entries.len();

        let mut batch = ReadDirBatch::default();
        for entry in entries.drain(start..end) {
            batch.entries.push(VfsDirEntry {
                name: entry.name,
                inode: entry.inode,
                file_type: entry.file_type,
            });
        }
        if more {
            batch.next = batch.entries.last().map(|last| VfsDirCookie::after(&last.name));
        }
        Ok(batch)
    }

    fn rename(&self, old_name: &[u8], new_parent: &dyn FsNode, new_name: &[u8]) -> VfsResult<()> {
        self.ensure_writable("host.rename.read_only")?;
        let dir = self.ensure_dir()?;
        let new_parent = self.sibling(new_parent, "host.rename.cross_device")?;
        let new_dir = new_parent.ensure_dir()?;
        crate::io_result(
            "host.rename",
            platform::rename_at(&dir.dir, old_name, &new_dir.dir, new_name),
        )
        .map_err(|err| {
            if err.errno() == Errno::Exist {
                VfsError::new(Errno::NotEmpty, "host.rename.not_empty")
            } else {
                err
            }
        })
    }

    fn link(&self, existing: &dyn FsNode, new_name: &[u8]) -> VfsResult<()> {
        self.ensure_writable("host.link.read_only")?;
        let dir = self.ensure_dir()?;
        let existing = self.sibling(existing, "host.link.cross_device")?;
        let (parent, name) = existing.locate_parent("host.link.locator")?;
        crate::io_result(
            "host.link",
            platform::link_at(&parent.dir, name, &dir.dir, new_name),
        )
    }

    fn symlink(&self, new_name: &[u8], target: &[u8]) -> VfsResult<()> {
        self.ensure_writable("host.symlink.read_only")?;
        let dir = self.ensure_dir()?;
        crate::io_result(
            "host.symlink",
            platform::symlink_at(&dir.dir, new_name, target),
        )
    }

    fn readlink(&self) -> VfsResult<Vec<u8>> {
        if self.file_type() != DescriptorType::SymbolicLink {
            return Err(VfsError::new(Errno::Inval, "host.readlink.not_symlink"));
        }
        let (parent, name) = self.locate_parent("host.readlink.locator")?;
        crate::io_result("host.readlink", platform::readlink_at(&parent.dir, name))
    }

    fn open(&self, access: DescriptorFlags) -> VfsResult<Arc<dyn FsHandle>> {
        match self.file_type() {
            DescriptorType::RegularFile => {}
            DescriptorType::Directory => {
                return Err(VfsError::new(Errno::IsDir, "host.open.directory"));
            }
            _ => return Err(VfsError::new(Errno::Inval, "host.open.not_file")),
        }
        if access.contains(DescriptorFlags::WRITE) {
            self.ensure_writable("host.open.read_only")?;
        }
        let (parent, name) = self.locate_parent("host.open.locator")?;
        let file = crate::io_result(
            "host.open.file",
            platform::open_file_at(
                &parent.dir,
                name,
                access.access(),
                OFlags::empty(),
                Default::default(),
            ),
        )?;
        Ok(Arc::new(HostHandle::new(file, self.is_read_only())))
    }
}

pub(crate) fn metadata_from_stat(stat: &platform::Stat) -> NodeMetadata {
    NodeMetadata {
        inode: stat.inode,
        file_type: stat.file_type,
        mode: stat.mode,
        nlink: stat.nlink,
        size: stat.size,
        atim: stat.atim,
        mtim: stat.mtim,
        ctim: stat.ctim,
    }
}
