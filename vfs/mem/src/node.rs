use std::collections::BTreeMap;
use std::ops::Bound;
use std::fmt;
use std::ptr;
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockWriteGuard};
use vfs_core::{
    CreateFile, DescriptorFlags, DescriptorType, Device, Errno, FsHandle, FsNode, INode,
    MkdirOptions, Mode, NewTimestamp, NodeMetadata, ReadDirBatch, Timestamp, VfsDirCookie,
    VfsDirEntry, VfsError, VfsResult,
};

use crate::fs::MemFsInner;
use crate::handle::MemHandle;

type Children = BTreeMap<Vec<u8>, Arc<MemNode>>;

pub(crate) enum Content {
    File(Vec<u8>),
    Dir(Children),
    Symlink(Vec<u8>),
}

pub(crate) struct NodeState {
    pub(crate) mode: Mode,
    /// Names referring to this node; 0 once unlinked or removed.
    pub(crate) links: u64,
    pub(crate) atim: Timestamp,
    pub(crate) mtim: Timestamp,
    pub(crate) ctim: Timestamp,
    pub(crate) content: Content,
}

impl NodeState {
    fn children(&self) -> VfsResult<&Children> {
        match &self.content {
            Content::Dir(children) => Ok(children),
            _ => Err(VfsError::new(Errno::NotDir, "mem.node.not_dir")),
        }
    }

    fn children_mut(&mut self) -> VfsResult<&mut Children> {
        match &mut self.content {
            Content::Dir(children) => Ok(children),
            _ => Err(VfsError::new(Errno::NotDir, "mem.node.not_dir")),
        }
    }

    pub(crate) fn touch_modified(&mut self, now: Timestamp) {
        self.mtim = now;
        self.ctim = now;
    }
}

/// Object of a [`crate::MemFs`].
pub struct MemNode {
    pub(crate) fs: Arc<MemFsInner>,
    me: Weak<MemNode>,
    inode: INode,
    file_type: DescriptorType,
    pub(crate) state: RwLock<NodeState>,
}

impl fmt::Debug for MemNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemNode")
            .field("device", &self.fs.device)
            .field("inode", &self.inode)
            .field("file_type", &self.file_type)
            .finish_non_exhaustive()
    }
}

impl Drop for MemNode {
    fn drop(&mut self) {
        if let Content::File(data) = &self.state.get_mut().content {
            self.fs.usage.release_bytes(data.len() as u64);
        }
        self.fs.usage.release_inode();
    }
}

impl MemNode {
    fn alloc(
        fs: &Arc<MemFsInner>,
        file_type: DescriptorType,
        mode: Mode,
        content: Content,
    ) -> VfsResult<Arc<Self>> {
        let inode = fs.usage.alloc_inode()?;
        let now = fs.now();
        Ok(Arc::new_cyclic(|me| MemNode {
            fs: fs.clone(),
            me: me.clone(),
            inode,
            file_type,
            state: RwLock::new(NodeState {
                mode,
                links: 1,
                atim: now,
                mtim: now,
                ctim: now,
                content,
            }),
        }))
    }

    pub(crate) fn new_root(fs: &Arc<MemFsInner>) -> VfsResult<Arc<Self>> {
        Self::alloc(
            fs,
            DescriptorType::Directory,
            Mode::all(),
            Content::Dir(BTreeMap::new()),
        )
    }

    fn strong(&self, context: &'static str) -> VfsResult<Arc<MemNode>> {
        self.me
            .upgrade()
            .ok_or_else(|| VfsError::new(Errno::Stale, context))
    }

    /// Write-lock a directory that may still gain entries.
    fn writable_dir(&self, context: &'static str) -> VfsResult<RwLockWriteGuard<'_, NodeState>> {
        let state = self.state.write();
        state.children()?;
        if state.links == 0 {
            return Err(VfsError::new(Errno::NoEnt, context));
        }
        Ok(state)
    }

    fn child(&self, name: &[u8], context: &'static str) -> VfsResult<Arc<MemNode>> {
        self.state
            .read()
            .children()?
            .get(name)
            .cloned()
            .ok_or_else(|| VfsError::new(Errno::NoEnt, context))
    }

    fn is_empty_dir(&self) -> bool {
        matches!(&self.state.read().content, Content::Dir(children) if children.is_empty())
    }

    /// Whether `other` sits anywhere below this directory.
    ///
    /// Holds at most one directory lock at a time.
    fn contains(&self, other: &MemNode) -> bool {
        let subdirs: Vec<Arc<MemNode>> = {
            let state = self.state.read();
            let Content::Dir(children) = &state.content else {
                return false;
            };
            if children.values().any(|child| ptr::eq(child.as_ref(), other)) {
                return true;
            }
            children
                .values()
                .filter(|child| child.file_type == DescriptorType::Directory)
                .cloned()
                .collect()
        };
        subdirs.iter().any(|dir| dir.contains(other))
    }

    fn detach(&self, now: Timestamp) {
        let mut state = self.state.write();
        state.links = match self.file_type {
            DescriptorType::Directory => 0,
            _ => state.links.saturating_sub(1),
        };
        state.ctim = now;
    }

    fn insert_new(
        &self,
        name: &[u8],
        file_type: DescriptorType,
        mode: Mode,
        content: Content,
        context: &'static str,
    ) -> VfsResult<Arc<MemNode>> {
        let mut state = self.writable_dir(context)?;
        if state.children()?.contains_key(name) {
            return Err(VfsError::new(Errno::Exist, context));
        }
        let node = MemNode::alloc(&self.fs, file_type, mode, content)?;
        state.children_mut()?.insert(name.to_vec(), node.clone());
        state.touch_modified(self.fs.now());
        tracing::trace!(device = self.fs.device, inode = node.inode, ?file_type, "mem node created");
        Ok(node)
    }

    fn sibling<'a>(&self, other: &'a dyn FsNode, context: &'static str) -> VfsResult<&'a MemNode> {
        let other = other
            .as_any()
            .downcast_ref::<MemNode>()
            .ok_or_else(|| VfsError::new(Errno::XDev, context))?;
        if !Arc::ptr_eq(&self.fs, &other.fs) {
            return Err(VfsError::new(Errno::XDev, context));
        }
        Ok(other)
    }
}

impl FsNode for MemNode {
    fn inode(&self) -> INode {
        self.inode
    }

    fn file_type(&self) -> DescriptorType {
        self.file_type
    }

    fn device(&self) -> Device {
        self.fs.device
    }

    fn metadata(&self) -> VfsResult<NodeMetadata> {
        let state = self.state.read();
        let (nlink, size) = match &state.content {
            Content::File(data) => (state.links, data.len() as u64),
            Content::Symlink(target) => (state.links, target.len() as u64),
            Content::Dir(children) if state.links == 0 => (0, children.len() as u64),
            Content::Dir(children) => {
                let subdirs = children
                    .values()
                    .filter(|child| child.file_type == DescriptorType::Directory)
                    .count() as u64;
                (2 + subdirs, children.len() as u64)
            }
        };
        Ok(NodeMetadata {
            inode: self.inode,
            file_type: self.file_type,
            mode: state.mode,
            nlink,
            size,
            atim: state.atim,
            mtim: state.mtim,
            ctim: state.ctim,
        })
    }

    fn set_times(&self, atim: NewTimestamp, mtim: NewTimestamp) -> VfsResult<()> {
        if !atim.is_change() && !mtim.is_change() {
            return Ok(());
        }
        let now = self.fs.now();
        let mut state = self.state.write();
        if let Some(atim) = atim.resolve(|| now) {
            state.atim = atim;
        }
        if let Some(mtim) = mtim.resolve(|| now) {
            state.mtim = mtim;
        }
        state.ctim = now;
        Ok(())
    }

    fn lookup(&self, name: &[u8]) -> VfsResult<Arc<dyn FsNode>> {
        let node: Arc<dyn FsNode> = self.child(name, "mem.lookup")?;
        Ok(node)
    }

    fn create_file(&self, name: &[u8], opts: CreateFile) -> VfsResult<Arc<dyn FsNode>> {
        {
            let state = self.writable_dir("mem.create_file")?;
            if let Some(existing) = state.children()?.get(name) {
                if opts.exclusive {
                    return Err(VfsError::new(Errno::Exist, "mem.create_file.exists"));
                }
                if existing.file_type == DescriptorType::Directory {
                    return Err(VfsError::new(Errno::IsDir, "mem.create_file.isdir"));
                }
                let existing: Arc<dyn FsNode> = existing.clone();
                return Ok(existing);
            }
        }
        let node: Arc<dyn FsNode> = self.insert_new(
            name,
            DescriptorType::RegularFile,
            opts.mode,
            Content::File(Vec::new()),
            "mem.create_file",
        )?;
        Ok(node)
    }

    fn mkdir(&self, name: &[u8], opts: MkdirOptions) -> VfsResult<Arc<dyn FsNode>> {
        let node: Arc<dyn FsNode> = self.insert_new(
            name,
            DescriptorType::Directory,
            opts.mode,
            Content::Dir(BTreeMap::new()),
            "mem.mkdir",
        )?;
        Ok(node)
    }

    fn unlink(&self, name: &[u8]) -> VfsResult<()> {
        let mut state = self.writable_dir("mem.unlink")?;
        let children = state.children_mut()?;
        match children.get(name) {
            None => return Err(VfsError::new(Errno::NoEnt, "mem.unlink")),
            Some(child) if child.file_type == DescriptorType::Directory => {
                return Err(VfsError::new(Errno::IsDir, "mem.unlink.isdir"));
            }
            Some(_) => {}
        }
        let now = self.fs.now();
        if let Some(child) = children.remove(name) {
            child.detach(now);
        }
        state.touch_modified(now);
        Ok(())
    }

    fn rmdir(&self, name: &[u8]) -> VfsResult<()> {
        let mut state = self.writable_dir("mem.rmdir")?;
        let children = state.children_mut()?;
        match children.get(name) {
            None => return Err(VfsError::new(Errno::NoEnt, "mem.rmdir")),
            Some(child) if child.file_type != DescriptorType::Directory => {
                return Err(VfsError::new(Errno::NotDir, "mem.rmdir.not_dir"));
            }
            Some(child) if !child.is_empty_dir() => {
                return Err(VfsError::new(Errno::NotEmpty, "mem.rmdir.not_empty"));
            }
            Some(_) => {}
        }
        let now = self.fs.now();
        if let Some(child) = children.remove(name) {
            child.detach(now);
        }
        state.touch_modified(now);
        Ok(())
    }

    fn read_dir(&self, cursor: Option<VfsDirCookie>, max: usize) -> VfsResult<ReadDirBatch> {
        let state = self.state.read();
        let children = state.children()?;
        let lower = match &cursor {
            Some(cookie) => Bound::Excluded(cookie.0.as_slice()),
            None => Bound::Unbounded,
        };
        let mut remaining = children.range::<[u8], _>((lower, Bound::Unbounded));

        let mut batch = ReadDirBatch::default();
        for (name, node) in remaining.by_ref().take(max.max(1)) {
            batch.entries.push(VfsDirEntry {
                name: name.clone(),
                inode: node.inode,
                file_type: node.file_type,
            });
        }
        if remaining.next().is_some() {
            batch.next = batch.entries.last().map(|last| VfsDirCookie::after(&last.name));
        }
        Ok(batch)
    }

    fn rename(&self, old_name: &[u8], new_parent: &dyn FsNode, new_name: &[u8]) -> VfsResult<()> {
        let target = self.sibling(new_parent, "mem.rename.cross_device")?;
        let _serial = self.fs.rename_lock.lock();
        let moved = self.child(old_name, "mem.rename.source")?;
        if moved.file_type == DescriptorType::Directory
            && (ptr::eq(moved.as_ref(), target) || moved.contains(target))
        {
            return Err(VfsError::new(Errno::Inval, "mem.rename.into_self"));
        }

        let now = self.fs.now();
        if ptr::eq(self, target) {
            if old_name == new_name {
                return Ok(());
            }
            let mut state = self.writable_dir("mem.rename")?;
            let children = state.children_mut()?;
            let replaced = move_entry(None, children, None, &moved, old_name, new_name)?;
            state.touch_modified(now);
            drop(state);
            finish_move(&moved, replaced, now);
            return Ok(());
        }

        // A directory above the source at `new_name` is never empty, and its
        // lock must not be waited on below it.
        let ancestor_at_target = target
            .child(new_name, "mem.rename.target")
            .ok()
            .filter(|node| ptr::eq(node.as_ref(), self) || node.contains(self));

        // Ancestor first, matching the parent-then-child order of unlink
        // and rmdir.
        let (mut src, mut dst) = if target.contains(self) {
            let dst = target.writable_dir("mem.rename.target")?;
            (self.writable_dir("mem.rename")?, dst)
        } else {
            let src = self.writable_dir("mem.rename")?;
            (src, target.writable_dir("mem.rename.target")?)
        };
        let replaced = move_entry(
            ancestor_at_target.as_deref(),
            src.children_mut()?,
            Some(dst.children_mut()?),
            &moved,
            old_name,
            new_name,
        )?;
        src.touch_modified(now);
        dst.touch_modified(now);
        drop(src);
        drop(dst);
        finish_move(&moved, replaced, now);
        Ok(())
    }

    fn link(&self, existing: &dyn FsNode, new_name: &[u8]) -> VfsResult<()> {
        let existing = self.sibling(existing, "mem.link.cross_device")?;
        if existing.file_type == DescriptorType::Directory {
            return Err(VfsError::new(Errno::Perm, "mem.link.directory"));
        }
        let existing = existing.strong("mem.link.source")?;
        let mut state = self.writable_dir("mem.link")?;
        let children = state.children_mut()?;
        if children.contains_key(new_name) {
            return Err(VfsError::new(Errno::Exist, "mem.link.exists"));
        }
        let now = self.fs.now();
        {
            let mut source = existing.state.write();
            if source.links == 0 {
                return Err(VfsError::new(Errno::NoEnt, "mem.link.unlinked"));
            }
            source.links += 1;
            source.ctim = now;
        }
        children.insert(new_name.to_vec(), existing);
        state.touch_modified(now);
        Ok(())
    }

    fn symlink(&self, new_name: &[u8], target: &[u8]) -> VfsResult<()> {
        self.insert_new(
            new_name,
            DescriptorType::SymbolicLink,
            Mode::all(),
            Content::Symlink(target.to_vec()),
            "mem.symlink",
        )?;
        Ok(())
    }

    fn readlink(&self) -> VfsResult<Vec<u8>> {
        match &self.state.read().content {
            Content::Symlink(target) => Ok(target.clone()),
            _ => Err(VfsError::new(Errno::Inval, "mem.readlink")),
        }
    }

    fn open(&self, access: DescriptorFlags) -> VfsResult<Arc<dyn FsHandle>> {
        match self.file_type {
            DescriptorType::RegularFile => {}
            DescriptorType::Directory => {
                return Err(VfsError::new(Errno::IsDir, "mem.open.directory"));
            }
            _ => return Err(VfsError::new(Errno::Inval, "mem.open.not_file")),
        }
        let mode = self.state.read().mode;
        if access.contains(DescriptorFlags::READ) && !mode.contains(Mode::READABLE) {
            return Err(VfsError::new(Errno::Access, "mem.open.read"));
        }
        if access.contains(DescriptorFlags::WRITE) && !mode.contains(Mode::WRITEABLE) {
            return Err(VfsError::new(Errno::Access, "mem.open.write"));
        }
        Ok(Arc::new(MemHandle::new(self.strong("mem.open")?)))
    }
}

/// Move `moved` from `old_name` in `src` to `new_name` in `dst` (or `src`
/// when `dst` is `None`). Returns the node that `new_name` referred to.
fn move_entry(
    ancestor_at_target: Option<&MemNode>,
    src: &mut Children,
    dst: Option<&mut Children>,
    moved: &Arc<MemNode>,
    old_name: &[u8],
    new_name: &[u8],
) -> VfsResult<Option<Arc<MemNode>>> {
    match src.get(old_name) {
        Some(current) if Arc::ptr_eq(current, moved) => {}
        Some(_) => return Err(VfsError::new(Errno::Busy, "mem.rename.raced")),
        None => return Err(VfsError::new(Errno::NoEnt, "mem.rename.source")),
    }

    let existing = match &dst {
        Some(dst) => dst.get(new_name),
        None => src.get(new_name),
    };
    if let Some(existing) = existing {
        if Arc::ptr_eq(existing, moved) {
            return Ok(None);
        }
        check_replace(ancestor_at_target, moved, existing)?;
    }

    src.remove(old_name);
    let replaced = match dst {
        Some(dst) => dst.insert(new_name.to_vec(), moved.clone()),
        None => src.insert(new_name.to_vec(), moved.clone()),
    };
    Ok(replaced)
}

fn check_replace(
    ancestor_at_target: Option<&MemNode>,
    moved: &MemNode,
    existing: &MemNode,
) -> VfsResult<()> {
    let moved_is_dir = moved.file_type == DescriptorType::Directory;
    let existing_is_dir = existing.file_type == DescriptorType::Directory;
    match (moved_is_dir, existing_is_dir) {
        (true, false) => Err(VfsError::new(Errno::NotDir, "mem.rename.not_dir")),
        (false, true) => Err(VfsError::new(Errno::IsDir, "mem.rename.is_dir")),
        (true, true)
            if ancestor_at_target.is_some_and(|ancestor| ptr::eq(existing, ancestor))
                || !existing.is_empty_dir() =>
        {
            Err(VfsError::new(Errno::NotEmpty, "mem.rename.not_empty"))
        }
        _ => Ok(()),
    }
}

fn finish_move(moved: &MemNode, replaced: Option<Arc<MemNode>>, now: Timestamp) {
    moved.state.write().ctim = now;
    if let Some(replaced) = replaced {
        replaced.detach(now);
    }
}
