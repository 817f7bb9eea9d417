//! Descriptors: capability references into a [`DescriptorTable`].
//!
//! Every public operation resolves the handle first (`BadF` once closed),
//! runs against the open description, and clamps the error code to the
//! operation's contract via [`FsOp::restrict`].

use crate::dir::DirEntry;
use crate::flags::{AtFlags, DescriptorFlags, Mode, OFlags};
use crate::handle::{OpenDescription, SeekFrom};
use crate::ids::DescriptorHandle;
use crate::node::{Advice, CreateFile, DescriptorType, FsNode, MkdirOptions};
use crate::ops::FsOp;
use crate::path_walker::{PathWalker, WalkFlags};
use crate::registry::{DescriptorTable, HandleRegistry};
use crate::stat::{DescriptorStat, FdInfo};
use crate::timestamp::NewTimestamp;
use crate::{Errno, VfsError, VfsResult};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Handle bound to one open filesystem object.
///
/// Not `Clone`: each value owns its handle's cursor. Dropping a descriptor
/// does not close it; call [`Descriptor::close`].
pub struct Descriptor {
    handle: DescriptorHandle,
    table: Arc<DescriptorTable>,
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl Descriptor {
    pub(crate) fn new(handle: DescriptorHandle, table: Arc<DescriptorTable>) -> Self {
        Self { handle, table }
    }

    pub fn handle(&self) -> DescriptorHandle {
        self.handle
    }

    pub fn table(&self) -> &Arc<DescriptorTable> {
        &self.table
    }

    pub fn is_open(&self) -> bool {
        self.table.is_open(self.handle)
    }

    /// Returns whether a live handle was closed.
    pub fn close(self) -> bool {
        self.table.close(self.handle)
    }

    fn run<T>(&self, op: FsOp, f: impl FnOnce(&OpenDescription) -> VfsResult<T>) -> VfsResult<T> {
        op.restrict(self.table.get(self.handle).and_then(|ofd| f(&ofd)))
    }

    fn walker(&self) -> PathWalker<'_> {
        PathWalker::new(self.table.config())
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, len = len, offset = offset), err)]
    pub fn pread(&self, len: u32, offset: u64) -> VfsResult<Vec<u8>> {
        self.run(FsOp::Pread, |ofd| ofd.pread(len, offset))
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, len = buf.len(), offset = offset), err)]
    pub async fn pwrite(&self, buf: &[u8], offset: u64) -> VfsResult<u32> {
        let result = match self.table.get(self.handle) {
            Ok(ofd) => ofd.pwrite(buf, offset).await,
            Err(err) => Err(err),
        };
        FsOp::Pwrite.restrict(result)
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, from = ?from), err)]
    pub fn seek(&self, from: SeekFrom) -> VfsResult<u64> {
        self.run(FsOp::Seek, |ofd| ofd.seek(from))
    }

    pub fn tell(&self) -> VfsResult<u64> {
        self.run(FsOp::Tell, |ofd| ofd.tell())
    }

    /// Stream the directory's entries. `rewind` restarts from the first
    /// entry; otherwise enumeration continues after the last entry handed
    /// out by any earlier stream of this descriptor.
    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, rewind = rewind), err)]
    pub fn readdir(&self, rewind: bool) -> VfsResult<ReadDir> {
        self.run(FsOp::Readdir, |ofd| {
            ofd.directory("descriptor.readdir")?;
            ofd.require_access(DescriptorFlags::READ, "descriptor.readdir")?;
            if rewind {
                ofd.rewind_dir();
            }
            Ok(ReadDir {
                handle: self.handle,
                table: self.table.clone(),
                done: false,
            })
        })
    }

    /// Fill `buf` with serialized `Dirent` + name records; `0` means the
    /// end of the directory.
    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, rewind = rewind, cap = buf.len()), err)]
    pub fn read_dir_into(&self, rewind: bool, buf: &mut [u8]) -> VfsResult<usize> {
        let batch = self.table.config().readdir_batch;
        self.run(FsOp::Readdir, |ofd| {
            ofd.directory("descriptor.read_dir_into")?;
            ofd.require_access(DescriptorFlags::READ, "descriptor.read_dir_into")?;
            if rewind {
                ofd.rewind_dir();
            }
            ofd.read_dir_into(buf, batch)
        })
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle), err)]
    pub fn stat(&self) -> VfsResult<DescriptorStat> {
        self.run(FsOp::Stat, |ofd| ofd.stat())
    }

    pub fn fadvise(&self, offset: u64, len: u32, advice: Advice) -> VfsResult<()> {
        self.run(FsOp::Fadvise, |ofd| ofd.fadvise(offset, len, advice))
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle), err)]
    pub fn datasync(&self) -> VfsResult<()> {
        self.run(FsOp::Datasync, |ofd| ofd.datasync())
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle), err)]
    pub fn sync(&self) -> VfsResult<()> {
        self.run(FsOp::Sync, |ofd| ofd.sync())
    }

    pub fn flags(&self) -> VfsResult<DescriptorFlags> {
        self.run(FsOp::Flags, |ofd| Ok(ofd.flags()))
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, flags = ?flags), err)]
    pub fn set_flags(&self, flags: DescriptorFlags) -> VfsResult<()> {
        self.run(FsOp::SetFlags, |ofd| ofd.set_flags(flags))
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, size = size), err)]
    pub fn set_size(&self, size: u64) -> VfsResult<()> {
        self.run(FsOp::SetSize, |ofd| ofd.set_size(size))
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, atim = ?atim, mtim = ?mtim), err)]
    pub fn set_times(&self, atim: NewTimestamp, mtim: NewTimestamp) -> VfsResult<()> {
        self.run(FsOp::SetTimes, |ofd| ofd.set_times(atim, mtim))
    }

    /// Type of the bound object, re-checked against the backend.
    #[instrument(level = "debug", skip_all, fields(fd = %self.handle), err)]
    pub fn descriptor_type(&self) -> VfsResult<DescriptorType> {
        self.run(FsOp::Type, |ofd| ofd.live_type())
    }

    pub fn info(&self) -> VfsResult<FdInfo> {
        self.run(FsOp::Info, |ofd| {
            Ok(FdInfo {
                file_type: ofd.file_type(),
                flags: ofd.flags(),
            })
        })
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(fd = %self.handle, path = path, oflags = ?oflags, mode = ?mode),
        err
    )]
    pub fn open_at(
        &self,
        at_flags: AtFlags,
        path: &str,
        oflags: OFlags,
        mode: Mode,
    ) -> VfsResult<Descriptor> {
        self.run(FsOp::OpenAt, |ofd| {
            let dir = ofd.directory("descriptor.open_at.receiver")?;
            let receiver_access = ofd.flags().access();
            let access = mode.requested_access();
            if access.is_empty() {
                return Err(VfsError::new(Errno::Inval, "descriptor.open_at.no_access"));
            }
            if !receiver_access.contains(access) {
                return Err(VfsError::new(Errno::Access, "descriptor.open_at.access"));
            }
            if oflags.contains(OFlags::TRUNC) && !access.contains(DescriptorFlags::WRITE) {
                return Err(VfsError::new(Errno::Inval, "descriptor.open_at.trunc_access"));
            }

            let walker = self.walker();
            let flags = WalkFlags::from_at_flags(self.table.config(), at_flags);
            let node = if oflags.contains(OFlags::CREATE) {
                self.open_or_create(&walker, dir, path, flags, oflags, mode, receiver_access)?
            } else {
                walker.resolve(dir, path.as_bytes(), flags)?.node
            };

            let file_type = node.file_type();
            if oflags.contains(OFlags::DIRECTORY) && file_type != DescriptorType::Directory {
                return Err(VfsError::new(Errno::NotDir, "descriptor.open_at.directory"));
            }
            if oflags.contains(OFlags::CREATE)
                && !oflags.contains(OFlags::DIRECTORY)
                && file_type == DescriptorType::Directory
            {
                return Err(VfsError::new(Errno::IsDir, "descriptor.open_at.create_dir"));
            }
            if oflags.contains(OFlags::TRUNC) && file_type == DescriptorType::Directory {
                return Err(VfsError::new(Errno::IsDir, "descriptor.open_at.trunc_dir"));
            }

            let file = if file_type.is_byte_stream() {
                let file = node.open(access)?;
                if oflags.contains(OFlags::TRUNC) {
                    file.set_len(0)?;
                }
                Some(file)
            } else {
                None
            };
            self.table
                .insert(OpenDescription::new(node, file, access))
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn open_or_create(
        &self,
        walker: &PathWalker<'_>,
        dir: &Arc<dyn FsNode>,
        path: &str,
        flags: WalkFlags,
        oflags: OFlags,
        mode: Mode,
        receiver_access: DescriptorFlags,
    ) -> VfsResult<Arc<dyn FsNode>> {
        let parent = walker.resolve_parent(dir, path.as_bytes(), flags)?;
        match parent.dir.lookup(&parent.name) {
            Ok(_) if oflags.contains(OFlags::EXCL) => {
                Err(VfsError::new(Errno::Exist, "descriptor.open_at.excl"))
            }
            Ok(_) => Ok(walker.resolve(dir, path.as_bytes(), flags)?.node),
            Err(err) if err.errno() == Errno::NoEnt => {
                if !receiver_access.contains(DescriptorFlags::WRITE) {
                    return Err(VfsError::new(Errno::Access, "descriptor.open_at.create"));
                }
                if oflags.contains(OFlags::DIRECTORY) {
                    parent.dir.mkdir(&parent.name, MkdirOptions { mode })
                } else if parent.had_trailing_slash {
                    Err(VfsError::new(Errno::IsDir, "descriptor.open_at.create_slash"))
                } else {
                    parent.dir.create_file(
                        &parent.name,
                        CreateFile {
                            mode,
                            exclusive: oflags.contains(OFlags::EXCL),
                        },
                    )
                }
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, path = path), err)]
    pub fn stat_at(&self, at_flags: AtFlags, path: &str) -> VfsResult<DescriptorStat> {
        self.run(FsOp::StatAt, |ofd| {
            let dir = ofd.directory("descriptor.stat_at.receiver")?;
            let flags = WalkFlags::from_at_flags(self.table.config(), at_flags);
            let node = self.walker().resolve(dir, path.as_bytes(), flags)?.node;
            Ok(DescriptorStat::from_metadata(node.device(), &node.metadata()?))
        })
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(fd = %self.handle, path = path, atim = ?atim, mtim = ?mtim),
        err
    )]
    pub fn set_times_at(
        &self,
        at_flags: AtFlags,
        path: &str,
        atim: NewTimestamp,
        mtim: NewTimestamp,
    ) -> VfsResult<()> {
        self.run(FsOp::SetTimesAt, |ofd| {
            let dir = ofd.directory("descriptor.set_times_at.receiver")?;
            require_mutation(ofd, "descriptor.set_times_at.access")?;
            let flags = WalkFlags::from_at_flags(self.table.config(), at_flags);
            let node = self.walker().resolve(dir, path.as_bytes(), flags)?.node;
            node.set_times(atim, mtim)
        })
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(fd = %self.handle, old_path = old_path, new_fd = %new_descriptor.handle, new_path = new_path),
        err
    )]
    pub fn link_at(
        &self,
        at_flags: AtFlags,
        old_path: &str,
        new_descriptor: &Descriptor,
        new_path: &str,
    ) -> VfsResult<()> {
        self.run(FsOp::LinkAt, |ofd| {
            let dir = ofd.directory("descriptor.link_at.receiver")?;
            let new_ofd = new_descriptor.table.get(new_descriptor.handle)?;
            let new_dir = new_ofd.directory("descriptor.link_at.new_receiver")?;
            require_mutation(&new_ofd, "descriptor.link_at.access")?;

            let flags = WalkFlags::from_at_flags(self.table.config(), at_flags);
            let source = self.walker().resolve(dir, old_path.as_bytes(), flags)?.node;
            if source.file_type() == DescriptorType::Directory {
                return Err(VfsError::new(Errno::Perm, "descriptor.link_at.directory"));
            }

            let target_config = new_descriptor.table.config();
            let target = PathWalker::new(target_config).resolve_parent(
                new_dir,
                new_path.as_bytes(),
                WalkFlags::new(target_config),
            )?;
            if source.device() != target.dir.device() {
                return Err(VfsError::new(Errno::XDev, "descriptor.link_at.cross_device"));
            }
            target.dir.link(source.as_ref(), &target.name)
        })
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, path = path), err)]
    pub fn create_directory_at(&self, path: &str) -> VfsResult<()> {
        self.run(FsOp::CreateDirectoryAt, |ofd| {
            let dir = ofd.directory("descriptor.create_directory_at.receiver")?;
            require_mutation(ofd, "descriptor.create_directory_at.access")?;
            let parent = self.walker().resolve_parent(
                dir,
                path.as_bytes(),
                WalkFlags::new(self.table.config()),
            )?;
            parent
                .dir
                .mkdir(&parent.name, MkdirOptions { mode: Mode::all() })?;
            Ok(())
        })
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, path = path), err)]
    pub fn read_link_at(&self, path: &str) -> VfsResult<String> {
        self.run(FsOp::ReadLinkAt, |ofd| {
            let dir = ofd.directory("descriptor.read_link_at.receiver")?;
            let config = self.table.config();
            let node = self
                .walker()
                .resolve(dir, path.as_bytes(), WalkFlags::no_follow(config))?
                .node;
            if node.file_type() != DescriptorType::SymbolicLink {
                return Err(VfsError::new(Errno::Inval, "descriptor.read_link_at.not_symlink"));
            }
            String::from_utf8(node.readlink()?)
                .map_err(|err| VfsError::with_source(Errno::Inval, "descriptor.read_link_at.utf8", err))
        })
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, old_path = old_path, new_path = new_path), err)]
    pub fn symlink_at(&self, old_path: &str, new_path: &str) -> VfsResult<()> {
        self.run(FsOp::SymlinkAt, |ofd| {
            let dir = ofd.directory("descriptor.symlink_at.receiver")?;
            require_mutation(ofd, "descriptor.symlink_at.access")?;
            if old_path.is_empty() {
                return Err(VfsError::new(Errno::NoEnt, "descriptor.symlink_at.empty_target"));
            }
            if old_path.starts_with('/') {
                return Err(VfsError::new(Errno::Perm, "descriptor.symlink_at.absolute_target"));
            }
            if old_path.as_bytes().contains(&0) {
                return Err(VfsError::new(Errno::Inval, "descriptor.symlink_at.nul"));
            }
            let parent = self.walker().resolve_parent(
                dir,
                new_path.as_bytes(),
                WalkFlags::new(self.table.config()),
            )?;
            parent.dir.symlink(&parent.name, old_path.as_bytes())
        })
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, path = path), err)]
    pub fn unlink_file_at(&self, path: &str) -> VfsResult<()> {
        self.run(FsOp::UnlinkFileAt, |ofd| {
            let dir = ofd.directory("descriptor.unlink_file_at.receiver")?;
            require_mutation(ofd, "descriptor.unlink_file_at.access")?;
            let parent = self.walker().resolve_parent(
                dir,
                path.as_bytes(),
                WalkFlags::new(self.table.config()),
            )?;
            let target = parent.dir.lookup(&parent.name)?;
            if target.file_type() == DescriptorType::Directory {
                return Err(VfsError::new(Errno::IsDir, "descriptor.unlink_file_at.directory"));
            }
            if parent.had_trailing_slash {
                return Err(VfsError::new(Errno::NotDir, "descriptor.unlink_file_at.slash"));
            }
            parent.dir.unlink(&parent.name)
        })
    }

    #[instrument(level = "debug", skip_all, fields(fd = %self.handle, path = path), err)]
    pub fn remove_directory_at(&self, path: &str) -> VfsResult<()> {
        self.run(FsOp::RemoveDirectoryAt, |ofd| {
            let dir = ofd.directory("descriptor.remove_directory_at.receiver")?;
            require_mutation(ofd, "descriptor.remove_directory_at.access")?;
            let parent = self.walker().resolve_parent(
                dir,
                path.as_bytes(),
                WalkFlags::new(self.table.config()),
            )?;
            parent.dir.rmdir(&parent.name)
        })
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(fd = %self.handle, old_path = old_path, new_fd = %new_descriptor.handle, new_path = new_path),
        err
    )]
    pub fn rename_at(
        &self,
        old_path: &str,
        new_descriptor: &Descriptor,
        new_path: &str,
    ) -> VfsResult<()> {
        self.run(FsOp::RenameAt, |ofd| {
            let dir = ofd.directory("descriptor.rename_at.receiver")?;
            require_mutation(ofd, "descriptor.rename_at.access")?;
            let new_ofd = new_descriptor.table.get(new_descriptor.handle)?;
            let new_dir = new_ofd.directory("descriptor.rename_at.new_receiver")?;
            require_mutation(&new_ofd, "descriptor.rename_at.new_access")?;

            let source = self.walker().resolve_parent(
                dir,
                old_path.as_bytes(),
                WalkFlags::new(self.table.config()),
            )?;
            let target_config = new_descriptor.table.config();
            let target = PathWalker::new(target_config).resolve_parent(
                new_dir,
                new_path.as_bytes(),
                WalkFlags::new(target_config),
            )?;
            if source.dir.device() != target.dir.device() {
                return Err(VfsError::new(Errno::XDev, "descriptor.rename_at.cross_device"));
            }
            source
                .dir
                .rename(&source.name, target.dir.as_ref(), &target.name)
        })
    }
}

fn require_mutation(ofd: &OpenDescription, context: &'static str) -> VfsResult<()> {
    if ofd.flags().contains(DescriptorFlags::WRITE) {
        Ok(())
    } else {
        Err(VfsError::new(Errno::Access, context))
    }
}

/// Lazy directory stream returned by [`Descriptor::readdir`].
///
/// Each step re-checks the handle, so closing the descriptor ends the stream
/// with `BadF`. After an error the stream yields nothing further.
pub struct ReadDir {
    handle: DescriptorHandle,
    table: Arc<DescriptorTable>,
    done: bool,
}

impl fmt::Debug for ReadDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadDir")
            .field("handle", &self.handle)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Iterator for ReadDir {
    type Item = VfsResult<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let batch = self.table.config().readdir_batch;
        let step = self
            .table
            .get(self.handle)
            .and_then(|ofd| ofd.next_dir_entry(batch));
        match FsOp::Readdir.restrict(step) {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
