//! Receiver-anchored path traversal and resolution.
//!
//! Every walk starts at a directory node and may never leave it: absolute
//! paths, absolute symlink targets, and `..` past the starting node fail with
//! `Perm`.

use crate::context::VfsConfig;
use crate::flags::AtFlags;
use crate::node::{DescriptorType, FsNode};
use crate::{Errno, VfsError, VfsResult};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
pub struct WalkFlags {
    pub follow_final_symlink: bool,
    pub must_be_dir: bool,
    pub max_symlinks: u16,
}

impl WalkFlags {
    pub fn new(config: &VfsConfig) -> Self {
        Self {
            follow_final_symlink: true,
            must_be_dir: false,
            max_symlinks: config.max_symlinks,
        }
    }

    pub fn from_at_flags(config: &VfsConfig, flags: AtFlags) -> Self {
        Self {
            follow_final_symlink: flags.contains(AtFlags::SYMLINK_FOLLOW),
            ..Self::new(config)
        }
    }

    pub fn no_follow(config: &VfsConfig) -> Self {
        Self {
            follow_final_symlink: false,
            ..Self::new(config)
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TraversalInfo {
    pub components_walked: usize,
    pub symlinks_followed: u16,
}

#[derive(Clone)]
pub struct Resolved {
    pub node: Arc<dyn FsNode>,
    pub traversal: TraversalInfo,
}

#[derive(Clone)]
pub struct ResolvedParent {
    pub dir: Arc<dyn FsNode>,
    pub name: Vec<u8>,
    pub had_trailing_slash: bool,
}

pub struct PathWalker<'a> {
    config: &'a VfsConfig,
}

impl<'a> PathWalker<'a> {
    pub fn new(config: &'a VfsConfig) -> Self {
        Self { config }
    }

    /// Resolve `path` to the object it names.
    pub fn resolve(
        &self,
        base: &Arc<dyn FsNode>,
        path: &[u8],
        flags: WalkFlags,
    ) -> VfsResult<Resolved> {
        match self.resolve_internal(base, path, flags, ResolveMode::Final)? {
            ResolveOutcome::Final(resolved) => Ok(resolved),
            ResolveOutcome::Parent(_) => Err(VfsError::new(Errno::IO, "path.resolve.mode")),
        }
    }

    /// Resolve every component but the last, returning the containing
    /// directory and the final name.
    pub fn resolve_parent(
        &self,
        base: &Arc<dyn FsNode>,
        path: &[u8],
        flags: WalkFlags,
    ) -> VfsResult<ResolvedParent> {
        match self.resolve_internal(base, path, flags, ResolveMode::Parent)? {
            ResolveOutcome::Parent(parent) => Ok(parent),
            ResolveOutcome::Final(_) => Err(VfsError::new(Errno::IO, "path.resolve_parent.mode")),
        }
    }

    fn resolve_internal(
        &self,
        base: &Arc<dyn FsNode>,
        path: &[u8],
        flags: WalkFlags,
        mode: ResolveMode,
    ) -> VfsResult<ResolveOutcome> {
        if path.is_empty() {
            return Err(VfsError::new(Errno::NoEnt, "path.resolve.empty"));
        }
        if path.len() > self.config.max_path_len {
            return Err(VfsError::new(Errno::NameTooLong, "path.resolve.path_len"));
        }
        if path.contains(&0) {
            return Err(VfsError::new(Errno::Inval, "path.resolve.nul"));
        }
        if path[0] == b'/' {
            return Err(VfsError::new(Errno::Perm, "path.resolve.absolute"));
        }
        if base.file_type() != DescriptorType::Directory {
            return Err(VfsError::new(Errno::NotDir, "path.resolve.base"));
        }

        let had_trailing_slash = path.ends_with(b"/");
        let mut queue = WorkQueue::from_path(path);
        let mut current = base.clone();
        let mut stack: SmallVec<[Arc<dyn FsNode>; 8]> = SmallVec::new();
        let mut traversal = TraversalInfo::default();

        while let Some(component) = queue.pop_front() {
            traversal.components_walked += 1;
            let is_final = queue.is_empty();
            match component {
                WorkComponent::CurDir | WorkComponent::ParentDir
                    if is_final && matches!(mode, ResolveMode::Parent) =>
                {
                    return Err(VfsError::new(Errno::Inval, "path.resolve.parent.dot"));
                }
                WorkComponent::CurDir => {}
                WorkComponent::ParentDir => {
                    current = stack
                        .pop()
                        .ok_or_else(|| VfsError::new(Errno::Perm, "path.resolve.escape"))?;
                }
                WorkComponent::Normal(name) => {
                    if name.len() > self.config.max_name_len {
                        return Err(VfsError::new(Errno::NameTooLong, "path.name"));
                    }
                    if current.file_type() != DescriptorType::Directory {
                        return Err(VfsError::new(Errno::NotDir, "path.resolve.not_dir"));
                    }

                    if is_final && matches!(mode, ResolveMode::Parent) {
                        return Ok(ResolveOutcome::Parent(ResolvedParent {
                            dir: current,
                            name,
                            had_trailing_slash,
                        }));
                    }

                    let child = current.lookup(&name)?;

                    if child.file_type() == DescriptorType::SymbolicLink {
                        let follow = !is_final || flags.follow_final_symlink || had_trailing_slash;
                        if follow {
                            traversal.symlinks_followed += 1;
                            if traversal.symlinks_followed > flags.max_symlinks {
                                return Err(VfsError::new(
                                    Errno::Loop,
                                    "path.resolve.symlink_depth",
                                ));
                            }
                            let target = child.readlink()?;
                            if target.is_empty() {
                                return Err(VfsError::new(Errno::NoEnt, "path.resolve.symlink_empty"));
                            }
                            if target[0] == b'/' {
                                return Err(VfsError::new(
                                    Errno::Perm,
                                    "path.resolve.symlink_absolute",
                                ));
                            }
                            queue.inject_symlink(&target);
                            continue;
                        }
                        // Final symlink without follow: the link itself is the result.
                    }

                    stack.push(current);
                    current = child;
                }
            }
        }

        // Parent mode returns from inside the loop for any non-empty path.
        if matches!(mode, ResolveMode::Parent) {
            return Err(VfsError::new(Errno::Inval, "path.resolve.parent.empty"));
        }

        if (flags.must_be_dir || had_trailing_slash)
            && current.file_type() != DescriptorType::Directory
        {
            return Err(VfsError::new(Errno::NotDir, "path.resolve.must_dir"));
        }

        Ok(ResolveOutcome::Final(Resolved {
            node: current,
            traversal,
        }))
    }
}

enum ResolveMode {
    Final,
    Parent,
}

enum ResolveOutcome {
    Final(Resolved),
    Parent(ResolvedParent),
}

#[derive(Clone)]
enum WorkComponent {
    CurDir,
    ParentDir,
    Normal(Vec<u8>),
}

struct WorkQueue {
    items: VecDeque<WorkComponent>,
}

impl WorkQueue {
    fn from_path(path: &[u8]) -> Self {
        Self {
            items: components(path).collect(),
        }
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn pop_front(&mut self) -> Option<WorkComponent> {
        self.items.pop_front()
    }

    fn inject_symlink(&mut self, target: &[u8]) {
        for comp in components(target).collect::<Vec<_>>().into_iter().rev() {
            self.items.push_front(comp);
        }
    }
}

fn components(path: &[u8]) -> impl Iterator<Item = WorkComponent> + '_ {
    path.split(|b| *b == b'/')
        .filter(|part| !part.is_empty())
        .map(|part| match part {
            b"." => WorkComponent::CurDir,
            b".." => WorkComponent::ParentDir,
            name => WorkComponent::Normal(name.to_vec()),
        })
}
