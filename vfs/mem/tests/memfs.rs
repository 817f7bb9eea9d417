use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::executor::block_on;
use pretty_assertions::assert_eq;
use vfs_core::{
    CreateFile, DateTime, DescriptorFlags, DescriptorType, Errno, Fs, FsNode, MkdirOptions, Mode,
    NewTimestamp, VfsDirCookie, WallClock,
};
use vfs_mem::{MemFs, MemFsConfig};

#[derive(Debug, Default)]
struct StepClock(AtomicU64);

impl WallClock for StepClock {
    fn now(&self) -> DateTime {
        DateTime::from_nanos(self.0.fetch_add(10, Ordering::Relaxed) + 10)
    }

    fn resolution(&self) -> DateTime {
        DateTime::from_nanos(1)
    }
}

fn memfs() -> MemFs {
    MemFs::new(MemFsConfig::default()).expect("memfs")
}

fn file(dir: &Arc<dyn FsNode>, name: &str) -> Arc<dyn FsNode> {
    dir.create_file(name.as_bytes(), CreateFile::default())
        .expect("create file")
}

#[test]
fn instances_have_distinct_devices() {
    let a = memfs();
    let b = memfs();
    assert_ne!(a.device(), b.device());
    assert_eq!(a.root().device(), a.device());
    assert_eq!(a.root().inode(), 1);
}

#[test]
fn write_then_read_back() {
    let fs = memfs();
    let root = fs.root();
    let node = file(&root, "data.bin");
    let handle = node
        .open(DescriptorFlags::READ | DescriptorFlags::WRITE)
        .expect("open");

    assert_eq!(block_on(handle.write_at(4, b"tail")).expect("write"), 4);
    let mut buf = [0xffu8; 8];
    assert_eq!(handle.read_at(0, &mut buf).expect("read"), 8);
    assert_eq!(&buf, b"\0\0\0\0tail");
    assert_eq!(handle.read_at(8, &mut buf).expect("eof"), 0);
    assert_eq!(node.metadata().expect("meta").size, 8);
    assert_eq!(fs.bytes_used(), 8);
}

#[test]
fn mode_is_enforced_on_open() {
    let fs = memfs();
    let root = fs.root();
    let node = root
        .create_file(
            b"ro",
            CreateFile {
                mode: Mode::READABLE,
                exclusive: true,
            },
        )
        .expect("create");
    node.open(DescriptorFlags::READ).expect("read open");
    let err = node.open(DescriptorFlags::WRITE).unwrap_err();
    assert_eq!(err.errno(), Errno::Access);
}

#[test]
fn byte_budget_gives_nospc() {
    let fs = MemFs::new(MemFsConfig {
        max_bytes: Some(4),
        ..MemFsConfig::default()
    })
    .expect("memfs");
    let node = file(&fs.root(), "f");
    let handle = node.open(DescriptorFlags::WRITE).expect("open");
    block_on(handle.write_at(0, b"1234")).expect("fits");
    let err = block_on(handle.write_at(4, b"5")).unwrap_err();
    assert_eq!(err.errno(), Errno::NoSpc);
    handle.set_len(1).expect("shrink");
    assert_eq!(fs.bytes_used(), 1);
}

#[test]
fn inode_budget_and_release() {
    let fs = MemFs::new(MemFsConfig {
        max_inodes: Some(2),
        ..MemFsConfig::default()
    })
    .expect("memfs");
    let root = fs.root();
    file(&root, "one");
    let err = root
        .create_file(b"two", CreateFile::default())
        .unwrap_err();
    assert_eq!(err.errno(), Errno::NoSpc);

    root.unlink(b"one").expect("unlink");
    assert_eq!(fs.inodes_used(), 1);
    file(&root, "two");
}

#[test]
fn directory_link_counts() {
    let fs = memfs();
    let root = fs.root();
    root.mkdir(b"a", MkdirOptions::default()).expect("mkdir a");
    root.mkdir(b"b", MkdirOptions::default()).expect("mkdir b");
    let f = file(&root, "f");
    assert_eq!(root.metadata().expect("meta").nlink, 4);

    root.link(f.as_ref(), b"g").expect("link");
    assert_eq!(f.metadata().expect("meta").nlink, 2);
    root.unlink(b"f").expect("unlink");
    assert_eq!(f.metadata().expect("meta").nlink, 1);
}

#[test]
fn rmdir_rules() {
    let fs = memfs();
    let root = fs.root();
    let dir = root.mkdir(b"d", MkdirOptions::default()).expect("mkdir");
    file(&dir, "inner");
    assert_eq!(root.rmdir(b"d").unwrap_err().errno(), Errno::NotEmpty);
    dir.unlink(b"inner").expect("unlink");
    root.rmdir(b"d").expect("rmdir");
    assert_eq!(dir.metadata().expect("meta").nlink, 0);
    let err = dir.create_file(b"late", CreateFile::default()).unwrap_err();
    assert_eq!(err.errno(), Errno::NoEnt);

    file(&root, "plain");
    assert_eq!(root.rmdir(b"plain").unwrap_err().errno(), Errno::NotDir);
    assert_eq!(root.unlink(b"missing").unwrap_err().errno(), Errno::NoEnt);
}

#[test]
fn rename_replacement_rules() {
    let fs = memfs();
    let root = fs.root();
    let a = root.mkdir(b"a", MkdirOptions::default()).expect("a");
    let b = root.mkdir(b"b", MkdirOptions::default()).expect("b");
    file(&root, "f");
    file(&b, "child");

    assert_eq!(
        root.rename(b"f", root.as_ref(), b"a").unwrap_err().errno(),
        Errno::IsDir
    );
    assert_eq!(
        root.rename(b"a", root.as_ref(), b"f").unwrap_err().errno(),
        Errno::NotDir
    );
    assert_eq!(
        root.rename(b"a", root.as_ref(), b"b").unwrap_err().errno(),
        Errno::NotEmpty
    );
    assert_eq!(
        root.rename(b"a", a.as_ref(), b"x").unwrap_err().errno(),
        Errno::Inval
    );

    root.rename(b"f", b.as_ref(), b"moved").expect("move into b");
    assert_eq!(root.lookup(b"f").unwrap_err().errno(), Errno::NoEnt);
    assert_eq!(
        b.lookup(b"moved").expect("moved").file_type(),
        DescriptorType::RegularFile
    );

    b.unlink(b"child").expect("unlink");
    b.unlink(b"moved").expect("unlink");
    root.rename(b"a", root.as_ref(), b"b").expect("replace empty dir");
    assert_eq!(root.lookup(b"b").expect("b").inode(), a.inode());
}

#[test]
fn rename_onto_an_ancestor_of_the_source_is_not_empty() {
    let fs = memfs();
    let root = fs.root();
    let d = root.mkdir(b"d", MkdirOptions::default()).expect("d");
    let e = d.mkdir(b"e", MkdirOptions::default()).expect("e");
    let f = e.mkdir(b"f", MkdirOptions::default()).expect("f");
    f.mkdir(b"x", MkdirOptions::default()).expect("x");

    assert_eq!(
        f.rename(b"x", d.as_ref(), b"e").unwrap_err().errno(),
        Errno::NotEmpty
    );
    assert_eq!(
        e.rename(b"f", d.as_ref(), b"e").unwrap_err().errno(),
        Errno::NotEmpty
    );
    assert_eq!(d.lookup(b"e").expect("e").inode(), e.inode());
}

#[test]
fn rename_across_instances_is_xdev() {
    let one = memfs();
    let two = memfs();
    file(&one.root(), "f");
    let err = one
        .root()
        .rename(b"f", two.root().as_ref(), b"f")
        .unwrap_err();
    assert_eq!(err.errno(), Errno::XDev);
}

#[test]
fn directory_renames_with_inverted_inode_order() {
    let fs = memfs();
    let root = fs.root();
    let low = root.mkdir(b"low", MkdirOptions::default()).expect("low");
    let high = root.mkdir(b"high", MkdirOptions::default()).expect("high");
    assert!(low.inode() < high.inode());

    // `low` now lives below a directory with a larger inode.
    root.rename(b"low", high.as_ref(), b"low").expect("nest low");
    let deeper = low.mkdir(b"deeper", MkdirOptions::default()).expect("deeper");

    assert_eq!(
        root.rename(b"high", deeper.as_ref(), b"loop").unwrap_err().errno(),
        Errno::Inval
    );
    high.rename(b"low", root.as_ref(), b"low").expect("move back");
    assert_eq!(root.lookup(b"low").expect("low").inode(), low.inode());

    let threads: Vec<_> = (0..4)
        .map(|i| {
            let root = root.clone();
            let high = high.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    if i % 2 == 0 {
                        let _ = root.rename(b"low", high.as_ref(), b"low");
                        let _ = high.rename(b"low", root.as_ref(), b"low");
                    } else {
                        let _ = root.rename(b"high", root.as_ref(), b"high");
                        let _ = high.read_dir(None, 8);
                    }
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().expect("rename thread");
    }
}

#[test]
fn readdir_orders_and_pages() {
    let fs = memfs();
    let root = fs.root();
    for name in ["c", "a", "b"] {
        file(&root, name);
    }
    let first = root.read_dir(None, 2).expect("first page");
    let names: Vec<_> = first.entries.iter().map(|e| e.name.clone()).collect();
    assert_eq!(names, vec![b"a".to_vec(), b"b".to_vec()]);
    assert_eq!(first.next, Some(VfsDirCookie::after(b"b")));
    let rest = root.read_dir(first.next, 2).expect("second page");
    assert_eq!(rest.entries.len(), 1);
    assert_eq!(rest.next, None);
}

#[test]
fn readdir_cookie_survives_directory_changes() {
    let fs = memfs();
    let root = fs.root();
    for name in ["b", "d", "f"] {
        file(&root, name);
    }
    let first = root.read_dir(None, 1).expect("first page");
    assert_eq!(first.entries[0].name, b"b".to_vec());

    // Earlier names and the cookie's own name no longer exist.
    file(&root, "a");
    root.unlink(b"b").expect("unlink b");
    file(&root, "c");

    let rest = root.read_dir(first.next, 8).expect("rest");
    let names: Vec<_> = rest.entries.iter().map(|e| e.name.clone()).collect();
    assert_eq!(names, vec![b"c".to_vec(), b"d".to_vec(), b"f".to_vec()]);
    assert_eq!(rest.next, None);
}

#[test]
fn symlinks_store_target_verbatim() {
    let fs = memfs();
    let root = fs.root();
    root.symlink(b"link", b"../x/y").expect("symlink");
    let link = root.lookup(b"link").expect("lookup");
    assert_eq!(link.file_type(), DescriptorType::SymbolicLink);
    assert_eq!(link.readlink().expect("readlink"), b"../x/y".to_vec());
    assert_eq!(link.metadata().expect("meta").size, 6);
    assert_eq!(root.readlink().unwrap_err().errno(), Errno::Inval);
    assert_eq!(
        root.symlink(b"link", b"z").unwrap_err().errno(),
        Errno::Exist
    );
}

#[test]
fn timestamps_follow_the_clock() {
    let clock = Arc::new(StepClock::default());
    let fs = MemFs::with_clock(MemFsConfig::default(), clock).expect("memfs");
    let node = file(&fs.root(), "t");
    let before = node.metadata().expect("meta");

    node.set_times(NewTimestamp::Timestamp(5), NewTimestamp::NoChange)
        .expect("set atim");
    let after = node.metadata().expect("meta");
    assert_eq!(after.atim, 5);
    assert_eq!(after.mtim, before.mtim);
    assert!(after.ctim > before.ctim);

    node.set_times(NewTimestamp::NoChange, NewTimestamp::Now)
        .expect("set mtim");
    let now = node.metadata().expect("meta");
    assert!(now.mtim > after.mtim);
    assert_eq!(now.atim, 5);
}
