use pretty_assertions::assert_eq;
use vfs_core::{
    AtFlags, Descriptor, DescriptorFlags, DescriptorTable, DescriptorType, Errno, HandleRegistry,
    Mode, NewTimestamp, OFlags, VfsConfig,
};
use vfs_mem::{MemFs, MemFsConfig};

fn rw() -> DescriptorFlags {
    DescriptorFlags::READ | DescriptorFlags::WRITE
}

fn rw_mode() -> Mode {
    Mode::READABLE | Mode::WRITEABLE
}

fn memfs() -> MemFs {
    MemFs::new(MemFsConfig::default()).expect("memfs")
}

fn preopen(fs: &MemFs, access: DescriptorFlags) -> Descriptor {
    DescriptorTable::with_defaults()
        .preopen(fs, access)
        .expect("preopen")
}

fn open(root: &Descriptor, path: &str, oflags: OFlags) -> Result<Descriptor, Errno> {
    root.open_at(AtFlags::empty(), path, oflags, rw_mode())
        .map_err(|err| err.errno())
}

async fn write_file(root: &Descriptor, path: &str, data: &[u8]) {
    let file = open(root, path, OFlags::CREATE).expect("create");
    file.pwrite(data, 0).await.expect("write");
    file.close();
}

fn kind(root: &Descriptor, flags: AtFlags, path: &str) -> DescriptorType {
    root.stat_at(flags, path).expect("stat_at").file_type
}

#[tokio::test]
async fn exclusive_create_leaves_existing_object_alone() {
    let fs = memfs();
    let root = preopen(&fs, rw());
    write_file(&root, "f", b"ABC").await;

    assert_eq!(
        open(&root, "f", OFlags::CREATE | OFlags::EXCL).unwrap_err(),
        Errno::Exist
    );
    let file = open(&root, "f", OFlags::empty()).expect("reopen");
    assert_eq!(file.pread(8, 0).expect("read"), b"ABC".to_vec());

    // A dangling symlink still occupies the name.
    root.symlink_at("missing", "dangling").expect("symlink");
    assert_eq!(
        open(&root, "dangling", OFlags::CREATE | OFlags::EXCL).unwrap_err(),
        Errno::Exist
    );
}

#[test]
fn create_and_directory_flag_combinations() {
    let fs = memfs();
    let root = preopen(&fs, rw());
    open(&root, "file", OFlags::CREATE).expect("create file");

    let dir = open(&root, "d", OFlags::CREATE | OFlags::DIRECTORY).expect("create dir");
    assert_eq!(dir.descriptor_type().expect("type"), DescriptorType::Directory);
    open(&root, "d", OFlags::CREATE | OFlags::DIRECTORY).expect("existing dir");

    assert_eq!(open(&root, "d", OFlags::CREATE).unwrap_err(), Errno::IsDir);
    assert_eq!(
        open(&root, "file", OFlags::CREATE | OFlags::DIRECTORY).unwrap_err(),
        Errno::NotDir
    );
    assert_eq!(
        open(&root, "file", OFlags::DIRECTORY).unwrap_err(),
        Errno::NotDir
    );
    assert_eq!(open(&root, "missing", OFlags::empty()).unwrap_err(), Errno::NoEnt);
    assert_eq!(
        open(&root, "newfile/", OFlags::CREATE).unwrap_err(),
        Errno::IsDir
    );
}

#[tokio::test]
async fn truncate_on_open() {
    let fs = memfs();
    let root = preopen(&fs, rw());
    write_file(&root, "f", b"hello").await;

    let err = root
        .open_at(AtFlags::empty(), "f", OFlags::TRUNC, Mode::READABLE)
        .unwrap_err();
    assert_eq!(err.errno(), Errno::Inval);

    let file = open(&root, "f", OFlags::TRUNC).expect("truncate");
    assert_eq!(file.stat().expect("stat").size, 0);
    assert_eq!(file.tell().expect("cursor"), 0);

    root.create_directory_at("d").expect("mkdir");
    assert_eq!(open(&root, "d", OFlags::TRUNC).unwrap_err(), Errno::IsDir);
}

#[test]
fn requested_access_is_bounded_by_receiver() {
    let fs = memfs();
    {
        let root = preopen(&fs, rw());
        open(&root, "f", OFlags::CREATE).expect("seed");
    }
    let reader = preopen(&fs, DescriptorFlags::READ);

    let err = reader
        .open_at(AtFlags::empty(), "f", OFlags::empty(), Mode::WRITEABLE)
        .unwrap_err();
    assert_eq!(err.errno(), Errno::Access);
    let file = reader
        .open_at(AtFlags::empty(), "f", OFlags::empty(), Mode::READABLE)
        .expect("read only");
    assert_eq!(file.flags().expect("flags"), DescriptorFlags::READ);

    let err = reader
        .open_at(AtFlags::empty(), "new", OFlags::CREATE, Mode::READABLE)
        .unwrap_err();
    assert_eq!(err.errno(), Errno::Access);
    assert_eq!(
        reader.create_directory_at("d").unwrap_err().errno(),
        Errno::Access
    );
    assert_eq!(reader.unlink_file_at("f").unwrap_err().errno(), Errno::Access);
    assert_eq!(
        reader
            .set_times_at(AtFlags::empty(), "f", NewTimestamp::Now, NewTimestamp::Now)
            .unwrap_err()
            .errno(),
        Errno::Access
    );
}

#[test]
fn open_without_read_or_write_is_inval() {
    let fs = memfs();
    let root = preopen(&fs, rw());
    open(&root, "f", OFlags::CREATE).expect("seed");

    for mode in [Mode::EXECUTABLE, Mode::empty()] {
        let err = root
            .open_at(AtFlags::empty(), "f", OFlags::empty(), mode)
            .unwrap_err();
        assert_eq!(err.errno(), Errno::Inval);
    }
    let err = root
        .open_at(AtFlags::empty(), "g", OFlags::CREATE, Mode::EXECUTABLE)
        .unwrap_err();
    assert_eq!(err.errno(), Errno::Inval);
    assert_eq!(
        root.stat_at(AtFlags::empty(), "g").unwrap_err().errno(),
        Errno::NoEnt
    );
}

#[tokio::test]
async fn nested_paths_resolve_under_the_receiver() {
    let fs = memfs();
    let root = preopen(&fs, rw());
    root.create_directory_at("a").expect("mkdir");
    write_file(&root, "a/b.txt", b"ABC").await;

    assert_eq!(root.stat_at(AtFlags::empty(), "a/b.txt").expect("stat").size, 3);
    assert_eq!(root.stat_at(AtFlags::empty(), "a/./b.txt").expect("dot").size, 3);
    assert_eq!(
        root.stat_at(AtFlags::empty(), "a/../a/b.txt").expect("dotdot").size,
        3
    );

    let sub = open(&root, "a", OFlags::DIRECTORY).expect("open dir");
    assert_eq!(sub.stat_at(AtFlags::empty(), "b.txt").expect("relative").size, 3);
    assert_eq!(
        sub.stat_at(AtFlags::empty(), "../a/b.txt").unwrap_err().errno(),
        Errno::Perm
    );
}

#[test]
fn resolution_policy_errors() {
    let fs = memfs();
    let root = preopen(&fs, rw());
    open(&root, "f", OFlags::CREATE).expect("file");

    let stat = |path: &str| root.stat_at(AtFlags::empty(), path).unwrap_err().errno();
    assert_eq!(stat("/f"), Errno::Perm);
    assert_eq!(stat(".."), Errno::Perm);
    assert_eq!(stat(""), Errno::NoEnt);
    assert_eq!(stat("f\0x"), Errno::Inval);
    assert_eq!(stat("f/"), Errno::NotDir);
    assert_eq!(stat("f/inner"), Errno::NotDir);
    assert_eq!(stat(&"n".repeat(256)), Errno::NameTooLong);

    root.symlink_at("loop", "loop").expect("self link");
    assert_eq!(
        root.stat_at(AtFlags::SYMLINK_FOLLOW, "loop").unwrap_err().errno(),
        Errno::Loop
    );
    assert_eq!(kind(&root, AtFlags::empty(), "loop"), DescriptorType::SymbolicLink);

    root.symlink_at("../outside", "escape").expect("escaping link");
    assert_eq!(
        root.stat_at(AtFlags::SYMLINK_FOLLOW, "escape").unwrap_err().errno(),
        Errno::Perm
    );

    assert_eq!(
        root.create_directory_at(".").unwrap_err().errno(),
        Errno::Inval
    );
    assert_eq!(
        root.remove_directory_at("..").unwrap_err().errno(),
        Errno::Inval
    );
}

#[test]
fn limits_come_from_table_config() {
    let fs = memfs();
    let table = DescriptorTable::new(VfsConfig {
        max_symlinks: 1,
        max_path_len: 16,
        ..VfsConfig::default()
    })
    .expect("table");
    let root = table.preopen(&fs, rw()).expect("preopen");
    open(&root, "f", OFlags::CREATE).expect("file");
    root.symlink_at("f", "one").expect("one");
    root.symlink_at("one", "two").expect("two");

    assert_eq!(kind(&root, AtFlags::SYMLINK_FOLLOW, "one"), DescriptorType::RegularFile);
    assert_eq!(
        root.stat_at(AtFlags::SYMLINK_FOLLOW, "two").unwrap_err().errno(),
        Errno::Loop
    );
    assert_eq!(
        root.stat_at(AtFlags::empty(), &"a/".repeat(9)).unwrap_err().errno(),
        Errno::NameTooLong
    );
}

#[test]
fn receiver_must_be_an_open_directory() {
    let fs = memfs();
    let root = preopen(&fs, rw());
    let file = open(&root, "f", OFlags::CREATE).expect("file");

    assert_eq!(open(&file, "x", OFlags::empty()).unwrap_err(), Errno::NotDir);
    assert_eq!(
        file.stat_at(AtFlags::empty(), "x").unwrap_err().errno(),
        Errno::NotDir
    );
    assert_eq!(file.create_directory_at("x").unwrap_err().errno(), Errno::NotDir);

    let sub = open(&root, "d", OFlags::CREATE | OFlags::DIRECTORY).expect("dir");
    let handle = sub.handle();
    assert!(sub.close());
    assert!(!root.table().is_open(handle));
    let reopened = open(&root, "d", OFlags::DIRECTORY).expect("reopen");
    assert_ne!(reopened.handle(), handle);
}

#[test]
fn symlinks_and_read_link_at() {
    let fs = memfs();
    let root = preopen(&fs, rw());
    root.create_directory_at("a").expect("mkdir");
    open(&root, "a/b.txt", OFlags::CREATE).expect("file");

    root.symlink_at("a/b.txt", "ln").expect("symlink");
    assert_eq!(root.read_link_at("ln").expect("readlink"), "a/b.txt");
    assert_eq!(kind(&root, AtFlags::empty(), "ln"), DescriptorType::SymbolicLink);
    assert_eq!(kind(&root, AtFlags::SYMLINK_FOLLOW, "ln"), DescriptorType::RegularFile);
    assert_eq!(root.stat_at(AtFlags::empty(), "ln").expect("lstat").size, 7);
    // A trailing slash forces following the final link.
    root.symlink_at("a", "dirlink").expect("dir symlink");
    assert_eq!(kind(&root, AtFlags::empty(), "dirlink/"), DescriptorType::Directory);

    assert_eq!(root.read_link_at("a/b.txt").unwrap_err().errno(), Errno::Inval);
    assert_eq!(root.read_link_at("nope").unwrap_err().errno(), Errno::NoEnt);
    assert_eq!(root.symlink_at("", "empty").unwrap_err().errno(), Errno::NoEnt);
    assert_eq!(root.symlink_at("/etc", "abs").unwrap_err().errno(), Errno::Perm);
    assert_eq!(root.symlink_at("x", "ln").unwrap_err().errno(), Errno::Exist);
}

#[tokio::test]
async fn hard_links() {
    let fs = memfs();
    let root = preopen(&fs, rw());
    write_file(&root, "f", b"shared").await;
    root.create_directory_at("d").expect("mkdir");

    root.link_at(AtFlags::empty(), "f", &root, "d/g").expect("link");
    assert_eq!(root.stat_at(AtFlags::empty(), "f").expect("stat").nlink, 2);
    let linked = open(&root, "d/g", OFlags::empty()).expect("open link");
    assert_eq!(linked.pread(16, 0).expect("read"), b"shared".to_vec());

    assert_eq!(
        root.link_at(AtFlags::empty(), "d", &root, "d2").unwrap_err().errno(),
        Errno::Perm
    );
    assert_eq!(
        root.link_at(AtFlags::empty(), "f", &root, "d/g").unwrap_err().errno(),
        Errno::Exist
    );

    let reader = root.table().preopen(&fs, DescriptorFlags::READ).expect("reader");
    assert_eq!(
        root.link_at(AtFlags::empty(), "f", &reader, "h").unwrap_err().errno(),
        Errno::Access
    );

    root.symlink_at("f", "sym").expect("symlink");
    root.link_at(AtFlags::SYMLINK_FOLLOW, "sym", &root, "via_follow")
        .expect("link target");
    assert_eq!(kind(&root, AtFlags::empty(), "via_follow"), DescriptorType::RegularFile);
    root.link_at(AtFlags::empty(), "sym", &root, "via_nofollow")
        .expect("link symlink");
    assert_eq!(
        kind(&root, AtFlags::empty(), "via_nofollow"),
        DescriptorType::SymbolicLink
    );
}

#[test]
fn cross_filesystem_link_and_rename_are_xdev() {
    let one = memfs();
    let two = memfs();
    let table = DescriptorTable::with_defaults();
    let a = table.preopen(&one, rw()).expect("a");
    let b = table.preopen(&two, rw()).expect("b");
    open(&a, "f", OFlags::CREATE).expect("file");

    assert_eq!(
        a.link_at(AtFlags::empty(), "f", &b, "f").unwrap_err().errno(),
        Errno::XDev
    );
    assert_eq!(a.rename_at("f", &b, "f").unwrap_err().errno(), Errno::XDev);
    assert_eq!(kind(&a, AtFlags::empty(), "f"), DescriptorType::RegularFile);
}

#[test]
fn unlink_and_remove_directory() {
    let fs = memfs();
    let root = preopen(&fs, rw());
    open(&root, "f", OFlags::CREATE).expect("file");
    root.create_directory_at("d").expect("mkdir");
    open(&root, "d/inner", OFlags::CREATE).expect("inner");
    root.symlink_at("f", "ln").expect("symlink");

    assert_eq!(root.unlink_file_at("d").unwrap_err().errno(), Errno::IsDir);
    assert_eq!(root.unlink_file_at("f/").unwrap_err().errno(), Errno::NotDir);
    assert_eq!(root.unlink_file_at("nope").unwrap_err().errno(), Errno::NoEnt);
    assert_eq!(root.remove_directory_at("d").unwrap_err().errno(), Errno::NotEmpty);
    assert_eq!(root.remove_directory_at("f").unwrap_err().errno(), Errno::NotDir);

    root.unlink_file_at("ln").expect("unlink symlink");
    assert_eq!(kind(&root, AtFlags::empty(), "f"), DescriptorType::RegularFile);

    root.unlink_file_at("d/inner").expect("unlink");
    root.remove_directory_at("d").expect("rmdir");
    assert_eq!(
        root.stat_at(AtFlags::empty(), "d").unwrap_err().errno(),
        Errno::NoEnt
    );
    assert_eq!(root.create_directory_at("f").unwrap_err().errno(), Errno::Exist);
}

#[tokio::test]
async fn rename_rules() {
    let fs = memfs();
    let root = preopen(&fs, rw());
    write_file(&root, "f", b"moved").await;
    root.create_directory_at("empty").expect("empty");
    root.create_directory_at("full").expect("full");
    open(&root, "full/x", OFlags::CREATE).expect("x");
    root.create_directory_at("src").expect("src");

    assert_eq!(root.rename_at("f", &root, "empty").unwrap_err().errno(), Errno::IsDir);
    assert_eq!(root.rename_at("src", &root, "f").unwrap_err().errno(), Errno::NotDir);
    assert_eq!(
        root.rename_at("src", &root, "full").unwrap_err().errno(),
        Errno::NotEmpty
    );

    root.rename_at("src", &root, "empty").expect("dir over empty dir");
    assert_eq!(
        root.stat_at(AtFlags::empty(), "src").unwrap_err().errno(),
        Errno::NoEnt
    );

    let full = open(&root, "full", OFlags::DIRECTORY).expect("full");
    root.rename_at("f", &full, "renamed").expect("move");
    let file = open(&root, "full/renamed", OFlags::empty()).expect("moved file");
    assert_eq!(file.pread(8, 0).expect("read"), b"moved".to_vec());
}

#[test]
fn set_times_at_follows_only_when_asked() {
    let fs = memfs();
    let root = preopen(&fs, rw());
    open(&root, "f", OFlags::CREATE).expect("file");
    root.symlink_at("f", "ln").expect("symlink");
    root.set_times_at(
        AtFlags::SYMLINK_FOLLOW,
        "f",
        NewTimestamp::Timestamp(1),
        NewTimestamp::Timestamp(1),
    )
    .expect("seed");

    root.set_times_at(
        AtFlags::empty(),
        "ln",
        NewTimestamp::NoChange,
        NewTimestamp::Timestamp(7),
    )
    .expect("touch link");
    assert_eq!(root.stat_at(AtFlags::empty(), "ln").expect("lstat").mtim, 7);
    assert_eq!(root.stat_at(AtFlags::empty(), "f").expect("stat").mtim, 1);

    root.set_times_at(
        AtFlags::SYMLINK_FOLLOW,
        "ln",
        NewTimestamp::NoChange,
        NewTimestamp::Timestamp(9),
    )
    .expect("touch target");
    assert_eq!(root.stat_at(AtFlags::empty(), "f").expect("stat").mtim, 9);
    assert_eq!(root.stat_at(AtFlags::empty(), "f").expect("stat").atim, 1);
}
