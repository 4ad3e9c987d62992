use anyhow::Context;
use osfs_kit::{FsBackend, ListOptions, OsFS, TempFS};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    // creates `/tmp/tmpXXXXXXjob1` on host
    let scratch = TempFS::with_identifier("job1")?;
    println!("Scratch dir: {}", scratch.root().display());

    scratch.make_dir("reports/2024", 0o755, true, false)?;
    scratch.set_contents("reports/2024/summary.txt", b"Hello")?;
    scratch.set_contents("reports/.draft", b"World")?;

    let visible = scratch.list_dir("reports", &ListOptions::default().no_hidden().full())?;
    println!("Visible: {visible:?}");

    // `..` never leaves the root
    let clamped = scratch.real_path("../../etc/passwd")?;
    assert!(clamped.starts_with(scratch.root()));

    scratch.set_xattr("reports/2024/summary.txt", "user.owner", b"job1")?;
    let owner = scratch
        .get_xattr("reports/2024/summary.txt", "user.owner")?
        .context("attribute was not stored")?;
    println!("Owner: {}", String::from_utf8_lossy(&owner));

    // a plain OsFS over the same directory sees the same files
    let view = OsFS::new(scratch.root())?;
    let first = String::from_utf8(view.get_contents("/reports/2024/summary.txt")?)?;
    let second = String::from_utf8(view.get_contents("reports/.draft")?)?;
    println!("{first}, {second}!");
    view.close()?;

    // removes the whole temporary tree; dropping `scratch` would do the same, with a warning
    let root = scratch.root().to_path_buf();
    scratch.close()?;
    assert!(!root.exists());

    Ok(())
}
