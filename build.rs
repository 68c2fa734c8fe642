//! Stamps `courtside version` output with the source revision.
//!
//! Exports `COURTSIDE_GIT_HASH` (short hash, `+dirty` when the tree has
//! local changes) and `COURTSIDE_COMMIT_DATE` (committer date of HEAD,
//! `YYYY-MM-DD`). Both fall back to `unknown` outside a git checkout, e.g.
//! when built from a published crate.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

fn main() {
    let hash = git(&["rev-parse", "--short=10", "HEAD"]).map(|hash| {
        let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
            .is_some_and(|status| !status.is_empty());
        if dirty {
            format!("{hash}+dirty")
        } else {
            hash
        }
    });
    let commit_date = git(&["log", "-1", "--format=%cs"]).filter(|d| !d.is_empty());

    for (key, value) in [
        ("COURTSIDE_GIT_HASH", hash),
        ("COURTSIDE_COMMIT_DATE", commit_date),
    ] {
        println!(
            "cargo:rustc-env={key}={}",
            value.as_deref().unwrap_or("unknown")
        );
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
}
