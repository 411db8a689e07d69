fn main() {
    // Prefer values injected by the release pipeline
    let datetime = std::env::var("BUILD_DATETIME").unwrap_or_else(|_| {
        chrono::Utc::now()
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
    });

    let git_hash = std::env::var("BUILD_GIT_HASH")
        .unwrap_or_else(|_| get_git_hash().unwrap_or_else(|| "unknown".to_string()));

    println!("cargo:rustc-env=BUILD_DATETIME={datetime}");
    println!("cargo:rustc-env=BUILD_GIT_HASH={git_hash}");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=BUILD_DATETIME");
    println!("cargo:rerun-if-env-changed=BUILD_GIT_HASH");
}

/// Short commit hash with a `-dirty` suffix for uncommitted changes
fn get_git_hash() -> Option<String> {
    use std::process::Command;

    let hash_output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !hash_output.status.success() {
        return None;
    }
    let hash = String::from_utf8(hash_output.stdout).ok()?;

    let is_dirty = Command::new("git")
        .args(["diff", "--quiet"])
        .output()
        .ok()
        .is_some_and(|output| !output.status.success());

    Some(format!("{}{}", hash.trim(), if is_dirty { "-dirty" } else { "" }))
}
