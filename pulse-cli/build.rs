// Injects PULSE_VERSION from `git describe`, falling back to the crate version
// when git (or a checkout) is unavailable.

use std::process::Command;

fn main() {
    let base = env!("CARGO_PKG_VERSION");
    let version = git_describe()
        .map(|described| version_from_describe(base, &described))
        .unwrap_or_else(|| base.to_string());

    println!("cargo:rustc-env=PULSE_VERSION={}", version);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/tags");
}

fn git_describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();
    (!described.is_empty()).then(|| described.to_string())
}

// "v0.3.0" -> "0.3.0"; "v0.3.0-4-gabc123" -> "0.3.0"; "abc123-dirty" -> "{base}-abc123-dirty"
fn version_from_describe(base: &str, described: &str) -> String {
    match described.strip_prefix('v') {
        Some(tagged) => tagged.split('-').next().unwrap_or(tagged).to_string(),
        None => format!("{}-{}", base, described),
    }
}
