use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8(out.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

fn main() {
    // Nearest tag plus commit, marked when the tree has local edits.
    let rev = git(&["describe", "--tags", "--always", "--dirty"])
        .unwrap_or_else(|| String::from("unknown"));
    println!("cargo:rustc-env=EVM_BUILD_REV={rev}");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
}
