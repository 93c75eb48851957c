use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!(
        "cargo:rustc-env=BUILD_DATE={}",
        command_output("date", &["-u", "+%Y-%m-%d"])
    );
    println!(
        "cargo:rustc-env=GIT_COMMIT={}",
        command_output("git", &["rev-parse", "--short", "HEAD"])
    );

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let extensions_dir = manifest_dir.join("grammar").join("extensions");
    println!("cargo:rerun-if-changed={}", extensions_dir.display());

    // GIT_COMMIT follows the checked out ref; BUILD_DATE is refreshed with it.
    for git_file in [".git/HEAD", ".git/refs", ".git/packed-refs"] {
        let path = manifest_dir.join(git_file);
        if path.exists() {
            println!("cargo:rerun-if-changed={}", path.display());
        }
    }

    let out = PathBuf::from(env::var("OUT_DIR").unwrap()).join("builtin_extensions.rs");
    fs::write(&out, extension_table(&extensions_dir)).unwrap();
}

const TABLE_START: &str = "pub(crate) static BUILTIN_EXTENSIONS: &[(&str, &str)] = &[\n";

/// Renders a `&[(file stem, json)]` table embedding every extension resource.
fn extension_table(dir: &Path) -> String {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect()
        })
        .unwrap_or_default();
    files.sort();

    let mut table = String::from(TABLE_START);
    for file in &files {
        println!("cargo:rerun-if-changed={}", file.display());
        let stem = file.file_stem().and_then(OsStr::to_str).unwrap_or_default();
        let path = file.display().to_string();
        table.push_str(&format!("    ({stem:?}, include_str!({path:?})),\n"));
    }
    table.push_str("];\n");
    table
}

/// Trimmed stdout of a helper command, or "unknown" when it is unavailable.
fn command_output(program: &str, args: &[&str]) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
