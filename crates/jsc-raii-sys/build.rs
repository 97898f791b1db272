use std::env;
use std::fs;
use std::path::{Path, PathBuf};

// Pinned oven-sh/WebKit autobuild; override with BUN_WEBKIT_VERSION
const BUN_WEBKIT_VERSION: &str = "aaf3f80b1cc701b412f8abfb7c7f413644a229ff";

fn main() {
    println!("cargo:rustc-check-cfg=cfg(has_bmalloc)");
    println!("cargo:rerun-if-env-changed=BUN_WEBKIT_VERSION");
    println!("cargo:rerun-if-env-changed=JSC_RAII_WEBKIT_CACHE");

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    match target_os.as_str() {
        "macos" | "ios" => link_apple_framework(),
        "linux" if env::var_os("CARGO_FEATURE_SYSTEM_JSC").is_some() => link_webkitgtk(),
        "linux" => link_bun_webkit("linux", bun_arch(&target_arch)),
        "windows" => {
            link_bun_webkit("windows", bun_arch(&target_arch));
            link_windows_system_libs();
        }
        other => panic!("JavaScriptCore is not available for target OS {other}"),
    }
}

fn bun_arch(target_arch: &str) -> &'static str {
    match target_arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => panic!("no bun-webkit build for architecture {other}"),
    }
}

fn link_apple_framework() {
    println!("cargo:rustc-link-lib=framework=JavaScriptCore");

    let sdk = std::process::Command::new("xcrun")
        .arg("--show-sdk-path")
        .output();
    if let Ok(output) = sdk {
        let sdk_path = String::from_utf8_lossy(&output.stdout);
        println!(
            "cargo:rustc-link-search=framework={}/System/Library/Frameworks",
            sdk_path.trim()
        );
    }
}

fn link_webkitgtk() {
    // WebKitGTK ships the C API in a shared library
    println!("cargo:rustc-link-lib=dylib=javascriptcoregtk-4.1");
}

fn link_bun_webkit(os: &str, arch: &str) {
    let webkit_dir = fetch_bun_webkit(os, arch);
    let lib_dir = locate_lib_dir(&webkit_dir);
    println!("cargo:rustc-link-search=native={}", lib_dir.display());

    println!("cargo:rustc-link-lib=static=JavaScriptCore");
    println!("cargo:rustc-link-lib=static=WTF");

    // Some Windows builds fold bmalloc into WTF
    if has_static_lib(&lib_dir, "bmalloc") {
        println!("cargo:rustc-link-lib=static=bmalloc");
        println!("cargo:rustc-cfg=has_bmalloc");
    }

    let icu: &[&str] = if has_static_lib(&lib_dir, "icudata") {
        &["icudata", "icui18n", "icuuc"]
    } else if has_static_lib(&lib_dir, "sicudt") {
        &["sicudt", "sicuin", "sicuuc"]
    } else {
        println!("cargo:warning=ICU libraries not found in {}", lib_dir.display());
        &[]
    };
    for lib in icu {
        println!("cargo:rustc-link-lib=static={lib}");
    }

    if os == "linux" {
        for lib in ["stdc++", "atomic", "dl", "pthread", "m"] {
            println!("cargo:rustc-link-lib={lib}");
        }
    }

    let include_dir = webkit_dir.join("include");
    if include_dir.exists() {
        println!("cargo:include={}", include_dir.display());
    }
}

fn link_windows_system_libs() {
    for lib in [
        "winmm", "bcrypt", "ntdll", "userenv", "dbghelp", "crypt32", "wsock32", "ws2_32",
        "advapi32", "ole32", "oleaut32", "uuid", "shell32",
    ] {
        println!("cargo:rustc-link-lib={lib}");
    }
    println!("cargo:rustc-link-arg=/NODEFAULTLIB:libcmt");
    println!("cargo:rustc-link-lib=msvcrt");
}

fn fetch_bun_webkit(os: &str, arch: &str) -> PathBuf {
    let version =
        env::var("BUN_WEBKIT_VERSION").unwrap_or_else(|_| BUN_WEBKIT_VERSION.to_string());
    let target_dir = cache_root().join(&version).join(format!("{os}-{arch}"));
    let marker = target_dir.join(".downloaded");
    if marker.exists() {
        return target_dir;
    }

    let url = format!(
        "https://github.com/oven-sh/WebKit/releases/download/autobuild-{version}/bun-webkit-{os}-{arch}.tar.gz"
    );
    println!("cargo:warning=Downloading bun-webkit from {url}");

    fs::create_dir_all(&target_dir)
        .unwrap_or_else(|e| panic!("cannot create {}: {e}", target_dir.display()));

    let response = ureq::get(&url)
        .call()
        .unwrap_or_else(|e| panic!("bun-webkit download failed ({url}): {e}"));

    // Stream straight into the decoder; the archive is several hundred MB
    let decoder = flate2::read::GzDecoder::new(response.into_body().into_reader());
    tar::Archive::new(decoder)
        .unpack(&target_dir)
        .unwrap_or_else(|e| panic!("cannot unpack bun-webkit: {e}"));

    fs::write(&marker, "").unwrap_or_else(|e| panic!("cannot write download marker: {e}"));
    target_dir
}

fn locate_lib_dir(webkit_dir: &Path) -> PathBuf {
    let direct = webkit_dir.join("lib");
    if direct.exists() {
        return direct;
    }

    fs::read_dir(webkit_dir)
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path().join("lib"))
        .find(|candidate| candidate.is_dir())
        .unwrap_or_else(|| webkit_dir.to_path_buf())
}

fn has_static_lib(lib_dir: &Path, name: &str) -> bool {
    let prefixed = format!("lib{name}");
    fs::read_dir(lib_dir)
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .any(|file| {
            (file.starts_with(name) || file.starts_with(&prefixed))
                && (file.ends_with(".a") || file.ends_with(".lib"))
        })
}

fn cache_root() -> PathBuf {
    if let Ok(dir) = env::var("JSC_RAII_WEBKIT_CACHE") {
        return PathBuf::from(dir);
    }

    let home = env::var("CARGO_HOME").map(PathBuf::from).or_else(|_| {
        env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map(|home| PathBuf::from(home).join(".cargo"))
    });

    match home {
        Ok(base) => base.join("cache").join("bun-webkit"),
        Err(_) => PathBuf::from(env::var("OUT_DIR").unwrap_or_default()).join("bun-webkit-cache"),
    }
}
