use std::env;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");
    println!("cargo:rerun-if-env-changed=VCPKG_ROOT");

    let wants_ffmpeg = env::var_os("CARGO_FEATURE_FFMPEG").is_some();
    let on_windows = env::var("CARGO_CFG_TARGET_OS").is_ok_and(|os| os == "windows");
    if !wants_ffmpeg || !on_windows || env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    // ffmpeg-sys-next finds nothing on Windows without FFMPEG_DIR.
    let candidate = env::var("VCPKG_ROOT")
        .map(|root| Path::new(&root).join("installed").join("x64-windows"))
        .ok()
        .filter(|path| path.exists());
    match candidate {
        Some(path) => println!(
            "cargo:warning=FFMPEG_DIR is not set; vcpkg FFmpeg found at {}, export FFMPEG_DIR to use it.",
            path.display()
        ),
        None => println!(
            "cargo:warning=FFMPEG_DIR is not set; the ffmpeg feature needs FFmpeg development libraries (e.g. `vcpkg install ffmpeg`)."
        ),
    }
}
