#[cfg(test)]
pub(crate) fn workspace_dir() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("Failed to go up two directories")
        .to_path_buf()
}

#[cfg(test)]
pub(crate) fn get_playback_lib() -> std::path::PathBuf {
    let lib_name = {
        #[cfg(target_os = "windows")]
        {
            "playback_lib.dll"
        }
        #[cfg(target_os = "macos")]
        {
            "libplayback_lib.dylib"
        }
        #[cfg(all(not(target_os = "windows"), not(target_os = "macos")))]
        {
            "libplayback_lib.so"
        }
    };
    let full_path = workspace_dir().join("target").join("debug").join(lib_name);
    assert!(
        full_path.exists(),
        "Library file does not exist: {:?}",
        full_path
    );
    full_path
}

#[cfg(test)]
pub(crate) fn get_test_data_file(name: &str) -> std::path::PathBuf {
    workspace_dir().join("data").join(name)
}
