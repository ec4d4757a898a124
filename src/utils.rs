use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Images below `dir`, sorted by path. Not recursive.
pub fn get_all_images(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_valid_image(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// A file with an image extension and a non-zero size.
pub fn is_valid_image(path: &Path) -> bool {
    let ext_valid = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    };

    let size_valid = match fs::metadata(path) {
        Ok(metadata) => metadata.len() != 0,
        Err(_) => false,
    };

    ext_valid && size_valid
}

/// The source itself when it is a file, otherwise the images it contains.
pub fn collect_sources(source: &Path) -> io::Result<Vec<PathBuf>> {
    if source.is_dir() {
        get_all_images(source)
    } else {
        Ok(vec![source.to_path_buf()])
    }
}
