//! Directory scanner: discover image files to feed the grid.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::debug::dbg_log;
use crate::decoder::Codec;

/// Strip Windows extended-length path prefix (`\\?\`) if present.
pub fn clean_path(s: &str) -> String {
    s.strip_prefix(r"\\?\").unwrap_or(s).to_string()
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif", "ico", "tga", "pnm", "qoi",
];

pub fn is_image_ext(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Walk `root` and return up to `limit` image paths in a stable order.
///
/// A file counts as an image when it has a known extension and the codec
/// can read its dimensions from the header.
pub fn discover(root: &Path, codec: &dyn Codec, limit: usize) -> Vec<PathBuf> {
    let mut found = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if found.len() >= limit {
            break;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !is_image_ext(ext) {
            continue;
        }

        match codec.probe(path) {
            Ok(dims) if !dims.is_empty() => {}
            Ok(_) => continue,
            Err(e) => {
                dbg_log!("scan: skip {}", e);
                continue;
            }
        }

        let abs = path
            .canonicalize()
            .map(|p| PathBuf::from(clean_path(&p.to_string_lossy())))
            .unwrap_or_else(|_| path.to_path_buf());
        found.push(abs);
    }

    dbg_log!("scan: {} images under {}", found.len(), root.display());
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::FileCodec;
    use image::RgbaImage;

    fn png(dir: &Path, name: &str) {
        RgbaImage::new(4, 3).save(dir.join(name)).unwrap();
    }

    fn file_names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    // ── extension filtering ─────────────────────────────────────────────

    #[test]
    fn image_ext_case_insensitive() {
        assert!(is_image_ext("JPG"));
        assert!(is_image_ext("Png"));
        assert!(is_image_ext("webp"));
    }

    #[test]
    fn non_image_ext_rejected() {
        for ext in &["txt", "mp4", "rs", "", "json", "svg"] {
            assert!(!is_image_ext(ext), "{} should NOT be an image", ext);
        }
    }

    #[test]
    fn clean_path_strips_verbatim_prefix() {
        assert_eq!(clean_path(r"\\?\C:\photos"), r"C:\photos");
        assert_eq!(clean_path("/home/me"), "/home/me");
    }

    // ── discover ────────────────────────────────────────────────────────

    #[test]
    fn discover_recurses_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        png(dir.path(), "b.png");
        png(dir.path(), "a.png");
        png(&dir.path().join("sub"), "c.png");

        let found = discover(dir.path(), &FileCodec, usize::MAX);
        assert_eq!(file_names(&found), vec!["a.png", "b.png", "c.png"]);
        assert!(found.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn discover_skips_undecodable_files() {
        let dir = tempfile::tempdir().unwrap();
        png(dir.path(), "ok.png");
        std::fs::write(dir.path().join("fake.jpg"), b"not a jpeg").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let found = discover(dir.path(), &FileCodec, usize::MAX);
        assert_eq!(file_names(&found), vec!["ok.png"]);
    }

    #[test]
    fn discover_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.png", "2.png", "3.png"] {
            png(dir.path(), name);
        }
        assert_eq!(discover(dir.path(), &FileCodec, 2).len(), 2);
    }

    #[test]
    fn discover_empty_or_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(dir.path(), &FileCodec, usize::MAX).is_empty());
        assert!(discover(&dir.path().join("nope"), &FileCodec, usize::MAX).is_empty());
    }
}
