use std::{
    io,
    path::{Component, Path, PathBuf},
};

use crate::constants::{IMAGE_EXTENSIONS, RECIPE_UPLOAD_DIR};

/// Uploaded files on the local filesystem, addressed by a name relative to
/// `root` and published under `base_url`.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    base_url: String,
}

impl MediaStorage {
    pub fn new<P: Into<PathBuf>>(root: P, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Only plain relative names are accepted, so nothing lands outside `root`.
    fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        let relative = Path::new(name);
        let plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

        if name.is_empty() || !plain {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid media name {name:?}"),
            ));
        }

        Ok(self.root.join(relative))
    }

    pub async fn save(&self, name: &str, content: &[u8]) -> io::Result<()> {
        let path = self.resolve(name)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&path, content).await?;
        log::debug!("Stored {} bytes at {}", content.len(), path.display());
        Ok(())
    }

    /// Missing files are not an error.
    pub async fn delete(&self, name: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.resolve(name)?).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    pub fn url(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            name.trim_start_matches('/')
        )
    }
}

/// Lower-cased extension of an uploaded file name with the image format it
/// promises, if it is an accepted type.
pub fn image_extension(filename: &str) -> Option<(String, &'static str)> {
    let (_, extension) = filename.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();

    IMAGE_EXTENSIONS
        .iter()
        .find(|(known, _)| *known == extension)
        .map(|(_, format)| (extension, *format))
}

/// Image format recognised from the leading magic bytes.
pub fn sniff_image_format(content: &[u8]) -> Option<&'static str> {
    match content {
        [0xFF, 0xD8, 0xFF, ..] => Some("jpeg"),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("png"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("webp"),
        _ => None,
    }
}

/// Fresh storage name for a recipe image.
pub fn recipe_image_name(extension: &str) -> String {
    format!("{RECIPE_UPLOAD_DIR}/{}.{extension}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("photo.jpg", Some(("jpg", "jpeg")))]
    #[case("photo.JPEG", Some(("jpeg", "jpeg")))]
    #[case("archive.tar.png", Some(("png", "png")))]
    #[case("anim.gif", Some(("gif", "gif")))]
    #[case("notes.txt", None)]
    #[case("no_extension", None)]
    fn accepted_image_extensions(
        #[case] filename: &str,
        #[case] expected: Option<(&str, &str)>,
    ) {
        let found = image_extension(filename);
        assert_eq!(
            found.as_ref().map(|(ext, format)| (ext.as_str(), *format)),
            expected
        );
    }

    #[rstest]
    #[case(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00], Some("jpeg"))]
    #[case(b"\x89PNG\r\n\x1a\n rest", Some("png"))]
    #[case(b"GIF89a....", Some("gif"))]
    #[case(b"RIFF\x00\x00\x00\x00WEBPVP8 ", Some("webp"))]
    #[case(b"plain text", None)]
    #[case(b"", None)]
    fn magic_bytes(#[case] content: &[u8], #[case] expected: Option<&str>) {
        assert_eq!(sniff_image_format(content), expected);
    }

    #[test]
    fn image_names_are_unique_and_scoped() {
        let a = recipe_image_name("png");
        let b = recipe_image_name("png");

        assert!(a.starts_with("uploads/recipe/"));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
    }

    #[test]
    fn urls_join_cleanly() {
        let storage = MediaStorage::new("/tmp", "/media/");
        assert_eq!(storage.url("uploads/recipe/x.png"), "/media/uploads/recipe/x.png");

        let storage = MediaStorage::new("/tmp", "https://cdn.example.com/media");
        assert_eq!(
            storage.url("/uploads/x.png"),
            "https://cdn.example.com/media/uploads/x.png"
        );
    }

    #[tokio::test]
    async fn save_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path(), "/media/");

        storage.save("uploads/recipe/a.png", b"png").await.unwrap();
        let path = dir.path().join("uploads/recipe/a.png");
        assert_eq!(std::fs::read(&path).unwrap(), b"png");

        storage.delete("uploads/recipe/a.png").await.unwrap();
        assert!(!path.exists());
        storage.delete("uploads/recipe/a.png").await.unwrap();
    }

    #[tokio::test]
    async fn traversal_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path(), "/media/");

        assert!(storage.save("../escape.png", b"x").await.is_err());
        assert!(storage.save("/etc/escape.png", b"x").await.is_err());
    }
}
