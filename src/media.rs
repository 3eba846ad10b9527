use std::io::{Cursor, ErrorKind};
use std::path::{Component, Path, PathBuf};

use image::error::ImageError;
use image::io::{Limits, Reader};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::io::AsyncWriteExt;

/// Directory (relative to the media root) that post images are written to.
pub const POST_IMAGE_DIR: &str = "posts";

/// Largest accepted width or height, in pixels.
pub const MAX_IMAGE_SIDE: u32 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    InvalidImage,

    #[error("The submitted file is empty.")]
    Empty,

    #[error("Upload an image no larger than {max}x{max} pixels.", max = MAX_IMAGE_SIDE)]
    TooLarge,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Uploaded files on local disk, addressed by paths relative to `root`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Validate and store a post image. Returns the stored relative path,
    /// e.g. `posts/small.gif`.
    pub async fn save_post_image(&self, file_name: &str, data: &[u8]) -> Result<String, MediaError> {
        if data.is_empty() {
            return Err(MediaError::Empty);
        }
        let header = data.to_vec();
        tokio::task::spawn_blocking(move || validate_image(&header))
            .await
            .map_err(|e| std::io::Error::new(ErrorKind::Other, e))??;

        let dir = self.root.join(POST_IMAGE_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let mut name = sanitize_file_name(file_name);
        let mut file = loop {
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(dir.join(&name))
                .await;
            match opened {
                Ok(file) => break file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    name = with_random_suffix(&name);
                }
                Err(e) => return Err(e.into()),
            }
        };

        file.write_all(data).await?;
        file.flush().await?;
        tracing::info!("Stored upload {}/{}", POST_IMAGE_DIR, name);
        Ok(format!("{POST_IMAGE_DIR}/{name}"))
    }

    /// Absolute path for a stored relative path. `None` for anything that
    /// could escape the media root.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || relative.as_os_str().is_empty() {
            return None;
        }
        Some(self.root.join(relative))
    }
}

/// Public URL of a stored media path.
pub fn media_url(relative: &str) -> String {
    format!("/media/{relative}")
}

/// Recognise the format and read the dimensions from the header without
/// decoding pixel data.
fn validate_image(data: &[u8]) -> Result<(), MediaError> {
    let mut reader = Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|_| MediaError::InvalidImage)?;
    if reader.format().is_none() {
        return Err(MediaError::InvalidImage);
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_SIDE);
    limits.max_image_height = Some(MAX_IMAGE_SIDE);
    reader.limits(limits);

    let (width, height) = reader.into_dimensions().map_err(|e| match e {
        ImageError::Limits(_) => MediaError::TooLarge,
        _ => MediaError::InvalidImage,
    })?;
    if width == 0 || height == 0 {
        return Err(MediaError::InvalidImage);
    }
    if width > MAX_IMAGE_SIDE || height > MAX_IMAGE_SIDE {
        return Err(MediaError::TooLarge);
    }
    Ok(())
}

/// Keep ASCII letters, digits, `.`, `-` and `_`; spaces become `_`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            _ => None,
        })
        .collect();
    let rest = cleaned.trim_start_matches('.');
    if rest.is_empty() {
        "image".to_string()
    } else if rest.len() < cleaned.len() {
        // Nothing of the stem survived; keep the extension
        format!("image.{rest}")
    } else {
        cleaned
    }
}

fn with_random_suffix(name: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect();
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{suffix}.{ext}"),
        _ => format!("{name}_{suffix}"),
    }
}
