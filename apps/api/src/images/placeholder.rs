//! Terminal placeholder. `resolve` has no error path: if the placeholder file cannot
//! be found or synthesized, a fixed remote URL is returned instead.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use tracing::warn;

use crate::images::ProviderResult;

/// Used only when the local placeholder cannot be produced.
pub const STATIC_PLACEHOLDER_URL: &str = "https://placehold.co/1080x1080/png?text=Image";
pub const PLACEHOLDER_FILE: &str = "placeholder.png";

const SIZE: u32 = 1080;
const BACKGROUND: Rgb<u8> = Rgb([0xf0, 0xf0, 0xf0]);
const FOREGROUND: Rgb<u8> = Rgb([0x66, 0x66, 0x66]);

pub struct PlaceholderImage {
    dir: PathBuf,
    base_url: String,
}

impl PlaceholderImage {
    pub fn new(dir: PathBuf, base_url: String) -> Self {
        Self { dir, base_url }
    }

    /// URL of the local placeholder once it exists.
    pub fn local_url(&self) -> String {
        format!("{}/images/{PLACEHOLDER_FILE}", self.base_url)
    }

    /// Reuses `placeholder.png` if present, otherwise draws it.
    pub async fn resolve(&self) -> ProviderResult {
        let path = self.dir.join(PLACEHOLDER_FILE);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return self.local(path);
        }

        let target = path.clone();
        let drawn = tokio::task::spawn_blocking(move || draw_placeholder(&target))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r);

        match drawn {
            Ok(()) => self.local(path),
            Err(e) => {
                warn!(error = %e, "Placeholder synthesis failed, using static URL");
                ProviderResult {
                    image_url: STATIC_PLACEHOLDER_URL.to_string(),
                    local_path: None,
                    error: Some(format!("placeholder synthesis failed: {e}")),
                }
            }
        }
    }

    fn local(&self, path: PathBuf) -> ProviderResult {
        ProviderResult {
            image_url: self.local_url(),
            local_path: Some(path),
            error: None,
        }
    }
}

/// Light grey square with a framed picture mark in the middle.
fn draw_placeholder(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
    }

    let (lo, hi) = (SIZE * 3 / 8, SIZE * 5 / 8);
    let stroke = 12;

    let canvas = RgbImage::from_fn(SIZE, SIZE, |x, y| {
        let inside = (lo..hi).contains(&x) && (lo..hi).contains(&y);
        let on_frame = inside
            && (x < lo + stroke || x >= hi - stroke || y < lo + stroke || y >= hi - stroke);
        // Diagonal "mountain" line across the lower half of the frame.
        let on_mark = inside && y > SIZE / 2 && x.abs_diff(y) < stroke / 2;
        if on_frame || on_mark {
            FOREGROUND
        } else {
            BACKGROUND
        }
    });

    canvas
        .save(path)
        .map_err(|e| format!("cannot save {}: {e}", path.display()))
}
