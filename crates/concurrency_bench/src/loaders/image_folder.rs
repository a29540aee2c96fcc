use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use walkdir::WalkDir;

use crate::dataset::{Dataset, Label, VectorShape};
use crate::error::HarnessError;

/// Tiny ImageNet images are 64x64 RGB.
pub const TINY_IMAGENET_SHAPE: VectorShape = VectorShape::new(64, 64, 3);

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Loads every image below `dir`, labelled by its parent directory name.
///
/// Images are converted to RGB and must already be `shape.height x shape.width`;
/// pixels are stored interleaved (`r, g, b, r, g, b, ...`) and normalized to
/// `[0, 1]`. Files are visited in sorted path order so the dataset order is
/// stable across loads.
pub fn load_image_folder(dir: impl AsRef<Path>, shape: VectorShape) -> Result<Dataset> {
    let dir = dir.as_ref();
    if shape.channels != 3 {
        return Err(HarnessError::load(dir, "only 3-channel RGB shapes are supported").into());
    }
    if !dir.is_dir() {
        return Err(HarnessError::load(dir, "not a directory").into());
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| HarnessError::load(dir, e.to_string()))?;
        if entry.file_type().is_file() && has_image_extension(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    if paths.is_empty() {
        return Err(HarnessError::load(dir, "no .jpg or .png images found").into());
    }
    info!(dir = %dir.display(), images = paths.len(), "Loading image folder");

    // One shared allocation per class name.
    let mut names: HashMap<String, Arc<str>> = HashMap::new();
    let mut vectors = Vec::with_capacity(paths.len());
    let mut labels = Vec::with_capacity(paths.len());

    for path in paths {
        vectors.push(load_image(&path, shape)?);

        let class = class_name(&path);
        let name = names
            .entry(class.clone())
            .or_insert_with(|| Arc::from(class.as_str()));
        labels.push(Label::Name(Arc::clone(name)));
    }

    Dataset::new(vectors, labels, shape)
}

fn load_image(path: &Path, shape: VectorShape) -> Result<Vec<f32>> {
    let image = image::open(path)
        .map_err(|e| HarnessError::load(path, format!("failed to decode image: {}", e)))?
        .to_rgb8();

    let (width, height) = image.dimensions();
    if width as usize != shape.width || height as usize != shape.height {
        return Err(HarnessError::load(
            path,
            format!(
                "image is {}x{}, expected {}x{}",
                width, height, shape.width, shape.height
            ),
        )
        .into());
    }

    Ok(image
        .into_raw()
        .into_iter()
        .map(|b| b as f32 / 255.0)
        .collect())
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| {
            IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str())
        })
}

fn class_name(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
