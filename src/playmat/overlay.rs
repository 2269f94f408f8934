use image::RgbaImage;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};
use tracing::{debug, info, warn};

use super::error::PlaymatError;
use super::geometry::RESAMPLE_FILTER;
use super::types::CanvasSize;

const TEMPLATE_SUFFIX: &str = "_lines.png";
const MAX_SELECTOR_LEN: usize = 64;

/// Check that an overlay selector is a single safe path segment.
///
/// Accepts ASCII letters, digits, `-`, `_` and `.`, so names like `white.v2` work.
/// A leading `.` and any `..` are refused, which together with the missing
/// separators keeps lookups inside the template directory.
pub fn validate_selector(selector: &str) -> Result<(), PlaymatError> {
    let valid = !selector.is_empty()
        && selector.len() <= MAX_SELECTOR_LEN
        && !selector.starts_with('.')
        && !selector.contains("..")
        && selector
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(PlaymatError::InvalidOverlay(selector.to_string()))
    }
}

/// Overlay templates loaded from `<directory>/<selector>_lines.png`.
///
/// Templates are resized to the canvas once and cached; cached entries are never mutated.
pub struct OverlayStore {
    directory: PathBuf,
    canvas: CanvasSize,
    cache: RwLock<HashMap<String, Arc<RgbaImage>>>,
}

impl OverlayStore {
    pub fn new(directory: PathBuf, canvas: CanvasSize) -> Self {
        Self {
            directory,
            canvas,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn template_path(&self, selector: &str) -> PathBuf {
        self.directory.join(format!("{}{}", selector, TEMPLATE_SUFFIX))
    }

    /// Fetch the canvas-sized overlay for `selector`, loading it on first use.
    pub fn get(&self, selector: &str) -> Result<Arc<RgbaImage>, PlaymatError> {
        validate_selector(selector)?;

        if let Some(cached) = self.cached(selector)? {
            return Ok(cached);
        }

        let path = self.template_path(selector);
        if !path.is_file() {
            debug!("Overlay template missing at {:?}", path);
            return Err(PlaymatError::OverlayNotFound(selector.to_string()));
        }

        let overlay = Arc::new(self.load(&path)?);

        let mut cache = self
            .cache
            .write()
            .map_err(|_| PlaymatError::Internal("overlay cache lock poisoned".to_string()))?;
        // Another thread may have loaded it meanwhile; keep the first entry
        let entry = cache
            .entry(selector.to_string())
            .or_insert_with(|| overlay.clone());
        Ok(entry.clone())
    }

    /// Selectors with a template file on disk, sorted.
    pub fn available(&self) -> Result<Vec<String>, PlaymatError> {
        let mut selectors = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if let Some(selector) = file_name.strip_suffix(TEMPLATE_SUFFIX)
                && validate_selector(selector).is_ok()
                && entry.path().is_file()
            {
                selectors.push(selector.to_string());
            }
        }
        selectors.sort();
        Ok(selectors)
    }

    /// Load every template on disk into the cache. Returns how many are cached.
    pub fn warm(&self) -> usize {
        let selectors = match self.available() {
            Ok(selectors) => selectors,
            Err(e) => {
                warn!(
                    "Unable to list overlay directory {:?}: {}",
                    self.directory, e
                );
                return 0;
            }
        };

        let mut loaded = 0;
        for selector in selectors {
            match self.get(&selector) {
                Ok(_) => loaded += 1,
                Err(e) => warn!("Failed to preload overlay '{}': {}", selector, e),
            }
        }
        info!("Preloaded {} overlay template(s)", loaded);
        loaded
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }

    fn cached(&self, selector: &str) -> Result<Option<Arc<RgbaImage>>, PlaymatError> {
        let cache = self
            .cache
            .read()
            .map_err(|_| PlaymatError::Internal("overlay cache lock poisoned".to_string()))?;
        Ok(cache.get(selector).cloned())
    }

    fn load(&self, path: &Path) -> Result<RgbaImage, PlaymatError> {
        let overlay = image::open(path)?.to_rgba8();
        debug!(
            "Loaded overlay {:?} at {}x{}",
            path,
            overlay.width(),
            overlay.height()
        );

        if overlay.dimensions() == self.canvas.dimensions() {
            Ok(overlay)
        } else {
            Ok(image::imageops::resize(
                &overlay,
                self.canvas.width,
                self.canvas.height,
                RESAMPLE_FILTER,
            ))
        }
    }
}
