//! Sample store - durable file-per-sample persistence
//!
//! Label JSON lives under `<root>/labels/<id>.json`, the resized image copy
//! under `<root>/images/<id>.jpg`. No transactional isolation: concurrent
//! writers to the same id race, last write wins.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use tracing::{debug, info};

use super::TrainingSample;
use crate::error::{MlError, MlResult};

/// Side length of the stored square image copy
pub const IMAGE_SIZE: u32 = 224;

/// Fixed JPEG quality for stored images. Part of the deterministic
/// resize policy: same input bytes always produce the same output.
pub const JPEG_QUALITY: u8 = 80;

/// Filesystem-backed repository of (image, label, metadata) samples
#[derive(Debug, Clone)]
pub struct SampleStore {
    root: PathBuf,
}

impl SampleStore {
    /// Open a store rooted at `root`, creating its layout if absent
    pub fn open(root: impl Into<PathBuf>) -> MlResult<Self> {
        let store = Self { root: root.into() };
        std::fs::create_dir_all(store.labels_dir())?;
        std::fs::create_dir_all(store.images_dir())?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn labels_dir(&self) -> PathBuf {
        self.root.join("labels")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    fn label_path(&self, id: &str) -> PathBuf {
        self.labels_dir().join(format!("{id}.json"))
    }

    /// Path where the image copy for `id` is stored
    pub fn image_path(&self, id: &str) -> PathBuf {
        self.images_dir().join(format!("{id}.jpg"))
    }

    /// Serialize a sample to its label file, creating parent dirs idempotently
    pub fn write(&self, sample: &TrainingSample) -> MlResult<()> {
        std::fs::create_dir_all(self.labels_dir())?;
        let json = serde_json::to_string_pretty(sample)?;
        std::fs::write(self.label_path(&sample.id), json)?;
        debug!(sample_id = %sample.id, "wrote sample label file");
        Ok(())
    }

    /// Decode, crop-to-cover resize to 224x224 and re-encode as JPEG.
    ///
    /// Resize policy is fixed: `resize_to_fill` with triangle filtering at
    /// JPEG quality 80, so the transform is reproducible across runs.
    pub fn write_image(&self, id: &str, raw: &[u8]) -> MlResult<PathBuf> {
        let decoded = image::load_from_memory(raw)
            .map_err(|e| MlError::ImageDecode(e.to_string()))?;
        let resized = decoded.resize_to_fill(IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle);

        std::fs::create_dir_all(self.images_dir())?;
        let path = self.image_path(id);
        let mut out = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut out);
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
        resized.write_with_encoder(encoder)?;
        std::fs::write(&path, out)?;
        info!(sample_id = %id, "stored {}x{} image copy", IMAGE_SIZE, IMAGE_SIZE);
        Ok(path)
    }

    /// Load a sample by id
    pub fn read(&self, id: &str) -> MlResult<TrainingSample> {
        let path = self.label_path(id);
        if !path.exists() {
            return Err(MlError::sample_not_found(id));
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Read-modify-write of a single sample's label file
    pub fn update<F>(&self, id: &str, mutator: F) -> MlResult<TrainingSample>
    where
        F: FnOnce(&mut TrainingSample),
    {
        let mut sample = self.read(id)?;
        mutator(&mut sample);
        self.write(&sample)?;
        Ok(sample)
    }

    /// Enumerate stored sample ids
    pub fn list(&self) -> MlResult<Vec<String>> {
        let dir = self.labels_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Number of stored samples
    pub fn count(&self) -> MlResult<usize> {
        Ok(self.list()?.len())
    }

    /// Number of stored image copies
    pub fn image_count(&self) -> MlResult<usize> {
        let dir = self.images_dir();
        if !dir.exists() {
            return Ok(0);
        }
        let mut count = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "jpg").unwrap_or(false) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Load every stored sample, skipping files that fail to parse
    pub fn load_all(&self) -> MlResult<Vec<TrainingSample>> {
        let mut samples = Vec::new();
        for id in self.list()? {
            match self.read(&id) {
                Ok(sample) => samples.push(sample),
                Err(e) => debug!(sample_id = %id, "skipping unreadable sample: {e}"),
            }
        }
        Ok(samples)
    }
}
