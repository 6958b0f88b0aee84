use image::GrayImage;
use log::warn;
use std::path::PathBuf;

/// Receives named intermediate buffers while an image moves through the pipeline.
pub trait DebugSink: Send + Sync {
    fn record(&self, name: &str, image: &GrayImage);
}

pub struct NoopSink;

impl DebugSink for NoopSink {
    fn record(&self, _name: &str, _image: &GrayImage) {}
}

impl<F> DebugSink for F
where
    F: Fn(&str, &GrayImage) + Send + Sync,
{
    fn record(&self, name: &str, image: &GrayImage) {
        self(name, image)
    }
}

/// Writes every buffer as `debug_<name>.png` under a directory.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(DirectorySink { dir })
    }
}

impl DebugSink for DirectorySink {
    fn record(&self, name: &str, image: &GrayImage) {
        let path = self.dir.join(format!("debug_{}.png", name));
        if let Err(e) = image.save(&path) {
            warn!("Failed to write debug image {}: {}", path.display(), e);
        }
    }
}
