//! File loaders: turn a path on disk into plain UTF-8 text.
//!
//! The [`LoaderRegistry`] maps lowercase file extensions to [`Loader`]
//! implementations. Text-like extensions come from `[loaders]` in the
//! config; `.pdf` is always handled by [`PdfLoader`]. Anything else is
//! rejected with [`MemoryError::UnsupportedType`] before any work is done.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use vector_memory_core::models::Document;
use vector_memory_core::MemoryError;

use crate::config::LoadersConfig;

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_PDF: &str = "application/pdf";

/// Extracts the textual content of one kind of file.
pub trait Loader: Send + Sync {
    /// MIME type recorded in each chunk's metadata.
    fn content_type(&self) -> &str;

    /// Read `path` and return its text. The registry attaches the path to
    /// any error.
    fn load(&self, path: &Path) -> Result<String>;
}

/// Reads the file as UTF-8.
pub struct TextLoader;

impl Loader for TextLoader {
    fn content_type(&self) -> &str {
        MIME_TEXT
    }

    fn load(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)?;
        String::from_utf8(bytes).context("file is not valid UTF-8 text")
    }
}

/// Extracts the text layer of a PDF with `pdf-extract`.
pub struct PdfLoader;

impl Loader for PdfLoader {
    fn content_type(&self) -> &str {
        MIME_PDF
    }

    fn load(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)?;
        pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| anyhow!("PDF extraction failed: {}", e))
    }
}

#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: BTreeMap<String, Arc<dyn Loader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LoadersConfig) -> Self {
        let mut registry = Self::new();
        let text: Arc<dyn Loader> = Arc::new(TextLoader);
        for ext in &config.text_extensions {
            registry.register(ext, Arc::clone(&text));
        }
        registry.register("pdf", Arc::new(PdfLoader));
        registry
    }

    /// Register `loader` for `extension` (leading dot optional, case-insensitive).
    pub fn register(&mut self, extension: &str, loader: Arc<dyn Loader>) {
        let key = extension.trim_start_matches('.').to_lowercase();
        if !key.is_empty() {
            self.loaders.insert(key, loader);
        }
    }

    /// Supported extensions, sorted.
    pub fn supported(&self) -> Vec<String> {
        self.loaders.keys().cloned().collect()
    }

    /// Pick the loader for `path` by extension.
    pub fn resolve(&self, path: &Path) -> std::result::Result<Arc<dyn Loader>, MemoryError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        extension
            .as_deref()
            .and_then(|ext| self.loaders.get(ext))
            .cloned()
            .ok_or_else(|| MemoryError::UnsupportedType {
                path: path.to_path_buf(),
                extension,
                supported: self.supported(),
            })
    }

    /// Load `path` into a [`Document`] keyed by `source_path`.
    pub fn load_document(
        &self,
        path: &Path,
        source_path: &str,
    ) -> std::result::Result<Document, MemoryError> {
        let loader = self.resolve(path)?;
        let text = loader.load(path).map_err(|e| MemoryError::Load {
            path: path.to_path_buf(),
            message: format!("{:#}", e),
        })?;
        Ok(Document {
            source_path: source_path.to_string(),
            content_type: loader.content_type().to_string(),
            text,
        })
    }
}
