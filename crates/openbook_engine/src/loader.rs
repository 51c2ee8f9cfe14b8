use std::io::Read;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use openbook_domain::{LoadError, SourceDocument};
use tracing::{debug, warn};

/// Loading strategy for a corpus file, resolved from its extension.
///
/// `Unsupported` is an explicit outcome rather than a silent omission so
/// skip decisions are observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    OfficeDocument,
    Unsupported,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" | "md" => Self::PlainText,
            "pdf" => Self::Pdf,
            "docx" => Self::OfficeDocument,
            _ => Self::Unsupported,
        }
    }
}

/// A file the loader could not read or parse. The rest of the corpus is
/// unaffected.
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: LoadError,
}

/// Outcome of loading a corpus directory
#[derive(Debug, Default)]
pub struct CorpusLoad {
    pub documents: Vec<SourceDocument>,
    pub failures: Vec<LoadFailure>,
    /// Files with unsupported extensions, left out of the corpus
    pub skipped: Vec<PathBuf>,
}

/// Reads every regular file under a corpus directory and extracts one
/// `SourceDocument` per supported file.
///
/// A single bad file is reported in `failures` and skipped; only an
/// unreadable corpus directory fails the whole load.
#[derive(Debug, Clone, Default)]
pub struct CorpusLoader;

impl CorpusLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load(&self, dir: &Path) -> Result<CorpusLoad, LoadError> {
        if let Err(source) = std::fs::read_dir(dir) {
            return Err(LoadError::Directory { path: dir.to_path_buf(), source });
        }

        // Sorted for a deterministic document (and therefore chunk) order.
        let mut files: Vec<PathBuf> = WalkBuilder::new(dir)
            .standard_filters(true)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(|entry| entry.into_path())
            .collect();
        files.sort();

        let mut load = CorpusLoad::default();
        for path in files {
            let format = DocumentFormat::from_path(&path);
            if format == DocumentFormat::Unsupported {
                debug!(path = %path.display(), "skipping unsupported file");
                load.skipped.push(path);
                continue;
            }

            match extract_text(&path, format) {
                Ok(raw_text) => {
                    let source_id = path
                        .strip_prefix(dir)
                        .unwrap_or(&path)
                        .to_string_lossy()
                        .to_string();
                    debug!(path = %path.display(), chars = raw_text.chars().count(), "loaded document");
                    load.documents.push(SourceDocument::new(source_id, raw_text));
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "failed to load corpus file");
                    load.failures.push(LoadFailure { path, error });
                }
            }
        }

        Ok(load)
    }
}

fn extract_text(path: &Path, format: DocumentFormat) -> Result<String, LoadError> {
    match format {
        DocumentFormat::PlainText => std::fs::read_to_string(path).map_err(|source| {
            LoadError::Io { path: path.to_path_buf(), source }
        }),
        DocumentFormat::Pdf => extract_pdf(path),
        DocumentFormat::OfficeDocument => extract_docx(path),
        DocumentFormat::Unsupported => Err(LoadError::Extraction {
            path: path.to_path_buf(),
            reason: "unsupported format".to_string(),
        }),
    }
}

fn extract_pdf(path: &Path) -> Result<String, LoadError> {
    pdf_extract::extract_text(path).map_err(|e| LoadError::Extraction {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// A .docx file is a zip archive; the text lives in `word/document.xml`.
/// Collect the XML text nodes and terminate each `w:p` paragraph with a
/// newline.
fn extract_docx(path: &Path) -> Result<String, LoadError> {
    let extraction = |reason: String| LoadError::Extraction {
        path: path.to_path_buf(),
        reason,
    };

    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| extraction(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| extraction(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| extraction(e.to_string()))?;

    let mut reader = quick_xml::Reader::from_str(&xml);
    let mut text = String::new();
    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Text(t)) => {
                let unescaped = t.unescape().map_err(|e| extraction(e.to_string()))?;
                text.push_str(&unescaped);
            }
            Ok(quick_xml::events::Event::End(e)) if e.local_name().as_ref() == b"p" => {
                text.push('\n');
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(extraction(e.to_string())),
        }
    }
    Ok(text)
}
