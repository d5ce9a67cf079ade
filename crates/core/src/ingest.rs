use crate::chunking::{split_text, ChunkingConfig};
use crate::extractor::{join_page_texts, LopdfExtractor, PdfExtractor};
use crate::models::{Chunk, IngestionOptions, UploadedFile};
use crate::store::VectorStore;
use crate::IngestError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Validates uploads, pulls their text out, and cuts it into chunks.
#[derive(Clone)]
pub struct DocumentProcessor {
    extractor: Arc<dyn PdfExtractor>,
    config: ChunkingConfig,
}

impl DocumentProcessor {
    pub fn new(options: IngestionOptions) -> Result<Self, IngestError> {
        Self::with_extractor(Arc::new(LopdfExtractor), options)
    }

    pub fn with_extractor(
        extractor: Arc<dyn PdfExtractor>,
        options: IngestionOptions,
    ) -> Result<Self, IngestError> {
        let config = ChunkingConfig::from(options);
        config.validate()?;
        Ok(Self { extractor, config })
    }

    pub async fn process(&self, file: &UploadedFile) -> Result<Vec<Chunk>, IngestError> {
        info!(filename = %file.filename, size = file.size(), "processing file");

        if !is_pdf_content_type(file.content_type.as_deref()) {
            let content_type = file.content_type.clone().unwrap_or_default();
            error!(filename = %file.filename, content_type = %content_type, "rejected file type");
            return Err(IngestError::InvalidFileType(content_type));
        }

        let extractor = Arc::clone(&self.extractor);
        let bytes = file.bytes.clone();
        let pages = tokio::task::spawn_blocking(move || extractor.extract_pages(&bytes))
            .await
            .map_err(|join_error| IngestError::PdfParse(join_error.to_string()))?
            .inspect_err(|err| error!(filename = %file.filename, error = %err, "failed to read pdf"))?;

        for page in pages.iter().filter(|page| page.text.trim().is_empty()) {
            debug!(filename = %file.filename, page = page.number, "page has no text");
        }

        let text = join_page_texts(&pages);
        if text.trim().is_empty() {
            warn!(filename = %file.filename, page_count = pages.len(), "pdf has no extractable text");
            return Err(IngestError::NoExtractableText(file.filename.clone()));
        }

        let chunks = split_text(&text, self.config)?
            .into_iter()
            .map(|text| Chunk::new(text, file.filename.clone()))
            .collect::<Vec<_>>();

        info!(filename = %file.filename, chunk_count = chunks.len(), "processed file");
        Ok(chunks)
    }
}

fn is_pdf_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE))
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if has_pdf_extension(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Read a file from disk as if it had been uploaded. Only a `.pdf` extension
/// earns the PDF content type.
pub async fn load_local_file(path: &Path) -> Result<UploadedFile, IngestError> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?
        .to_string();

    let bytes = tokio::fs::read(path).await?;
    let content_type = has_pdf_extension(path).then(|| PDF_CONTENT_TYPE.to_string());

    Ok(UploadedFile {
        filename,
        content_type,
        bytes,
    })
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub files_ingested: usize,
    pub chunks_created: usize,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Ingest a single file or every PDF under a folder.
///
/// Files that fail validation or extraction are skipped and reported; a store
/// failure aborts the run.
pub async fn ingest_path(
    processor: &DocumentProcessor,
    store: &VectorStore,
    path: &Path,
) -> Result<IngestionReport, IngestError> {
    let files = if path.is_dir() {
        discover_pdf_files(path)
    } else {
        vec![path.to_path_buf()]
    };

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            path.display()
        )));
    }

    let mut report = IngestionReport {
        files_ingested: 0,
        chunks_created: 0,
        skipped_files: Vec::new(),
    };

    for file_path in files {
        let processed = match load_local_file(&file_path).await {
            Ok(file) => processor.process(&file).await,
            Err(error) => Err(error),
        };

        match processed {
            Ok(chunks) => {
                store.add(&chunks).await?;
                report.files_ingested += 1;
                report.chunks_created += chunks.len();
            }
            Err(error) => report.skipped_files.push(SkippedPdf {
                path: file_path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::stores::LocalStore;
    use crate::testing::pdf_with_pages;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    fn upload(content_type: Option<&str>, bytes: Vec<u8>) -> UploadedFile {
        UploadedFile {
            filename: "manual.pdf".to_string(),
            content_type: content_type.map(str::to_string),
            bytes,
        }
    }

    fn processor() -> DocumentProcessor {
        DocumentProcessor::new(IngestionOptions::default()).unwrap()
    }

    fn memory_store() -> VectorStore {
        VectorStore::new(
            Arc::new(CharacterNgramEmbedder::default()),
            Arc::new(LocalStore::in_memory()),
        )
    }

    #[tokio::test]
    async fn non_pdf_content_type_is_rejected() {
        let file = upload(Some("text/plain"), b"hello".to_vec());
        let result = processor().process(&file).await;
        assert!(matches!(result, Err(IngestError::InvalidFileType(ref ct)) if ct == "text/plain"));
    }

    #[tokio::test]
    async fn missing_content_type_is_rejected() {
        let file = upload(None, pdf_with_pages(&["text"]));
        let result = processor().process(&file).await;
        assert!(matches!(result, Err(IngestError::InvalidFileType(_))));
    }

    #[tokio::test]
    async fn image_only_pdf_has_no_extractable_text() {
        let file = upload(Some(PDF_CONTENT_TYPE), pdf_with_pages(&["", ""]));
        let result = processor().process(&file).await;
        assert!(matches!(result, Err(IngestError::NoExtractableText(_))));
    }

    #[tokio::test]
    async fn corrupt_pdf_is_an_extraction_error() {
        let file = upload(Some(PDF_CONTENT_TYPE), b"%PDF-1.4\n%broken".to_vec());
        let result = processor().process(&file).await;
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
    }

    #[tokio::test]
    async fn text_pdf_is_chunked_and_tagged_with_filename() {
        let file = upload(
            Some("application/pdf; charset=binary"),
            pdf_with_pages(&["Warranty covers one year.", "Returns accepted for 30 days."]),
        );

        let chunks = processor().process(&file).await.unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source, "manual.pdf");
        assert!(chunks[0].text.contains("Warranty covers one year."));
        assert!(chunks[0].text.contains("Returns accepted for 30 days."));
    }

    #[test]
    fn invalid_chunking_options_are_rejected() {
        let options = IngestionOptions {
            chunk_max_chars: 100,
            chunk_overlap_chars: 150,
        };
        assert!(DocumentProcessor::new(options).is_err());
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt")).and_then(|mut file| file.write_all(b"notes"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn local_non_pdf_file_gets_no_content_type() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"notes")?;

        let file = load_local_file(&path).await?;

        assert_eq!(file.filename, "notes.txt");
        assert_eq!(file.content_type, None);
        Ok(())
    }

    #[tokio::test]
    async fn ingestion_fails_without_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = ingest_path(&processor(), &memory_store(), dir.path()).await;
        assert!(matches!(result, Err(IngestError::InvalidArgument(_))));
        Ok(())
    }

    #[tokio::test]
    async fn folder_ingest_skips_unreadable_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;
        fs::write(
            dir.path().join("good.pdf"),
            pdf_with_pages(&["Orders ship within two business days."]),
        )?;

        let store = memory_store();
        let report = ingest_path(&processor(), &store, dir.path()).await?;

        assert_eq!(report.files_ingested, 1);
        assert_eq!(report.chunks_created, 1);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("unreadable.pdf")
        );

        let hits = store.search("When do orders ship?", 1).await?;
        assert_eq!(hits[0].source.as_deref(), Some("good.pdf"));
        Ok(())
    }
}
