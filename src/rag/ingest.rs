//! Turns uploaded reference files into embedded chunks in the document store.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::chunker::TextSplitter;
use super::store::{DocumentStore, StoreError, StoredChunk};
use crate::capability::CapabilityError;
use crate::llm::LlmProvider;

pub const SUPPORTED_EXTENSIONS: [&str; 5] = [".txt", ".md", ".html", ".pdf", ".docx"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("Document {0} contains no text")]
    Empty(String),
    #[error("Could not read text from {file}: {reason}")]
    Extract { file: String, reason: String },
    #[error("File is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("Embedding failed: {0}")]
    Embedding(#[from] CapabilityError),
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    /// Saved path, also the `source` recorded on every chunk.
    pub source: String,
    pub chunks_created: usize,
}

pub struct DocumentIngestor {
    upload_dir: PathBuf,
    max_file_size: usize,
    splitter: TextSplitter,
    embedder: Arc<dyn LlmProvider>,
    store: Arc<dyn DocumentStore>,
}

impl DocumentIngestor {
    pub fn new(
        upload_dir: PathBuf,
        max_file_size: usize,
        splitter: TextSplitter,
        embedder: Arc<dyn LlmProvider>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            upload_dir,
            max_file_size,
            splitter,
            embedder,
            store,
        }
    }

    /// Saves an upload as `{uuid}{ext}` and indexes it. The saved file is
    /// removed again if indexing fails.
    pub async fn ingest_upload(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<IngestReport, IngestError> {
        let path = self.save_upload(file_name, bytes).await?;
        tracing::info!("Saved uploaded file: {} -> {}", file_name, path.display());

        match self.ingest_file(&path).await {
            Ok(report) => Ok(report),
            Err(err) => {
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    tracing::warn!("Failed to remove {}: {}", path.display(), remove_err);
                }
                Err(err)
            }
        }
    }

    pub async fn save_upload(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, IngestError> {
        if bytes.len() > self.max_file_size {
            return Err(IngestError::TooLarge {
                size: bytes.len(),
                limit: self.max_file_size,
            });
        }
        let extension = supported_extension(Path::new(file_name))?;

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = self
            .upload_dir
            .join(format!("{}{}", uuid::Uuid::new_v4(), extension));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Loads, chunks, embeds and stores one file.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport, IngestError> {
        let chunks = self.load_chunks(path).await?;

        let inputs: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed(&inputs).await?;
        if embeddings.len() != chunks.len() {
            return Err(IngestError::Embedding(CapabilityError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            ))));
        }

        let chunks_created = chunks.len();
        self.store
            .insert_batch(chunks.into_iter().zip(embeddings).collect())
            .await?;

        tracing::info!(
            "Processed document {} into {} chunks",
            path.display(),
            chunks_created
        );
        Ok(IngestReport {
            source: path.display().to_string(),
            chunks_created,
        })
    }

    async fn load_chunks(&self, path: &Path) -> Result<Vec<StoredChunk>, IngestError> {
        let extension = supported_extension(path)?;
        let source = path.display().to_string();
        let base_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.clone());

        let text = match extension {
            ".html" => strip_html(&tokio::fs::read_to_string(path).await?),
            ".pdf" | ".docx" => {
                let bytes = tokio::fs::read(path).await?;
                let extracted = tokio::task::spawn_blocking(move || {
                    if extension == ".pdf" {
                        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string())
                    } else {
                        docx_text(&bytes)
                    }
                })
                .await
                .map_err(|e| e.to_string())
                .and_then(|result| result);
                extracted.map_err(|reason| IngestError::Extract {
                    file: base_name.clone(),
                    reason,
                })?
            }
            _ => tokio::fs::read_to_string(path).await?,
        };

        let chunks: Vec<StoredChunk> = self
            .splitter
            .split(&text)
            .into_iter()
            .enumerate()
            .map(|(i, content)| {
                let chunk_id = format!("{}_{}", base_name, i);
                let mut metadata = Map::new();
                metadata.insert("source".to_string(), Value::from(source.clone()));
                metadata.insert("chunk_index".to_string(), Value::from(i));
                metadata.insert("chunk_id".to_string(), Value::from(chunk_id.clone()));
                StoredChunk {
                    chunk_id,
                    content,
                    source: source.clone(),
                    metadata,
                }
            })
            .collect();

        if chunks.is_empty() {
            return Err(IngestError::Empty(base_name));
        }
        Ok(chunks)
    }
}

fn supported_extension(path: &Path) -> Result<&'static str, IngestError> {
    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    SUPPORTED_EXTENSIONS
        .iter()
        .find(|supported| **supported == extension)
        .copied()
        .ok_or(IngestError::UnsupportedFileType(extension))
}

/// Drops markup, `<script>` and `<style>` bodies, decodes the common
/// entities and collapses whitespace, keeping one line per text line.
pub fn strip_html(html: &str) -> String {
    let bytes = html.as_bytes();
    let mut text = String::with_capacity(html.len());
    let mut segment_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }

        text.push_str(&html[segment_start..i]);
        text.push(' ');

        let resume = if starts_with_ignore_case(&bytes[i..], b"<script") {
            find_after_ignore_case(bytes, i, b"</script>")
        } else if starts_with_ignore_case(&bytes[i..], b"<style") {
            find_after_ignore_case(bytes, i, b"</style>")
        } else {
            html[i..].find('>').map(|pos| i + pos + 1)
        };
        i = resume.unwrap_or(bytes.len());
        segment_start = i;
    }
    text.push_str(&html[segment_start..]);

    let decoded = decode_entities(&text);

    decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Paragraph text of a `.docx`: the runs of `word/document.xml`, one line per
/// paragraph.
pub fn docx_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| e.to_string())?
        .read_to_string(&mut xml)
        .map_err(|e| e.to_string())?;

    let mut text = String::with_capacity(xml.len() / 4);
    let mut rest = xml.as_str();
    while let Some(open) = rest.find('<') {
        text.push_str(&decode_entities(&rest[..open]));
        let Some(close) = rest[open..].find('>') else {
            rest = "";
            break;
        };
        let tag = &rest[open + 1..open + close];
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default();
        match name {
            "w:p" if tag.starts_with('/') || tag.ends_with('/') => text.push('\n'),
            "w:tab" => text.push('\t'),
            "w:br" | "w:cr" => text.push('\n'),
            _ => {}
        }
        rest = &rest[open + close + 1..];
    }
    text.push_str(&decode_entities(rest));

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn starts_with_ignore_case(haystack: &[u8], prefix: &[u8]) -> bool {
    haystack.len() >= prefix.len() && haystack[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn find_after_ignore_case(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    haystack[from..]
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
        .map(|pos| from + pos + needle.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRequest;
    use crate::rag::SqliteDocumentStore;
    use async_trait::async_trait;

    struct LengthEmbedder;

    #[async_trait]
    impl LlmProvider for LengthEmbedder {
        fn name(&self) -> &str {
            "length"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<String, CapabilityError> {
            Ok(String::new())
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
            Ok(inputs
                .iter()
                .map(|text| vec![text.len() as f32, 1.0])
                .collect())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl LlmProvider for BrokenEmbedder {
        fn name(&self) -> &str {
            "broken"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<String, CapabilityError> {
            Ok(String::new())
        }

        async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
            Err(CapabilityError::Embedding("model not loaded".to_string()))
        }
    }

    async fn ingestor(
        dir: &tempfile::TempDir,
        embedder: Arc<dyn LlmProvider>,
    ) -> (DocumentIngestor, Arc<SqliteDocumentStore>) {
        let store = Arc::new(
            SqliteDocumentStore::open(dir.path().join("documents.db"))
                .await
                .unwrap(),
        );
        let ingestor = DocumentIngestor::new(
            dir.path().join("uploads"),
            1024,
            TextSplitter::new(40, 10),
            embedder,
            store.clone(),
        );
        (ingestor, store)
    }

    #[tokio::test]
    async fn upload_is_saved_chunked_and_stored() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, store) = ingestor(&dir, Arc::new(LengthEmbedder)).await;

        let text = "List comprehensions build lists.\n\nGenerators yield values lazily.";
        let report = ingestor.ingest_upload("notes.MD", text.as_bytes()).await.unwrap();

        assert_eq!(report.chunks_created, 2);
        assert!(report.source.ends_with(".md"));
        assert!(Path::new(&report.source).exists());
        assert_eq!(store.count().await.unwrap(), 2);

        let hits = store.search(&[1.0, 0.0], 5).await.unwrap();
        let file_name = Path::new(&report.source)
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let first = hits
            .iter()
            .find(|hit| hit.chunk.metadata["chunk_index"] == 0)
            .unwrap();
        assert_eq!(first.chunk.chunk_id, format!("{}_0", file_name));
        assert_eq!(first.chunk.metadata["source"], report.source.as_str());
        assert_eq!(first.chunk.content, "List comprehensions build lists.");
    }

    #[tokio::test]
    async fn unsupported_and_oversized_uploads_are_rejected_before_saving() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, _store) = ingestor(&dir, Arc::new(LengthEmbedder)).await;

        let err = ingestor.ingest_upload("slides.pptx", b"PK").await.unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFileType(ref ext) if ext == ".pptx"));
        assert_eq!(err.to_string(), "Unsupported file type: .pptx");

        let err = ingestor
            .ingest_upload("big.txt", &vec![b'a'; 2048])
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::TooLarge { size: 2048, limit: 1024 }));

        let uploads = dir.path().join("uploads");
        let saved = std::fs::read_dir(&uploads).map(|d| d.count()).unwrap_or(0);
        assert_eq!(saved, 0);
    }

    #[tokio::test]
    async fn failed_embedding_removes_saved_file() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, store) = ingestor(&dir, Arc::new(BrokenEmbedder)).await;

        let err = ingestor
            .ingest_upload("notes.txt", b"some reference text")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Embedding(_)));
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(std::fs::read_dir(dir.path().join("uploads")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn whitespace_only_document_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, _store) = ingestor(&dir, Arc::new(LengthEmbedder)).await;

        let err = ingestor.ingest_upload("blank.txt", b"  \n\n  ").await.unwrap_err();
        assert!(matches!(err, IngestError::Empty(_)));
    }

    #[test]
    fn html_markup_scripts_and_entities_are_stripped() {
        let html = r#"
            <html>
            <head><SCRIPT>var x = 1;</SCRIPT><style>p { color: red; }</style></head>
            <body>
                <h1>Hello</h1>
                <p>Fish &amp; <b>chips</b></p>
            </body>
            </html>
        "#;

        assert_eq!(strip_html(html), "Hello\nFish & chips");
    }

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        use std::io::Write;

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = r#"<?xml version="1.0"?><w:document><w:body><w:p><w:pPr><w:jc w:val="left"/></w:pPr><w:r><w:t>Fish &amp; </w:t></w:r><w:r><w:t xml:space="preserve">chips</w:t></w:r></w:p><w:p/><w:p><w:r><w:t>for</w:t><w:tab/><w:t>loops</w:t></w:r></w:p></w:body></w:document>"#;

        assert_eq!(docx_text(&docx_bytes(xml)).unwrap(), "Fish & chips\nfor\tloops");
    }

    #[tokio::test]
    async fn docx_upload_is_chunked_like_text() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, store) = ingestor(&dir, Arc::new(LengthEmbedder)).await;
        let xml = "<w:document><w:body><w:p><w:r><w:t>Tuples are immutable.</w:t></w:r></w:p></w:body></w:document>";

        let report = ingestor
            .ingest_upload("tuples.docx", &docx_bytes(xml))
            .await
            .unwrap();

        assert_eq!(report.chunks_created, 1);
        let hits = store.search(&[1.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].chunk.content, "Tuples are immutable.");
    }

    #[tokio::test]
    async fn unreadable_pdf_is_rejected_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let (ingestor, store) = ingestor(&dir, Arc::new(LengthEmbedder)).await;

        let err = ingestor
            .ingest_upload("broken.pdf", b"definitely not a pdf")
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Extract { ref file, .. } if file.ends_with(".pdf")));
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(std::fs::read_dir(dir.path().join("uploads")).unwrap().count(), 0);
    }
}
