use log::{ info, warn };
use std::path::{ Path, PathBuf };
use tokio::sync::OnceCell;

/// The knowledge-base document embedded in every system instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeDocument {
    pub filename: String,
    pub text: String,
}

/// Lazily reads the document from a fixed path. A successful read is cached
/// for the life of the process; a failed one is retried on the next request.
#[derive(Debug)]
pub struct KnowledgeBase {
    path: PathBuf,
    cached: OnceCell<KnowledgeDocument>,
}

impl KnowledgeBase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cached: OnceCell::new() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Option<&KnowledgeDocument> {
        match self.cached.get_or_try_init(|| read_document(&self.path)).await {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!("Knowledge base '{}' unavailable: {}", self.path.display(), e);
                None
            }
        }
    }
}

async fn read_document(path: &Path) -> Result<KnowledgeDocument, std::io::Error> {
    let text = tokio::fs::read_to_string(path).await?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    info!("Loaded knowledge base '{}' ({} bytes)", filename, text.len());
    Ok(KnowledgeDocument { filename, text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}-{}", Uuid::new_v4(), name))
    }

    #[tokio::test]
    async fn missing_file_is_not_fatal() {
        let kb = KnowledgeBase::new(temp_path("missing.md"));
        assert!(kb.load().await.is_none());
    }

    #[tokio::test]
    async fn loads_and_caches_document() {
        let path = temp_path("faq.md");
        tokio::fs::write(&path, "Horario: 9 a 18 h").await.unwrap();

        let kb = KnowledgeBase::new(&path);
        let doc = kb.load().await.unwrap().clone();
        assert!(doc.filename.ends_with("faq.md"));
        assert_eq!(doc.text, "Horario: 9 a 18 h");

        tokio::fs::remove_file(&path).await.unwrap();
        assert_eq!(kb.load().await, Some(&doc));
    }

    #[tokio::test]
    async fn failed_read_is_retried() {
        let path = temp_path("late.md");
        let kb = KnowledgeBase::new(&path);
        assert!(kb.load().await.is_none());

        tokio::fs::write(&path, "contenido").await.unwrap();
        assert_eq!(kb.load().await.map(|d| d.text.as_str()), Some("contenido"));
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
