//! Backend selection shared by every subcommand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use tracing::{info, warn};
use wordvault_ingest_docs::{ExtractionPipeline, OcrError, VisionOcrClient};
use wordvault_llm::openai::OPENAI_API_KEY_ENV;
use wordvault_llm::{
    FreeDictionaryClient, LlmConfig, MockProvider, OpenAiProvider, PronunciationSource,
    StaticDictionary, WordEnricher,
};
use wordvault_storage::{DocumentStore, FirestoreConfig, FirestoreStore, MemoryStore};

/// Canned answer for `--llm-mock`; it satisfies every enrichment prompt.
const MOCK_LLM_ANSWER: &str = r#"{
  "partsOfSpeech": ["verb"],
  "definitions": [{"text": "to lessen in intensity or degree.", "partOfSpeech": "verb"}],
  "definition": "to lessen in intensity or degree.",
  "etymology": "From Old French abatre, to beat down.",
  "synonyms": ["diminish", "subside", "wane"],
  "antonyms": ["intensify"],
  "examples": ["The storm abated by morning.", "Nothing could abate her curiosity."],
  "difficulty": 6,
  "pronunciation": "/əˈbeɪt/",
  "translation": "줄어들다",
  "words": []
}"#;

#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// Document store: `memory`, `file` (JSON snapshot, needs `--data-file`) or `firestore`.
    #[arg(long, default_value = "memory")]
    pub store: String,

    /// Snapshot path for `--store file`.
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// Choose at most one LLM backend: `--llm-mock` or `--llm-openai`.
    ///
    /// With neither flag, OpenAI is used when `OPENAI_API_KEY` is set.
    #[arg(long)]
    pub llm_mock: bool,

    #[arg(long)]
    pub llm_openai: bool,

    /// Model override for `--llm-openai` (defaults to `OPENAI_MODEL` or `gpt-4o-mini`).
    #[arg(long)]
    pub llm_model: Option<String>,

    /// Skip the Vision OCR backend even when `GOOGLE_VISION_API_KEY` is set.
    #[arg(long)]
    pub no_ocr: bool,

    /// Serve pronunciations from an empty in-process dictionary instead of the network.
    #[arg(long)]
    pub offline_dictionary: bool,
}

pub struct Backends {
    pub store: Arc<dyn DocumentStore>,
    pub enricher: Option<WordEnricher>,
    pub pipeline: ExtractionPipeline,
    pub dictionary: Arc<dyn PronunciationSource>,
}

impl Backends {
    pub fn from_args(args: &BackendArgs) -> Result<Self> {
        let store = open_store(args)?;
        let enricher = resolve_enricher(args)?;

        let mut pipeline = ExtractionPipeline::new();
        if !args.no_ocr {
            match VisionOcrClient::from_env() {
                Ok(client) => {
                    info!("OCR backend: Google Vision");
                    pipeline = pipeline.with_ocr(Arc::new(client));
                }
                Err(OcrError::NotConfigured(reason)) => {
                    info!(reason = %reason, "OCR backend disabled");
                }
                Err(e) => return Err(anyhow!("OCR backend: {e}")),
            }
        }
        if let Some(enricher) = enricher.as_ref() {
            pipeline = pipeline.with_llm(enricher.clone());
        }

        let dictionary: Arc<dyn PronunciationSource> = if args.offline_dictionary {
            Arc::new(StaticDictionary::new())
        } else {
            Arc::new(FreeDictionaryClient::new().map_err(|e| anyhow!("dictionary client: {e}"))?)
        };

        Ok(Self {
            store,
            enricher,
            pipeline,
            dictionary,
        })
    }

    /// The enricher, or an error naming the flags that enable one.
    pub fn require_enricher(&self) -> Result<&WordEnricher> {
        self.enricher.as_ref().ok_or_else(|| {
            anyhow!("no LLM backend configured (use --llm-mock, --llm-openai, or set {OPENAI_API_KEY_ENV})")
        })
    }
}

fn open_store(args: &BackendArgs) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match args.store.trim().to_ascii_lowercase().as_str() {
        "memory" | "mem" => {
            if args.data_file.is_some() {
                warn!("--data-file is ignored with --store memory");
            }
            Arc::new(MemoryStore::new())
        }
        "file" | "json" => {
            let path = args
                .data_file
                .as_ref()
                .ok_or_else(|| anyhow!("`--store file` requires `--data-file <path>`"))?;
            Arc::new(
                MemoryStore::open(path)
                    .with_context(|| format!("open data file {}", path.display()))?,
            )
        }
        "firestore" => {
            let config = FirestoreConfig::from_env().context("firestore configuration")?;
            Arc::new(FirestoreStore::new(config).context("firestore client")?)
        }
        other => {
            return Err(anyhow!(
                "unknown store `{other}` (expected memory, file, or firestore)"
            ))
        }
    };
    info!(backend = store.backend_name(), "document store ready");
    Ok(store)
}

fn resolve_enricher(args: &BackendArgs) -> Result<Option<WordEnricher>> {
    let selected = (args.llm_mock as usize) + (args.llm_openai as usize);
    if selected > 1 {
        return Err(anyhow!(
            "choose at most one LLM backend: --llm-mock or --llm-openai"
        ));
    }

    if args.llm_mock {
        info!("LLM backend: mock");
        return Ok(Some(WordEnricher::new(Arc::new(MockProvider::always(
            MOCK_LLM_ANSWER,
        )))));
    }

    let config = match LlmConfig::from_env() {
        Ok(config) => config,
        Err(e) if args.llm_openai => return Err(anyhow!("`--llm-openai`: {e}")),
        Err(_) => {
            info!("LLM backend disabled ({OPENAI_API_KEY_ENV} is not set)");
            return Ok(None);
        }
    };
    let config = match args.llm_model.as_deref() {
        Some(model) => config.with_model(model),
        None => config,
    };
    info!(model = %config.model, "LLM backend: openai");
    let provider = OpenAiProvider::new(config).map_err(|e| anyhow!("openai client: {e}"))?;
    Ok(Some(WordEnricher::new(Arc::new(provider))))
}
