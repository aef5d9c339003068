use std::io::Write;
use std::path::Path;

use insight_core::bootstrap::{build_answerer, connect_provider, create_provider, load_index};
use insight_core::config::{Config, ProviderKind};
use insight_core::ingest::{IngestError, run_ingestion, run_ingestion_with_loader};
use insight_core::prompt::REFUSAL_SENTENCE;
use insight_core::{AnswerError, Answerer};
use insight_llm::mock::MockProvider;
use insight_memory::VectorIndexError;
use insight_memory::document::TextLoader;
use serial_test::serial;

const REPORT: &str = "\
Relatório de Política Monetária\x0c\
O Comitê de Política Monetária decidiu, por unanimidade, manter a taxa Selic em 10,50% ao ano. \
O Comitê avalia que o cenário global incerto e o cenário doméstico marcado por resiliência na \
atividade exigem acompanhamento diligente.\n\n\
A inflação corrente medida pelo IPCA manteve trajetória de desinflação, embora os núcleos \
permaneçam acima da meta. As expectativas de inflação para 2025 e 2026 se elevaram.\x0c\
O crédito às famílias cresceu em ritmo moderado, com queda da inadimplência nas modalidades \
com recursos livres. O mercado de trabalho segue aquecido, com taxa de desocupação em queda e \
rendimentos reais em alta no período analisado pelo relatório.";

fn write_config(dir: &Path, docs: &Path, index: &Path) -> Config {
    for key in ["INSIGHT_LLM_PROVIDER", "AZURE_OPENAI_ENDPOINT", "INSIGHT_INDEX_PATH"] {
        unsafe { std::env::remove_var(key) };
    }
    let path = dir.join("insight.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        r#"
[llm]
provider = "mock"

[ingest]
documents_dir = "{}"
chunk_size = 300
chunk_overlap = 60
batch_size = 2
cooldown_secs = 0

[index]
path = "{}"
"#,
        docs.display(),
        index.display()
    )
    .unwrap();
    let config = Config::load(&path).unwrap();
    config.validate().unwrap();
    config
}

#[tokio::test]
#[serial]
async fn ingest_then_ask() {
    let work = tempfile::tempdir().unwrap();
    let docs = work.path().join("dados_rpm");
    std::fs::create_dir(&docs).unwrap();
    std::fs::write(docs.join("rpm_2024_06.txt"), REPORT).unwrap();
    let config = write_config(work.path(), &docs, &work.path().join("faiss_index"));
    assert_eq!(config.llm.provider, ProviderKind::Mock);

    let provider = connect_provider(&config).await.unwrap();
    let report = run_ingestion_with_loader(&config, TextLoader::default(), &provider)
        .await
        .unwrap();
    assert_eq!(report.chunking.pages_discarded, 1);
    assert_eq!(report.chunking.pages_kept, 2);
    assert!(report.indexed >= 3);

    let index = load_index(&config).unwrap();
    let answerer = build_answerer(&config, create_provider(&config).unwrap(), index).unwrap();
    let envelope = answerer
        .answer("Qual a decisão do Comitê sobre a taxa Selic?")
        .await
        .unwrap();

    assert!(envelope.is_grounded);
    assert_eq!(envelope.sources.len(), 3);
    assert!(
        envelope
            .sources
            .iter()
            .all(|c| c.metadata.source_path.ends_with("rpm_2024_06.txt"))
    );
}

#[tokio::test]
#[serial]
async fn refusal_comes_back_without_sources() {
    let work = tempfile::tempdir().unwrap();
    let docs = work.path().join("dados_rpm");
    std::fs::create_dir(&docs).unwrap();
    std::fs::write(docs.join("rpm.txt"), REPORT).unwrap();
    let config = write_config(work.path(), &docs, &work.path().join("faiss_index"));

    let embedder = MockProvider::default();
    run_ingestion_with_loader(&config, TextLoader::default(), &embedder)
        .await
        .unwrap();

    let completion = MockProvider::with_responses(vec![REFUSAL_SENTENCE.into()]);
    let answerer = Answerer::new(
        embedder,
        completion.clone(),
        load_index(&config).unwrap(),
        config.answer.clone(),
    );
    let envelope = answerer
        .answer("Qual foi a taxa de câmbio da Argentina em 1990?")
        .await
        .unwrap();

    assert!(!envelope.is_grounded);
    assert!(envelope.sources.is_empty());
    let prompt = &completion.prompts()[0];
    assert!(prompt.contains("Contexto:"));
    assert!(prompt.contains("Pergunta:\nQual foi a taxa de câmbio da Argentina em 1990?"));
}

#[tokio::test]
#[serial]
async fn asking_before_ingesting_is_not_found() {
    let work = tempfile::tempdir().unwrap();
    let config = write_config(work.path(), work.path(), &work.path().join("faiss_index"));
    assert!(matches!(
        load_index(&config),
        Err(VectorIndexError::NotFound(_))
    ));
}

#[tokio::test]
#[serial]
async fn directory_without_pdfs_fails_ingestion() {
    let work = tempfile::tempdir().unwrap();
    let docs = work.path().join("dados_rpm");
    std::fs::create_dir(&docs).unwrap();
    std::fs::write(docs.join("notes.txt"), REPORT).unwrap();
    let index_path = work.path().join("faiss_index");
    let config = write_config(work.path(), &docs, &index_path);

    let result = run_ingestion(&config, &MockProvider::default()).await;
    assert!(matches!(result, Err(IngestError::NoChunks(_))));
    assert!(!index_path.exists());
}

#[tokio::test]
#[serial]
async fn blank_question_is_rejected() {
    let work = tempfile::tempdir().unwrap();
    let docs = work.path().join("dados_rpm");
    std::fs::create_dir(&docs).unwrap();
    std::fs::write(docs.join("rpm.txt"), REPORT).unwrap();
    let config = write_config(work.path(), &docs, &work.path().join("faiss_index"));
    let provider = create_provider(&config).unwrap();
    run_ingestion_with_loader(&config, TextLoader::default(), &provider)
        .await
        .unwrap();

    let answerer = build_answerer(&config, provider, load_index(&config).unwrap()).unwrap();
    assert!(matches!(
        answerer.answer("").await,
        Err(AnswerError::InvalidArgument(_))
    ));
}
