use std::fmt::Write as _;

use anyhow::Context;
use insight_core::bootstrap::{build_answerer, connect_provider, load_index};
use insight_core::config::Config;
use insight_core::ingest::{IngestError, run_ingestion};
use insight_core::{AnswerEnvelope, Answerer};
use insight_llm::any::AnyProvider;
use insight_memory::VectorIndexError;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const NO_REFERENCES: &str = "Nenhuma referência relevante encontrada para esta resposta.";

pub async fn ingest(config: &Config) -> anyhow::Result<()> {
    let provider = connect_provider(config).await?;
    let report = run_ingestion(config, &provider).await?;
    println!(
        "Indexed {} chunks from {} documents into {} ({} dropped, {:.1}s).",
        report.indexed,
        report.chunking.documents_found - report.chunking.documents_failed,
        report.index_path.display(),
        report.batches.dropped_chunks,
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

async fn answerer(config: &Config) -> anyhow::Result<Answerer<AnyProvider, AnyProvider>> {
    let index = load_index(config)?;
    let provider = connect_provider(config).await?;
    build_answerer(config, provider, index)
}

pub async fn ask(config: &Config, question: &str) -> anyhow::Result<()> {
    let answerer = answerer(config).await?;
    let envelope = answerer.answer(question).await?;
    println!("{}", format_answer(&envelope));
    Ok(())
}

pub async fn chat(config: &Config) -> anyhow::Result<()> {
    let answerer = answerer(config).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "sair" | "exit" | "quit") {
            break;
        }

        // Each question is answered on its own; no history is carried over.
        match answerer.answer(question).await {
            Ok(envelope) => {
                let text = format!("{}\n\n", format_answer(&envelope));
                stdout.write_all(text.as_bytes()).await?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "question failed");
                eprintln!("error: {e}");
            }
        }
    }
    Ok(())
}

/// Answer text followed by one reference line per source, each with the
/// retrieved text indented below it.
pub fn format_answer(envelope: &AnswerEnvelope) -> String {
    let mut out = envelope.answer_text.trim().to_owned();
    out.push_str("\n\n");
    if envelope.is_grounded && !envelope.sources.is_empty() {
        out.push_str("Referências:");
        for (i, chunk) in envelope.sources.iter().enumerate() {
            let _ = write!(
                out,
                "\nReferência {}: {} (pág. {})",
                i + 1,
                chunk.source_name(),
                chunk.metadata.page_number
            );
            for line in chunk.text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                let _ = write!(out, "\n    {line}");
            }
        }
    } else {
        out.push_str(NO_REFERENCES);
    }
    out
}

/// User-facing message for a failed command. A missing index gets a hint
/// instead of the raw error chain.
pub fn describe_error(err: &anyhow::Error) -> String {
    let index_error = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<VectorIndexError>());
    match index_error {
        Some(VectorIndexError::NotFound(path)) => {
            return format!(
                "error: no index found at {}. Run `insight ingest` first.",
                path.display()
            );
        }
        Some(VectorIndexError::Corrupt { path, reason }) => {
            return format!(
                "error: index at {} is unusable ({reason}). Run `insight ingest` to rebuild it.",
                path.display()
            );
        }
        _ => {}
    }
    if let Some(IngestError::NoChunks(dir)) = err.downcast_ref::<IngestError>() {
        return format!(
            "error: no text chunks were produced from {}. Check that it contains readable PDF files.",
            dir.display()
        );
    }
    format!("error: {err:#}")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use insight_memory::document::{Chunk, DocumentMetadata};

    use super::*;

    fn chunk(source: &str, page_number: usize) -> Chunk {
        let page = DocumentMetadata {
            source: source.into(),
            content_type: "application/pdf".into(),
            page_number,
        };
        Chunk::new("trecho".into(), &page, 0)
    }

    #[test]
    fn grounded_answer_lists_references() {
        let envelope = AnswerEnvelope {
            answer_text: "A Selic foi mantida.".into(),
            sources: vec![
                chunk("/dados_rpm/rpm_2024_03.pdf", 12),
                chunk("/dados_rpm/rpm_2023_12.pdf", 4),
            ],
            is_grounded: true,
        };
        let out = format_answer(&envelope);
        assert!(out.starts_with("A Selic foi mantida.\n\nReferências:"));
        assert!(out.contains("Referência 1: rpm_2024_03.pdf (pág. 12)\n    trecho\n"));
        assert!(out.ends_with("Referência 2: rpm_2023_12.pdf (pág. 4)\n    trecho"));
    }

    #[test]
    fn reference_text_is_indented_line_by_line() {
        let page = DocumentMetadata {
            source: "/dados_rpm/rpm_2024_06.pdf".into(),
            content_type: "application/pdf".into(),
            page_number: 7,
        };
        let envelope = AnswerEnvelope {
            answer_text: "O IPCA recuou.".into(),
            sources: vec![Chunk::new(
                "IPCA em queda\n\n  núcleos estáveis".into(),
                &page,
                0,
            )],
            is_grounded: true,
        };
        assert!(format_answer(&envelope).ends_with(
            "Referência 1: rpm_2024_06.pdf (pág. 7)\n    IPCA em queda\n    núcleos estáveis"
        ));
    }

    #[test]
    fn ungrounded_answer_has_no_references() {
        let envelope = AnswerEnvelope {
            answer_text: "Não encontrei essa informação nos relatórios fornecidos.".into(),
            sources: Vec::new(),
            is_grounded: false,
        };
        assert!(format_answer(&envelope).ends_with(NO_REFERENCES));
    }

    #[test]
    fn missing_index_message_is_actionable() {
        let err = anyhow::Error::new(VectorIndexError::NotFound(PathBuf::from("faiss_index")));
        let msg = describe_error(&err);
        assert_eq!(
            msg,
            "error: no index found at faiss_index. Run `insight ingest` first."
        );
    }

    #[test]
    fn missing_index_found_through_context() {
        let err = anyhow::Error::new(VectorIndexError::NotFound(PathBuf::from("idx")))
            .context("loading index");
        assert!(describe_error(&err).contains("Run `insight ingest` first"));
    }

    #[test]
    fn corrupt_index_message_suggests_rebuild() {
        let err = anyhow::Error::new(VectorIndexError::Corrupt {
            path: PathBuf::from("faiss_index"),
            reason: "not a directory".into(),
        });
        assert_eq!(
            describe_error(&err),
            "error: index at faiss_index is unusable (not a directory). Run `insight ingest` to rebuild it."
        );
    }

    #[test]
    fn zero_chunks_message_names_directory() {
        let err = anyhow::Error::new(IngestError::NoChunks(PathBuf::from("./dados_rpm")));
        assert!(describe_error(&err).contains("./dados_rpm"));
    }

    #[test]
    fn other_errors_show_chain() {
        let err = anyhow::anyhow!("root cause").context("outer");
        assert_eq!(describe_error(&err), "error: outer: root cause");
    }
}
