use archrag_chunker::{Chunk, Metadata};
use archrag_search::{
    build_context, Confidence, KeywordReranker, KnowledgeBase, Retriever, RetrieverConfig,
};
use archrag_vector_store::{EmbeddingProvider, StubEmbedder, VectorStore};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn provider() -> Arc<dyn EmbeddingProvider> {
    Arc::new(StubEmbedder::new(32))
}

fn chunk(text: &str, source: &str) -> Chunk {
    Chunk::new(text.to_string(), Metadata::new()).with_meta("source", source)
}

async fn build_index(dir: &Path, chunks: Vec<Chunk>) {
    VectorStore::from_documents(chunks, provider())
        .await
        .unwrap()
        .save_local(dir)
        .await
        .unwrap();
}

fn retriever(dir: &Path, config: RetrieverConfig) -> Retriever {
    Retriever::new(Arc::new(KnowledgeBase::new(dir, provider())), config)
}

#[tokio::test]
async fn exact_question_is_high_confidence_first() {
    let temp = TempDir::new().unwrap();
    build_index(
        temp.path(),
        vec![
            chunk("Services own their database schema", "docs/adr/001-postgres.md"),
            chunk("Which database do we use?", "docs/faq.md"),
            chunk("Billing is event sourced", "confluence:ADR-010"),
        ],
    )
    .await;

    let sources = retriever(temp.path(), RetrieverConfig::default())
        .retrieve("Which database do we use?")
        .await
        .unwrap();

    assert_eq!(sources.len(), 3);
    assert_eq!(sources[0].source, "docs/faq.md");
    assert_eq!(sources[0].filename, "faq.md");
    assert_eq!(sources[0].confidence, Confidence::High);
    assert!(sources[0].distance < 1e-6);
    assert!(sources.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn keyword_question_reorders_by_keyword_count() {
    let temp = TempDir::new().unwrap();
    build_index(
        temp.path(),
        vec![
            chunk("Where is PII stored?", "q.md"),
            chunk("PII and more PII on AWS", "pii.md"),
            chunk("Nothing relevant here", "other.md"),
        ],
    )
    .await;

    let config = RetrieverConfig {
        reranker: KeywordReranker::from_csv("pii,aws"),
        ..RetrieverConfig::default()
    };
    let sources = retriever(temp.path(), config)
        .retrieve("Where is PII stored?")
        .await
        .unwrap();

    let order: Vec<&str> = sources.iter().map(|s| s.source.as_str()).collect();
    assert_eq!(order, vec!["pii.md", "q.md", "other.md"]);
    assert_eq!(
        build_context(&sources),
        "PII and more PII on AWS\n\nWhere is PII stored?\n\nNothing relevant here"
    );
}

#[tokio::test]
async fn empty_index_yields_no_sources() {
    let temp = TempDir::new().unwrap();
    build_index(temp.path(), Vec::new()).await;

    let sources = retriever(temp.path(), RetrieverConfig::default())
        .retrieve("anything at all")
        .await
        .unwrap();
    assert!(sources.is_empty());
}

#[tokio::test]
async fn explicit_k_limits_results() {
    let temp = TempDir::new().unwrap();
    let chunks = (0..12)
        .map(|i| chunk(&format!("standard {i}"), &format!("s{i}.md")))
        .collect();
    build_index(temp.path(), chunks).await;

    let r = retriever(temp.path(), RetrieverConfig::default());
    assert_eq!(r.retrieve("list every standard").await.unwrap().len(), 10);
    assert_eq!(r.retrieve("standard 3").await.unwrap().len(), 6);
    assert_eq!(r.retrieve_k("standard 3", 2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn chunks_without_source_are_unknown() {
    let temp = TempDir::new().unwrap();
    build_index(
        temp.path(),
        vec![Chunk::new("orphan text".to_string(), Metadata::new())],
    )
    .await;

    let sources = retriever(temp.path(), RetrieverConfig::default())
        .retrieve("orphan text")
        .await
        .unwrap();
    assert_eq!(sources[0].source, "unknown");
    assert_eq!(sources[0].filename, "unknown");
}

#[tokio::test]
async fn audit_puts_priority_adrs_before_closer_standards() {
    let temp = TempDir::new().unwrap();
    let design = "Checkout service writes orders to DynamoDB and calls billing over REST.";
    let mut chunks = vec![
        chunk(design, "docs/standards/checkout.md"),
        chunk("Caching follows the read-through pattern.", "docs/adr/ADR-007-caching.md"),
        chunk("Per ADR-001 all services use PostgreSQL.", "docs/db.md"),
    ];
    chunks.extend(
        (0..12).map(|i| chunk(&format!("Standard number {i} for services"), "docs/misc.md")),
    );
    // Fifteen chunks: every one is within the audit fetch.
    build_index(temp.path(), chunks).await;

    let config = RetrieverConfig {
        priority_adrs: vec!["ADR-001".to_string(), "ADR-007".to_string()],
        ..RetrieverConfig::default()
    };
    let sources = retriever(temp.path(), config)
        .retrieve_for_audit(design)
        .await
        .unwrap();

    let priority: Vec<&str> = sources[..2].iter().map(|s| s.source.as_str()).collect();
    assert!(priority.contains(&"docs/adr/ADR-007-caching.md"));
    assert!(priority.contains(&"docs/db.md"));
    assert!(sources[0].distance <= sources[1].distance);

    assert_eq!(sources[2].source, "docs/standards/checkout.md");
    assert!(sources[2].distance < 1e-6);
    assert!(sources[2].distance < sources[0].distance);

    assert_eq!(sources.len(), 2 + 10);
    assert!(sources[2..].windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn audit_without_priority_adrs_caps_standards() {
    let temp = TempDir::new().unwrap();
    let chunks = (0..20)
        .map(|i| chunk(&format!("Policy {i}: mention ADR-001"), "docs/policies.md"))
        .collect();
    build_index(temp.path(), chunks).await;

    let sources = retriever(temp.path(), RetrieverConfig::default())
        .retrieve_for_audit("A design that stores PII in S3.")
        .await
        .unwrap();
    assert_eq!(sources.len(), 10);
}
