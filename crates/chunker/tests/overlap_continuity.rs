use archrag_chunker::{Document, SplitterConfig, TextSplitter};

fn sample_policy() -> String {
    let mut text = String::from("# Data Residency Policy\n\n");
    for section in 0..12 {
        text.push_str(&format!("## Section {section}\n\n"));
        for line in 0..6 {
            text.push_str(&format!(
                "Rule {section}.{line}: services handling PII must keep primary storage in the approved region and log every cross-border transfer.\n"
            ));
        }
        text.push('\n');
    }
    text
}

fn tail(text: &str, n: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars[chars.len().saturating_sub(n)..].iter().collect()
}

#[test]
fn consecutive_chunks_share_the_overlap_tail() {
    let config = SplitterConfig::with_size(300, 60);
    let splitter = TextSplitter::new(config.clone()).unwrap();
    let text = sample_policy();

    let chunks = splitter.split_text(&text);
    assert!(chunks.len() >= 2, "expected multiple chunks, got {}", chunks.len());

    for pair in chunks.windows(2) {
        let expected = tail(&pair[0], config.chunk_overlap);
        assert!(
            pair[1].starts_with(&expected),
            "chunk does not start with previous tail {expected:?}: {:?}",
            pair[1]
        );
    }
}

#[test]
fn chunks_are_contiguous_slices_within_bounds() {
    let config = SplitterConfig::with_size(300, 60);
    let splitter = TextSplitter::new(config.clone()).unwrap();
    let text = sample_policy();

    for chunk in splitter.split_text(&text) {
        assert!(text.contains(&chunk), "chunk is not a slice of the source");
        let len = chunk.chars().count();
        assert!(
            len <= config.chunk_size + config.chunk_overlap + 2,
            "chunk of {len} chars exceeds bound"
        );
    }
}

#[test]
fn every_document_keeps_its_own_metadata() {
    let splitter = TextSplitter::new(SplitterConfig::with_size(200, 40)).unwrap();
    let docs = vec![
        Document::new(sample_policy()).with_source("docs/policy.md"),
        Document::new("ADR-002: adopt event sourcing for billing.").with_source("docs/adr-002.md"),
    ];

    let chunks = splitter.split_documents(&docs);
    let last = chunks.last().unwrap();
    assert_eq!(last.source(), Some("docs/adr-002.md"));
    assert_eq!(last.content, "ADR-002: adopt event sourcing for billing.");
    assert!(chunks[..chunks.len() - 1]
        .iter()
        .all(|c| c.source() == Some("docs/policy.md")));
}
