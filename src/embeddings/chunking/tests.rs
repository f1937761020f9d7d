use super::*;
use crate::ingest::extractor::{MetadataValue, Segment, SegmentMetadata};

fn chunker(chunk_size: usize, chunk_overlap: usize) -> Chunker {
    Chunker::new(&ChunkingConfig {
        chunk_size,
        chunk_overlap,
        ..ChunkingConfig::default()
    })
    .expect("should build chunker")
}

fn segment(text: &str, page_number: Option<u32>) -> Segment {
    Segment {
        text: text.to_string(),
        metadata: SegmentMetadata {
            file_name: "notes.txt".to_string(),
            page_number,
            total_pages: page_number.map(|_| 3),
            ..SegmentMetadata::default()
        },
    }
}

/// Rebuild the word sequence by dropping the overlapping prefix of each chunk
fn reassemble(chunks: &[String]) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for chunk in chunks {
        let chunk_words: Vec<&str> = chunk.split_whitespace().collect();
        let mut skip = 0;
        for candidate in (1..=chunk_words.len().min(words.len())).rev() {
            let tail = &words[words.len() - candidate..];
            if tail.iter().map(String::as_str).eq(chunk_words[..candidate].iter().copied()) {
                skip = candidate;
                break;
            }
        }
        words.extend(chunk_words[skip..].iter().map(|w| (*w).to_string()));
    }
    words
}

#[test]
fn encoding_names() {
    assert_eq!(Encoding::from_name("cl100k_base"), Some(Encoding::Cl100kBase));
    assert_eq!(Encoding::from_name("o200k_base"), Some(Encoding::O200kBase));
    assert_eq!(Encoding::from_name("p50k"), None);
    assert_eq!(Encoding::Cl100kBase.name(), "cl100k_base");
}

#[test]
fn token_counting() {
    let tokenizer = Tokenizer::new(Encoding::Cl100kBase).expect("should load tokenizer");
    assert_eq!(tokenizer.count(""), 0);
    assert_eq!(tokenizer.count("A B C"), 3);
    assert!(tokenizer.count("<|endoftext|>") > 1);
}

#[test]
fn rejects_invalid_config() {
    assert!(
        Chunker::new(&ChunkingConfig {
            chunk_size: 0,
            chunk_overlap: 0,
            ..ChunkingConfig::default()
        })
        .is_err()
    );
    assert!(
        Chunker::new(&ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 10,
            ..ChunkingConfig::default()
        })
        .is_err()
    );
    assert!(
        Chunker::new(&ChunkingConfig {
            encoding: "unknown".to_string(),
            ..ChunkingConfig::default()
        })
        .is_err()
    );
}

#[test]
fn short_text_is_single_chunk() {
    let chunks = chunker(500, 100).split_text("  A short paragraph of text.  ");
    assert_eq!(chunks, vec!["A short paragraph of text.".to_string()]);
}

#[test]
fn word_windows_overlap_by_one_token() {
    let chunks = chunker(2, 1).split_text("A B C D");
    assert_eq!(chunks, vec!["A B", "B C", "C D"]);
}

#[test]
fn windows_respect_size_and_reassemble() {
    let chunker = chunker(3, 1);
    let chunks = chunker.split_text("A B C D E F G H");

    assert_eq!(chunks, vec!["A B C", "C D E", "E F G", "G H"]);
    for chunk in &chunks {
        assert!(chunker.tokenizer().count(chunk) <= 3);
    }
    assert_eq!(
        reassemble(&chunks).join(" "),
        "A B C D E F G H",
        "dropping overlaps should restore the original text"
    );
}

#[test]
fn paragraphs_split_before_words() {
    let chunker = chunker(8, 0);
    let text = "one two three four\n\nfive six seven eight\n\nnine ten";
    let chunks = chunker.split_text(text);

    assert!(chunks.len() >= 2);
    for chunk in &chunks {
        assert!(chunker.tokenizer().count(chunk) <= 8);
        assert!(!chunk.starts_with('\n') && !chunk.ends_with('\n'));
    }
    assert_eq!(reassemble(&chunks).join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
}

#[test]
fn long_word_falls_back_to_characters() {
    let chunker = chunker(4, 0);
    let word = "supercalifragilisticexpialidocious";
    let chunks = chunker.split_text(word);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunker.tokenizer().count(chunk) <= 4);
    }
    assert_eq!(chunks.concat(), word);
}

#[test]
fn whitespace_only_text_yields_nothing() {
    let chunker = chunker(10, 2);
    assert!(chunker.split_text("").is_empty());
    assert!(chunker.split_text(" \n\n \t ").is_empty());
}

#[test]
fn chunks_inherit_segment_metadata() {
    let chunker = chunker(4, 1);
    let mut first = segment("alpha beta gamma delta epsilon zeta", Some(1));
    first
        .metadata
        .extra
        .insert("author".to_string(), MetadataValue::Text("Ada".to_string()));
    let segments = vec![first, segment("   ", Some(2)), segment("omega", Some(3))];

    let chunks = chunker.chunk_segments(&segments);

    assert!(chunks.len() >= 3);
    let last = chunks.last().expect("should have a last chunk");
    assert_eq!(last.text, "omega");
    assert_eq!(last.metadata.page_number, Some(3));

    for chunk in &chunks[..chunks.len() - 1] {
        assert_eq!(chunk.metadata.page_number, Some(1));
        assert_eq!(
            chunk.metadata.extra.get("author"),
            Some(&MetadataValue::Text("Ada".to_string()))
        );
        assert!(chunk.token_count <= 4);
        assert_eq!(chunk.token_count, chunker.tokenizer().count(&chunk.text));
    }
}

#[test]
fn empty_segments_produce_no_chunks() {
    let chunks = chunker(500, 100).chunk_segments(&[]);
    assert!(chunks.is_empty());
}
