use super::*;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[test]
fn empty_text_has_no_chunks() {
    let chunks = chunk_text("", 10, 2).expect("chunking should succeed");
    assert!(chunks.is_empty());
}

#[test]
fn short_text_is_a_single_chunk() {
    let chunks = chunk_text("hello world", 1000, 200).expect("chunking should succeed");
    assert_eq!(chunks, vec!["hello world".to_string()]);
}

#[test]
fn text_of_exactly_chunk_size_is_not_repeated() {
    let text = "a".repeat(1000);
    let chunks = chunk_text(&text, 1000, 200).expect("chunking should succeed");
    assert_eq!(chunks.len(), 1);
}

#[test]
fn windows_overlap_by_configured_amount() {
    let text: String = (0..2500)
        .map(|i| char::from(b'a' + u8::try_from(i % 26).expect("fits in u8")))
        .collect();
    let chunks = chunk_text(&text, 1000, 200).expect("chunking should succeed");

    // starts at 0, 800, 1600
    assert_eq!(chunks.len(), 3);
    for chunk in &chunks {
        assert!(char_len(chunk) <= 1000);
    }

    for pair in chunks.windows(2) {
        let previous: Vec<char> = pair[0].chars().collect();
        let next: Vec<char> = pair[1].chars().collect();
        let tail = &previous[previous.len() - 200..];
        assert_eq!(tail, &next[..200]);
    }

    assert!(text.ends_with(chunks.last().expect("has chunks").as_str()));
}

#[test]
fn chunks_cover_the_whole_text() {
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
    let chunks = chunk_text(&text, 100, 25).expect("chunking should succeed");

    let mut rebuilt = chunks[0].clone();
    for chunk in &chunks[1..] {
        rebuilt.extend(chunk.chars().skip(25));
    }
    assert_eq!(rebuilt, text);
}

#[test]
fn chunking_is_deterministic() {
    let text = "fn main() {\n    println!(\"hi\");\n}\n".repeat(50);
    let first = chunk_text(&text, 128, 32).expect("chunking should succeed");
    let second = chunk_text(&text, 128, 32).expect("chunking should succeed");
    assert_eq!(first, second);
}

#[test]
fn multibyte_text_is_split_on_char_boundaries() {
    let text = "héllo wörld ✓ ".repeat(20);
    let chunks = chunk_text(&text, 7, 3).expect("chunking should succeed");

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(char_len(chunk) <= 7);
    }
}

#[test]
fn zero_overlap_partitions_text() {
    let chunks = chunk_text("abcdefghij", 4, 0).expect("chunking should succeed");
    assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
}

#[test]
fn invalid_sizes_are_rejected() {
    assert!(chunk_text("abc", 0, 0).is_err());
    assert!(chunk_text("abc", 10, 10).is_err());
    assert!(chunk_text("abc", 10, 11).is_err());
}

#[test]
fn config_defaults_match_indexer_settings() {
    let config = ChunkingConfig::default();
    let text = "x".repeat(1500);
    let chunks = chunk_with_config(&text, &config).expect("chunking should succeed");
    assert_eq!(chunks.len(), 2);
    assert_eq!(char_len(&chunks[1]), 700);
}

#[test]
fn language_from_extension() {
    assert_eq!(language_for_path(Path::new("src/main.rs")), "rs");
    assert_eq!(language_for_path(Path::new("scripts/Backup.PY")), "py");
    assert_eq!(language_for_path(Path::new("Makefile")), "text");
    assert_eq!(language_for_path(Path::new("clipboard")), "text");
}
