use super::*;

fn numbered_sentences(count: usize) -> String {
    (1..=count)
        .map(|i| format!("This is sentence number {i}."))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn split_basic_sentences() {
    let sentences = split_sentences("First one. Second one! Third one? Fourth");
    assert_eq!(
        sentences,
        vec!["First one.", "Second one!", "Third one?", "Fourth"]
    );
}

#[test]
fn split_collapses_whitespace() {
    let sentences = split_sentences("  Line one\nstill line one.\n\n\tLine   two.  ");
    assert_eq!(sentences, vec!["Line one still line one.", "Line two."]);
}

#[test]
fn split_keeps_abbreviations_and_initials() {
    let sentences =
        split_sentences("Dr. Smith met J. R. Tolkien, e.g. at lunch. They talked for hours.");
    assert_eq!(
        sentences,
        vec![
            "Dr. Smith met J. R. Tolkien, e.g. at lunch.",
            "They talked for hours."
        ]
    );
}

#[test]
fn split_ends_sentences_at_pronoun_and_no() {
    let sentences =
        split_sentences("Nobody came but I. Then we left. The answer was no. We went home.");
    assert_eq!(
        sentences,
        vec![
            "Nobody came but I.",
            "Then we left.",
            "The answer was no.",
            "We went home."
        ]
    );
}

#[test]
fn split_keeps_numbered_no() {
    let sentences = split_sentences("She played Symphony No. 5 twice. It was late.");
    assert_eq!(
        sentences,
        vec!["She played Symphony No. 5 twice.", "It was late."]
    );
}

#[test]
fn split_handles_quotes_and_decimals() {
    let sentences = split_sentences("He said \"stop.\" Pi is 3.14 today. Done");
    assert_eq!(
        sentences,
        vec!["He said \"stop.\"", "Pi is 3.14 today.", "Done"]
    );
}

#[test]
fn split_empty_text() {
    assert!(split_sentences("").is_empty());
    assert!(split_sentences("   \n\t ").is_empty());
}

#[test]
fn twenty_one_sentences_make_three_chunks() {
    let config = ChunkingConfig::default();
    let chunks =
        chunk_by_sentences(&numbered_sentences(21), &config).expect("chunking should succeed");

    assert_eq!(chunks.len(), 3);
    assert_eq!(config.expected_chunk_count(21), 3);

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert_eq!(chunk.sentence_count, 7);
        assert_eq!(chunk.first_sentence, i * 7);
    }

    // No overlap: boundaries fall exactly on sentence 7 and 14
    assert!(chunks[0].text.ends_with("number 7."));
    assert!(chunks[1].text.starts_with("This is sentence number 8."));
    assert!(chunks[2].text.ends_with("number 21."));
}

#[test]
fn chunk_count_matches_window_arithmetic() {
    for sentences_per_chunk in 1..=8 {
        for overlap in 0..sentences_per_chunk {
            let config = ChunkingConfig {
                sentences_per_chunk,
                overlap,
            };
            for n in 0..=30 {
                let sentences: Vec<String> = (0..n).map(|i| format!("S{i}.")).collect();
                let chunks = window_sentences(&sentences, &config).expect("valid config");
                assert_eq!(
                    chunks.len(),
                    config.expected_chunk_count(n),
                    "C={sentences_per_chunk} O={overlap} N={n}"
                );
                if n > overlap {
                    let step = sentences_per_chunk - overlap;
                    assert_eq!(chunks.len(), (n - overlap).div_ceil(step));
                }
            }
        }
    }
}

#[test]
fn overlapping_windows_share_sentences() {
    let sentences: Vec<String> = (0..10).map(|i| format!("S{i}.")).collect();
    let config = ChunkingConfig {
        sentences_per_chunk: 4,
        overlap: 1,
    };

    let chunks = window_sentences(&sentences, &config).expect("valid config");
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

    assert_eq!(
        texts,
        vec!["S0. S1. S2. S3.", "S3. S4. S5. S6.", "S6. S7. S8. S9."]
    );
}

#[test]
fn last_window_may_be_short() {
    let chunks = chunk_by_sentences(&numbered_sentences(9), &ChunkingConfig::default())
        .expect("chunking should succeed");

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[1].sentence_count, 2);
    assert_eq!(chunks[1].first_sentence, 7);
}

#[test]
fn invalid_config_is_rejected() {
    let sentences = vec!["One.".to_string()];

    let zero = ChunkingConfig {
        sentences_per_chunk: 0,
        overlap: 0,
    };
    assert!(window_sentences(&sentences, &zero).is_err());

    let too_much_overlap = ChunkingConfig {
        sentences_per_chunk: 3,
        overlap: 3,
    };
    assert!(window_sentences(&sentences, &too_much_overlap).is_err());
}

#[test]
fn empty_document_has_no_chunks() {
    let chunks =
        chunk_by_sentences("", &ChunkingConfig::default()).expect("chunking should succeed");
    assert!(chunks.is_empty());
}
