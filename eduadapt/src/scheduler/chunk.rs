//! Sentence-boundary chunking for long blocks.

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Text at or under the limit is returned whole. Longer text is split only at
/// sentence boundaries (`.`, `!` or `?` followed by whitespace), so a single
/// sentence longer than the limit becomes its own oversized chunk.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for sentence in split_sentences(text) {
        let len = sentence.chars().count();
        if current.is_empty() {
            current.push_str(sentence);
            current_len = len;
        } else if current_len + 1 + len <= max_chars {
            current.push(' ');
            current.push_str(sentence);
            current_len += 1 + len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Sentences with their terminal punctuation, trimmed.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            if let Some((next_index, next)) = chars.peek() {
                if next.is_whitespace() {
                    let sentence = text[start..*next_index].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    start = index + ch.len_utf8();
                }
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Join adapted chunk outputs into one text.
///
/// Each output is trimmed; an empty output still contributes its separator.
pub fn join_chunks(outputs: &[String]) -> String {
    outputs
        .iter()
        .map(|o| o.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Sentence number {i} talks about the water cycle and clouds."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_short_text_single_chunk() {
        assert_eq!(split_into_chunks("One. Two.", 900), vec!["One. Two."]);
    }

    #[test]
    fn test_long_text_chunks_bounded_and_complete() {
        let text = long_text(40);
        assert!(text.chars().count() > 900);

        let chunks = split_into_chunks(&text, 900);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 900));
        assert_eq!(chunks.join(" "), text);
        assert!(chunks.iter().all(|c| c.ends_with('.')));
    }

    #[test]
    fn test_oversized_sentence_kept_whole() {
        let giant = format!("{}.", "word ".repeat(300).trim());
        let text = format!("Short start. {giant} Short end.");
        let chunks = split_into_chunks(&text, 900);
        assert_eq!(chunks, vec!["Short start.".to_string(), giant, "Short end.".to_string()]);
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("Hi there! Is it 3.5 km? Yes.\nDone"),
            vec!["Hi there!", "Is it 3.5 km?", "Yes.", "Done"]
        );
    }

    #[test]
    fn test_join_keeps_empty_outputs() {
        assert_eq!(join_chunks(&[" A. ".to_string(), String::new(), "C.\n".to_string()]), "A.\n\n\n\nC.");
    }
}
