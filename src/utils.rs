/// Maps a 1-based line/column pair, as reported by the XML and JSON parsers, to a byte offset.
/// Positions past the end of a line or of the text clamp to the nearest valid offset.
pub fn get_offset(source: &str, line: usize, column: usize) -> usize {
    let mut current_line = 1;
    let mut current_column = 1;
    for (i, c) in source.char_indices() {
        if current_line == line && current_column >= column {
            return i;
        }
        if c == '\n' {
            if current_line == line {
                return i;
            }
            current_line += 1;
            current_column = 1;
        } else {
            current_column += 1;
        }
    }
    source.len()
}

/// Whether `name` is an ASCII identifier: a letter or `_`, then letters, digits or `_`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strips carriage returns and surrounding tabs/spaces from one documentation line.
pub fn clean_line(line: &str) -> String {
    line.replace('\r', "")
        .trim_matches('\t')
        .trim_matches(' ')
        .to_string()
}

/// Joins the lines of a multi-line text into one space-separated line.
pub fn single_line(text: &str) -> String {
    clean_line(&text.split('\n').collect::<Vec<_>>().join(" "))
}
