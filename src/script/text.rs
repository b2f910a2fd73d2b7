//! Line-level text handling shared by the script, parameter and phase
//! compilers.

use super::CompileError;

/// One logical line of script text with its 1-based line number.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

impl SourceLine {
    pub fn new<S: Into<String>>(number: usize, text: S) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// Removes comments and blank lines, keeping original line numbers.
///
/// `#` starts a comment running to the end of the line; a line holding only
/// `###` opens or closes a comment block.
pub fn clean_script(text: &str) -> Result<Vec<SourceLine>, CompileError> {
    let mut lines = Vec::new();
    let mut block_start: Option<usize> = None;
    let mut last_number = 1;

    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;
        last_number = number;
        let line = raw.replace('\t', " ");
        let line = line.trim();

        if line == "###" {
            block_start = match block_start {
                Some(_) => None,
                None => Some(number),
            };
            continue;
        }
        if block_start.is_some() {
            continue;
        }

        let content = match line.find('#') {
            Some(pos) => line[..pos].trim(),
            None => line,
        };
        if !content.is_empty() {
            lines.push(SourceLine::new(number, content));
        }
    }

    if let Some(start) = block_start {
        return Err(CompileError::new(
            last_number,
            format!(
                "Comment block start '###' on line {} has no matching end.",
                start
            ),
        ));
    }
    if lines.is_empty() {
        return Err(CompileError::new(1, "Script is empty."));
    }
    Ok(lines)
}

/// Joins a line ending with a comma with the lines that follow it.
pub fn merge_continuations(lines: Vec<SourceLine>) -> Vec<SourceLine> {
    let mut merged: Vec<SourceLine> = Vec::with_capacity(lines.len());
    let mut continuing = false;
    for line in lines {
        match merged.last_mut() {
            Some(last) if continuing => {
                last.text.push(' ');
                last.text.push_str(&line.text);
            }
            _ => merged.push(line),
        }
        continuing = merged
            .last()
            .map(|l| l.text.ends_with(','))
            .unwrap_or(false);
    }
    merged
}

/// Splits on `separator` where it is not nested in parentheses or brackets.
///
/// Items are trimmed; a trailing separator does not produce an empty item.
pub fn split_list(text: &str, separator: char) -> Vec<String> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            _ => {}
        }
        if c == separator && depth == 0 {
            items.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }
    let last = current.trim();
    if !last.is_empty() || (!items.is_empty() && !text.trim_end().ends_with(separator)) {
        items.push(last.to_string());
    }
    items
}

/// Splits a phase line on `|`, leaving the `||` operator intact.
pub fn split_bars(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '|' {
            if chars.get(i + 1) == Some(&'|') {
                current.push_str("||");
                i += 2;
                continue;
            }
            parts.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(chars[i]);
        }
        i += 1;
    }
    parts.push(current.trim().to_string());
    parts
}

/// Splits `key:value` at the first top-level colon.
pub fn split_key_value(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    for (pos, c) in text.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ':' if depth == 0 => return Some((text[..pos].trim(), text[pos + 1..].trim())),
            _ => {}
        }
    }
    None
}

/// Number of colons outside parentheses and brackets.
pub fn count_top_level_colons(text: &str) -> usize {
    let mut depth = 0i32;
    let mut count = 0;
    for c in text.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ':' if depth == 0 => count += 1,
            _ => {}
        }
    }
    count
}

/// Splits off the first whitespace-delimited word.
pub fn split_first_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.find(char::is_whitespace) {
        Some(pos) => (&text[..pos], text[pos..].trim()),
        None => (text, ""),
    }
}
