//! Reference-list parsing.

/// One meaningful input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLine {
    /// 1-based position in the original input.
    pub line: usize,
    /// The line as read, trailing newline removed.
    pub raw: String,
}

/// Blank lines and `#` comments carry no reference.
pub fn is_ignorable(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Number lines from 1 and drop the ignorable ones.
pub fn reference_lines<I, S>(lines: I) -> impl Iterator<Item = ReferenceLine>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    lines
        .into_iter()
        .enumerate()
        .map(|(i, raw)| ReferenceLine {
            line: i + 1,
            raw: raw.into(),
        })
        .filter(|r| !is_ignorable(&r.raw))
}

/// Split text into lines, accepting `\n` and `\r\n` endings.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}
