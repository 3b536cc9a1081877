//! Small text-scanning helpers shared by the heuristics.

use regex::Regex;

/// Compile `patterns`, dropping any that fail to parse.
pub(crate) fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(pattern = %p, error = %e, "skipping invalid pattern");
                None
            }
        })
        .collect()
}

/// How many of `needles` occur in `haystack` (already lowercased).
pub(crate) fn count_present(haystack: &str, needles: &[&str]) -> usize {
    needles.iter().filter(|n| haystack.contains(*n)).count()
}

/// How many of `patterns` match somewhere in `text`.
pub(crate) fn count_matching(text: &str, patterns: &[Regex]) -> usize {
    patterns.iter().filter(|re| re.is_match(text)).count()
}

/// `n / (n + k)`: 0 at zero, 0.5 at `k`, approaching 1.
pub(crate) fn squash(n: u64, k: f64) -> f64 {
    let n = n as f64;
    (n / (n + k)).min(1.0)
}

pub(crate) fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Lines from the first heading matching `heading` up to (not including) the
/// next heading.
pub(crate) fn section_after(text: &str, heading: &Regex) -> String {
    let mut out = Vec::new();
    let mut inside = false;
    for line in text.lines() {
        let is_heading = line.trim_start().starts_with('#');
        if !inside {
            if is_heading && heading.is_match(line) {
                inside = true;
                out.push(line);
            }
        } else if is_heading {
            break;
        } else {
            out.push(line);
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squash_midpoint_and_bounds() {
        assert_eq!(squash(0, 100.0), 0.0);
        assert_eq!(squash(100, 100.0), 0.5);
        assert!(squash(u64::MAX, 100.0) <= 1.0);
    }

    #[test]
    fn test_section_after_stops_at_next_heading() {
        let re = Regex::new(r"(?i)^#+\s*license").unwrap();
        let text = "# Model\nintro\n## License\nMIT\nmore\n## Citation\nbib";
        assert_eq!(section_after(text, &re), "## License\nMIT\nmore");
        assert_eq!(section_after("no headings", &re), "");
    }

    #[test]
    fn test_compile_skips_invalid() {
        let res = compile(&[r"ok", r"(unclosed"]);
        assert_eq!(res.len(), 1);
    }

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(1.7), 1.0);
        assert_eq!(clamp01(-0.1), 0.0);
        assert_eq!(clamp01(f64::NAN), 0.0);
    }
}
