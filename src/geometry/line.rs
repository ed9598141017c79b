//! YOLO label-line format.
//!
//! One object per line: `<class_index> <x_center> <y_center> <width> <height>`,
//! floats with exactly six fractional digits. External training tooling
//! reads these files byte for byte, so [`format_label_line`] must not change.

use std::fmt;
use std::path::Path;

use tracing::warn;

use super::NormalizedBox;
use crate::error::MalformedLine;

/// One parsed or to-be-written label line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelLine {
    pub class_index: usize,
    pub bbox: NormalizedBox,
}

impl LabelLine {
    pub fn new(class_index: usize, bbox: NormalizedBox) -> Self {
        Self { class_index, bbox }
    }
}

impl fmt::Display for LabelLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_index,
            self.bbox.x_center,
            self.bbox.y_center,
            self.bbox.width,
            self.bbox.height
        )
    }
}

/// Serializes one label line, without the trailing newline.
pub fn format_label_line(class_index: usize, bbox: &NormalizedBox) -> String {
    LabelLine::new(class_index, *bbox).to_string()
}

/// Parses a single line. Blank lines yield `Ok(None)`.
///
/// Tokens after the fifth are ignored. `line_num` is 1-based and only used
/// for the error.
pub fn parse_label_line(line: &str, line_num: usize) -> Result<Option<LabelLine>, MalformedLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().take(5).collect();
    if tokens.len() < 5 {
        return Err(MalformedLine {
            line: line_num,
            message: format!("expected 5 tokens, found {}", tokens.len()),
        });
    }

    let class_index = tokens[0].parse::<usize>().map_err(|_| MalformedLine {
        line: line_num,
        message: format!(
            "invalid class index '{}'; expected non-negative integer",
            tokens[0]
        ),
    })?;

    let x_center = parse_f64_token(tokens[1], "x_center", line_num)?;
    let y_center = parse_f64_token(tokens[2], "y_center", line_num)?;
    let width = parse_f64_token(tokens[3], "width", line_num)?;
    let height = parse_f64_token(tokens[4], "height", line_num)?;

    Ok(Some(LabelLine::new(
        class_index,
        NormalizedBox::new(x_center, y_center, width, height),
    )))
}

/// Parses a whole label file, skipping malformed lines with a warning.
pub fn parse_label_lines(content: &str, source: &Path) -> Vec<LabelLine> {
    let mut lines = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        match parse_label_line(raw, idx + 1) {
            Ok(Some(parsed)) => lines.push(parsed),
            Ok(None) => {}
            Err(malformed) => {
                warn!(path = %source.display(), "skipping malformed label {}", malformed);
            }
        }
    }
    lines
}

/// Fuzz-only entrypoint: parses `input` and, if it is accepted, checks that
/// formatting and re-parsing keeps it within six-decimal rounding.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_label_line(input: &str) {
    let Ok(Some(parsed)) = parse_label_line(input, 1) else {
        return;
    };
    let formatted = parsed.to_string();
    let reparsed = match parse_label_line(&formatted, 1) {
        Ok(Some(line)) => line,
        other => panic!("formatted line {formatted:?} did not re-parse: {other:?}"),
    };
    assert_eq!(parsed.class_index, reparsed.class_index);

    let pairs = [
        (parsed.bbox.x_center, reparsed.bbox.x_center),
        (parsed.bbox.y_center, reparsed.bbox.y_center),
        (parsed.bbox.width, reparsed.bbox.width),
        (parsed.bbox.height, reparsed.bbox.height),
    ];
    for (a, b) in pairs {
        assert!((a - b).abs() <= 5e-7 + 1e-12 + a.abs() * 1e-15, "{a} drifted to {b}");
    }
}

fn parse_f64_token(raw: &str, field_name: &str, line_num: usize) -> Result<f64, MalformedLine> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(MalformedLine {
            line: line_num,
            message: format!("invalid {field_name} '{raw}'; expected a finite number"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_uses_six_fractional_digits() {
        let line = format_label_line(1, &NormalizedBox::new(0.15, 0.2, 0.2, 0.2));
        assert_eq!(line, "1 0.150000 0.200000 0.200000 0.200000");
    }

    #[test]
    fn format_rounds_rather_than_truncates() {
        let line = format_label_line(0, &NormalizedBox::new(0.1234567, 0.5, 1.0 / 3.0, 0.25));
        assert_eq!(line, "0 0.123457 0.500000 0.333333 0.250000");
    }

    #[test]
    fn parse_accepts_valid_rows() {
        let parsed = parse_label_line("2 0.5 0.25 0.3 0.1", 1)
            .expect("parse should succeed")
            .expect("line should produce a row");

        assert_eq!(
            parsed,
            LabelLine::new(2, NormalizedBox::new(0.5, 0.25, 0.3, 0.1))
        );
    }

    #[test]
    fn parse_is_left_inverse_of_format() {
        let original = LabelLine::new(3, NormalizedBox::new(0.25, 0.75, 0.5, 0.125));
        let parsed = parse_label_line(&original.to_string(), 1)
            .expect("parse")
            .expect("row");
        assert_eq!(parsed, original);
    }

    #[test]
    fn parse_skips_blank_rows() {
        assert!(parse_label_line("   ", 2).expect("blank is fine").is_none());
    }

    #[test]
    fn parse_rejects_short_rows() {
        let err = parse_label_line("0 0.1 0.2", 3).unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("expected 5 tokens"));
    }

    #[test]
    fn parse_rejects_non_numeric_and_negative_tokens() {
        assert!(parse_label_line("x 0.1 0.2 0.3 0.4", 1).is_err());
        assert!(parse_label_line("-1 0.1 0.2 0.3 0.4", 1).is_err());
        assert!(parse_label_line("0 0.1 abc 0.3 0.4", 1).is_err());
        assert!(parse_label_line("0 0.1 nan 0.3 0.4", 1).is_err());
    }

    #[test]
    fn parse_ignores_trailing_tokens() {
        let parsed = parse_label_line("0 0.1 0.2 0.3 0.4 0.9 0.9", 1)
            .expect("parse")
            .expect("row");
        assert_eq!(parsed.bbox.height, 0.4);
    }

    #[test]
    fn file_parse_keeps_good_lines_around_corrupt_ones() {
        let content = "0 0.5 0.5 0.2 0.2\ngarbage\n\n1 0.1 0.1 0.05 0.05\n0 0.3\n";
        let lines = parse_label_lines(content, Path::new("a.txt"));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].class_index, 0);
        assert_eq!(lines[1].class_index, 1);
    }
}
