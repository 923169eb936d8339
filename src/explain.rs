// src/explain.rs
//! Human-readable rendering of rules and matched lines, for `--explain`
//! and for showing the loaded configuration.
use crate::extractor::{locate, FieldSpan};
use crate::merge::MergedLine;
use crate::rules::{Element, EndBoundary, Rule, RuleSet};
use is_terminal::IsTerminal;
use std::io::{self, Write};
use terminal_size::{terminal_size, Width};

/// ANSI color codes for highlighted output
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub label: &'static str,  // Bold blue for element summary labels
    pub marker: &'static str, // Red for start/end markers
    pub value: &'static str,  // Bold green for extracted values
    pub name: &'static str,   // Bold cyan for app names
    pub faint: &'static str,  // Dim for captions
    pub reset: &'static str,  // Reset to default color
}

impl ColorScheme {
    pub fn new(use_colors: bool) -> Self {
        if use_colors {
            Self {
                label: "\x1b[1;34m",
                marker: "\x1b[31m",
                value: "\x1b[1;32m",
                name: "\x1b[1;36m",
                faint: "\x1b[2m",
                reset: "\x1b[0m",
            }
        } else {
            // All empty strings for no-color mode
            Self {
                label: "",
                marker: "",
                value: "",
                name: "",
                faint: "",
                reset: "",
            }
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if text.is_empty() {
            String::new()
        } else {
            format!("{}{}{}", color, text, self.reset)
        }
    }
}

/// Colors only when the stream is attached to a terminal
pub fn should_use_colors<T: IsTerminal>(stream: &T) -> bool {
    stream.is_terminal()
}

/// Get terminal width, default to 80 if not available
pub fn terminal_width() -> usize {
    if let Some((Width(w), _)) = terminal_size() {
        w as usize
    } else {
        80
    }
}

/// Printed width of text, ignoring ANSI escape sequences
fn visible_len(text: &str) -> usize {
    let mut len = 0;
    let mut in_escape = false;
    for c in text.chars() {
        match (in_escape, c) {
            (false, '\x1b') => in_escape = true,
            (true, 'm') => in_escape = false,
            (true, _) => {}
            (false, _) => len += 1,
        }
    }
    len
}

/// Word-wrap a single line to `width` visible columns.
///
/// Words longer than the width are kept whole.
pub fn wrap(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut column = 0;
    for (i, word) in text.split(' ').enumerate() {
        let len = visible_len(word);
        if i > 0 {
            if column > 0 && column + 1 + len > width {
                out.push('\n');
                column = 0;
            } else {
                out.push(' ');
                column += 1;
            }
        }
        out.push_str(word);
        column += len;
    }
    out
}

/// One-line description of an element's boundaries
pub fn element_summary(element: &Element, colors: &ColorScheme) -> String {
    let mut parts = Vec::new();

    if let Some(name) = &element.display_name {
        parts.push(format!("{}: {:<23}", colors.paint(colors.label, "ColName"), name));
    }
    parts.push(format!(
        "{}: {:<23}",
        colors.paint(colors.label, "Start"),
        format!("'{}'", element.start.pattern())
    ));
    match &element.end {
        EndBoundary::LineEnd => parts.push(format!(
            "{}: '{}'",
            colors.paint(colors.label, "End"),
            crate::rules::END_OF_LINE
        )),
        EndBoundary::Literal(marker) => {
            parts.push(format!("{}: '{}'", colors.paint(colors.label, "End"), marker))
        }
        EndBoundary::Length(length) => {
            parts.push(format!("{}: {}", colors.paint(colors.label, "Len"), length))
        }
        EndBoundary::Unbounded => {}
    }

    parts.join(" ").trim_end().to_string()
}

/// Mark every element the rule can locate in the line.
///
/// Start and end markers get one color and the extracted value another.
/// Where located elements overlap only the first is marked.
pub fn highlight_line(line: &str, rule: &Rule, colors: &ColorScheme) -> String {
    let mut spans: Vec<FieldSpan> = rule
        .elements
        .iter()
        .filter_map(|element| locate(line, element))
        .collect();
    spans.sort_by_key(|span| (span.start, span.end));

    let mut out = String::with_capacity(line.len() * 2);
    let mut cursor = 0;
    for span in spans {
        if span.start < cursor {
            continue;
        }
        out.push_str(&line[cursor..span.start]);
        out.push_str(&colors.paint(colors.marker, &line[span.start..span.value_start]));
        out.push_str(&colors.paint(colors.value, &line[span.value_start..span.value_end]));
        out.push_str(&colors.paint(colors.marker, &line[span.value_end..span.end]));
        cursor = span.end;
    }
    out.push_str(&line[cursor..]);
    out
}

/// Readable listing of every group, its rules and their elements
pub fn config_summary(rules: &RuleSet, colors: &ColorScheme, width: usize) -> String {
    let caption = |text: &str, pad: usize| colors.paint(colors.faint, &format!("{:<pad$}", text));
    let mut lines = Vec::new();

    for group in rules.groups() {
        lines.push("--------- Configurations ----------".to_string());
        lines.push(format!(
            "{}   {}",
            caption("AppName:", 10),
            colors.paint(colors.name, &group.id)
        ));
        if let Some(block) = &group.block {
            lines.push(format!(
                "{}   start {:?} end {:?} ({:?})",
                caption("Blocks:", 10),
                block.start,
                block.end,
                block.policy
            ));
        }
        lines.push(caption("LogLines:", 25));

        for rule in &group.rules {
            lines.push(wrap(
                &highlight_line(&rule.example_line, rule, colors),
                width.saturating_sub(1),
            ));
            lines.push(format!("  {}: {}", caption("Tag", 25), rule.tag));
            let patterns: Vec<String> = rule.required.iter().map(|p| format!("\"{}\"", p)).collect();
            lines.push(format!("  {}: {}", caption("Patterns", 25), patterns.join(" ")));
            for element in &rule.elements {
                lines.push(format!(
                    "  {}: {}",
                    caption(&format!("- {}", element.key), 25),
                    element_summary(element, colors)
                ));
            }
        }
    }

    let mut summary = lines.join("\n");
    summary.push('\n');
    summary
}

/// Writes a highlighted description of each matched line
pub struct Explainer<'w> {
    out: Box<dyn Write + 'w>,
    colors: ColorScheme,
    width: usize,
}

impl<'w> Explainer<'w> {
    pub fn new(out: Box<dyn Write + 'w>, colors: ColorScheme, width: usize) -> Self {
        Explainer { out, colors, width }
    }

    pub fn explain_line(&mut self, line: &MergedLine, rule: &Rule) -> io::Result<()> {
        let colors = &self.colors;
        writeln!(
            self.out,
            "{}",
            colors.paint(
                colors.faint,
                &format!("[input {} line {}] {}", line.source, line.line_number, rule.tag)
            )
        )?;
        writeln!(
            self.out,
            "{}",
            wrap(&highlight_line(&line.text, rule, colors), self.width.saturating_sub(1))
        )?;
        for element in &rule.elements {
            writeln!(self.out, "  {}", element_summary(element, colors))?;
        }
        self.out.flush()
    }
}
