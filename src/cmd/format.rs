/*!
format.rs

Human-facing output for the `devconsole` binary.

  - StyleOptions::detect() -> colour / emoji / width decisions (NO_COLOR, NO_EMOJI, COLUMNS);
                              plain when stdout is not a terminal
  - color(role, text, &style) / emoji(tag, &style)
  - banner(title, subtitle, &style)  -> one-line boxed heading
  - table(headers, rows, TableOpts, &style)
  - TerminalSink                     -> console `OutputSink` writing to stdout/stderr

JSON output paths do not go through these helpers.
*/

use std::borrow::Cow;
use std::io::{IsTerminal, Write};

use devconsole::console::context::{Level, Message, OutputSink};

/* -------------------------------------------------------------------------- */
/* Style Options                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub use_emoji: bool,
    pub term_width: usize,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::detect()
    }
}

impl StyleOptions {
    pub fn detect() -> Self {
        let term_width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|w| w.clamp(40, 220))
            .unwrap_or(100);

        if !std::io::stdout().is_terminal() {
            return StyleOptions {
                term_width,
                ..Self::plain()
            };
        }
        StyleOptions {
            use_color: std::env::var_os("NO_COLOR").is_none(),
            use_emoji: std::env::var_os("NO_EMOJI").is_none(),
            term_width,
        }
    }

    /// No colour, no emoji.
    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            use_emoji: false,
            term_width: 100,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Color / Emoji                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Primary,
    Secondary,
    Accent,
    Success,
    Warning,
    Error,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Primary => "38;5;45",
        Role::Secondary => "38;5;250",
        Role::Accent => "38;5;213",
        Role::Success => "38;5;82",
        Role::Warning => "38;5;214",
        Role::Error => "38;5;196",
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

pub fn emoji(tag: &str, style: &StyleOptions) -> &'static str {
    if !style.use_emoji {
        return "";
    }
    match tag {
        "error" => "✖",
        "warn" => "⚠",
        "info" => "ℹ",
        "list" => "📜",
        "var" => "🎛",
        _ => "",
    }
}

/* -------------------------------------------------------------------------- */
/* Banner                                                                     */
/* -------------------------------------------------------------------------- */

/// Single boxed heading line, clipped to the terminal width.
pub fn banner(title: impl AsRef<str>, subtitle: Option<&str>, style: &StyleOptions) -> String {
    let mut inner = color(Role::Primary, title.as_ref(), style);
    if let Some(sub) = subtitle {
        inner.push_str("  ");
        inner.push_str(&color(Role::Secondary, sub, style));
    }
    let max_inner = style.term_width.saturating_sub(4).max(10);
    let width = display_width(&inner);
    let inner = if width > max_inner {
        truncate_ellipsis(&strip_ansi(&inner), max_inner)
    } else {
        inner
    };
    let width = display_width(&inner);
    let rule = "─".repeat(width + 2);
    format!("┌{rule}┐\n│ {inner} │\n└{rule}┘")
}

/* -------------------------------------------------------------------------- */
/* Table Rendering                                                             */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct TableOpts {
    /// 0 means the style's terminal width.
    pub max_width: usize,
    pub header_sep: bool,
    pub min_col_width: usize,
}

impl Default for TableOpts {
    fn default() -> Self {
        Self {
            max_width: 0,
            header_sep: true,
            min_col_width: 3,
        }
    }
}

pub fn table(
    headers: &[&str],
    rows: &[Vec<String>],
    opts: TableOpts,
    style: &StyleOptions,
) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let cols = headers.len();
    let limit = match opts.max_width {
        0 => style.term_width,
        w => w.min(style.term_width),
    };

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(cols) {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    // shrink the widest columns first until the row fits
    let total: usize = widths.iter().sum::<usize>() + (cols - 1) * 2;
    if total > limit {
        let mut overflow = total - limit;
        let mut order: Vec<usize> = (0..cols).collect();
        order.sort_by(|a, b| widths[*b].cmp(&widths[*a]));
        for idx in order {
            if overflow == 0 {
                break;
            }
            let spare = widths[idx].saturating_sub(opts.min_col_width);
            let shrink = spare.min(overflow);
            widths[idx] -= shrink;
            overflow -= shrink;
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    let header = headers
        .iter()
        .enumerate()
        .map(|(i, h)| color(Role::Accent, fit(h, widths[i]), style))
        .collect::<Vec<_>>()
        .join("  ");
    lines.push(header);
    if opts.header_sep {
        let sep = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(color(Role::Dim, sep, style));
    }
    for row in rows {
        let line = (0..cols)
            .map(|c| fit(row.get(c).map_or("", String::as_str), widths[c]))
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

fn fit(s: &str, width: usize) -> String {
    let len = display_width(s);
    if len <= width {
        return format!("{s}{}", " ".repeat(width - len));
    }
    truncate_ellipsis(&strip_ansi(s), width)
}

/* -------------------------------------------------------------------------- */
/* Text Helpers                                                                */
/* -------------------------------------------------------------------------- */

pub fn truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

fn strip_ansi(s: &str) -> Cow<'_, str> {
    if !s.contains('\x1b') {
        return Cow::Borrowed(s);
    }
    let mut buf = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        buf.push(ch);
    }
    Cow::Owned(buf)
}

fn display_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

/* -------------------------------------------------------------------------- */
/* Terminal Sink                                                               */
/* -------------------------------------------------------------------------- */

/// Writes console messages to the terminal: info/echo to stdout, warnings and
/// errors to stderr, coloured per level.
#[derive(Debug, Clone, Default)]
pub struct TerminalSink {
    style: StyleOptions,
}

impl TerminalSink {
    pub fn new(style: StyleOptions) -> Self {
        Self { style }
    }

    pub fn render(&self, message: &Message) -> String {
        let style = &self.style;
        match message.level {
            Level::Info => message.text.clone(),
            Level::Echo => color(Role::Dim, &message.text, style),
            Level::Warning => format!(
                "{} {}",
                emoji("warn", style),
                color(Role::Warning, &message.text, style)
            )
            .trim_start()
            .to_string(),
            Level::Error => format!(
                "{} {}",
                emoji("error", style),
                color(Role::Error, &message.text, style)
            )
            .trim_start()
            .to_string(),
        }
    }
}

impl OutputSink for TerminalSink {
    fn emit(&mut self, message: Message) {
        let line = self.render(&message);
        // write errors (closed pipe) are dropped
        let _ = match message.level {
            Level::Info | Level::Echo => writeln!(std::io::stdout(), "{line}"),
            Level::Warning | Level::Error => writeln!(std::io::stderr(), "{line}"),
        };
    }
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                       */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piped_stdout_gets_plain_style() {
        if std::io::stdout().is_terminal() {
            return;
        }
        let style = StyleOptions::detect();
        assert!(!style.use_color);
        assert!(!style.use_emoji);
    }

    #[test]
    fn table_aligns_columns() {
        let t = table(
            &["NAME", "VALUE"],
            &[
                vec!["gravity".into(), "9.8".into()],
                vec!["x".into(), "1".into()],
            ],
            TableOpts::default(),
            &StyleOptions::plain(),
        );
        let lines: Vec<&str> = t.lines().collect();
        assert_eq!(lines[0], "NAME     VALUE");
        assert_eq!(lines[1], "-------  -----");
        assert_eq!(lines[2], "gravity  9.8");
        assert_eq!(lines[3], "x        1");
    }

    #[test]
    fn table_shrinks_to_width() {
        let style = StyleOptions {
            term_width: 40,
            ..StyleOptions::plain()
        };
        let t = table(
            &["A", "B"],
            &[vec!["short".into(), "y".repeat(80)]],
            TableOpts::default(),
            &style,
        );
        assert!(t.lines().all(|l| l.chars().count() <= 40));
        assert!(t.contains('…'));
    }

    #[test]
    fn truncate_keeps_ellipsis() {
        assert_eq!(truncate_ellipsis("abcdef", 4), "abc…");
        assert_eq!(truncate_ellipsis("abc", 4), "abc");
    }

    #[test]
    fn strip_ansi_removes_sequences() {
        assert_eq!(strip_ansi("\x1b[31mRED\x1b[0m"), "RED");
    }

    #[test]
    fn plain_sink_renders_bare_text() {
        let sink = TerminalSink::new(StyleOptions::plain());
        let msg = Message::new(Level::Error, "not found: fly");
        assert_eq!(sink.render(&msg), "not found: fly");
    }
}
