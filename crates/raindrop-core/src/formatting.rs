//! Formatting utilities (notices → Telegram HTML, list exports).

use crate::{
    domain::Snowflake,
    messaging::types::{Notice, NoticeKind},
};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn kind_marker(kind: NoticeKind) -> &'static str {
    match kind {
        NoticeKind::Info => "ℹ️",
        NoticeKind::Success => "✅",
        NoticeKind::Error => "❌",
    }
}

/// Render a notice as Telegram HTML: marker + bold title, body, then fields.
pub fn notice_to_html(notice: &Notice) -> String {
    let mut out = format!(
        "{} <b>{}</b>",
        kind_marker(notice.kind),
        escape_html(&notice.title)
    );
    if !notice.body.is_empty() {
        out.push('\n');
        out.push_str(&escape_html(&notice.body));
    }
    for field in &notice.fields {
        out.push_str("\n\n<b>");
        out.push_str(&escape_html(&field.name));
        out.push_str("</b>\n");
        out.push_str(&escape_html(&field.value));
    }
    out
}

/// Render a notice as one or more HTML messages of at most `limit` bytes.
///
/// Breaks at line boundaries where possible. Bold markup is never split across
/// two messages, and escapes are never cut in half.
pub fn notice_to_html_chunks(notice: &Notice, limit: usize) -> Vec<String> {
    let html = notice_to_html(notice);
    if html.len() <= limit {
        return vec![html];
    }

    let mut chunks = HtmlChunks::new(limit);
    chunks.push_bold(&format!("{} ", kind_marker(notice.kind)), &notice.title);
    if !notice.body.is_empty() {
        chunks.push_text("\n");
        chunks.push_text(&notice.body);
    }
    for field in &notice.fields {
        chunks.push_text("\n\n");
        chunks.push_bold("", &field.name);
        chunks.push_text("\n");
        chunks.push_text(&field.value);
    }
    chunks.finish()
}

struct HtmlChunks {
    limit: usize,
    out: Vec<String>,
    cur: String,
}

impl HtmlChunks {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            out: Vec::new(),
            cur: String::new(),
        }
    }

    fn push_bold(&mut self, prefix: &str, text: &str) {
        let html = format!("{prefix}<b>{}</b>", escape_html(text));
        if html.len() > self.limit {
            self.push_text(prefix);
            self.push_text(text);
            return;
        }
        if self.cur.len() + html.len() > self.limit {
            self.flush();
        }
        self.cur.push_str(&html);
    }

    fn push_text(&mut self, text: &str) {
        for line in text.split_inclusive('\n') {
            let escaped = escape_html(line);
            if self.cur.len() + escaped.len() <= self.limit {
                self.cur.push_str(&escaped);
                continue;
            }
            self.flush();
            if escaped.len() <= self.limit {
                self.cur.push_str(&escaped);
                continue;
            }
            let mut buf = [0u8; 4];
            for ch in line.chars() {
                let piece = escape_html(ch.encode_utf8(&mut buf));
                if self.cur.len() + piece.len() > self.limit {
                    self.flush();
                }
                self.cur.push_str(&piece);
            }
        }
    }

    fn flush(&mut self) {
        let chunk = std::mem::take(&mut self.cur);
        let chunk = chunk.trim_matches('\n');
        if !chunk.trim().is_empty() {
            self.out.push(chunk.to_string());
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.out
    }
}

/// One id per line, each line newline-terminated.
pub fn export_ids<'a>(ids: impl IntoIterator<Item = &'a Snowflake>) -> String {
    let mut out = String::new();
    for id in ids {
        out.push_str(id.as_str());
        out.push('\n');
    }
    out
}
