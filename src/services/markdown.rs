//! # Markdown 渲染服务
//!
//! 将累计的模型输出转换为清洗过的 HTML。每收到一个片段都会对完整文本重新渲染，
//! 因此渲染必须是幂等的：相同输入总是得到相同输出。
//!
//! ## 渲染规则
//! 1. 文本以 ```` ``` ```` 开头时，删除第一个换行符及其之前的内容
//!    （部分模型会在回答最前面多输出一个代码围栏）
//! 2. 代码块按围栏上的语言或首行推测的语言高亮；不支持的语言只转义
//! 3. 外部链接（http / https / mailto）在新的顶层上下文打开，且不带回引用；
//!    其他协议的链接只保留文本
//! 4. 模型输出中的原始 HTML 一律转义，不会进入 DOM

use std::sync::Arc;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};

use crate::models::session::RenderedOutput;
use crate::services::highlight::{Highlighter, SyntectHighlighter};

/// 代码围栏标记
const CODE_FENCE: &str = "```";

/// 允许渲染为链接的协议
const EXTERNAL_SCHEMES: &[&str] = &["http://", "https://", "mailto:"];

/// 允许渲染为图片的协议
const IMAGE_SCHEMES: &[&str] = &["http://", "https://"];

/// 删除开头多余的代码围栏行
///
/// 只处理一次：删除后剩余文本即使仍以围栏开头，也按正常 Markdown 解释。
/// 还没有收到换行符时，整段文本都是那行围栏，返回空串。
pub fn strip_leading_fence(text: &str) -> &str {
    if !text.starts_with(CODE_FENCE) {
        return text;
    }
    match text.find('\n') {
        Some(pos) => &text[pos + 1..],
        None => "",
    }
}

/// Markdown 渲染器
#[derive(Clone)]
pub struct MarkdownRenderer {
    highlighter: Arc<dyn Highlighter>,
}

impl MarkdownRenderer {
    /// 使用指定高亮后端创建渲染器
    pub fn new(highlighter: Arc<dyn Highlighter>) -> Self {
        Self { highlighter }
    }

    /// 渲染累计文本
    pub fn render(&self, accumulated: &str) -> RenderedOutput {
        let raw = strip_leading_fence(accumulated);
        RenderedOutput {
            html: self.to_html(raw),
            raw_markdown: raw.to_string(),
        }
    }

    fn to_html(&self, markdown: &str) -> String {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS;
        let parser = Parser::new_ext(markdown, options);

        let mut events: Vec<Event> = Vec::new();
        // 正在收集的代码块：(语言, 源码)
        let mut code_block: Option<(Option<String>, String)> = None;
        // 每个打开的链接是否输出了 <a> 标签
        let mut open_links: Vec<bool> = Vec::new();
        // 每个打开的图片是否保留了 <img>；不保留时只输出替代文本
        let mut open_images: Vec<bool> = Vec::new();

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let language = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .map(|lang| lang.to_string()),
                        CodeBlockKind::Indented => None,
                    };
                    code_block = Some((language, String::new()));
                }
                Event::Text(text) if code_block.is_some() => {
                    if let Some((_, source)) = code_block.as_mut() {
                        source.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((language, source)) = code_block.take() {
                        let block = self.code_block_html(language.as_deref(), &source);
                        events.push(Event::Html(CowStr::from(block)));
                    }
                }
                Event::Start(Tag::Link {
                    dest_url, title, ..
                }) => match external_anchor(&dest_url, &title) {
                    Some(anchor) => {
                        events.push(Event::InlineHtml(CowStr::from(anchor)));
                        open_links.push(true);
                    }
                    None => open_links.push(false),
                },
                Event::End(TagEnd::Link) => {
                    if open_links.pop().unwrap_or(false) {
                        events.push(Event::InlineHtml(CowStr::Borrowed("</a>")));
                    }
                }
                Event::Start(Tag::Image { ref dest_url, .. }) => {
                    if has_scheme(dest_url, IMAGE_SCHEMES) {
                        open_images.push(true);
                        events.push(event);
                    } else {
                        open_images.push(false);
                    }
                }
                Event::End(TagEnd::Image) => {
                    if open_images.pop().unwrap_or(false) {
                        events.push(event);
                    }
                }
                // 原始 HTML 作为文本输出（转义）
                Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
                other => events.push(other),
            }
        }

        let mut output = String::with_capacity(markdown.len() * 2);
        html::push_html(&mut output, events.into_iter());
        output
    }

    fn code_block_html(&self, language: Option<&str>, source: &str) -> String {
        let language = language
            .filter(|lang| self.highlighter.supports_language(lang))
            .map(|lang| lang.to_string())
            .or_else(|| self.highlighter.detect_language(source));

        let highlighted = language
            .as_deref()
            .and_then(|lang| self.highlighter.highlight(source, lang));

        match (language, highlighted) {
            (Some(lang), Some(body)) => format!(
                "<pre><code class=\"language-{}\">{}</code></pre>\n",
                html_escape::encode_double_quoted_attribute(&lang.to_lowercase()),
                body
            ),
            _ => format!(
                "<pre><code>{}</code></pre>\n",
                html_escape::encode_text(source)
            ),
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(Arc::new(SyntectHighlighter::new()))
    }
}

/// 地址是否使用白名单中的协议（不区分大小写）
fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    schemes.iter().any(|scheme| lower.starts_with(scheme))
}

/// 为外部链接生成开始标签；不允许的协议返回 `None`
fn external_anchor(dest_url: &str, title: &str) -> Option<String> {
    if !has_scheme(dest_url, EXTERNAL_SCHEMES) {
        return None;
    }

    let mut anchor = format!(
        "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\"",
        html_escape::encode_double_quoted_attribute(dest_url.trim())
    );
    if !title.is_empty() {
        anchor.push_str(&format!(
            " title=\"{}\"",
            html_escape::encode_double_quoted_attribute(title)
        ));
    }
    anchor.push('>');
    Some(anchor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::highlight::PlainHighlighter;
    use pretty_assertions::assert_eq;

    fn plain() -> MarkdownRenderer {
        MarkdownRenderer::new(Arc::new(PlainHighlighter))
    }

    #[test]
    fn test_strip_leading_fence() {
        assert_eq!(strip_leading_fence("```markdown\n# Title"), "# Title");
        assert_eq!(strip_leading_fence("```"), "");
        assert_eq!(strip_leading_fence("plain ``` text"), "plain ``` text");
        // 只删除一次
        assert_eq!(strip_leading_fence("```\n```rust\nfn a() {}"), "```rust\nfn a() {}");
    }

    #[test]
    fn test_render_simple_answer() {
        let output = plain().render("4");
        assert_eq!(output.html, "<p>4</p>\n");
        assert_eq!(output.raw_markdown, "4");
    }

    #[test]
    fn test_render_is_idempotent() {
        let renderer = MarkdownRenderer::default();
        let text = "# Hi\n\n```rust\nfn main() {}\n```\n\nSee [docs](https://example.com).";
        assert_eq!(renderer.render(text), renderer.render(text));
    }

    #[test]
    fn test_stray_fence_not_rendered_literally() {
        let output = plain().render("```markdown\n**bold**");
        assert_eq!(output.raw_markdown, "**bold**");
        assert_eq!(output.html, "<p><strong>bold</strong></p>\n");
        assert!(!output.html.contains("```"));
    }

    #[test]
    fn test_external_links_open_without_opener() {
        let output = plain().render("[site](https://example.com \"Example\")");
        assert_eq!(
            output.html,
            "<p><a href=\"https://example.com\" target=\"_blank\" rel=\"noopener noreferrer\" title=\"Example\">site</a></p>\n"
        );
    }

    #[test]
    fn test_unsafe_link_scheme_keeps_text_only() {
        let output = plain().render("[click](javascript:alert(1))");
        assert_eq!(output.html, "<p>click</p>\n");
    }

    #[test]
    fn test_unsafe_image_scheme_keeps_alt_text_only() {
        let output = plain().render("![x](javascript:alert(1))");
        assert_eq!(output.html, "<p>x</p>\n");
        assert!(!output.html.contains("<img"));
    }

    #[test]
    fn test_https_image_is_kept() {
        let output = plain().render("![logo](https://example.com/a.png)");
        assert_eq!(
            output.html,
            "<p><img src=\"https://example.com/a.png\" alt=\"logo\" /></p>\n"
        );
    }

    #[test]
    fn test_detected_language_class_has_no_spaces() {
        let output = MarkdownRenderer::default().render("Run:\n\n```\n#!/bin/bash\necho hi\n```");
        let start = output.html.find("class=\"").expect("language class") + 7;
        let class = &output.html[start..start + output.html[start..].find('"').unwrap()];
        assert!(class.starts_with("language-"));
        assert!(!class.contains(' '), "{}", class);
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let output = plain().render("<script>alert(1)</script>\n\nhi <b>x</b>");
        assert!(!output.html.contains("<script>"));
        assert!(!output.html.contains("<b>"));
        assert!(output.html.contains("&lt;script&gt;"));
        assert!(output.html.contains("&lt;b&gt;x&lt;/b&gt;"));
    }

    #[test]
    fn test_unknown_language_is_escaped_not_failed() {
        let output = plain().render("```klingon\nif a < b {}\n```");
        assert_eq!(output.html, "<pre><code>if a &lt; b {}\n</code></pre>\n");
    }

    #[test]
    fn test_known_language_is_highlighted() {
        let output = MarkdownRenderer::default().render("text\n\n```rust\nlet x = 1;\n```");
        assert!(output.html.contains("<pre><code class=\"language-rust\">"));
        assert!(output.html.contains("<span"));
    }

    #[test]
    fn test_unterminated_fence_during_streaming() {
        let output = plain().render("Answer:\n\n```python\nprint(");
        assert!(output.html.contains("<pre><code>print(\n</code></pre>") || output.html.contains("<pre><code>print(</code></pre>"));
        assert_eq!(output.raw_markdown, "Answer:\n\n```python\nprint(");
    }
}
