//! # 代码块语法高亮
//!
//! Markdown 渲染器通过 [`Highlighter`] trait 使用高亮后端，渲染契约不依赖具体实现：
//! - [`PlainHighlighter`] - 不支持任何语言，代码块只做转义
//! - [`SyntectHighlighter`] - 基于 syntect 内置语法定义和主题

use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{IncludeBackground, styled_line_to_highlighted_html};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// 高亮后端接口
pub trait Highlighter: Send + Sync {
    /// 是否支持指定语言（名称、别名或扩展名）
    fn supports_language(&self, name: &str) -> bool;

    /// 根据代码内容推测语言（如 shebang 行），推测失败返回 `None`
    ///
    /// # 返回值
    /// 能再次传给 [`Highlighter::supports_language`] 的短名称（扩展名形式）
    fn detect_language(&self, _code: &str) -> Option<String> {
        None
    }

    /// 将代码高亮为 HTML 片段（不含外层 `<pre><code>`）
    ///
    /// 返回 `None` 时渲染器退回到纯转义输出。
    fn highlight(&self, code: &str, language: &str) -> Option<String>;
}

/// 只转义、不高亮的后端
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainHighlighter;

impl Highlighter for PlainHighlighter {
    fn supports_language(&self, _name: &str) -> bool {
        false
    }

    fn highlight(&self, _code: &str, _language: &str) -> Option<String> {
        None
    }
}

/// 亮色主题，与默认的 whitesmoke 背景搭配
const DEFAULT_THEME: &str = "InspiredGitHub";

/// syntect 高亮后端
pub struct SyntectHighlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl SyntectHighlighter {
    /// 加载内置语法定义和默认主题
    pub fn new() -> Self {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let mut themes = ThemeSet::load_defaults().themes;
        let theme = themes.remove(DEFAULT_THEME).unwrap_or_default();
        Self { syntax_set, theme }
    }

    fn find_syntax(&self, language: &str) -> Option<&SyntaxReference> {
        let lower = language.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        let token = match lower.as_str() {
            "js" | "jsx" => "javascript",
            "ts" | "tsx" | "typescript" => "js",
            "py" => "python",
            "rb" => "ruby",
            "rs" => "rust",
            "sh" | "shell" | "zsh" | "console" => "bash",
            "yml" => "yaml",
            "md" => "markdown",
            "c++" => "cpp",
            "golang" => "go",
            other => other,
        };

        self.syntax_set
            .find_syntax_by_token(token)
            .or_else(|| self.syntax_set.find_syntax_by_name(language.trim()))
    }
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter for SyntectHighlighter {
    fn supports_language(&self, name: &str) -> bool {
        self.find_syntax(name).is_some()
    }

    fn detect_language(&self, code: &str) -> Option<String> {
        let first_line = code.lines().next()?;
        let syntax = self.syntax_set.find_syntax_by_first_line(first_line)?;
        // 返回扩展名而非显示名（如 "Bourne Again Shell (bash)"），可直接用作 CSS 类名
        syntax.file_extensions.first().cloned()
    }

    fn highlight(&self, code: &str, language: &str) -> Option<String> {
        let syntax = self.find_syntax(language)?;
        let mut highlighter = HighlightLines::new(syntax, &self.theme);
        let mut html = String::with_capacity(code.len() * 2);

        for line in LinesWithEndings::from(code) {
            let regions = match highlighter.highlight_line(line, &self.syntax_set) {
                Ok(regions) => regions,
                Err(e) => {
                    log::warn!("代码高亮失败（{}）: {}", language, e);
                    return None;
                }
            };
            html.push_str(&styled_line_to_highlighted_html(&regions, IncludeBackground::No).ok()?);
        }

        Some(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_highlighter_supports_nothing() {
        let plain = PlainHighlighter;
        assert!(!plain.supports_language("rust"));
        assert_eq!(plain.highlight("fn main() {}", "rust"), None);
    }

    #[test]
    fn test_syntect_resolves_aliases() {
        let highlighter = SyntectHighlighter::new();
        assert!(highlighter.supports_language("rust"));
        assert!(highlighter.supports_language("rs"));
        assert!(highlighter.supports_language("Python"));
        assert!(highlighter.supports_language("sh"));
        assert!(!highlighter.supports_language("no-such-language"));
        assert!(!highlighter.supports_language(""));
    }

    #[test]
    fn test_syntect_output_is_escaped_spans() {
        let highlighter = SyntectHighlighter::new();
        let html = highlighter
            .highlight("let a = \"<b>\";\n", "rust")
            .unwrap();

        assert!(html.contains("<span"));
        assert!(html.contains("&lt;b&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_detects_language_from_shebang() {
        let highlighter = SyntectHighlighter::new();
        let detected = highlighter.detect_language("#!/usr/bin/env python\nprint(1)\n");
        assert_eq!(detected.as_deref(), Some("py"));
    }

    #[test]
    fn test_detected_shell_language_is_a_usable_token() {
        let highlighter = SyntectHighlighter::new();
        let detected = highlighter
            .detect_language("#!/bin/bash\necho hi\n")
            .expect("shebang detected");
        assert!(!detected.contains(char::is_whitespace), "{}", detected);
        assert!(highlighter.supports_language(&detected));
    }
}
