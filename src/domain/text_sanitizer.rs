//! 文本清理
//!
//! 流式接口收到的文本常带有 LLM 输出的 Markdown 标记，送去合成前先去掉：
//! - `*` / `#` 强调与标题符号
//! - 行首的 `Title:` / `标题：` 标签
//! - 只有 `---` 的分隔线

use once_cell::sync::Lazy;
use regex::Regex;

static TITLE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:Title|标题)[:：][ \t]*").expect("valid title regex")
});

static HORIZONTAL_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*-{3,}[ \t]*$").expect("valid rule regex"));

/// 清理待合成文本，返回去掉首尾空白后的结果
pub fn sanitize_text(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !matches!(c, '*' | '#')).collect();
    let stripped = stripped.trim();
    let without_title = TITLE_LABEL.replace_all(stripped, "");
    let without_rules = HORIZONTAL_RULE.replace_all(&without_title, "");
    without_rules.trim().to_string()
}
