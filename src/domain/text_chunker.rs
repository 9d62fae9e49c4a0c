//! 文本分块器
//!
//! 将长文本按句子切成适合单次合成的片段，每个片段不超过 `max_chars` 个字符

/// 默认单块最大字符数
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 500;

/// 中文句末标点（总是分割）
#[inline]
fn is_cjk_terminator(ch: char) -> bool {
    matches!(ch, '。' | '！' | '？')
}

/// 英文句末标点（后面紧跟空白或文本结束时才分割，避免切开 `3.14`）
#[inline]
fn is_ascii_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

fn push_sentence<'a>(sentences: &mut Vec<&'a str>, raw: &'a str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed);
    }
}

/// 按句末标点和换行拆分句子（去掉首尾空白，丢弃空句）
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let end = idx + ch.len_utf8();

        if ch == '\n' || ch == '\r' {
            push_sentence(&mut sentences, &text[start..idx]);
            start = end;
            continue;
        }

        let boundary = if is_cjk_terminator(ch) {
            true
        } else if is_ascii_terminator(ch) {
            chars.peek().map_or(true, |(_, next)| next.is_whitespace())
        } else {
            false
        };

        if boundary {
            push_sentence(&mut sentences, &text[start..end]);
            start = end;
        }
    }

    push_sentence(&mut sentences, &text[start..]);
    sentences
}

/// 按字符截断（保证落在 UTF-8 字符边界上）
fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// 将超长句子按 `max_chars` 硬切
fn hard_split(sentence: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect::<String>())
        .collect()
}

/// 英文句子之间补一个空格，中文句子直接拼接
#[inline]
fn needs_space(current: &str) -> bool {
    current.chars().last().map_or(false, |c| c.is_ascii())
}

/// 分块结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunks {
    pub chunks: Vec<String>,
    /// 走了截断分支，块内容不再覆盖全文
    pub truncated: bool,
}

impl Chunks {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// 对文本进行分块
///
/// 分块策略：
/// 1. 按句末标点（`。！？` 以及后接空白的 `.!?`）和换行拆句
/// 2. 依次累加句子，加入下一句会超过 `max_chars` 时输出当前块
/// 3. 整段文本没有任何句子边界且超长时，退化为按字符截断
/// 4. 有句子边界但某一句本身超长时，该句按 `max_chars` 硬切
///
/// 输出的每一块都不超过 `max_chars` 个字符；发生截断时 `truncated` 为 true
pub fn chunk_text(text: &str, max_chars: usize) -> Chunks {
    let max_chars = max_chars.max(1);
    let sentences = split_sentences(text);

    if sentences.len() == 1 && sentences[0].chars().count() > max_chars {
        return Chunks {
            chunks: vec![truncate_chars(sentences[0], max_chars)],
            truncated: true,
        };
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in sentences {
        let len = sentence.chars().count();

        if len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            chunks.extend(hard_split(sentence, max_chars));
            continue;
        }

        if current.is_empty() {
            current.push_str(sentence);
            current_len = len;
            continue;
        }

        let space = needs_space(&current);
        let added = len + usize::from(space);
        if current_len + added <= max_chars {
            if space {
                current.push(' ');
            }
            current.push_str(sentence);
            current_len += added;
        } else {
            chunks.push(std::mem::replace(&mut current, sentence.to_string()));
            current_len = len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    Chunks {
        chunks,
        truncated: false,
    }
}
