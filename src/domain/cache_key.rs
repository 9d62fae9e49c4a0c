//! 缓存 Key 生成
//!
//! 合成请求的确定性指纹：`md5("{text}_{voice}_{language}_{speed}")`
//!
//! ⚠️ 一次性接口与流式接口必须使用同一个函数生成 key，
//! 且调用方在调用前对 text 做相同的 trim 处理，否则同样的文本会得到不同的 key。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key 各字段之间的分隔符
const SEPARATOR: char = '_';

/// 十六进制 digest 长度（128 bit）
pub const CACHE_KEY_LEN: usize = 32;

/// 缓存 Key（32 位小写十六进制 MD5）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// 根据合成参数生成 key
    pub fn derive(text: &str, voice: &str, language: &str, speed: f64) -> Self {
        let input = format!(
            "{text}{sep}{voice}{sep}{language}{sep}{speed}",
            sep = SEPARATOR,
            speed = render_speed(speed)
        );
        let digest = md5::compute(input.as_bytes());
        Self(format!("{:x}", digest))
    }

    /// 解析外部传入的 hash（仅接受 32 位小写十六进制）
    ///
    /// 用于 `/check/{hash}` 等入口，防止任意字符串拼接进文件路径
    pub fn parse(value: &str) -> Option<Self> {
        let valid = value.len() == CACHE_KEY_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 以自然十进制形式输出速度：`1.0`、`1.5`、`0.75`
///
/// 整数值保留一位小数，与前端 `${speed}` 的 `1.0` 写法保持一致
fn render_speed(speed: f64) -> String {
    if speed.is_finite() && speed.fract() == 0.0 {
        format!("{:.1}", speed)
    } else {
        format!("{}", speed)
    }
}
