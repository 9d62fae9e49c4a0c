//! Speech Commands - 一次性合成命令

use crate::application::error::ApplicationError;
use crate::domain::CacheKey;

/// 生成语音命令
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateSpeechCommand {
    pub text: String,
    pub voice: String,
    pub language: String,
    pub speed: f64,
}

/// 生成语音响应
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateSpeechResponse {
    /// 是否来自缓存
    pub cached: bool,
    pub hash: CacheKey,
    /// 容器文件大小（字节）
    pub file_size: u64,
    /// 时长（秒），仅新生成的音频有值
    pub duration: Option<f64>,
}

/// 请求参数范围
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisLimits {
    pub min_text_length: usize,
    pub max_text_length: usize,
    pub min_speed: f64,
    pub max_speed: f64,
}

impl Default for SynthesisLimits {
    fn default() -> Self {
        Self {
            min_text_length: 1,
            max_text_length: 500,
            min_speed: 0.5,
            max_speed: 2.0,
        }
    }
}

impl SynthesisLimits {
    /// 文本长度按字符计，调用方需先 trim
    pub fn check_text(&self, text: &str) -> Result<(), ApplicationError> {
        if text.is_empty() {
            return Err(ApplicationError::validation(
                "Text cannot be empty or whitespace only",
            ));
        }
        let len = text.chars().count();
        if len < self.min_text_length || len > self.max_text_length {
            return Err(ApplicationError::validation(format!(
                "Text length must be between {} and {} characters, got {}",
                self.min_text_length, self.max_text_length, len
            )));
        }
        Ok(())
    }

    pub fn check_speed(&self, speed: f64) -> Result<(), ApplicationError> {
        if !speed.is_finite() || speed < self.min_speed || speed > self.max_speed {
            return Err(ApplicationError::validation(format!(
                "Speed must be between {} and {}, got {}",
                self.min_speed, self.max_speed, speed
            )));
        }
        Ok(())
    }

    /// 校验命令，返回 trim 之后的版本
    pub fn validate(&self, cmd: GenerateSpeechCommand) -> Result<GenerateSpeechCommand, ApplicationError> {
        let text = cmd.text.trim().to_string();
        self.check_text(&text)?;
        self.check_speed(cmd.speed)?;
        if cmd.voice.trim().is_empty() {
            return Err(ApplicationError::validation("Voice cannot be empty"));
        }
        if cmd.language.trim().is_empty() {
            return Err(ApplicationError::validation("Language cannot be empty"));
        }
        Ok(GenerateSpeechCommand { text, ..cmd })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(text: &str, speed: f64) -> GenerateSpeechCommand {
        GenerateSpeechCommand {
            text: text.to_string(),
            voice: "Cherry".to_string(),
            language: "en-US".to_string(),
            speed,
        }
    }

    #[test]
    fn test_validate_trims_text() {
        let limits = SynthesisLimits::default();
        let validated = limits.validate(cmd("  Hello \n", 1.0)).unwrap();
        assert_eq!(validated.text, "Hello");
    }

    #[test]
    fn test_text_bounds() {
        let limits = SynthesisLimits::default();
        assert!(limits.validate(cmd("   ", 1.0)).is_err());
        assert!(limits.validate(cmd(&"a".repeat(500), 1.0)).is_ok());
        assert!(limits.validate(cmd(&"a".repeat(501), 1.0)).is_err());
        // 按字符而非字节计数
        assert!(limits.validate(cmd(&"你".repeat(500), 1.0)).is_ok());
    }

    #[test]
    fn test_speed_bounds() {
        let limits = SynthesisLimits::default();
        assert!(limits.validate(cmd("Hello", 0.5)).is_ok());
        assert!(limits.validate(cmd("Hello", 2.0)).is_ok());
        assert!(limits.validate(cmd("Hello", 0.49)).is_err());
        assert!(limits.validate(cmd("Hello", 2.01)).is_err());
        assert!(limits.validate(cmd("Hello", f64::NAN)).is_err());
    }

    #[test]
    fn test_empty_voice_rejected() {
        let limits = SynthesisLimits::default();
        let mut command = cmd("Hello", 1.0);
        command.voice = " ".to_string();
        assert!(matches!(
            limits.validate(command),
            Err(ApplicationError::ValidationError(_))
        ));
    }
}
