//! Encoder Adapter - PCM 容器封装

mod wav_encoder;

pub use wav_encoder::WavEncoder;
