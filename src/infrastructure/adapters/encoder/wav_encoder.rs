//! WAV Encoder - RIFF/WAVE 容器封装
//!
//! 支持：
//! - PCM → WAV（44 字节标准头）
//! - WAV 头解析和信息提取

use crate::application::ports::{AudioEncoderPort, AudioInfo, EncodeError, PcmFormat};

/// 标准 WAV 头长度
const WAV_HEADER_LEN: usize = 44;

/// fmt chunk 中的 PCM 格式码
const WAVE_FORMAT_PCM: u16 = 1;

/// WAV 编码器
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder;

impl WavEncoder {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug)]
struct FmtChunk {
    audio_format: u16,
    num_channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

fn read_u16(data: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([data[pos], data[pos + 1]])
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

impl AudioEncoderPort for WavEncoder {
    fn extension(&self) -> &'static str {
        "wav"
    }

    fn encode(&self, pcm: &[u8], format: &PcmFormat) -> Result<Vec<u8>, EncodeError> {
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(EncodeError::InvalidInput(
                "channels and sample rate must be non-zero".to_string(),
            ));
        }
        if format.bits_per_sample == 0 || format.bits_per_sample % 8 != 0 {
            return Err(EncodeError::InvalidInput(format!(
                "unsupported bit depth: {}",
                format.bits_per_sample
            )));
        }

        // data chunk 声明真实的 PCM 字节数；奇数长度按 RIFF 规范补一个 pad 字节，但不计入 data size
        let data_size = pcm.len();
        let pad = data_size % 2;
        let riff_size = 36 + data_size + pad;
        if riff_size > u32::MAX as usize {
            return Err(EncodeError::TooLarge(data_size));
        }

        let mut wav = Vec::with_capacity(WAV_HEADER_LEN + data_size + pad);

        // RIFF header
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(riff_size as u32).to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        // fmt chunk
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
        wav.extend_from_slice(&format.channels.to_le_bytes());
        wav.extend_from_slice(&format.sample_rate.to_le_bytes());
        wav.extend_from_slice(&format.byte_rate().to_le_bytes());
        wav.extend_from_slice(&format.block_align().to_le_bytes());
        wav.extend_from_slice(&format.bits_per_sample.to_le_bytes());

        // data chunk
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&(data_size as u32).to_le_bytes());
        wav.extend_from_slice(pcm);
        if pad == 1 {
            wav.push(0);
        }

        Ok(wav)
    }

    fn probe(&self, data: &[u8]) -> Result<AudioInfo, EncodeError> {
        if data.len() < WAV_HEADER_LEN {
            return Err(EncodeError::InvalidInput("WAV data too short".to_string()));
        }
        if &data[0..4] != b"RIFF" {
            return Err(EncodeError::InvalidInput(
                "Invalid WAV: missing RIFF header".to_string(),
            ));
        }
        if &data[8..12] != b"WAVE" {
            return Err(EncodeError::InvalidInput(
                "Invalid WAV: missing WAVE identifier".to_string(),
            ));
        }

        let mut pos = 12;
        let mut fmt: Option<FmtChunk> = None;
        let mut data_size: Option<usize> = None;

        while pos + 8 <= data.len() {
            let chunk_id = &data[pos..pos + 4];
            let chunk_size = read_u32(data, pos + 4) as usize;
            let body = pos + 8;

            match chunk_id {
                b"fmt " => {
                    if chunk_size < 16 || body + 16 > data.len() {
                        return Err(EncodeError::InvalidInput(
                            "Invalid fmt chunk size".to_string(),
                        ));
                    }
                    fmt = Some(FmtChunk {
                        audio_format: read_u16(data, body),
                        num_channels: read_u16(data, body + 2),
                        sample_rate: read_u32(data, body + 4),
                        bits_per_sample: read_u16(data, body + 14),
                    });
                }
                b"data" => {
                    data_size = Some(chunk_size);
                    break;
                }
                _ => {}
            }

            // 对齐到偶数字节
            pos = body + chunk_size + chunk_size % 2;
        }

        let fmt = fmt.ok_or_else(|| {
            EncodeError::InvalidInput("Invalid WAV: missing fmt chunk".to_string())
        })?;
        let data_size = data_size.ok_or_else(|| {
            EncodeError::InvalidInput("Invalid WAV: missing data chunk".to_string())
        })?;

        if fmt.audio_format != WAVE_FORMAT_PCM {
            return Err(EncodeError::InvalidInput(format!(
                "Unsupported WAV format code: {}",
                fmt.audio_format
            )));
        }

        let format = PcmFormat {
            channels: fmt.num_channels,
            bits_per_sample: fmt.bits_per_sample,
            sample_rate: fmt.sample_rate,
        };
        let block_align = format.block_align() as usize;
        let frames = if block_align > 0 { data_size / block_align } else { 0 };
        let duration_ms = if format.sample_rate > 0 {
            (frames as u64 * 1000) / format.sample_rate as u64
        } else {
            0
        };

        Ok(AudioInfo {
            format,
            data_size,
            frames,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    struct Decoded {
        channels: usize,
        sample_rate: u32,
        bits_per_sample: Option<u32>,
        samples: Vec<i16>,
    }

    /// 用 symphonia 独立解码，验证输出能被标准解码器读取
    fn decode(wav: Vec<u8>) -> Decoded {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(wav)), Default::default());
        let mut hint = Hint::new();
        hint.with_extension("wav");

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .unwrap();
        let mut format = probed.format;
        let track = format.default_track().unwrap();
        let params = track.codec_params.clone();
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .unwrap();

        let mut samples = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => panic!("packet read error: {e}"),
            };
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = decoder.decode(&packet).unwrap();
            let spec = *decoded.spec();
            let frames = decoded.frames();
            let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(&buf.samples()[..frames * spec.channels.count()]);
        }

        Decoded {
            channels: params.channels.map(|c| c.count()).unwrap_or(0),
            sample_rate: params.sample_rate.unwrap_or(0),
            bits_per_sample: params.bits_per_sample.or(params.bits_per_coded_sample),
            samples,
        }
    }

    fn ramp_pcm(frames: usize) -> (Vec<i16>, Vec<u8>) {
        let samples: Vec<i16> = (0..frames).map(|i| ((i * 37) % 20000) as i16 - 10000).collect();
        let bytes = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        (samples, bytes)
    }

    #[test]
    fn test_header_layout() {
        let encoder = WavEncoder::new();
        let (_, pcm) = ramp_pcm(100);
        let wav = encoder.encode(&pcm, &PcmFormat::default()).unwrap();

        assert_eq!(wav.len(), 44 + 200);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(read_u32(&wav, 4), 36 + 200);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(read_u16(&wav, 22), 1);
        assert_eq!(read_u32(&wav, 24), 24000);
        assert_eq!(read_u32(&wav, 28), 48000);
        assert_eq!(read_u16(&wav, 32), 2);
        assert_eq!(read_u16(&wav, 34), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(read_u32(&wav, 40), 200);
        assert_eq!(&wav[44..], &pcm[..]);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let encoder = WavEncoder::new();
        let (_, pcm) = ramp_pcm(512);
        let a = encoder.encode(&pcm, &PcmFormat::default()).unwrap();
        let b = encoder.encode(&pcm, &PcmFormat::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_round_trip_through_symphonia() {
        let encoder = WavEncoder::new();
        let (samples, pcm) = ramp_pcm(24000);
        let wav = encoder.encode(&pcm, &PcmFormat::default()).unwrap();

        let decoded = decode(wav);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_rate, 24000);
        assert_eq!(decoded.bits_per_sample, Some(16));
        assert_eq!(decoded.samples.len(), 24000);
        assert_eq!(decoded.samples, samples);
    }

    #[test]
    fn test_probe_round_trip() {
        let encoder = WavEncoder::new();
        let (_, pcm) = ramp_pcm(12000);
        let wav = encoder.encode(&pcm, &PcmFormat::default()).unwrap();

        let info = encoder.probe(&wav).unwrap();
        assert_eq!(info.format, PcmFormat::default());
        assert_eq!(info.data_size, 24000);
        assert_eq!(info.frames, 12000);
        assert_eq!(info.duration_ms, 500);
    }

    #[test]
    fn test_odd_length_is_padded_but_declared_exactly() {
        let encoder = WavEncoder::new();
        let pcm = vec![1u8, 2, 3];
        let wav = encoder.encode(&pcm, &PcmFormat::default()).unwrap();

        assert_eq!(wav.len(), 44 + 4);
        assert_eq!(read_u32(&wav, 40), 3);
        assert_eq!(read_u32(&wav, 4) as usize, wav.len() - 8);
        assert_eq!(wav[47], 0);
    }

    #[test]
    fn test_empty_pcm() {
        let encoder = WavEncoder::new();
        let wav = encoder.encode(&[], &PcmFormat::default()).unwrap();
        assert_eq!(wav.len(), 44);
        let info = encoder.probe(&wav).unwrap();
        assert_eq!(info.frames, 0);
    }

    #[test]
    fn test_probe_rejects_garbage() {
        let encoder = WavEncoder::new();
        assert!(encoder.probe(b"not a wav").is_err());
        assert!(encoder.probe(&[0u8; 64]).is_err());
    }

    #[test]
    fn test_rejects_invalid_format() {
        let encoder = WavEncoder::new();
        let format = PcmFormat {
            channels: 1,
            bits_per_sample: 12,
            sample_rate: 24000,
        };
        assert!(encoder.encode(&[0, 0], &format).is_err());
    }
}
