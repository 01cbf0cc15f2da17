//! WAV framing for raw speech PCM.
//!
//! Speech providers return headerless signed 16-bit little-endian PCM, mono, 24 kHz.
//! Browsers need a RIFF/WAVE container around it before an `<audio>` element will play it.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Sample rate of the PCM returned by speech providers.
pub const SAMPLE_RATE: u32 = 24_000;
/// Channel count of the PCM returned by speech providers.
pub const CHANNELS: u16 = 1;
/// Bit depth of the PCM returned by speech providers.
pub const BITS_PER_SAMPLE: u16 = 16;
/// Size of the canonical PCM header written in front of the samples.
pub const HEADER_LEN: usize = 44;

const DATA_URI_PREFIX: &str = "data:audio/wav;base64,";

pub fn pcm_spec() -> hound::WavSpec {
    hound::WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Wraps little-endian 16-bit PCM in a WAV container.
///
/// A trailing odd byte cannot form a sample and is dropped.
pub fn pcm_to_wav(pcm: &[u8]) -> Result<Vec<u8>, hound::Error> {
    if pcm.len() % 2 != 0 {
        log::warn!("speech PCM has an odd length ({} bytes), dropping last byte", pcm.len());
    }

    let mut cursor = Cursor::new(Vec::with_capacity(HEADER_LEN + pcm.len()));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, pcm_spec())?;
        for frame in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([frame[0], frame[1]]))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Encodes WAV bytes as a `data:audio/wav;base64,` URI.
pub fn to_data_uri(wav: &[u8]) -> String {
    format!("{DATA_URI_PREFIX}{}", STANDARD.encode(wav))
}

/// Decodes a WAV data URI back into its bytes.
pub fn from_data_uri(uri: &str) -> Option<Vec<u8>> {
    let payload = uri.strip_prefix(DATA_URI_PREFIX)?;
    STANDARD.decode(payload).ok()
}
