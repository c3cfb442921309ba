//! PCM16 audio helpers and the playback timeline.
//!
//! All audio in the crate is signed 16-bit little-endian PCM. Speech from the
//! service arrives mono at 24 kHz; microphone input is sent mono at 16 kHz.
//! Voice notes arrive as WAV attachments and replies leave the same way.

use crate::errors::{Error, Result};
use std::time::{Duration, Instant};

/// Decodes raw little-endian PCM16 bytes; a trailing odd byte is dropped.
#[must_use]
pub fn decode_pcm16le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encodes samples as raw little-endian PCM16 bytes.
#[must_use]
pub fn encode_pcm16le(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Averages interleaved channels into one.
#[must_use]
pub fn downmix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(usize::from(channels))
        .map(|frame| {
            let sum: i32 = frame.iter().map(|s| i32::from(*s)).sum();
            #[allow(clippy::cast_possible_truncation)]
            let avg = (sum / frame.len() as i32) as i16;
            avg
        })
        .collect()
}

/// Linear-interpolation resampler.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = pos - idx as f64;
            let a = f64::from(samples[idx]);
            let b = f64::from(samples[next]);
            (a + (b - a) * frac).round() as i16
        })
        .collect()
}

/// A mono PCM16 clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    /// Mono samples
    pub samples: Vec<i16>,
    /// Samples per second
    pub sample_rate: u32,
}

impl Clip {
    /// Wraps samples.
    #[must_use]
    pub const fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decodes raw PCM16 LE bytes.
    #[must_use]
    pub fn from_pcm16le(bytes: &[u8], sample_rate: u32) -> Self {
        Self::new(decode_pcm16le(bytes), sample_rate)
    }

    /// Playback length.
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let nanos = self.samples.len() as u128 * 1_000_000_000 / u128::from(self.sample_rate);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Same clip at another sample rate.
    #[must_use]
    pub fn resampled(&self, sample_rate: u32) -> Self {
        Self::new(
            resample_linear(&self.samples, self.sample_rate, sample_rate),
            sample_rate,
        )
    }
}

/// A clip placed on the timeline
#[derive(Debug, Clone)]
pub struct ScheduledClip {
    /// Offset from the timeline origin
    pub start: Duration,
    /// The audio
    pub clip: Clip,
}

/// Serializes clips on a single cursor so they never overlap.
#[derive(Debug, Clone)]
pub struct PlaybackTimeline {
    origin: Instant,
    cursor: Duration,
    scheduled: Vec<ScheduledClip>,
}

impl Default for PlaybackTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackTimeline {
    /// Empty timeline whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            cursor: Duration::ZERO,
            scheduled: Vec::new(),
        }
    }

    /// Time elapsed since the origin.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    /// End of the last scheduled clip.
    #[must_use]
    pub const fn cursor(&self) -> Duration {
        self.cursor
    }

    /// Clips in scheduling order.
    #[must_use]
    pub fn scheduled(&self) -> &[ScheduledClip] {
        &self.scheduled
    }

    /// Places `clip` at `max(cursor, now)` and advances the cursor past it.
    pub fn schedule(&mut self, clip: Clip, now: Duration) -> Duration {
        let start = self.cursor.max(now);
        self.cursor = start + clip.duration();
        self.scheduled.push(ScheduledClip { start, clip });
        start
    }

    /// Mixes the clips starting at or after `from` into one buffer at `sample_rate`,
    /// with silence where nothing is scheduled.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn render_from(&self, from: Duration, sample_rate: u32) -> Clip {
        let clips: Vec<&ScheduledClip> =
            self.scheduled.iter().filter(|s| s.start >= from).collect();
        let Some(first) = clips.first().map(|s| s.start) else {
            return Clip::new(Vec::new(), sample_rate);
        };

        let offset_samples =
            |d: Duration| (d.as_nanos() * u128::from(sample_rate) / 1_000_000_000) as usize;

        let mut out: Vec<i16> = Vec::new();
        for scheduled in clips {
            let samples = scheduled.clip.resampled(sample_rate).samples;
            let at = offset_samples(scheduled.start - first);
            if out.len() < at + samples.len() {
                out.resize(at + samples.len(), 0);
            }
            for (slot, sample) in out[at..].iter_mut().zip(samples) {
                *slot = slot.saturating_add(sample);
            }
        }
        Clip::new(out, sample_rate)
    }

    /// Mixes every scheduled clip.
    #[must_use]
    pub fn render(&self, sample_rate: u32) -> Clip {
        self.render_from(Duration::ZERO, sample_rate)
    }

    /// Drops all clips and restarts the cursor.
    pub fn clear(&mut self) {
        self.scheduled.clear();
        self.cursor = Duration::ZERO;
        self.origin = Instant::now();
    }
}

/// Packs a clip as a 16-bit mono WAV file.
#[must_use]
pub fn encode_wav(clip: &Clip) -> Vec<u8> {
    let data = encode_pcm16le(&clip.samples);
    let data_len = u32::try_from(data.len()).unwrap_or(u32::MAX);
    let mut wav = Vec::with_capacity(44 + data.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&clip.sample_rate.to_le_bytes());
    wav.extend_from_slice(&(clip.sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(&data);
    wav
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes([*bytes.get(at)?, *bytes.get(at + 1)?]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes([
        *bytes.get(at)?,
        *bytes.get(at + 1)?,
        *bytes.get(at + 2)?,
        *bytes.get(at + 3)?,
    ]))
}

/// Reads a PCM16 WAV file into a mono clip.
///
/// # Errors
/// `Audio` for anything that is not uncompressed 16-bit PCM.
pub fn decode_wav(bytes: &[u8]) -> Result<Clip> {
    let bad = |message: &str| Error::Audio {
        message: message.to_string(),
    };
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(bad("not a WAV file"));
    }

    let mut format: Option<(u16, u16, u32, u16)> = None;
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let len = read_u32(bytes, pos + 4).ok_or_else(|| bad("truncated chunk"))? as usize;
        let body = pos + 8;
        let end = body.saturating_add(len).min(bytes.len());

        match id {
            b"fmt " => {
                let tag = read_u16(bytes, body).ok_or_else(|| bad("truncated fmt chunk"))?;
                let channels = read_u16(bytes, body + 2).ok_or_else(|| bad("truncated fmt chunk"))?;
                let rate = read_u32(bytes, body + 4).ok_or_else(|| bad("truncated fmt chunk"))?;
                let bits = read_u16(bytes, body + 14).ok_or_else(|| bad("truncated fmt chunk"))?;
                format = Some((tag, channels, rate, bits));
            }
            b"data" => {
                let (tag, channels, rate, bits) =
                    format.ok_or_else(|| bad("data chunk before fmt chunk"))?;
                // 0xFFFE is WAVE_FORMAT_EXTENSIBLE, accepted when the sample size is 16 bits
                if !(tag == 1 || tag == 0xFFFE) || bits != 16 {
                    return Err(bad("only 16-bit PCM WAV is supported"));
                }
                if channels == 0 || rate == 0 {
                    return Err(bad("invalid WAV format"));
                }
                let samples = decode_pcm16le(&bytes[body..end]);
                return Ok(Clip::new(downmix_to_mono(&samples, channels), rate));
            }
            _ => {}
        }
        // chunks are word aligned
        pos = end + (len & 1);
    }
    Err(bad("WAV file has no audio data"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_pcm_round_trip_and_odd_byte() {
        let samples = vec![0, 1, -1, i16::MAX, i16::MIN];
        let bytes = encode_pcm16le(&samples);
        assert_eq!(bytes.len(), 10);
        assert_eq!(decode_pcm16le(&bytes), samples);

        let mut odd = bytes;
        odd.push(7);
        assert_eq!(decode_pcm16le(&odd).len(), 5);
    }

    #[test]
    fn test_downmix() {
        assert_eq!(downmix_to_mono(&[100, 300, -50, 50], 2), vec![200, 0]);
        assert_eq!(downmix_to_mono(&[1, 2, 3], 1), vec![1, 2, 3]);
    }

    #[test]
    fn test_resample_length() {
        let input = vec![0i16; 48_000];
        assert_eq!(resample_linear(&input, 48_000, 16_000).len(), 16_000);
        assert_eq!(resample_linear(&[0, 100], 1, 2), vec![0, 50, 100, 100]);
    }

    #[test]
    fn test_clip_duration() {
        let clip = Clip::new(vec![0; 24_000], 24_000);
        assert_eq!(clip.duration(), Duration::from_secs(1));
        assert_eq!(Clip::new(vec![0; 10], 0).duration(), Duration::ZERO);
    }

    #[test]
    fn test_schedule_never_overlaps() {
        let mut timeline = PlaybackTimeline::new();
        let half_second = || Clip::new(vec![1; 12_000], 24_000);

        let a = timeline.schedule(half_second(), Duration::ZERO);
        // second clip requested while the first is still playing
        let b = timeline.schedule(half_second(), Duration::from_millis(100));
        // third requested long after the cursor
        let c = timeline.schedule(half_second(), Duration::from_secs(3));

        assert_eq!(a, Duration::ZERO);
        assert_eq!(b, Duration::from_millis(500));
        assert_eq!(c, Duration::from_secs(3));
        assert_eq!(timeline.cursor(), Duration::from_millis(3500));

        for pair in timeline.scheduled().windows(2) {
            assert!(pair[1].start >= pair[0].start + pair[0].clip.duration());
        }
    }

    #[test]
    fn test_render_places_clips_with_gaps() {
        let mut timeline = PlaybackTimeline::new();
        timeline.schedule(Clip::new(vec![5; 2], 4), Duration::ZERO);
        timeline.schedule(Clip::new(vec![7; 2], 4), Duration::from_secs(1));

        let rendered = timeline.render(4);
        assert_eq!(rendered.samples, vec![5, 5, 0, 0, 7, 7]);

        let tail = timeline.render_from(Duration::from_secs(1), 4);
        assert_eq!(tail.samples, vec![7, 7]);

        timeline.clear();
        assert!(timeline.render(4).samples.is_empty());
    }

    #[test]
    fn test_wav_round_trip() {
        let clip = Clip::new(vec![10, -10, 300], 16_000);
        let wav = encode_wav(&clip);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(wav.len(), 44 + 6);
        assert_eq!(decode_wav(&wav).unwrap(), clip);
    }

    #[test]
    fn test_decode_wav_rejects_other_formats() {
        assert!(matches!(decode_wav(b"OggS...."), Err(Error::Audio { .. })));

        let mut wav = encode_wav(&Clip::new(vec![1, 2], 8_000));
        // switch bits per sample to 8
        wav[34] = 8;
        assert!(matches!(decode_wav(&wav), Err(Error::Audio { .. })));
    }
}
