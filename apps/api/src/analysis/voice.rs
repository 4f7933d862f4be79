//! Voice tone metrics from the uploaded recording.
//!
//! The browser uploads WebM/Opus, which is converted to 16 kHz mono WAV
//! through an ffmpeg stdin/stdout pipe and decoded with symphonia. When no
//! ffmpeg binary can be resolved the raw upload is handed to symphonia
//! directly (covers WAV/MP3/OGG uploads). Every failure mode ends up as an
//! error-shaped [`VoiceAnalysis`] inside the response payload, never as an
//! HTTP error.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

const FRAME_LEN: usize = 2048;
const HOP_LEN: usize = 512;
/// Frames more than 30 dB below the loudest frame count as silence.
const SILENCE_TOP_DB: f32 = 30.0;
const MIN_SPEECH_SECS: f32 = 0.5;
/// Pitch search band: C2..C7.
const PITCH_FMIN_HZ: f32 = 65.41;
const PITCH_FMAX_HZ: f32 = 2093.0;
/// Minimum normalized autocorrelation for a frame to count as voiced.
const VOICING_THRESHOLD: f32 = 0.5;

// ────────────────────────────────────────────────────────────────────────────
// Output shape
// ────────────────────────────────────────────────────────────────────────────

/// Voice analysis result: either the metric set or an error record.
/// Serialized untagged so the payload matches the historical dict shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VoiceAnalysis {
    Metrics(VoiceMetrics),
    Failed(VoiceFailure),
}

impl VoiceAnalysis {
    pub fn failed(error: impl Into<String>, detail: Option<String>) -> Self {
        VoiceAnalysis::Failed(VoiceFailure {
            error: error.into(),
            detail,
        })
    }

    pub fn metrics(&self) -> Option<&VoiceMetrics> {
        match self {
            VoiceAnalysis::Metrics(m) => Some(m),
            VoiceAnalysis::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceMetrics {
    pub avg_pitch_hz: f64,
    pub pitch_variation: f64,
    pub pitch_variation_pct: f64,
    pub speaking_rate: f64,
    pub avg_energy: f64,
    pub energy_variation: f64,
    pub pitch_feedback: String,
    pub tone_feedback: String,
    pub rate_feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Entry point
// ────────────────────────────────────────────────────────────────────────────

/// Analyzes voice tone directly from the in-memory upload bytes.
pub async fn analyze_voice(audio: Vec<u8>, ffmpeg_path: Option<&str>) -> VoiceAnalysis {
    if audio.is_empty() {
        return VoiceAnalysis::failed("Empty audio upload (0 bytes).", None);
    }

    let (samples, sample_rate) = match decode_upload(audio, ffmpeg_path).await {
        Ok(decoded) => decoded,
        Err(failure) => return VoiceAnalysis::Failed(failure),
    };

    // Silence skews pitch readings; analyze voiced frames only.
    let voiced = drop_silent_frames(&samples, sample_rate);
    if (voiced.len() as f32) < sample_rate as f32 * MIN_SPEECH_SECS {
        return VoiceAnalysis::failed("Not enough speech detected", None);
    }

    let f0_track = pitch_track(&voiced, sample_rate);
    let (avg_pitch, pitch_variation) = mean_std(&f0_track);
    let pitch_variation_pct = if avg_pitch > 0.0 {
        pitch_variation / avg_pitch * 100.0
    } else {
        0.0
    };

    let duration_voiced = voiced.len() as f64 / sample_rate as f64;
    let onsets = count_energy_onsets(&voiced, sample_rate);
    let speaking_rate = if duration_voiced > 0.0 {
        onsets as f64 / duration_voiced
    } else {
        0.0
    };

    let rms = rms_envelope(&voiced, FRAME_LEN, HOP_LEN);
    let (avg_energy, energy_variation) = mean_std(&rms);

    debug!(
        avg_pitch_hz = avg_pitch,
        pitch_variation_pct, speaking_rate, "Voice analysis complete"
    );

    VoiceAnalysis::Metrics(VoiceMetrics {
        avg_pitch_hz: round2(avg_pitch),
        pitch_variation: round2(pitch_variation),
        pitch_variation_pct: round2(pitch_variation_pct),
        speaking_rate: round2(speaking_rate),
        avg_energy: round4(avg_energy),
        energy_variation: round4(energy_variation),
        pitch_feedback: pitch_feedback(avg_pitch).to_string(),
        tone_feedback: tone_feedback(pitch_variation_pct).to_string(),
        rate_feedback: rate_feedback(speaking_rate).to_string(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Decoding
// ────────────────────────────────────────────────────────────────────────────

async fn decode_upload(
    audio: Vec<u8>,
    ffmpeg_path: Option<&str>,
) -> std::result::Result<(Vec<f32>, u32), VoiceFailure> {
    match resolve_ffmpeg(ffmpeg_path) {
        Some(ffmpeg) => match convert_to_wav(&ffmpeg, audio.clone()).await {
            Ok(wav) => decode_bytes(wav, Some("wav")).map_err(|e| VoiceFailure {
                error: format!("Failed to decode converted audio: {e}"),
                detail: None,
            }),
            Err(e) => Err(VoiceFailure {
                error: e.to_string(),
                detail: None,
            }),
        },
        None => {
            // No converter available; symphonia can still handle WAV/MP3/OGG
            // uploads on its own.
            decode_bytes(audio, None).map_err(|e| VoiceFailure {
                error: "ffmpeg_not_available".to_string(),
                detail: Some(format!(
                    "ffmpeg not found (add it to PATH or set FFMPEG_PATH) and direct decode \
                     failed: {e}"
                )),
            })
        }
    }
}

/// Resolves an ffmpeg executable: explicit config path first, then PATH.
fn resolve_ffmpeg(configured: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = configured {
        let candidate = PathBuf::from(path);
        if candidate.is_file() {
            return Some(candidate);
        }
        warn!(path = %path, "FFMPEG_PATH is set but does not point at a file");
    }

    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        for name in ["ffmpeg", "avconv"] {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Converts arbitrary audio bytes to 16 kHz mono WAV via ffmpeg pipes.
/// No filesystem I/O; stdin/stdout only.
async fn convert_to_wav(ffmpeg: &Path, input: Vec<u8>) -> Result<Vec<u8>> {
    let mut child = Command::new(ffmpeg)
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            "pipe:0",
            "-ac",
            "1",
            "-ar",
            "16000",
            "-f",
            "wav",
            "pipe:1",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to spawn ffmpeg")?;

    let mut stdin = child.stdin.take().context("ffmpeg stdin unavailable")?;
    // Feed stdin concurrently with draining stdout so a large upload cannot
    // deadlock against a full pipe. A write error just means ffmpeg exited
    // early; the exit status carries the real diagnosis.
    let writer = tokio::spawn(async move {
        let _ = stdin.write_all(&input).await;
        let _ = stdin.shutdown().await;
    });

    let output = child
        .wait_with_output()
        .await
        .context("failed to wait for ffmpeg")?;
    let _ = writer.await;

    if !output.status.success() || output.stdout.is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let preview: String = stderr.chars().take(800).collect();
        anyhow::bail!(
            "ffmpeg conversion failed (code={:?}). {preview}",
            output.status.code()
        );
    }
    Ok(output.stdout)
}

/// Decodes audio bytes to mono f32 samples using symphonia.
fn decode_bytes(data: Vec<u8>, extension_hint: Option<&str>) -> Result<(Vec<f32>, u32)> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("unrecognized audio format")?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("no audio track found")?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.context("sample rate unknown")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("failed to create decoder")?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<(SampleBuffer<f32>, usize)> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt packets are skippable; the stream may still be usable.
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if sample_buf.is_none() {
            let spec: SignalSpec = *decoded.spec();
            let channels = spec.channels.count().max(1);
            sample_buf = Some((SampleBuffer::new(decoded.capacity() as u64, spec), channels));
        }
        if let Some((buf, channels)) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            for frame in buf.samples().chunks_exact(*channels) {
                samples.push(frame.iter().sum::<f32>() / *channels as f32);
            }
        }
    }

    anyhow::ensure!(!samples.is_empty(), "decoded zero samples");
    Ok((samples, sample_rate))
}

// ────────────────────────────────────────────────────────────────────────────
// Signal measurements
// ────────────────────────────────────────────────────────────────────────────

/// Concatenates the frames whose RMS is within `SILENCE_TOP_DB` of the
/// loudest frame, dropping silence anywhere in the clip.
fn drop_silent_frames(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    let frame_len = (sample_rate as usize * 30 / 1000).max(1); // 30 ms
    let frames: Vec<&[f32]> = samples.chunks(frame_len).collect();
    let rms: Vec<f32> = frames.iter().map(|f| frame_rms(f)).collect();

    let max_rms = rms.iter().copied().fold(0.0_f32, f32::max);
    if max_rms <= 0.0 {
        return Vec::new();
    }
    let threshold = max_rms * 10.0_f32.powf(-SILENCE_TOP_DB / 20.0);

    let mut voiced = Vec::with_capacity(samples.len());
    for (frame, frame_rms) in frames.iter().zip(&rms) {
        if *frame_rms >= threshold {
            voiced.extend_from_slice(frame);
        }
    }
    voiced
}

fn frame_rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

/// Per-frame fundamental frequency estimates over the voiced signal.
/// Unvoiced/low-confidence frames are omitted, mirroring pyin's voicing flag.
fn pitch_track(samples: &[f32], sample_rate: u32) -> Vec<f64> {
    let min_lag = ((sample_rate as f32 / PITCH_FMAX_HZ).floor() as usize).max(2);
    let max_lag = (sample_rate as f32 / PITCH_FMIN_HZ).ceil() as usize;

    let mut track = Vec::new();
    let mut start = 0;
    while start + FRAME_LEN <= samples.len() {
        let frame = &samples[start..start + FRAME_LEN];
        if let Some(hz) = autocorrelation_pitch(frame, sample_rate, min_lag, max_lag) {
            track.push(hz);
        }
        start += HOP_LEN;
    }
    track
}

/// Normalized-autocorrelation pitch for one frame, with parabolic
/// interpolation around the best lag for sub-sample precision.
fn autocorrelation_pitch(
    frame: &[f32],
    sample_rate: u32,
    min_lag: usize,
    max_lag: usize,
) -> Option<f64> {
    let energy: f32 = frame.iter().map(|s| s * s).sum();
    if energy <= f32::EPSILON {
        return None;
    }
    let max_lag = max_lag.min(frame.len() - 1);
    if min_lag >= max_lag {
        return None;
    }

    let corr_at = |lag: usize| -> f32 {
        let acc: f32 = frame[..frame.len() - lag]
            .iter()
            .zip(&frame[lag..])
            .map(|(a, b)| a * b)
            .sum();
        acc / energy
    };

    let mut best_lag = 0;
    let mut best_corr = 0.0_f32;
    for lag in min_lag..=max_lag {
        let corr = corr_at(lag);
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }
    if best_lag == 0 || best_corr < VOICING_THRESHOLD {
        return None;
    }

    let refined = if best_lag > min_lag && best_lag < max_lag {
        let y0 = corr_at(best_lag - 1);
        let y2 = corr_at(best_lag + 1);
        let denom = y0 - 2.0 * best_corr + y2;
        if denom.abs() > f32::EPSILON {
            best_lag as f32 + 0.5 * (y0 - y2) / denom
        } else {
            best_lag as f32
        }
    } else {
        best_lag as f32
    };

    Some(sample_rate as f64 / refined as f64)
}

/// Counts syllable-scale energy onsets: a frame whose RMS jumps well above
/// the recent envelope, at most one onset per 100 ms.
fn count_energy_onsets(samples: &[f32], sample_rate: u32) -> usize {
    let envelope = rms_envelope(samples, FRAME_LEN, HOP_LEN);
    if envelope.is_empty() {
        return 0;
    }
    let max_env = envelope.iter().copied().fold(0.0_f64, f64::max);
    if max_env <= 0.0 {
        return 0;
    }
    let floor = 0.05 * max_env;
    let min_gap = ((sample_rate as usize / 10) / HOP_LEN).max(1); // 100 ms in hops

    let mut onsets = 0;
    let mut last_onset: Option<usize> = None;
    for i in 1..envelope.len() {
        let window_start = i.saturating_sub(4);
        let recent = &envelope[window_start..i];
        let recent_mean = recent.iter().sum::<f64>() / recent.len() as f64;

        let gap_ok = last_onset.map_or(true, |last| i - last >= min_gap);
        if envelope[i] > recent_mean * 1.5 && envelope[i] > floor && gap_ok {
            onsets += 1;
            last_onset = Some(i);
        }
    }
    onsets
}

fn rms_envelope(samples: &[f32], frame_len: usize, hop_len: usize) -> Vec<f64> {
    let mut envelope = Vec::new();
    let mut start = 0;
    while start < samples.len() {
        let end = (start + frame_len).min(samples.len());
        envelope.push(frame_rms(&samples[start..end]) as f64);
        start += hop_len;
    }
    envelope
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    (mean, variance.sqrt())
}

// ────────────────────────────────────────────────────────────────────────────
// Feedback bands
// ────────────────────────────────────────────────────────────────────────────

// Gender-neutral pitch ranges.
fn pitch_feedback(avg_pitch_hz: f64) -> &'static str {
    if avg_pitch_hz < 85.0 {
        "Very low pitch — may sound flat or disengaged."
    } else if avg_pitch_hz < 180.0 {
        "Low-normal pitch — sounds calm and authoritative."
    } else if avg_pitch_hz < 300.0 {
        "Normal pitch range — good for conversation."
    } else {
        "High pitch — may sound nervous or anxious."
    }
}

// Variation as % of mean pitch, for fairer comparison across voices.
fn tone_feedback(pitch_variation_pct: f64) -> &'static str {
    if pitch_variation_pct < 10.0 {
        "Very monotone — your pitch barely changes, which can disengage interviewers. \
         Practice varying your tone when emphasizing key points."
    } else if pitch_variation_pct < 25.0 {
        "Slightly monotone — some variation present but adding more expressiveness \
         would help keep the interviewer engaged."
    } else if pitch_variation_pct < 60.0 {
        "Good pitch variation — your voice sounds natural and engaging."
    } else {
        "High pitch variation — make sure your tone stays controlled and professional."
    }
}

// Onsets per second of voiced audio.
fn rate_feedback(speaking_rate: f64) -> &'static str {
    if speaking_rate < 2.0 {
        "Speaking too slowly — try to pick up the pace to sound more confident."
    } else if speaking_rate > 6.0 {
        "Speaking too fast — slow down so the interviewer can follow you."
    } else {
        "Good speaking rate — easy to follow."
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
