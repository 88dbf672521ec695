use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded stereo PCM. Mono sources are duplicated to both channels.
pub struct AudioData {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn duration(&self) -> f32 {
        self.left.len() as f32 / self.sample_rate as f32
    }
}

pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut left: Vec<f32> = Vec::new();
    let mut right: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        split_channels(samples, spec.channels.count(), &mut left, &mut right);
    }

    if channels > 2 {
        log::warn!("{} channels found, using the first two", channels);
    }

    let audio = AudioData {
        left,
        right,
        sample_rate,
    };

    log::info!(
        "Decoded audio: {} frames, {} channel(s), {}Hz, {:.1}s",
        audio.len(),
        channels,
        sample_rate,
        audio.duration()
    );

    Ok(audio)
}

/// Appends interleaved samples as a left/right pair.
fn split_channels(interleaved: &[f32], channels: usize, left: &mut Vec<f32>, right: &mut Vec<f32>) {
    if channels <= 1 {
        left.extend_from_slice(interleaved);
        right.extend_from_slice(interleaved);
        return;
    }
    for frame in interleaved.chunks_exact(channels) {
        left.push(frame[0]);
        right.push(frame[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_duplicates_to_both_channels() {
        let (mut left, mut right) = (Vec::new(), Vec::new());
        split_channels(&[0.1, 0.2, 0.3], 1, &mut left, &mut right);
        assert_eq!(left, vec![0.1, 0.2, 0.3]);
        assert_eq!(left, right);
    }

    #[test]
    fn extra_channels_are_dropped() {
        let (mut left, mut right) = (Vec::new(), Vec::new());
        split_channels(&[1.0, -1.0, 9.0, 2.0, -2.0, 9.0], 3, &mut left, &mut right);
        assert_eq!(left, vec![1.0, 2.0]);
        assert_eq!(right, vec![-1.0, -2.0]);
    }
}
