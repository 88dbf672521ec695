use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

/// Bytes of ffmpeg stderr kept for error reports.
const STDERR_TAIL: usize = 16 * 1024;

/// Pipes raw RGBA frames into an ffmpeg child process, muxing the source audio.
///
/// stderr is drained on a background thread so a chatty encoder never blocks
/// frame writes.
pub struct FfmpegEncoder {
    child: Child,
    stderr: Option<JoinHandle<Vec<u8>>>,
    frame_bytes: usize,
}

/// Encoder parameters for [`FfmpegEncoder::new`].
#[derive(Clone, Debug)]
pub struct EncodeSettings<'a> {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: &'a str,
    pub pix_fmt: &'a str,
    pub crf: u32,
}

impl FfmpegEncoder {
    pub fn new(output_path: &Path, input_audio: &Path, settings: &EncodeSettings<'_>) -> Result<Self> {
        let mut command = Command::new("ffmpeg");
        command.args(build_args(output_path, input_audio, settings));
        let frame_bytes = settings.width as usize * settings.height as usize * 4;

        let encoder = Self::spawn(command, frame_bytes)
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            settings.width,
            settings.height,
            settings.fps,
            settings.codec
        );

        Ok(encoder)
    }

    fn spawn(mut command: Command, frame_bytes: usize) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = match child.stderr.take() {
            Some(pipe) => Some(
                std::thread::Builder::new()
                    .name("ffmpeg-stderr".into())
                    .spawn(move || drain_tail(pipe))?,
            ),
            None => None,
        };

        Ok(Self {
            child,
            stderr,
            frame_bytes,
        })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        if rgba_pixels.len() != self.frame_bytes {
            anyhow::bail!(
                "Frame is {} bytes, encoder expects {}",
                rgba_pixels.len(),
                self.frame_bytes
            );
        }
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // Close stdin to signal EOF
        drop(self.child.stdin.take());

        let status = self.child.wait().context("Failed to wait for ffmpeg")?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}

/// Reads `pipe` to EOF, keeping only the last [`STDERR_TAIL`] bytes.
fn drain_tail(mut pipe: impl Read) -> Vec<u8> {
    let mut tail = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match pipe.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL {
                    tail.drain(..tail.len() - STDERR_TAIL);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    tail
}

fn build_args(output_path: &Path, input_audio: &Path, settings: &EncodeSettings<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-nostats".into(),
        "-loglevel".into(), "error".into(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), "rgba".into(),
        "-video_size".into(), format!("{}x{}", settings.width, settings.height).into(),
        "-framerate".into(), settings.fps.to_string().into(),
        "-i".into(), "pipe:0".into(),
        "-i".into(), input_audio.as_os_str().to_owned(),
        "-c:v".into(), settings.codec.into(),
        "-pix_fmt".into(), settings.pix_fmt.into(),
        "-crf".into(), settings.crf.to_string().into(),
        "-preset".into(), "medium".into(),
        "-c:a".into(), "aac".into(),
        "-b:a".into(), "192k".into(),
        "-shortest".into(),
    ];
    args.push(output_path.as_os_str().to_owned());
    args
}
