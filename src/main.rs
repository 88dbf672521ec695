use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use afterglow::audio::{self, analysis::Analyzer};
use afterglow::cli::Cli;
use afterglow::config::{self, ConfigStore, Settings};
use afterglow::encode::ffmpeg::{EncodeSettings, FfmpegEncoder};
use afterglow::render::canvas::Canvas;
use afterglow::render::phosphor::CpuPhosphor;
use afterglow::render::text::TextOverlay;
use afterglow::spectrum::visualizer::SpectrumVisualizer;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect afterglow.toml / global config
    let mut store = match config::discover(cli.config.as_deref()) {
        Some(path) => match ConfigStore::open(&path, |s| cli.apply_overrides(s)) {
            Ok(store) => {
                log::info!("Loaded config from {}", path.display());
                store
            }
            Err(err) => {
                log::warn!("Failed to load config: {}", err);
                ConfigStore::with_path(cli_defaults(&cli), &path)
                    .context("Invalid command line settings")?
            }
        },
        None => ConfigStore::new(cli_defaults(&cli)).context("Invalid command line settings")?,
    };

    if cli.print_config {
        print!("{}", store.settings().to_toml()?);
        return Ok(());
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let settings = store.settings().clone();
    let (width, height, fps) = (settings.output.width, settings.output.height, settings.output.fps);

    log::info!("afterglow - spectrum renderer");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", cli.output.display());
    log::info!("Resolution: {}x{} @ {}fps", width, height, fps);
    log::info!(
        "Mode: {:?}, persistence {}",
        settings.spectrum.stereo_mode,
        if settings.spectrum.enable_phosphor { "on" } else { "off" }
    );

    // 1. Decode audio
    log::info!("Decoding audio...");
    let audio_data = audio::decode::decode_audio(input)?;
    if audio_data.is_empty() {
        anyhow::bail!("No audio samples decoded from {}", input.display());
    }

    // 2. Analysis, drawing surface and persistence renderer
    let mut analyzer = Analyzer::new(settings.analysis(), audio_data.sample_rate);

    let text = match settings.output.font.as_deref() {
        Some(path) => match TextOverlay::from_file(path) {
            Ok(overlay) => Some(overlay),
            Err(err) => {
                log::warn!("Text overlay disabled: {:#}", err);
                None
            }
        },
        None => {
            log::info!("No font configured; grid labels and readout are not drawn");
            None
        }
    };
    let mut canvas = Canvas::new(width, height, text);
    let mut renderer = settings.phosphor_renderer();
    let mut palette = settings.palette();

    let mut visualizer = SpectrumVisualizer::<CpuPhosphor>::new(0, width as i32);
    if let Some((x, y)) = cli.hover {
        visualizer.update_mouse_position(x + visualizer.position() as f32, y);
        visualizer.set_hovering(true);
    }

    // 3. Start FFmpeg encoder
    log::info!("Starting FFmpeg encoder...");
    let mut encoder = FfmpegEncoder::new(
        &cli.output,
        input,
        &EncodeSettings {
            width,
            height,
            fps,
            codec: &settings.output.codec,
            pix_fmt: &cli.pix_fmt,
            crf: settings.output.crf,
        },
    )?;

    // 4. Render loop
    let total_frames = (audio_data.duration() * fps as f32).ceil() as usize;
    let delta_time = 1.0 / fps as f32;
    log::info!("Total frames: {}, Duration: {:.1}s", total_frames, audio_data.duration());

    let pb = ProgressBar::new(total_frames as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    for frame_idx in 0..total_frames {
        if cli.watch_config
            && frame_idx > 0
            && frame_idx % fps as usize == 0
            && store.reload_if_changed(|s| cli.apply_overrides(s))
        {
            let next = store.settings();
            if next.analysis() != *analyzer.settings() {
                analyzer = Analyzer::new(next.analysis(), audio_data.sample_rate);
            }
            let next_renderer = next.phosphor_renderer();
            if next_renderer.decay_time != renderer.decay_time
                || next_renderer.exposure != renderer.exposure
            {
                visualizer.invalidate_phosphor_context();
                renderer = next_renderer;
            }
            palette = next.palette();
            if (next.output.width, next.output.height, next.output.fps) != (width, height, fps) {
                log::warn!("Output geometry changes apply to the next render");
            }
        }

        let display = store.display_config();
        let time = frame_idx as f32 * delta_time;
        let frame = analyzer.analyze(&audio_data, time);

        canvas.clear(palette.background);
        visualizer.draw(
            &frame.input(audio_data.sample_rate as f32, height as f32, delta_time),
            &display,
            &palette,
            &mut renderer,
            &mut canvas,
        );

        encoder.write_frame(canvas.pixels())?;
        pb.set_position(frame_idx as u64 + 1);
    }

    pb.finish_with_message("Rendering complete");
    if let Some(readout) = visualizer.readout() {
        log::debug!("Last readout: {}", readout);
    }

    // 5. Finish encoding
    log::info!("Finishing encoding...");
    encoder.finish()?;

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}

fn cli_defaults(cli: &Cli) -> Settings {
    let mut settings = Settings::default();
    cli.apply_overrides(&mut settings);
    settings
}
