mod settings;
mod terminal_renderer;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use livefakecheck_core::capture::domain::device_probe::probe_devices;
use livefakecheck_core::capture::infrastructure::ffmpeg_camera::FfmpegCamera;
use livefakecheck_core::classification::infrastructure::onnx_classifier::OnnxClassifier;
use livefakecheck_core::detection::domain::face_crop::CropSettings;
use livefakecheck_core::detection::domain::face_extractor::CroppingFaceExtractor;
use livefakecheck_core::detection::infrastructure::onnx_blazeface_detector::{
    DetectorSettings, OnnxBlazefaceDetector,
};
use livefakecheck_core::display::display_loop::DisplayLoop;
use livefakecheck_core::inference::inference_logger::StatsInferenceLogger;
use livefakecheck_core::inference::scheduler::{InferenceScheduler, SchedulerConfig};
use livefakecheck_core::shared::model_resolver::{self, ModelLocation};

use settings::Settings;
use terminal_renderer::TerminalRenderer;

/// Live webcam deepfake detection.
#[derive(Parser)]
#[command(name = "livefakecheck")]
struct Cli {
    /// Camera device index.
    #[arg(long)]
    camera: Option<u32>,

    /// List cameras that open and deliver a frame, then exit.
    #[arg(long)]
    list_cameras: bool,

    /// Display tick period in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Frames whose aggregated score is above this are FAKE (0.0-1.0).
    #[arg(long)]
    threshold: Option<f32>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Overlap above which duplicate face boxes are merged (0.0-1.0).
    #[arg(long)]
    iou: Option<f64>,

    /// Side length of the classifier input crops.
    #[arg(long)]
    crop_size: Option<u32>,

    /// Context kept around each face box, as a fraction of its size (0.0-1.0).
    #[arg(long)]
    crop_margin: Option<f64>,

    /// Number of device indices tried by --list-cameras.
    #[arg(long)]
    probe_range: Option<u32>,

    /// Face detector model: file path or http(s) URL.
    #[arg(long)]
    detector_model: Option<String>,

    /// Real/fake classifier model: file path or http(s) URL.
    #[arg(long)]
    classifier_model: Option<String>,

    /// Stop after this many seconds (default: run until Enter is pressed).
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Stop after this many display ticks.
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Read settings from this file instead of the user config directory.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the effective settings back to the settings file.
    #[arg(long)]
    save_settings: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let settings_path = cli.settings.clone().or_else(Settings::config_path);
    let base = settings_path
        .as_deref()
        .map(Settings::load_from)
        .unwrap_or_default();
    let settings = merge(base, &cli);
    settings.validate()?;

    if cli.save_settings {
        let path = settings_path.ok_or("Could not determine settings location")?;
        settings.save_to(&path)?;
        log::info!("Settings saved to {}", path.display());
    }

    if cli.list_cameras {
        return list_cameras(&settings);
    }

    run_live(&settings, cli.duration_secs, cli.max_ticks)
}

fn list_cameras(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let factory = FfmpegCamera::open_boxed;
    let devices = probe_devices(&factory, settings.probe_range);
    if devices.is_empty() {
        return Err(format!("No cameras found in indices 0..{}", settings.probe_range).into());
    }
    for device in devices {
        println!("{}", device.label());
    }
    Ok(())
}

fn run_live(
    settings: &Settings,
    duration_secs: Option<u64>,
    max_ticks: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let scheduler = build_scheduler(settings)?;
    let source = FfmpegCamera::open_boxed(settings.camera)?;
    log::info!(
        "Camera {} open, ticking every {} ms",
        settings.camera,
        settings.tick_interval_ms
    );

    let stop = Arc::new(AtomicBool::new(false));
    spawn_stop_triggers(&stop, duration_secs);

    let mut display = DisplayLoop::new(
        source,
        scheduler,
        Box::new(TerminalRenderer::stderr()),
        settings.tick_interval(),
    );
    let ticks = display.run(&stop, max_ticks);
    eprintln!();

    let launched = display.scheduler().launched();
    let dropped = display.scheduler().dropped();
    log::info!("{ticks} ticks, {launched} inference jobs, {dropped} frames skipped while busy");
    if let Some(logger) = display.shutdown() {
        logger.summary();
    }
    Ok(())
}

fn build_scheduler(settings: &Settings) -> Result<InferenceScheduler, Box<dyn std::error::Error>> {
    let detector_path = resolve_model(&settings.detector_model, "face detector")?;
    let classifier_path = resolve_model(&settings.classifier_model, "classifier")?;

    let detector = OnnxBlazefaceDetector::new(
        &detector_path,
        DetectorSettings {
            confidence: settings.detector_confidence,
            iou_threshold: settings.detector_iou,
        },
    )?;
    let extractor = CroppingFaceExtractor::new(
        Box::new(detector),
        CropSettings {
            size: settings.crop_size,
            margin: settings.crop_margin,
        },
    );
    let classifier = OnnxClassifier::new(&classifier_path)?;

    let scheduler = InferenceScheduler::spawn(
        Box::new(extractor),
        Box::new(classifier),
        SchedulerConfig {
            fake_threshold: settings.fake_threshold,
            ..SchedulerConfig::default()
        },
        Box::new(StatsInferenceLogger::new()),
    )?;
    Ok(scheduler)
}

fn resolve_model(location: &str, what: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving {what} model: {location}");
    let location = ModelLocation::parse(location)?;
    let bundled = bundled_model_dir();
    let label = what.to_string();
    let progress: model_resolver::ProgressFn = Box::new(move |downloaded, total| {
        if total > 0 {
            let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
            eprint!("\rDownloading {label} model... {pct}%");
        } else {
            eprint!("\rDownloading {label} model... {downloaded} bytes");
        }
    });
    let is_remote = matches!(location, ModelLocation::Remote { .. });
    let path = model_resolver::resolve(&location, bundled.as_deref(), Some(progress))?;
    if is_remote {
        eprintln!();
    }
    Ok(path)
}

/// `models/` next to the executable, where packaged builds ship their models.
fn bundled_model_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")))
}

/// Stops the display loop when Enter is pressed or the duration elapses.
fn spawn_stop_triggers(stop: &Arc<AtomicBool>, duration_secs: Option<u64>) {
    let on_enter = stop.clone();
    thread::spawn(move || {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_ok() {
            on_enter.store(true, Ordering::Relaxed);
        }
    });

    if let Some(secs) = duration_secs {
        let on_timeout = stop.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            on_timeout.store(true, Ordering::Relaxed);
        });
    }
}

fn merge(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(v) = cli.camera {
        settings.camera = v;
    }
    if let Some(v) = cli.interval_ms {
        settings.tick_interval_ms = v;
    }
    if let Some(v) = cli.threshold {
        settings.fake_threshold = v;
    }
    if let Some(v) = cli.confidence {
        settings.detector_confidence = v;
    }
    if let Some(v) = cli.iou {
        settings.detector_iou = v;
    }
    if let Some(v) = cli.crop_size {
        settings.crop_size = v;
    }
    if let Some(v) = cli.crop_margin {
        settings.crop_margin = v;
    }
    if let Some(v) = cli.probe_range {
        settings.probe_range = v;
    }
    if let Some(v) = &cli.detector_model {
        settings.detector_model = v.clone();
    }
    if let Some(v) = &cli.classifier_model {
        settings.classifier_model = v.clone();
    }
    settings
}
