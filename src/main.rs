use std::process;
use std::sync::mpsc;
use std::thread;

use clap::Parser;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "preview-window")]
use opencv::{
    prelude::*,
    core::Mat,
    core::Size,
    highgui::imshow,
    highgui::named_window,
    highgui::resize_window,
    highgui::wait_key,
    imgproc::resize,
};

mod lib;
use lib::rest_api::{
    start_rest_api,
    APIStorage,
};
use lib::snapshots::SnapshotRegistry;

mod settings;
use settings::{
    AppSettings,
    OutputSettings,
    SettingsError,
};

mod video_capture;
use video_capture::{
    get_video_capture,
    video_props,
    run_capture_loop,
    ThreadedFrame,
};

mod pipeline;
use pipeline::FramePipeline;

const FRAMES_CHANNEL_CAPACITY: usize = 25;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("Video error: {0}")]
    Video(String),
    #[error("Detection error: {0}")]
    Detection(String),
    #[error("Snapshot error: {0}")]
    Snapshot(String),
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Camera web server: serves an ESP32-CAM style page with a live MJPEG stream
#[derive(Parser, Debug)]
#[command(name = "esp32cam-server", version, about)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "./data/conf.toml")]
    config: String,
    /// Debug logging (same as `[debug] enable = true`)
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(feature = "preview-window")]
struct PreviewWindow {
    name: String,
    size: Size,
    resized: Mat,
}

#[cfg(feature = "preview-window")]
impl PreviewWindow {
    fn new(output: &OutputSettings) -> Result<Self, AppError> {
        named_window(&output.window_name, 1)?;
        resize_window(&output.window_name, output.width, output.height)?;
        Ok(PreviewWindow {
            name: output.window_name.clone(),
            size: Size::new(output.width, output.height),
            resized: Mat::default(),
        })
    }
    /// Shows the frame. Returns false once `q` has been pressed
    fn show(&mut self, frame: &Mat) -> Result<bool, AppError> {
        resize(frame, &mut self.resized, self.size, 0.0, 0.0, 1)?;
        if self.resized.size()?.width > 0 {
            imshow(&self.name, &self.resized)?;
        }
        let key = wait_key(1)?;
        Ok((key & 0xFF) != 'q' as i32)
    }
}

#[cfg(not(feature = "preview-window"))]
struct PreviewWindow;

#[cfg(not(feature = "preview-window"))]
impl PreviewWindow {
    fn new(_output: &OutputSettings) -> Result<Self, AppError> {
        warn!("Preview window requested, but the binary is built without 'preview-window' feature");
        Ok(PreviewWindow)
    }
    fn show(&mut self, _frame: &opencv::core::Mat) -> Result<bool, AppError> {
        Ok(true)
    }
}

fn run(settings: &AppSettings) -> Result<(), AppError> {
    info!("Press `Ctrl-C` to stop main program");
    ctrlc::set_handler(move || {
        info!("Ctrl+C has been pressed! Exit");
        process::exit(0);
    }).map_err(|err| AppError::Video(format!("Error setting `Ctrl-C` handler: {}", err)))?;

    let snapshots = SnapshotRegistry::new_threaded(&settings.snapshots.output_dir);
    let mut pipeline = FramePipeline::new(settings, snapshots.clone())?;

    /* Start web server */
    let (tx_mjpeg, rx_mjpeg) = mpsc::sync_channel::<Vec<u8>>(FRAMES_CHANNEL_CAPACITY);
    let (ready_tx, ready_rx) = mpsc::sync_channel::<std::io::Result<()>>(1);
    let server_handle = {
        let host = settings.server.host.clone();
        let port = settings.server.port;
        let storage = APIStorage::new(snapshots.clone());
        thread::spawn(move || {
            match start_rest_api(host, port, storage, rx_mjpeg, ready_tx) {
                Ok(_) => {},
                Err(err) => {
                    error!("Web server stopped due the error: {}", err)
                }
            }
        })
    };
    match ready_rx.recv() {
        Ok(Ok(())) => {},
        Ok(Err(err)) => return Err(AppError::Io(err)),
        Err(_) => return Err(AppError::Io(std::io::Error::other("Web server thread exited before binding"))),
    }

    /* Video properties */
    let video_capture = get_video_capture(&settings.input.video_src, &settings.input.typ)?;
    let props = video_props(&video_capture)?;
    info!("Video properties: {{Width: {}px | Height: {}px | FPS: {}}}", props.width, props.height, props.fps);

    let mut preview = if settings.output.enable {
        Some(PreviewWindow::new(&settings.output)?)
    } else {
        None
    };

    /* Start capture loop */
    let (tx_capture, rx_capture) = mpsc::sync_channel::<ThreadedFrame>(FRAMES_CHANNEL_CAPACITY);
    thread::spawn(move || {
        let total = run_capture_loop(video_capture, tx_capture);
        info!("Capture loop finished after {} frames", total);
    });

    for mut received in rx_capture {
        debug!("Frame #{} captured at {}", received.frame_index, received.captured_at);
        let jpeg = match pipeline.process(&mut received.frame) {
            Ok(jpeg) => jpeg,
            Err(err) => {
                warn!("Can't process frame #{} due the error: {}", received.frame_index, err);
                continue;
            }
        };
        if tx_mjpeg.send(jpeg).is_err() {
            debug!("MJPEG channel is closed");
        }
        if let Some(window) = preview.as_mut() {
            if !window.show(&received.frame)? {
                info!("Preview window has been closed");
                return Ok(());
            }
        }
    }

    info!("Video source is exhausted. Web server keeps serving the last frame, press `Ctrl-C` to stop");
    drop(tx_mjpeg);
    if server_handle.join().is_err() {
        error!("Web server thread panicked");
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let app_settings = AppSettings::new(&cli.config);
    let verbose = cli.verbose || app_settings.as_ref().map(|s| s.verbose()).unwrap_or(false);
    init_tracing(verbose);

    let app_settings = match app_settings {
        Ok(settings) => settings,
        Err(err) => {
            error!("Can't load settings from '{}': {}", cli.config, err);
            process::exit(1);
        }
    };
    info!("Settings are:\n\t{}", app_settings);

    match run(&app_settings) {
        Ok(_) => {},
        Err(err) => {
            error!("Error in main thread: {}", err);
            process::exit(1);
        }
    };
}
