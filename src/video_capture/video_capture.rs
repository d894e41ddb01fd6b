use std::sync::mpsc::SyncSender;

use chrono::Utc;
use opencv::{
    prelude::*,
    core::Mat,
    videoio::VideoCapture,
    videoio::CAP_ANY,
    videoio::CAP_PROP_FPS,
    videoio::CAP_PROP_FRAME_WIDTH,
    videoio::CAP_PROP_FRAME_HEIGHT,
};
use tracing::{debug, info, warn};

use crate::AppError;
use crate::video_capture::ThreadedFrame;

/// Capture loop gives up after this many empty frames in a row
pub const EMPTY_FRAMES_LIMIT: u16 = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProps {
    pub width: f32,
    pub height: f32,
    pub fps: f64,
}

/// Opens either a local camera (`device`, `video_src` is its index) or any
/// address OpenCV understands (`url`: file, RTSP, HTTP MJPEG).
pub fn get_video_capture(video_src: &str, typ: &str) -> Result<VideoCapture, AppError> {
    let video_capture = match typ {
        "url" => VideoCapture::from_file(video_src, CAP_ANY)?,
        "device" => {
            let device_id = video_src.parse::<i32>().map_err(|_| AppError::Video(format!("Can't parse '{}' as device_id (i32)", video_src)))?;
            VideoCapture::new(device_id, CAP_ANY)?
        },
        other => {
            return Err(AppError::Video(format!("Unsupported input type '{}'", other)));
        }
    };
    if !video_capture.is_opened()? {
        return Err(AppError::Video(format!("Can't open video '{}'", video_src)));
    }
    Ok(video_capture)
}

pub fn video_props(capture: &VideoCapture) -> Result<VideoProps, AppError> {
    let fps = capture.get(CAP_PROP_FPS)?;
    let width = capture.get(CAP_PROP_FRAME_WIDTH)? as f32;
    let height = capture.get(CAP_PROP_FRAME_HEIGHT)? as f32;
    Ok(VideoProps { width, height, fps })
}

/// Reads frames until the source is exhausted or broken and forwards them to
/// the processing side. Returns the number of forwarded frames.
pub fn run_capture_loop(mut video_capture: VideoCapture, tx_capture: SyncSender<ThreadedFrame>) -> u64 {
    let mut frame_index: u64 = 0;
    let mut empty_frames_counter: u16 = 0;
    loop {
        let mut read_frame = Mat::default();
        match video_capture.read(&mut read_frame) {
            Ok(_) => {},
            Err(err) => {
                warn!("Can't read next frame: {}", err);
                break;
            }
        };
        if read_frame.empty() {
            debug!("Empty frame");
            empty_frames_counter += 1;
            if empty_frames_counter >= EMPTY_FRAMES_LIMIT {
                warn!("Too many empty frames");
                break
            }
            continue;
        }
        empty_frames_counter = 0;
        let frame = ThreadedFrame {
            frame: read_frame,
            captured_at: Utc::now(),
            frame_index: frame_index,
        };
        if tx_capture.send(frame).is_err() {
            // Processing side is gone
            break;
        }
        frame_index += 1;
    }
    match video_capture.release() {
        Ok(_) => {
            info!("Video capture has been closed successfully");
        },
        Err(err) => {
            warn!("Can't release video capturer due the error: {}", err);
        }
    };
    frame_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use opencv::{
        core::Scalar,
        core::Size,
        core::CV_8UC3,
        videoio::VideoWriter,
    };

    const CLIP_FRAMES: u64 = 5;

    /// Small MJPG/AVI clip, readable by OpenCV's built-in backend
    fn write_clip(dir: &std::path::Path) -> String {
        let path = dir.join("clip.avi").to_string_lossy().to_string();
        let fourcc = VideoWriter::fourcc('M', 'J', 'P', 'G').unwrap();
        let mut writer = VideoWriter::new(&path, fourcc, 10.0, Size::new(64, 48), true).unwrap();
        assert!(writer.is_opened().unwrap());
        for i in 0..CLIP_FRAMES {
            let frame = Mat::new_rows_cols_with_default(48, 64, CV_8UC3, Scalar::all(40.0 * i as f64)).unwrap();
            writer.write(&frame).unwrap();
        }
        writer.release().unwrap();
        path
    }

    #[test]
    fn test_capture_until_source_ends() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_clip(dir.path());
        let capture = get_video_capture(&path, "url").unwrap();
        let props = video_props(&capture).unwrap();
        assert_eq!((props.width, props.height), (64.0, 48.0));

        // End of file shows up as empty reads, the loop stops on the limit
        let (tx, rx) = mpsc::sync_channel(CLIP_FRAMES as usize);
        let forwarded = run_capture_loop(capture, tx);
        assert_eq!(forwarded, CLIP_FRAMES);
        let indices: Vec<u64> = rx.iter().map(|f| f.frame_index).collect();
        assert_eq!(indices, (0..CLIP_FRAMES).collect::<Vec<u64>>());
    }

    #[test]
    fn test_capture_stops_without_receiver() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_clip(dir.path());
        let capture = get_video_capture(&path, "url").unwrap();
        let (tx, rx) = mpsc::sync_channel(1);
        drop(rx);
        assert_eq!(run_capture_loop(capture, tx), 0);
    }
    #[test]
    fn test_unsupported_input() {
        let res = get_video_capture("0", "rtmp");
        assert!(matches!(res, Err(AppError::Video(_))));
    }
    #[test]
    fn test_bad_device_id() {
        let res = get_video_capture("front-camera", "device");
        assert!(matches!(res, Err(AppError::Video(_))));
    }
}
