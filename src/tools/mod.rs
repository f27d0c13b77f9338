pub mod encoder;
pub mod ffmpeg_command;
pub mod ffprobe_info;
mod file_hasher;
pub mod fingerprint_store;
pub mod lock_coordinator;
mod media_scanner;
mod path_validator;

pub use encoder::{EncoderGateway, FfmpegEncoder};
pub use ffmpeg_command::{ScreenshotCommand, ScreenshotOptions, SeekTarget};
pub use ffprobe_info::{VideoInfo, count_read_frames, get_video_info};
pub use file_hasher::calculate_checksum;
pub use fingerprint_store::{FingerprintStore, JsonFingerprintStore, StoreTransaction};
pub use lock_coordinator::{ExclusiveScope, LockCoordinator, SharedScope};
pub use media_scanner::{apply_video_info, probe_media, scan_media_files, scan_video_files};
pub use path_validator::{normalize_input_path, validate_directory_exists};
