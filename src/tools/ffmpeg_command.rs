use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// 兩段式 seek 的前置緩衝時間（秒）
const SEEK_MARGIN: f64 = 2.0;

/// 截圖定位方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// 以秒數定位（快速，依賴關鍵幀）
    Time(f64),
    /// 以幀序號定位（需從頭解碼，短片使用）
    Frame(i64),
}

/// 截圖輸出尺寸；只給一邊時另一邊依比例計算
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenshotOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ScreenshotOptions {
    #[must_use]
    pub const fn width(width: u32) -> Self {
        Self {
            width: Some(width),
            height: None,
        }
    }

    #[must_use]
    pub const fn height(height: u32) -> Self {
        Self {
            width: None,
            height: Some(height),
        }
    }

    fn scale_filter(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("scale={w}:{h}")),
            (Some(w), None) => Some(format!("scale={w}:-2")),
            (None, Some(h)) => Some(format!("scale=-2:{h}")),
            (None, None) => None,
        }
    }
}

/// 單張截圖的 ffmpeg 命令，輸出 BMP 到 stdout
pub struct ScreenshotCommand {
    source_path: PathBuf,
    target: SeekTarget,
    options: ScreenshotOptions,
}

impl ScreenshotCommand {
    #[must_use]
    pub fn new(source_path: &Path, target: SeekTarget, options: ScreenshotOptions) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            target,
            options,
        }
    }

    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];

        let mut filters = Vec::new();

        match self.target {
            SeekTarget::Time(timestamp) => {
                // 第一個 -ss（在 -i 前）快速跳轉，第二個 -ss（在 -i 後）精準定位
                let timestamp = timestamp.max(0.0);
                let t0 = (timestamp - SEEK_MARGIN).max(0.0);
                let delta = timestamp - t0;

                if t0 > 0.0 {
                    args.push("-ss".to_string());
                    args.push(format!("{t0:.3}"));
                }

                args.push("-i".to_string());
                args.push(self.source_path.to_string_lossy().to_string());

                if delta > 0.0 {
                    args.push("-ss".to_string());
                    args.push(format!("{delta:.3}"));
                }
            }
            SeekTarget::Frame(frame) => {
                args.push("-i".to_string());
                args.push(self.source_path.to_string_lossy().to_string());
                filters.push(format!("select=eq(n\\,{frame})"));
            }
        }

        if let Some(scale) = self.options.scale_filter() {
            filters.push(scale);
        }

        args.extend([
            "-frames:v".to_string(),
            "1".to_string(),
            "-an".to_string(),
            "-sn".to_string(),
            "-dn".to_string(),
        ]);

        if !filters.is_empty() {
            args.push("-vf".to_string());
            args.push(filters.join(","));
        }

        if matches!(self.target, SeekTarget::Frame(_)) {
            args.push("-vsync".to_string());
            args.push("vfr".to_string());
        }

        args.extend([
            "-c:v".to_string(),
            "bmp".to_string(),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-".to_string(),
        ]);

        args
    }

    #[must_use]
    pub fn build_command(&self, ffmpeg: &Path) -> Command {
        let mut cmd = Command::new(ffmpeg);
        cmd.args(self.build_args());
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_for(target: SeekTarget, options: ScreenshotOptions) -> Vec<String> {
        ScreenshotCommand::new(Path::new("/test/video.mp4"), target, options).build_args()
    }

    fn position(args: &[String], value: &str) -> Option<usize> {
        args.iter().position(|a| a == value)
    }

    #[test]
    fn test_time_seek_uses_two_stage_seek() {
        let args = args_for(SeekTarget::Time(10.0), ScreenshotOptions::width(160));

        let input = position(&args, "-i").unwrap();
        let first_ss = position(&args, "-ss").unwrap();
        assert!(first_ss < input);
        assert_eq!(args[first_ss + 1], "8.000");

        let second_ss = args[input..].iter().position(|a| a == "-ss").unwrap() + input;
        assert_eq!(args[second_ss + 1], "2.000");

        let vf = position(&args, "-vf").unwrap();
        assert_eq!(args[vf + 1], "scale=160:-2");
        assert_eq!(args.last().unwrap(), "-");
    }

    #[test]
    fn test_time_seek_at_zero_has_no_ss() {
        let args = args_for(SeekTarget::Time(0.0), ScreenshotOptions::default());
        assert!(position(&args, "-ss").is_none());
        assert!(position(&args, "-vf").is_none());
    }

    #[test]
    fn test_frame_seek_uses_select_filter() {
        let args = args_for(SeekTarget::Frame(42), ScreenshotOptions::height(160));

        let vf = position(&args, "-vf").unwrap();
        assert_eq!(args[vf + 1], "select=eq(n\\,42),scale=-2:160");
        assert!(position(&args, "-ss").is_none());
        assert!(position(&args, "vfr").is_some());
    }

    #[test]
    fn test_output_is_bmp_pipe() {
        let args = args_for(SeekTarget::Time(1.0), ScreenshotOptions::width(160));
        let codec = position(&args, "-c:v").unwrap();
        assert_eq!(args[codec + 1], "bmp");
        let format = position(&args, "-f").unwrap();
        assert_eq!(args[format + 1], "image2pipe");
    }
}
