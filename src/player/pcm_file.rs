use crate::core::{AudioSpec, PlayerError, Result};
use crate::player::quit::QuitFlag;
use crate::player::source::AudioFill;
use log::{info, warn};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 裸 PCM 文件音源（交织 S16）
///
/// 与解码管线遵守同一个 `fill` 约定：总是写满请求长度，文件读完或收到停止请求后补静音。
pub struct PcmFileSource {
    reader: Box<dyn Read + Send>,
    spec: AudioSpec,
    quit: QuitFlag,
    finished: Arc<AtomicBool>,
    bytes_read: u64,
}

impl PcmFileSource {
    pub fn open(path: impl AsRef<Path>, sample_rate: u32, channels: u16, quit: QuitFlag) -> Result<Self> {
        let path = path.as_ref();
        if sample_rate == 0 || channels == 0 {
            return Err(PlayerError::OpenError(format!(
                "无效的 PCM 参数: {} Hz, {} 声道",
                sample_rate, channels
            )));
        }
        let file = File::open(path)
            .map_err(|e| PlayerError::OpenError(format!("无法打开 PCM 文件 {}: {}", path.display(), e)))?;
        info!("🎵 打开 PCM 文件: {} ({} Hz, {} 声道, s16)", path.display(), sample_rate, channels);
        Ok(Self::from_reader(
            BufReader::new(file),
            AudioSpec::s16(sample_rate, channels),
            quit,
        ))
    }

    pub fn from_reader(reader: impl Read + Send + 'static, spec: AudioSpec, quit: QuitFlag) -> Self {
        Self {
            reader: Box::new(reader),
            spec,
            quit,
            finished: Arc::new(AtomicBool::new(false)),
            bytes_read: 0,
        }
    }

    pub fn spec(&self) -> AudioSpec {
        self.spec
    }

    /// 文件读完后置位
    pub fn finished(&self) -> Arc<AtomicBool> {
        self.finished.clone()
    }

    fn read_into(&mut self, out: &mut [u8]) -> usize {
        let mut filled = 0;
        while filled < out.len() {
            match self.reader.read(&mut out[filled..]) {
                Ok(0) => {
                    info!("📄 PCM 文件播放完毕（{} 字节）", self.bytes_read);
                    self.finished.store(true, Ordering::SeqCst);
                    break;
                }
                Ok(n) => {
                    filled += n;
                    self.bytes_read += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("读取 PCM 文件失败，按结束处理: {}", e);
                    self.finished.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }
        filled
    }
}

impl AudioFill for PcmFileSource {
    fn fill(&mut self, out: &mut [u8]) {
        let filled = if self.quit.is_raised() || self.finished.load(Ordering::SeqCst) {
            0
        } else {
            self.read_into(out)
        };
        out[filled..].fill(self.spec.format.silence_byte());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_exact_fill_then_silence() {
        let data: Vec<u8> = (1..=10u8).collect();
        let mut source = PcmFileSource::from_reader(Cursor::new(data), AudioSpec::s16(8000, 1), QuitFlag::new());
        let finished = source.finished();

        let mut buf = [0xAAu8; 4];
        source.fill(&mut buf);
        assert_eq!(buf, [1, 2, 3, 4]);
        source.fill(&mut buf);
        assert_eq!(buf, [5, 6, 7, 8]);
        assert!(!finished.load(Ordering::SeqCst));

        source.fill(&mut buf);
        assert_eq!(buf, [9, 10, 0, 0]);
        assert!(finished.load(Ordering::SeqCst));

        source.fill(&mut buf);
        assert_eq!(buf, [0; 4]);
    }

    #[test]
    fn test_silence_after_quit() {
        let quit = QuitFlag::new();
        let mut source = PcmFileSource::from_reader(Cursor::new(vec![7u8; 64]), AudioSpec::s16(8000, 2), quit.clone());
        let mut buf = [0xAAu8; 8];
        source.fill(&mut buf);
        assert_eq!(buf, [7; 8]);

        quit.raise();
        source.fill(&mut buf);
        assert_eq!(buf, [0; 8]);
    }

    #[test]
    fn test_open_file() {
        let path = std::env::temp_dir().join(format!("mini_player_pcm_{}.raw", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            file.write_all(&[1, 0, 2, 0, 3, 0, 4, 0]).unwrap();
        }

        let mut source = PcmFileSource::open(&path, 44100, 2, QuitFlag::new()).unwrap();
        assert_eq!(source.spec(), AudioSpec::s16(44100, 2));
        let mut buf = vec![0xAAu8; 12];
        source.fill(&mut buf);
        assert_eq!(buf, vec![1, 0, 2, 0, 3, 0, 4, 0, 0, 0, 0, 0]);
        assert!(source.finished().load(Ordering::SeqCst));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_rejects_bad_parameters() {
        let err = PcmFileSource::open("/nonexistent.raw", 0, 2, QuitFlag::new()).err().unwrap();
        assert!(err.is_fatal());
        assert!(PcmFileSource::open("/nonexistent/mini_player.raw", 44100, 2, QuitFlag::new()).is_err());
    }
}
