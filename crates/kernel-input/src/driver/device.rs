//! 비차단 커널 로그 장치 리더
//!
//! 장치를 `O_NONBLOCK`으로 열고 [`AsyncFd`]로 읽기 가능 상태를 기다립니다.
//! 한 번의 대기는 `poll_interval`로 제한됩니다.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tracing::{debug, error, warn};

use crate::error::DriverError;

/// 한 번의 읽기 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    /// `n` 바이트 읽음
    Data(usize),
    /// 대기 간격 동안 데이터 없음
    Idle,
    /// 링 버퍼가 덮어써져 끝으로 이동함
    Overrun,
    /// 장치가 EOF를 반환함
    Eof,
}

/// 비차단 장치 핸들
#[derive(Debug)]
pub(crate) struct DeviceReader {
    fd: AsyncFd<File>,
    path: PathBuf,
}

impl DeviceReader {
    /// 장치를 엽니다. `seek_to_end`이면 기존 메시지를 건너뜁니다.
    pub(crate) fn open(path: &Path, seek_to_end: bool) -> Result<Self, DriverError> {
        let open_err = |source| DriverError::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(open_err)?;

        if seek_to_end {
            let mut handle = &file;
            handle.seek(SeekFrom::End(0)).map_err(open_err)?;
            debug!(path = %path.display(), "skipped existing kernel messages");
        }

        let fd = AsyncFd::with_interest(file, Interest::READABLE).map_err(open_err)?;
        Ok(Self {
            fd,
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// 최대 `poll_interval` 동안 읽기를 기다립니다.
    pub(crate) async fn read(
        &self,
        buf: &mut [u8],
        poll_interval: Duration,
    ) -> Result<ReadOutcome, DriverError> {
        loop {
            let mut guard = match tokio::time::timeout(poll_interval, self.fd.readable()).await {
                Err(_elapsed) => return Ok(ReadOutcome::Idle),
                Ok(ready) => ready.map_err(DriverError::Read)?,
            };

            let result = guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.read(buf)
            });

            match result {
                Ok(Ok(0)) => return Ok(ReadOutcome::Eof),
                Ok(Ok(n)) => return Ok(ReadOutcome::Data(n)),
                Ok(Err(e)) if e.kind() == ErrorKind::Interrupted => continue,
                Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {
                    warn!(
                        path = %self.path.display(),
                        "kernel ring buffer overrun, some messages were lost"
                    );
                    self.seek_to_end();
                    return Ok(ReadOutcome::Overrun);
                }
                Ok(Err(e)) => return Err(DriverError::Read(e)),
                // WouldBlock: readiness가 해제되었으므로 다시 대기
                Err(_would_block) => continue,
            }
        }
    }

    fn seek_to_end(&self) {
        let mut file = self.fd.get_ref();
        if let Err(e) = file.seek(SeekFrom::End(0)) {
            error!(path = %self.path.display(), error = %e, "failed to seek after overrun");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_missing_device_reports_path() {
        let err = DeviceReader::open(Path::new("/nonexistent/kmsg"), true).unwrap_err();
        match err {
            DriverError::Open { path, source } => {
                assert_eq!(path, PathBuf::from("/nonexistent/kmsg"));
                assert_eq!(source.kind(), ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn pipe_reader_reports_data_idle_and_eof() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("klog.fifo");
        let c_path = std::ffi::CString::new(fifo.to_str().unwrap()).unwrap();
        // SAFETY: 유효한 NUL 종료 경로
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

        let reader = DeviceReader::open(&fifo, false).unwrap();
        let mut writer = OpenOptions::new().write(true).open(&fifo).unwrap();
        let mut buf = [0u8; 64];

        assert_eq!(
            reader.read(&mut buf, Duration::from_millis(20)).await.unwrap(),
            ReadOutcome::Idle
        );

        std::io::Write::write_all(&mut writer, b"<6>hello\n").unwrap();
        let outcome = reader.read(&mut buf, Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Data(9));
        assert_eq!(&buf[..9], b"<6>hello\n");

        drop(writer);
        assert_eq!(
            reader.read(&mut buf, Duration::from_secs(5)).await.unwrap(),
            ReadOutcome::Eof
        );
    }
}
