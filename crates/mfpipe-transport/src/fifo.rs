use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Mode, Transport};

/// Named-pipe (FIFO) transport.
///
/// `create` makes the FIFO node; each handle then opens it non-blocking in
/// one direction. Opening for write fails until a reader has the FIFO open,
/// so `open` keeps retrying until its timeout.
pub struct NamedPipe {
    path: PathBuf,
    file: Option<File>,
}

impl NamedPipe {
    pub const KIND: &'static str = "named-pipe";

    /// Default permission mode for created FIFOs.
    pub const DEFAULT_MODE: u32 = 0o666;

    const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(1);

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    /// The FIFO path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn id(&self) -> String {
        self.path.display().to_string()
    }

    fn file(&mut self) -> std::io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotConnected))
    }
}

#[cfg(unix)]
impl NamedPipe {
    fn make_fifo(&self) -> Result<()> {
        use std::os::unix::ffi::OsStrExt;
        use std::os::unix::fs::FileTypeExt;

        let create_err = |source| TransportError::Create {
            id: self.id(),
            source,
        };

        let c_path = std::ffi::CString::new(self.path.as_os_str().as_bytes()).map_err(|_| {
            TransportError::InvalidEndpoint {
                id: self.id(),
                reason: "path contains a NUL byte".to_string(),
            }
        })?;

        // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
        let rc = unsafe { libc::mkfifo(c_path.as_ptr(), Self::DEFAULT_MODE as libc::mode_t) };
        if rc == 0 {
            debug!(path = ?self.path, "created named pipe");
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::AlreadyExists {
            return Err(create_err(err));
        }

        // Reuse an existing FIFO, but never hijack a regular file.
        let metadata = std::fs::symlink_metadata(&self.path).map_err(create_err)?;
        if metadata.file_type().is_fifo() {
            debug!(path = ?self.path, "reusing existing named pipe");
            Ok(())
        } else {
            Err(create_err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "existing path is not a named pipe",
            )))
        }
    }

    fn open_once(&self, mode: Mode) -> std::io::Result<File> {
        use std::os::unix::fs::OpenOptionsExt;

        let mut options = std::fs::OpenOptions::new();
        match mode {
            Mode::Read => options.read(true),
            Mode::Write => options.write(true),
        };
        options.custom_flags(libc::O_NONBLOCK).open(&self.path)
    }
}

#[cfg(unix)]
impl Transport for NamedPipe {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn create(&mut self) -> Result<()> {
        self.make_fifo()
    }

    fn open(&mut self, mode: Mode, timeout: Duration) -> Result<()> {
        if self.file.is_some() {
            return Err(TransportError::Open {
                id: self.id(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "named pipe handle is already open",
                ),
            });
        }

        let start = Instant::now();
        loop {
            match self.open_once(mode) {
                Ok(file) => {
                    debug!(path = ?self.path, %mode, "opened named pipe");
                    self.file = Some(file);
                    return Ok(());
                }
                // ENXIO: write side opened before any reader.
                Err(err)
                    if err.raw_os_error() == Some(libc::ENXIO)
                        || err.kind() == std::io::ErrorKind::NotFound
                        || err.kind() == std::io::ErrorKind::Interrupted =>
                {
                    if start.elapsed() >= timeout {
                        return Err(TransportError::Timeout {
                            id: self.id(),
                            waited: start.elapsed(),
                        });
                    }
                    std::thread::sleep(Self::OPEN_RETRY_INTERVAL);
                }
                Err(err) => {
                    return Err(TransportError::Open {
                        id: self.id(),
                        source: err,
                    })
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.file.take().is_some() {
            debug!(path = ?self.path, "closed named pipe");
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file()?.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file()?.write(buf)
    }
}

#[cfg(not(unix))]
impl Transport for NamedPipe {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn create(&mut self) -> Result<()> {
        Err(TransportError::Unsupported(Self::KIND))
    }

    fn open(&mut self, _mode: Mode, _timeout: Duration) -> Result<()> {
        Err(TransportError::Unsupported(Self::KIND))
    }

    fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file()?.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file()?.write(buf)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::ErrorKind;
    use std::os::unix::fs::FileTypeExt;

    use super::*;

    fn unique_dir(tag: &str) -> PathBuf {
        let dir = PathBuf::from(format!(
            "/tmp/mfpipe-fifo-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn create_makes_fifo_and_is_idempotent() {
        let dir = unique_dir("create");
        let path = dir.join("pipe");

        NamedPipe::new(&path).create().unwrap();
        let metadata = std::fs::symlink_metadata(&path).unwrap();
        assert!(metadata.file_type().is_fifo());

        NamedPipe::new(&path).create().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn create_rejects_regular_file() {
        let dir = unique_dir("regular");
        let path = dir.join("not-a-fifo");
        std::fs::write(&path, b"regular-file").unwrap();

        let err = NamedPipe::new(&path).create().unwrap_err();
        assert!(matches!(err, TransportError::Create { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_open_times_out_without_reader() {
        let dir = unique_dir("noreader");
        let path = dir.join("pipe");
        NamedPipe::new(&path).create().unwrap();

        let mut writer = NamedPipe::new(&path);
        let err = writer
            .open(Mode::Write, Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bytes_flow_from_writer_to_reader() {
        let dir = unique_dir("flow");
        let path = dir.join("pipe");
        NamedPipe::new(&path).create().unwrap();

        let mut reader = NamedPipe::new(&path);
        reader.open(Mode::Read, Duration::from_millis(100)).unwrap();

        let mut buf = [0u8; 16];
        let empty = reader.read(&mut buf);
        assert!(matches!(empty, Ok(0)) || matches!(&empty, Err(e) if e.kind() == ErrorKind::WouldBlock));

        let mut writer = NamedPipe::new(&path);
        writer.open(Mode::Write, Duration::from_millis(100)).unwrap();
        assert_eq!(writer.write(b"hello").unwrap(), 5);

        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");

        writer.close().unwrap();
        reader.close().unwrap();
        reader.close().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn read_before_open_is_not_connected() {
        let mut pipe = NamedPipe::new("/tmp/never-opened");
        let err = pipe.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
    }
}
