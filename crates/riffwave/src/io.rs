//! File handle with positional I/O and an optional background writer
//!
//! [`AudioFile`] keeps its own cursor and issues positional reads and writes
//! against a shared [`File`]. That lets a worker thread write queued blocks
//! while the caller keeps going, without the two fighting over an OS file
//! offset. Any read, length query, flush or mode change drains the worker
//! first, so callers always observe their own writes.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

/// Write jobs queued before `write` blocks the caller
const QUEUE_DEPTH: usize = 32;

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    std::os::unix::fs::FileExt::write_all_at(file, buf, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ));
            }
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Read until `buf` is full or the reader is exhausted, returning the bytes read
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn worker_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "background writer stopped")
}

enum Job {
    Write { offset: u64, bytes: Vec<u8> },
    Drain(SyncSender<()>),
}

/// Worker thread that performs queued positional writes
struct BackgroundWriter {
    sender: Option<SyncSender<Job>>,
    worker: Option<JoinHandle<()>>,
    failure: Arc<Mutex<Option<io::Error>>>,
}

impl BackgroundWriter {
    fn spawn(file: Arc<File>) -> io::Result<Self> {
        let (sender, receiver) = mpsc::sync_channel(QUEUE_DEPTH);
        let failure = Arc::new(Mutex::new(None));
        let worker_failure = Arc::clone(&failure);

        let worker = thread::Builder::new()
            .name("riffwave-writer".to_string())
            .spawn(move || run_worker(&file, &receiver, &worker_failure))?;

        debug!("Background writer started");
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            failure,
        })
    }

    fn submit(&self, offset: u64, bytes: Vec<u8>) -> io::Result<()> {
        self.take_failure()?;
        let sender = self.sender.as_ref().ok_or_else(worker_gone)?;
        sender
            .send(Job::Write { offset, bytes })
            .map_err(|_| worker_gone())
    }

    /// Block until every queued write has been issued
    fn drain(&self) -> io::Result<()> {
        let sender = self.sender.as_ref().ok_or_else(worker_gone)?;
        let (ack, done) = mpsc::sync_channel(1);
        sender.send(Job::Drain(ack)).map_err(|_| worker_gone())?;
        done.recv().map_err(|_| worker_gone())?;
        self.take_failure()
    }

    fn take_failure(&self) -> io::Result<()> {
        self.failure.lock().take().map_or(Ok(()), Err)
    }

    fn shutdown(mut self) -> io::Result<()> {
        let result = self.drain();
        self.stop();
        result
    }

    fn stop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("Background writer panicked");
        }
    }
}

impl Drop for BackgroundWriter {
    fn drop(&mut self) {
        if self.sender.is_some() {
            if let Err(e) = self.drain() {
                warn!("Background writes lost on drop: {}", e);
            }
            self.stop();
        }
    }
}

fn run_worker(file: &File, receiver: &Receiver<Job>, failure: &Mutex<Option<io::Error>>) {
    for job in receiver {
        match job {
            Job::Write { offset, bytes } => {
                // After the first failure later blocks would leave holes, so stop writing
                if failure.lock().is_some() {
                    continue;
                }
                if let Err(e) = write_all_at(file, &bytes, offset) {
                    error!(
                        "Background write of {} bytes at {} failed: {}",
                        bytes.len(),
                        offset,
                        e
                    );
                    *failure.lock() = Some(e);
                }
            }
            Job::Drain(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

/// An open container file
pub struct AudioFile {
    path: PathBuf,
    file: Arc<File>,
    position: u64,
    writable: bool,
    background: Option<BackgroundWriter>,
}

impl AudioFile {
    /// Open an existing file read-only
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::from_file(path.as_ref(), file, false))
    }

    /// Create (or truncate) a file for reading and writing
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        Ok(Self::from_file(path.as_ref(), file, true))
    }

    fn from_file(path: &Path, file: File, writable: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            file: Arc::new(file),
            position: 0,
            writable,
            background: None,
        }
    }

    /// Path the file was opened with
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current cursor
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// True if opened for writing
    pub const fn is_writable(&self) -> bool {
        self.writable
    }

    /// True while writes go through the worker thread
    pub const fn is_background(&self) -> bool {
        self.background.is_some()
    }

    /// Current file length, including queued writes
    pub fn len(&mut self) -> io::Result<u64> {
        self.drain()?;
        Ok(self.file.metadata()?.len())
    }

    /// Switch background writing on or off, returning the previous mode
    ///
    /// Turning it off waits for every queued write and reports the first
    /// deferred error.
    pub fn set_background(&mut self, enable: bool) -> io::Result<bool> {
        let previous = self.background.is_some();
        if enable && !previous && self.writable {
            self.background = Some(BackgroundWriter::spawn(Arc::clone(&self.file))?);
        } else if !enable && let Some(writer) = self.background.take() {
            writer.shutdown()?;
            debug!("Background writer stopped");
        }
        Ok(previous)
    }

    /// Wait for queued writes to land
    pub fn drain(&mut self) -> io::Result<()> {
        match &self.background {
            Some(writer) => writer.drain(),
            None => Ok(()),
        }
    }

    /// Drain queued writes and flush the file to storage
    pub fn sync(&mut self) -> io::Result<()> {
        self.drain()?;
        if self.writable {
            self.file.sync_all()?;
        }
        Ok(())
    }
}

impl Read for AudioFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.drain()?;
        let n = read_at(&self.file, buf, self.position)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Write for AudioFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.background {
            Some(writer) => writer.submit(self.position, buf.to_vec())?,
            None => write_all_at(&self.file, buf, self.position)?,
        }
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain()
    }
}

impl Seek for AudioFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => self.len()?.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file")
        })?;
        self.position = target;
        Ok(target)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}

impl std::fmt::Debug for AudioFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFile")
            .field("path", &self.path)
            .field("position", &self.position)
            .field("writable", &self.writable)
            .field("background", &self.is_background())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_positional_cursor() {
        let dir = tempdir().expect("temp dir");
        let mut file = AudioFile::create(dir.path().join("a.bin")).expect("create");

        file.write_all(b"hello world").expect("write");
        assert_eq!(file.position(), 11);

        file.seek(SeekFrom::Start(6)).expect("seek");
        let mut buf = [0u8; 5];
        file.read_exact(&mut buf).expect("read");
        assert_eq!(&buf, b"world");

        file.seek(SeekFrom::Current(-5)).expect("seek back");
        assert_eq!(file.position(), 6);
        assert!(file.seek(SeekFrom::Current(-100)).is_err());
    }

    #[test]
    fn test_background_writes_visible_after_drain() {
        let dir = tempdir().expect("temp dir");
        let mut file = AudioFile::create(dir.path().join("b.bin")).expect("create");

        assert!(!file.set_background(true).expect("enable"));
        assert!(file.is_background());
        for block in 0u8..100 {
            file.write_all(&[block; 64]).expect("queued write");
        }

        // Reads drain the worker first
        file.seek(SeekFrom::Start(64 * 42)).expect("seek");
        let mut buf = [0u8; 64];
        file.read_exact(&mut buf).expect("read");
        assert_eq!(buf, [42u8; 64]);

        assert!(file.set_background(false).expect("disable"));
        assert_eq!(file.len().expect("len"), 6400);
    }

    #[test]
    fn test_read_only_file_never_starts_worker() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("c.bin");
        std::fs::write(&path, b"abc").expect("seed");

        let mut file = AudioFile::open(&path).expect("open");
        file.set_background(true).expect("no-op");
        assert!(!file.is_background());
        assert!(file.write_all(b"x").is_err());
    }
}
