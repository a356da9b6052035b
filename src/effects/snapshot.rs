use super::{SnapshotOutcome, SnapshotStore};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::JoinHandle;

/// Writes `Motion_<timestamp>.jpg` files into one directory, creating it on
/// first use
#[derive(Debug, Clone)]
pub struct JpegSnapshotStore {
    dir: PathBuf,
}

impl JpegSnapshotStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// `Motion_20261016_142305_123.jpg` (local time, millisecond precision)
    pub fn file_name(taken_at: DateTime<Local>) -> String {
        format!("Motion_{}.jpg", taken_at.format("%Y%m%d_%H%M%S_%3f"))
    }

    pub fn path_for(&self, taken_at: DateTime<Local>) -> PathBuf {
        self.dir.join(Self::file_name(taken_at))
    }

    fn write(&self, frame: &RgbImage, path: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create snapshot directory {}", self.dir.display())
        })?;
        frame
            .save_with_format(path, ImageFormat::Jpeg)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))
    }
}

impl SnapshotStore for JpegSnapshotStore {
    fn save(&mut self, frame: &RgbImage, taken_at: DateTime<Local>) -> Result<SnapshotOutcome> {
        let path = self.path_for(taken_at);
        self.write(frame, &path)?;
        Ok(SnapshotOutcome::Saved(path))
    }
}

/// Hands snapshots to a background writer thread through a bounded queue so
/// a slow disk never holds up the frame loop. A full queue drops the snapshot
/// and reports it as a failure. Write results come back through `completed`.
pub struct QueuedSnapshotStore {
    store: JpegSnapshotStore,
    sender: Option<SyncSender<(RgbImage, PathBuf)>>,
    results: Receiver<Result<PathBuf>>,
    pending: usize,
    worker: Option<JoinHandle<()>>,
}

impl QueuedSnapshotStore {
    pub fn spawn(store: JpegSnapshotStore, capacity: usize) -> Result<Self> {
        let (sender, receiver) = mpsc::sync_channel::<(RgbImage, PathBuf)>(capacity.max(1));
        let (result_sender, results) = mpsc::channel();
        let writer = store.clone();

        let worker = std::thread::Builder::new()
            .name("snapshot-writer".into())
            .spawn(move || {
                while let Ok((frame, path)) = receiver.recv() {
                    let result = writer.write(&frame, &path).map(|_| path);
                    if result_sender.send(result).is_err() {
                        break;
                    }
                }
            })
            .context("Failed to start snapshot writer thread")?;

        Ok(Self {
            store,
            sender: Some(sender),
            results,
            pending: 0,
            worker: Some(worker),
        })
    }
}

impl SnapshotStore for QueuedSnapshotStore {
    fn save(&mut self, frame: &RgbImage, taken_at: DateTime<Local>) -> Result<SnapshotOutcome> {
        let path = self.store.path_for(taken_at);
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("snapshot writer is shut down"))?;

        match sender.try_send((frame.clone(), path.clone())) {
            Ok(()) => {
                self.pending += 1;
                Ok(SnapshotOutcome::Queued(path))
            }
            Err(TrySendError::Full(_)) => Err(anyhow!(
                "snapshot queue full, dropped {}",
                path.display()
            )),
            Err(TrySendError::Disconnected(_)) => Err(anyhow!("snapshot writer thread stopped")),
        }
    }

    fn completed(&mut self, wait: bool) -> Vec<Result<PathBuf>> {
        let mut done = Vec::new();
        loop {
            let next = if wait && self.pending > 0 {
                self.results.recv().ok()
            } else {
                self.results.try_recv().ok()
            };
            let Some(result) = next else {
                break;
            };
            self.pending = self.pending.saturating_sub(1);
            done.push(result);
        }
        done
    }
}

impl Drop for QueuedSnapshotStore {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain what is queued and exit
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
