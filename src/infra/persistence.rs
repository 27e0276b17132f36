use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::state::LedgerSnapshot;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("ошибка JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Куда пишется снапшот леджера.
///
/// Вызывается только из фонового потока, поэтому `Send + 'static`.
pub trait PersistenceSink: Send + 'static {
    fn save(&mut self, snapshot: &LedgerSnapshot) -> Result<(), PersistenceError>;
}

/// Плоский JSON-файл. Запись через временный файл + rename,
/// чтобы читатель никогда не видел половину файла.
#[derive(Clone, Debug)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Прочитать снапшот. Нет файла — `None` (первый запуск).
    pub fn load(&self) -> Result<Option<LedgerSnapshot>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl PersistenceSink for JsonFileSink {
    fn save(&mut self, snapshot: &LedgerSnapshot) -> Result<(), PersistenceError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Хранилище в памяти для тестов. Клоны видят одни и те же записи.
#[derive(Clone, Debug, Default)]
pub struct InMemorySink {
    saved: Arc<Mutex<Vec<LedgerSnapshot>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<LedgerSnapshot> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.saved.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl PersistenceSink for InMemorySink {
    fn save(&mut self, snapshot: &LedgerSnapshot) -> Result<(), PersistenceError> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot.clone());
        Ok(())
    }
}

/// Фоновая запись снапшотов: канал + отдельный поток.
///
/// `submit` не блокирует: полный канал или ошибка записи только логируются,
/// изменение в памяти уже произошло и не откатывается.
#[derive(Debug)]
pub struct PersistenceWorker {
    sender: Option<mpsc::Sender<LedgerSnapshot>>,
    handle: Option<JoinHandle<()>>,
}

impl PersistenceWorker {
    pub fn spawn<S: PersistenceSink>(sink: S, buffer_size: usize) -> Result<Self, PersistenceError> {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let handle = std::thread::Builder::new()
            .name("ledger-persistence".into())
            .spawn(move || persistence_loop(sink, receiver))?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    pub fn submit(&self, snapshot: LedgerSnapshot) {
        let Some(sender) = &self.sender else {
            warn!("запись снапшота после остановки — пропускаем");
            return;
        };
        match sender.try_send(snapshot) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("канал записи снапшотов переполнен — снапшот пропущен, следующий его перекроет");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("поток записи снапшотов остановлен");
            }
        }
    }

    /// Дождаться места в очереди, положить финальный снапшот и остановить поток.
    pub fn finish(&mut self, last: LedgerSnapshot) {
        match &self.sender {
            Some(sender) => {
                if sender.blocking_send(last).is_err() {
                    error!("поток записи снапшотов остановлен, финальный снапшот потерян");
                }
            }
            None => warn!("финальный снапшот после остановки — пропускаем"),
        }
        self.shutdown();
    }

    /// Дописать всё из очереди и остановить поток.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("поток записи снапшотов завершился паникой");
            }
        }
    }
}

impl Drop for PersistenceWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn persistence_loop<S: PersistenceSink>(mut sink: S, mut receiver: mpsc::Receiver<LedgerSnapshot>) {
    while let Some(snapshot) = receiver.blocking_recv() {
        match sink.save(&snapshot) {
            Ok(()) => debug!(accounts = snapshot.accounts.len(), "снапшот записан"),
            Err(err) => error!("ошибка записи снапшота: {err}"),
        }
    }
}
