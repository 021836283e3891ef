//! 进程内注册中心
//!
//! 每个服务名对应一个 `tokio::sync::watch` 通道，注册/注销时唤醒所有 watcher

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{Discovery, RegistryError, Service, Watcher};

struct Slot {
    tx: watch::Sender<Vec<Service>>,
    pending_errors: VecDeque<RegistryError>,
}

impl Slot {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            tx,
            pending_errors: VecDeque::new(),
        }
    }
}

type Slots = Arc<Mutex<HashMap<String, Slot>>>;

/// 进程内注册中心
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    slots: Slots,
    discover_delay: Option<Duration>,
}

impl MemoryRegistry {
    /// 创建空的注册中心
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用静态实例列表创建注册中心
    pub fn with_services(services: impl IntoIterator<Item = Service>) -> Self {
        let registry = Self::new();
        for service in services {
            registry.register(service);
        }
        registry
    }

    /// `discover` 在返回前等待的时间，用来模拟慢速后端
    pub fn with_discover_delay(mut self, delay: Duration) -> Self {
        self.discover_delay = Some(delay);
        self
    }

    fn with_slot<R>(&self, name: &str, f: impl FnOnce(&mut Slot) -> R) -> R {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.entry(name.to_string()).or_insert_with(Slot::new);
        f(slot)
    }

    /// 注册实例，同 ID 的旧实例会被替换
    pub fn register(&self, service: Service) {
        let name = service.name.clone();
        self.with_slot(&name, |slot| {
            slot.tx.send_modify(|services| {
                match services.iter_mut().find(|s| s.id == service.id) {
                    Some(existing) => *existing = service,
                    None => services.push(service),
                }
            });
        });
    }

    /// 注销实例
    pub fn deregister(&self, name: &str, id: &str) {
        self.with_slot(name, |slot| {
            slot.tx.send_modify(|services| services.retain(|s| s.id != id));
        });
    }

    /// 整体替换某个服务的实例列表
    pub fn set_services(&self, name: &str, services: Vec<Service>) {
        self.with_slot(name, |slot| {
            slot.tx.send_replace(services);
        });
    }

    /// 让该服务下一次 `list` 返回指定错误
    pub fn inject_error(&self, name: &str, error: RegistryError) {
        self.with_slot(name, |slot| {
            slot.pending_errors.push_back(error);
            // 唤醒阻塞中的 watcher
            slot.tx.send_modify(|_| {});
        });
    }

    /// 当前注册的实例
    pub fn services(&self, name: &str) -> Vec<Service> {
        self.with_slot(name, |slot| slot.tx.borrow().clone())
    }
}

#[async_trait]
impl Discovery for MemoryRegistry {
    async fn discover(&self, name: &str) -> Result<Box<dyn Watcher>, RegistryError> {
        if let Some(delay) = self.discover_delay {
            tokio::time::sleep(delay).await;
        }

        let rx = self.with_slot(name, |slot| slot.tx.subscribe());
        Ok(Box::new(MemoryWatcher {
            name: name.to_string(),
            slots: self.slots.clone(),
            rx: tokio::sync::Mutex::new(rx),
            initialized: AtomicBool::new(false),
            stopped: CancellationToken::new(),
        }))
    }
}

struct MemoryWatcher {
    name: String,
    slots: Slots,
    rx: tokio::sync::Mutex<watch::Receiver<Vec<Service>>>,
    initialized: AtomicBool,
    stopped: CancellationToken,
}

impl MemoryWatcher {
    fn take_error(&self) -> Option<RegistryError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get_mut(&self.name)
            .and_then(|slot| slot.pending_errors.pop_front())
    }
}

#[async_trait]
impl Watcher for MemoryWatcher {
    async fn list(&self) -> Result<Vec<Service>, RegistryError> {
        if self.stopped.is_cancelled() {
            return Err(RegistryError::Canceled);
        }
        if let Some(err) = self.take_error() {
            return Err(err);
        }

        let mut rx = self.rx.lock().await;
        if !self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(rx.borrow_and_update().clone());
        }

        tokio::select! {
            _ = self.stopped.cancelled() => return Err(RegistryError::Canceled),
            changed = rx.changed() => changed.map_err(|_| RegistryError::Canceled)?,
        }

        if let Some(err) = self.take_error() {
            return Err(err);
        }
        Ok(rx.borrow_and_update().clone())
    }

    async fn stop(&self) -> Result<(), RegistryError> {
        self.stopped.cancel();
        Ok(())
    }
}
