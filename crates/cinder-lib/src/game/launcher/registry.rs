/// Process registry for tracking running game instances
use crate::game::launcher::error::LaunchError;
use crate::game::launcher::types::GameInstance;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, System};
use tokio::sync::RwLock;

/// In-memory registry of running instances. At most one live process per
/// instance id; callers share a registry by cloning it.
#[derive(Clone)]
pub struct ProcessRegistry {
    /// Map of instance_id -> GameInstance
    instances: Arc<RwLock<HashMap<String, GameInstance>>>,

    /// System info for PID checking
    system: Arc<RwLock<System>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self {
            instances: Arc::new(RwLock::new(HashMap::new())),
            system: Arc::new(RwLock::new(System::new_all())),
        }
    }

    /// Create the registry and start the background exit monitor
    pub fn with_monitoring() -> Self {
        let registry = Self::new();
        registry.start_monitoring();
        registry
    }

    /// Register a running instance. Fails when the instance already has a
    /// live process; the check and insert are one atomic operation under
    /// the write lock.
    pub async fn register(&self, instance: GameInstance) -> Result<(), LaunchError> {
        let mut instances = self.instances.write().await;
        if instances.contains_key(&instance.instance_id) {
            return Err(LaunchError::AlreadyRunning {
                instance_id: instance.instance_id,
            });
        }

        log::info!(
            "Registering instance: {} (PID {})",
            instance.instance_id,
            instance.pid
        );
        instances.insert(instance.instance_id.clone(), instance);
        Ok(())
    }

    /// Unregister an instance
    pub async fn unregister(&self, instance_id: &str) {
        log::info!("Unregistering instance: {}", instance_id);
        let mut instances = self.instances.write().await;
        instances.remove(instance_id);
    }

    /// Get all running instances
    pub async fn get_all(&self) -> Vec<GameInstance> {
        let instances = self.instances.read().await;
        instances.values().cloned().collect()
    }

    /// Get a specific instance
    pub async fn get(&self, instance_id: &str) -> Option<GameInstance> {
        let instances = self.instances.read().await;
        instances.get(instance_id).cloned()
    }

    /// Check if an instance is running
    pub async fn is_running(&self, instance_id: &str) -> bool {
        let instances = self.instances.read().await;
        instances.contains_key(instance_id)
    }

    /// Kill a running instance's process and drop it from the registry.
    /// Returns true when a process was found and signalled.
    pub async fn kill(&self, instance_id: &str) -> Result<bool> {
        let instance = {
            let instances = self.instances.read().await;
            instances.get(instance_id).cloned()
        };

        let Some(instance) = instance else {
            return Ok(false);
        };

        let killed = {
            let mut sys = self.system.write().await;
            sys.refresh_all();
            match sys.process(Pid::from_u32(instance.pid)) {
                Some(process) => process.kill(),
                None => false,
            }
        };

        if killed {
            log::info!("Killed instance {} (PID {})", instance_id, instance.pid);
        } else {
            log::warn!(
                "Instance {} (PID {}) was not killable; it may have already exited",
                instance_id,
                instance.pid
            );
        }

        self.unregister(instance_id).await;
        Ok(killed)
    }

    /// Start background monitoring: dead PIDs are reaped every 5 seconds
    fn start_monitoring(&self) {
        let instances = self.instances.clone();
        let system = self.system.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));

            loop {
                interval.tick().await;

                let mut sys = system.write().await;
                sys.refresh_all();

                let mut instances_lock = instances.write().await;
                let mut to_remove = Vec::new();

                for (id, instance) in instances_lock.iter() {
                    if sys.process(Pid::from_u32(instance.pid)).is_none() {
                        log::info!("Instance {} (PID {}) has exited", id, instance.pid);
                        to_remove.push(id.clone());
                    }
                }

                for id in to_remove {
                    instances_lock.remove(&id);
                }
            }
        });
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}
