use std::sync::Arc;

use scheduling_engine::{
    BookingCoordinator, InMemorySlotStore, LogAuditRecorder, LogNotificationDispatcher,
    NoShowSweeper, SlotStore, SweeperConfig,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct SchedulerServer {
    /// Server configuration
    pub config: ServerConfig,
    /// Slot and appointment storage
    pub store: Arc<dyn SlotStore>,
    /// Booking orchestration
    pub coordinator: Arc<BookingCoordinator>,
    /// No-show sweep (also triggerable over HTTP)
    pub sweeper: Arc<NoShowSweeper>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name
    pub name: String,
    /// No-show sweep settings
    pub sweeper: SweeperConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "ClinicFlow Scheduling Engine".to_string(),
            sweeper: SweeperConfig::default(),
        }
    }
}

impl SchedulerServer {
    /// Wire up the engine with in-memory storage and the logging
    /// collaborator defaults.
    pub fn new(config: ServerConfig) -> Self {
        let store: Arc<dyn SlotStore> = Arc::new(InMemorySlotStore::new());
        let notifier = Arc::new(LogNotificationDispatcher);
        let audit = Arc::new(LogAuditRecorder);

        let coordinator = Arc::new(BookingCoordinator::new(
            Arc::clone(&store),
            notifier.clone(),
            audit.clone(),
        ));
        let sweeper = Arc::new(NoShowSweeper::new(
            Arc::clone(&store),
            notifier,
            audit,
            config.sweeper.clone(),
        ));

        Self {
            config,
            store,
            coordinator,
            sweeper,
        }
    }
}
