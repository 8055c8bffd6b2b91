//! Engine runtime
//!
//! Startup sequence:
//! 1. start draining the publish queue into the broker
//! 2. publish `{"state":"online"}` retained on `<name>/state`
//! 3. receive messages until none has been retained for the settle window,
//!    so units see the broker's retained state when they load
//! 4. arm the midnight re-anchor job for sun events
//! 5. hand every further message to the dispatcher until shutdown

use ms_automation::Dispatcher;
use ms_bus::{spawn_pump, BrokerResult, Publisher, SharedBroker};
use ms_config::EngineConfig;
use ms_core::{InboundMessage, OutboundMessage, PublishOptions};
use ms_scheduler::{JobHandle, TimeScheduler};
use ms_solar::SolarScheduler;
use ms_state_store::TopicStateStore;
use ms_unit_host::{AutomationUnit, HostResult, UnitApi, UnitHost};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// The automation engine
pub struct Engine {
    config: EngineConfig,
    broker: SharedBroker,
    dispatcher: Arc<Dispatcher>,
    time: Arc<TimeScheduler>,
    solar: Arc<SolarScheduler>,
    publisher: Publisher,
    outbox: Mutex<Option<mpsc::UnboundedReceiver<OutboundMessage>>>,
    host: UnitHost,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    midnight: Mutex<Option<JobHandle>>,
}

impl Engine {
    /// Create an engine for a configuration and a broker client
    pub fn new(config: EngineConfig, broker: SharedBroker) -> Self {
        let states = Arc::new(TopicStateStore::new());
        let dispatcher = Arc::new(Dispatcher::new(states));
        let time = Arc::new(TimeScheduler::new());
        let solar = Arc::new(SolarScheduler::new(config.latitude, config.longitude));
        let (publisher, outbox) = Publisher::channel();
        let host = UnitHost::new(
            dispatcher.clone(),
            time.clone(),
            solar.clone(),
            publisher.clone(),
        );
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            broker,
            dispatcher,
            time,
            solar,
            publisher,
            outbox: Mutex::new(Some(outbox)),
            host,
            running: AtomicBool::new(false),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            midnight: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn states(&self) -> &Arc<TopicStateStore> {
        self.dispatcher.states()
    }

    pub fn host(&self) -> &UnitHost {
        &self.host
    }

    pub fn solar(&self) -> &Arc<SolarScheduler> {
        &self.solar
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the engine
    ///
    /// Returns once the startup settle window has passed; units loaded after
    /// that see every retained value the broker delivered.
    pub async fn start(&self) -> anyhow::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Engine already running");
            return Ok(());
        }
        info!(name = %self.config.name, url = %self.config.url, "Starting engine");

        if let Some(outbox) = self.outbox.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let pump = spawn_pump(outbox, self.broker.clone());
            self.tasks.lock().unwrap_or_else(|e| e.into_inner()).push(pump);
        }

        self.publish_state("online").await?;

        let mut inbound = self.broker.subscribe();
        self.settle(&mut inbound).await;

        let midnight = self.solar.start_midnight_job()?;
        *self.midnight.lock().unwrap_or_else(|e| e.into_inner()) = Some(midnight);

        let dispatcher = self.dispatcher.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let inbound_loop = tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = inbound.recv() => {
                        match message {
                            Some(message) => {
                                dispatcher.dispatch(message);
                            }
                            None => {
                                error!("Broker message stream closed");
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Inbound loop received shutdown signal");
                        break;
                    }
                }
            }
        });
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(inbound_loop);

        info!("Engine started");
        Ok(())
    }

    /// Dispatch messages until no retained message arrived for `settle_ms`
    async fn settle(&self, inbound: &mut mpsc::UnboundedReceiver<InboundMessage>) {
        let window = Duration::from_millis(self.config.settle_ms);
        let mut deadline = Instant::now() + window;
        let mut retained = 0usize;

        loop {
            match tokio::time::timeout_at(deadline, inbound.recv()).await {
                Ok(Some(message)) => {
                    if message.retain {
                        retained += 1;
                        deadline = Instant::now() + window;
                    }
                    self.dispatcher.dispatch(message);
                }
                Ok(None) => {
                    warn!("Broker message stream closed during startup");
                    break;
                }
                Err(_) => break,
            }
        }
        debug!(retained, "Startup settle window passed");
    }

    /// Load one unit
    pub fn load(&self, unit: &dyn AutomationUnit) -> HostResult<UnitApi> {
        self.host.load(unit)
    }

    /// Load several units, skipping ones that cannot be loaded
    ///
    /// Returns the number of units loaded.
    pub fn load_units(&self, units: &[Box<dyn AutomationUnit>]) -> usize {
        let mut loaded = 0;
        for unit in units {
            match self.host.load(unit.as_ref()) {
                Ok(_) => loaded += 1,
                Err(e) => error!(unit = %unit.name(), error = %e, "Unit not loaded"),
            }
        }
        info!("{} of {} units loaded", loaded, units.len());
        loaded
    }

    /// Stop dispatching, cancel timers and publish the offline state
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping engine");
        let _ = self.shutdown_tx.send(());

        if let Some(midnight) = self.midnight.lock().unwrap_or_else(|e| e.into_inner()).take() {
            midnight.cancel();
        }
        self.time.shutdown();
        self.solar.shutdown();

        // Let queued publishes reach the broker before going offline
        tokio::task::yield_now().await;
        if let Err(e) = self.publish_state("offline").await {
            error!(error = %e, "Failed to publish offline state");
        }

        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for task in tasks {
            task.abort();
        }
        info!("Engine stopped");
    }

    async fn publish_state(&self, state: &str) -> BrokerResult<()> {
        let topic = self.config.state_topic();
        debug!(topic = %topic, state, "Publishing engine state");
        self.broker
            .publish(OutboundMessage {
                topic,
                payload: serde_json::json!({ "state": state }).to_string(),
                options: PublishOptions::retained(),
            })
            .await
    }
}
