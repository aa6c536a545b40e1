//! Single owner task for the arena.
//!
//! The service task is the only place the world is touched. Ticks and requests
//! are taken one at a time from a `select!` loop, and each runs to completion,
//! backend calls included, before the next one starts.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, warn};

use crate::{
    arena::Arena,
    backend::Backend,
    config::ArenaConfig,
    error::ArenaError,
    handler::ItemResponse,
    telemetry::Telemetry,
    world::World,
};

const COMMAND_CAPACITY: usize = 64;

#[derive(Debug)]
enum ArenaCommand {
    PickUp {
        robot_id: String,
        reply: oneshot::Sender<ItemResponse>,
    },
    Offload {
        robot_id: String,
        reply: oneshot::Sender<Result<ItemResponse, ArenaError>>,
    },
    Snapshot {
        reply: oneshot::Sender<World>,
    },
    Shutdown,
}

/// Represents the task that owns an [`Arena`] and serves its requests and ticks.
pub struct ArenaService {
    arena: Arena,
    commands: mpsc::Receiver<ArenaCommand>,
    telemetry: watch::Sender<Telemetry>,
    tick_period: Duration,
}

impl ArenaService {
    /// Builds a fresh arena from `config` together with a handle to it.
    pub fn new(config: &ArenaConfig, backend: Arc<dyn Backend>) -> (Self, ArenaHandle) {
        Self::from_arena(Arena::new(config, backend), config.tick_period())
    }

    /// Wraps an already prepared arena.
    pub fn from_arena(arena: Arena, tick_period: Duration) -> (Self, ArenaHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (telemetry_tx, telemetry_rx) = watch::channel(Telemetry::from_world(arena.world()));
        let service = ArenaService {
            arena,
            commands: command_rx,
            telemetry: telemetry_tx,
            tick_period,
        };
        let handle = ArenaHandle {
            commands: command_tx,
            telemetry: telemetry_rx,
        };
        (service, handle)
    }

    /// Runs the service on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<Result<(), ArenaError>> {
        tokio::spawn(self.run())
    }

    /// Runs until shut down or every handle is dropped.
    ///
    /// Only a failed seeding ends the loop with an error.
    pub async fn run(mut self) -> Result<(), ArenaError> {
        let mut ticker = tokio::time::interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period = ?self.tick_period, "arena service started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(ArenaCommand::Shutdown) => break,
                    Some(command) => self.handle(command).await,
                },
                _ = ticker.tick() => self.tick().await?,
            }
        }

        info!("arena service stopped");
        Ok(())
    }

    async fn handle(&mut self, command: ArenaCommand) {
        match command {
            ArenaCommand::PickUp { robot_id, reply } => {
                let response = self.arena.pick_up_item(&robot_id);
                let _ = reply.send(response);
            }
            ArenaCommand::Offload { robot_id, reply } => {
                let response = self.arena.offload_item(&robot_id).await;
                if let Err(error) = &response {
                    warn!(%robot_id, %error, "offload failed");
                }
                let _ = reply.send(response);
            }
            ArenaCommand::Snapshot { reply } => {
                let _ = reply.send(self.arena.world().clone());
            }
            ArenaCommand::Shutdown => {}
        }
    }

    async fn tick(&mut self) -> Result<(), ArenaError> {
        match self.arena.tick().await {
            Ok(telemetry) => {
                debug!(total_value = telemetry.log.total_value, "tick");
                self.telemetry.send_replace(telemetry);
                Ok(())
            }
            Err(ArenaError::Placement(placement)) => {
                error!(%placement, "arena seeding failed");
                Err(placement.into())
            }
            Err(error) => {
                warn!(%error, "tick skipped");
                Ok(())
            }
        }
    }
}

/// Cloneable client of a running [`ArenaService`].
#[derive(Clone)]
pub struct ArenaHandle {
    commands: mpsc::Sender<ArenaCommand>,
    telemetry: watch::Receiver<Telemetry>,
}

impl ArenaHandle {
    /// Asks the arena to hand `robot_id` an item within reach.
    pub async fn pick_up_item(&self, robot_id: &str) -> Result<ItemResponse, ArenaError> {
        let (reply, response) = oneshot::channel();
        self.send(ArenaCommand::PickUp {
            robot_id: robot_id.to_string(),
            reply,
        })
        .await?;
        response.await.map_err(|_| ArenaError::ServiceClosed)
    }

    /// Asks the arena to release the item `robot_id` carries.
    pub async fn offload_item(&self, robot_id: &str) -> Result<ItemResponse, ArenaError> {
        let (reply, response) = oneshot::channel();
        self.send(ArenaCommand::Offload {
            robot_id: robot_id.to_string(),
            reply,
        })
        .await?;
        response.await.map_err(|_| ArenaError::ServiceClosed)?
    }

    /// Copy of the world as of the last completed operation.
    pub async fn world(&self) -> Result<World, ArenaError> {
        let (reply, response) = oneshot::channel();
        self.send(ArenaCommand::Snapshot { reply }).await?;
        response.await.map_err(|_| ArenaError::ServiceClosed)
    }

    /// Latest published telemetry; `changed()` fires once per tick.
    pub fn telemetry(&self) -> watch::Receiver<Telemetry> {
        self.telemetry.clone()
    }

    /// Stops the service once the commands sent before it are handled.
    pub async fn shutdown(&self) -> Result<(), ArenaError> {
        self.send(ArenaCommand::Shutdown).await
    }

    async fn send(&self, command: ArenaCommand) -> Result<(), ArenaError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ArenaError::ServiceClosed)
    }
}
