//! CLI command implementations.

pub mod block;
pub mod evidence;
pub mod init;
pub mod portfolio;
pub mod student;
pub mod verify;

use anyhow::Result;

use crate::application::Engine;
use crate::domain::models::Config;

/// Open the engine with its reactor running. Callers shut it down so
/// queued reactions (rating recalculation) land before the process exits.
pub(crate) async fn open_engine(config: &Config) -> Result<Engine> {
    let engine = Engine::open(config).await?;
    engine.start().await;
    Ok(engine)
}
