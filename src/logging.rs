use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::error::StartupError;

/// Initialize the logging system. Events go to stderr, tagged with the thread
/// that emitted them so UI and worker activity can be told apart.
pub fn init_logging(level: Level) -> Result<(), StartupError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_thread_names(true)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
