use crate::layer::RecordLayer;
use crate::logger::Logger;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the `tracing` bridge.
///
/// **Fields**
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt` layer is
///   installed next to [`RecordLayer`] so events are also printed in the
///   usual human-readable form.
#[derive(Clone, Debug, Default)]
pub struct LayerConfig {
    pub enable_stdout: bool,
}

/// Error returned when the global subscriber cannot be installed.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install [`RecordLayer`] as the global `tracing` subscriber.
///
/// **Parameters**
/// - `logger`: the [`Logger`] that receives every `tracing` event that
///   passes its threshold.
/// - `config`: [`LayerConfig`] controlling additional layers.
///
/// **Returns**
/// - `Err(InitError::AlreadyInstalled)` if another subscriber was set first.
pub fn init_tracing_with_config(logger: Logger, config: LayerConfig) -> Result<(), InitError> {
    let layer = RecordLayer::new(logger);

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Install the bridge with [`LayerConfig::default`].
pub fn init_tracing(logger: Logger) -> Result<(), InitError> {
    init_tracing_with_config(logger, LayerConfig::default())
}
