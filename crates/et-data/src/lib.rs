pub mod balance;
pub mod loaders;
pub mod scaler;
pub mod split;

pub use balance::*;
pub use loaders::*;
pub use scaler::*;
pub use split::*;

use et_types::{DataSettings, EventClass, EventTable, TuneResult};

/// Signal and background tables as read from disk.
#[derive(Debug, Clone)]
pub struct RawSamples {
    pub signal: EventTable,
    pub background: EventTable,
}

/// Data manager coordinates loading of the two event classes
#[derive(Debug, Clone)]
pub struct DataManager {
    settings: DataSettings,
    loader: EventLoader,
}

impl DataManager {
    pub fn new(settings: DataSettings) -> Self {
        let loader = EventLoader::new(settings.features.clone(), settings.weight_column.clone());
        Self { settings, loader }
    }

    /// Read both input files concurrently.
    pub async fn load_samples(&self) -> TuneResult<RawSamples> {
        tracing::info!(
            "Loading signal from {} and background from {}",
            self.settings.signal_path.display(),
            self.settings.background_path.display()
        );

        let (signal, background) = tokio::try_join!(
            self.loader.load(&self.settings.signal_path, EventClass::Signal),
            self.loader.load(&self.settings.background_path, EventClass::Background),
        )?;

        Ok(RawSamples { signal, background })
    }
}
