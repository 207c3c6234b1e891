use crate::device::{ATTR_MIXER_COUNT, ATTR_MIXERS, Device, DeviceCommand};
use crate::product::{ConnectedModules, ProductInfo, ProductType};
use crate::snapshot::Snapshot;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

pub const MANUFACTURER: &str = "Plum Sp. z o.o.";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not read the device snapshot at {1:?}")]
    ReadSnapshot(#[source] std::io::Error, PathBuf),
    #[error("could not parse the device snapshot at {1:?}")]
    ParseSnapshot(#[source] serde_json::Error, PathBuf),
}

#[derive(clap::Parser, Clone)]
#[group(id = "connection::Args")]
pub struct Args {
    /// JSON snapshot of the controller: product information, connected modules and the values
    /// of the controller and its mixers.
    #[arg(long, short = 's')]
    pub snapshot: PathBuf,

    /// Name used to prefix entity names with. Defaults to the name stored in the snapshot.
    #[arg(long)]
    pub name: Option<String>,

    /// How long to wait for the controller to report its mixers before giving up on mixer
    /// entities.
    #[arg(long, default_value = "10s")]
    pub mixer_timeout: humantime::Duration,
}

impl Args {
    /// Load the snapshot and build a connection around it.
    ///
    /// The receiver gets every write issued through the device or any of its mixers.
    pub async fn connect(
        &self,
    ) -> Result<(Arc<EcomaxConnection>, UnboundedReceiver<DeviceCommand>), Error> {
        let bytes = tokio::fs::read(&self.snapshot)
            .await
            .map_err(|e| Error::ReadSnapshot(e, self.snapshot.clone()))?;
        let snapshot = serde_json::from_slice::<Snapshot>(&bytes)
            .map_err(|e| Error::ParseSnapshot(e, self.snapshot.clone()))?;
        let (connection, commands) = snapshot.into_connection(*self.mixer_timeout);
        let connection = match &self.name {
            None => connection,
            Some(name) => connection.renamed(name.clone()),
        };
        info!(
            name = connection.name(),
            product = %connection.product_type(),
            model = connection.model(),
            "connected"
        );
        Ok((Arc::new(connection), commands))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub identifiers: Vec<String>,
    pub manufacturer: &'static str,
    pub model: String,
    pub sw_version: Option<String>,
}

/// The shared handle through which entities reach the controller.
pub struct EcomaxConnection {
    name: String,
    device: Arc<Device>,
    product: ProductInfo,
    modules: ConnectedModules,
    capabilities: BTreeSet<String>,
    mixer_timeout: Duration,
    /// Mixers that entities were already created for.
    covered_mixers: Mutex<BTreeSet<u8>>,
}

impl EcomaxConnection {
    /// The capabilities are the attributes the device has reported by the time of this call.
    pub fn new(
        name: String,
        device: Arc<Device>,
        product: ProductInfo,
        modules: ConnectedModules,
        mixer_timeout: Duration,
    ) -> Self {
        let capabilities = device.data().into_keys().collect::<BTreeSet<_>>();
        debug!(count = capabilities.len(), "collected device capabilities");
        Self {
            name,
            device,
            product,
            modules,
            capabilities,
            mixer_timeout,
            covered_mixers: Default::default(),
        }
    }

    fn renamed(self, name: String) -> Self {
        Self { name, ..self }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn product(&self) -> &ProductInfo {
        &self.product
    }

    pub fn product_type(&self) -> ProductType {
        self.product.product_type
    }

    pub fn uid(&self) -> &str {
        &self.product.uid
    }

    pub fn model(&self) -> &str {
        &self.product.model
    }

    pub fn modules(&self) -> &ConnectedModules {
        &self.modules
    }

    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    /// Whether the controller supports mixers, regardless of whether they were reported yet.
    pub fn has_mixers(&self) -> bool {
        self.capabilities.contains(ATTR_MIXER_COUNT) || self.capabilities.contains(ATTR_MIXERS)
    }

    /// Wait for the controller to report its mixers.
    ///
    /// Returns `false` if they did not show up in time, in which case no mixer entities should
    /// be created.
    pub async fn setup_mixers(&self) -> bool {
        match self.device.get(ATTR_MIXERS, self.mixer_timeout).await {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    message = "mixers were not reported by the controller",
                    error = (&e as &dyn std::error::Error)
                );
                false
            }
        }
    }

    /// Record that entities exist for the mixers at `indexes`. Returns the indexes that were not
    /// covered before.
    pub fn cover_mixers(&self, indexes: impl IntoIterator<Item = u8>) -> Vec<u8> {
        let mut covered = self.covered_mixers.lock().unwrap_or_else(|e| e.into_inner());
        indexes.into_iter().filter(|index| covered.insert(*index)).collect()
    }

    /// Re-run mixer discovery and return the mixers no entities were created for yet.
    ///
    /// The returned mixers are marked as covered.
    pub async fn detect_sub_devices(&self) -> Vec<u8> {
        if !self.setup_mixers().await {
            return Vec::new();
        }
        let found = self.cover_mixers(self.device.mixers().into_iter().map(|(index, _)| index));
        info!(count = found.len(), mixers = ?found, "detected new sub-devices");
        found
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: self.name.clone(),
            identifiers: vec![self.product.uid.clone()],
            manufacturer: MANUFACTURER,
            model: self.product.model.clone(),
            sw_version: self.product.software.clone(),
        }
    }
}
