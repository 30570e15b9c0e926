// Device endpoints
//
// Device descriptor lookup and model-info (field catalog) resolution.
// Both can fail with `NotAuthenticated` when the access token has gone
// stale; callers recover with refresh + retry.

use tracing::debug;

use crate::client::ThinqClient;
use crate::error::Error;
use crate::models::{DeviceDescriptor, ModelCatalog, ModelInfoDocument};

impl ThinqClient {
    /// Fetch the descriptor for a single device.
    ///
    /// `GET /v1/devices/{device_id}`
    pub async fn get_device(&self, device_id: &str) -> Result<DeviceDescriptor, Error> {
        let url = self.api_url(&format!("devices/{device_id}"))?;
        debug!(device_id, "fetching device descriptor");
        self.get(url).await
    }

    /// Resolve the field catalog for a device's model.
    ///
    /// `GET /v1/devices/{device_id}/model`
    ///
    /// The model-info document's `Value` section is parsed into a
    /// [`ModelCatalog`]; descriptor kinds the pipeline does not interpret
    /// are dropped.
    pub async fn model_info(&self, device: &DeviceDescriptor) -> Result<ModelCatalog, Error> {
        let url = self.api_url(&format!("devices/{}/model", device.device_id))?;
        debug!(device_id = %device.device_id, model_id = %device.model_id, "fetching model info");
        let doc: ModelInfoDocument = self.get(url).await?;
        Ok(ModelCatalog::from(doc))
    }
}
