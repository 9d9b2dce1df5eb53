//! Scan pipeline: OCR, normalize, store images, reconcile.

use crate::images::{extension_of, strip_data_url, ImageStore, BASE64_IMAGE_EXT};
use crate::ocr::{OcrProvider, OcrRequest};
use base64::prelude::*;
use labelscan_core::{CanonicalField, CanonicalFieldMap, Error, HardwareRecord, NaturalKey, Result};
use labelscan_matching::{Normalizer, SenderContext};
use labelscan_storage::InventoryManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_IMAGE_TYPE: &str = "hard";

/// Base64 scan submitted by a webservice client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub inventory_id: String,
    #[serde(default, rename = "type")]
    pub image_type: String,
    #[serde(default)]
    pub sender: Option<String>,
}

/// An uploaded image file
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Reconciled record as returned to clients, image names resolved to URLs
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    #[serde(flatten)]
    pub record: HardwareRecord,
    pub created: bool,
}

/// PSID read off a single label by the reader flow
#[derive(Debug, Clone, Serialize)]
pub struct PsidReading {
    pub psid: Option<String>,
    pub image: Option<String>,
}

pub struct ScanService {
    ocr: Arc<dyn OcrProvider>,
    normalizer: Normalizer,
    inventory: InventoryManager,
    images: Arc<ImageStore>,
}

impl ScanService {
    pub fn new(
        ocr: Arc<dyn OcrProvider>,
        normalizer: Normalizer,
        inventory: InventoryManager,
        images: Arc<ImageStore>,
    ) -> Self {
        Self {
            ocr,
            normalizer,
            inventory,
            images,
        }
    }

    pub fn ocr(&self) -> &Arc<dyn OcrProvider> {
        &self.ocr
    }

    pub fn images(&self) -> &Arc<ImageStore> {
        &self.images
    }

    async fn recognize(
        &self,
        images: Vec<String>,
        image_type: &str,
        inventory_id: &str,
        sender: SenderContext,
    ) -> Result<CanonicalFieldMap> {
        if images.is_empty() {
            return Err(Error::InvalidInput("No images provided".to_string()));
        }
        let request = OcrRequest {
            images,
            image_type: image_type.to_string(),
            inventory_id: inventory_id.to_string(),
        };
        let response = self.ocr.scan(&request).await?;
        Ok(self.normalizer.normalize(&response.data, sender).await)
    }

    /// Scan base64 images and upsert the resulting record
    pub async fn scan_base64(&self, request: ScanRequest) -> Result<ScanOutcome> {
        // reject undecodable payloads before spending an OCR call
        let decoded = ImageStore::decode_all(&request.images)?;

        let image_type = non_empty_or_default(&request.image_type);
        let sender = SenderContext::from_sender(request.sender.as_deref());
        let payloads: Vec<String> = request
            .images
            .iter()
            .map(|i| strip_data_url(i).to_string())
            .collect();

        let fields = self
            .recognize(payloads, image_type, &request.inventory_id, sender)
            .await?;
        let images: Vec<(&[u8], &str)> = decoded
            .iter()
            .map(|data| (data.as_slice(), BASE64_IMAGE_EXT))
            .collect();
        self.reconcile(&fields, &images, &request.inventory_id).await
    }

    /// Scan uploaded files and upsert the resulting record
    pub async fn scan_files(
        &self,
        files: &[UploadedImage],
        image_type: &str,
        inventory_id: &str,
        sender: SenderContext,
    ) -> Result<ScanOutcome> {
        let fields = self
            .recognize(encode(files), non_empty_or_default(image_type), inventory_id, sender)
            .await?;

        let extensions: Vec<String> = files.iter().map(|f| extension_of(&f.filename)).collect();
        let images: Vec<(&[u8], &str)> = files
            .iter()
            .zip(&extensions)
            .map(|(file, ext)| (file.data.as_slice(), ext.as_str()))
            .collect();
        self.reconcile(&fields, &images, inventory_id).await
    }

    /// OCR and normalize without persisting anything
    pub async fn scan_only(
        &self,
        files: &[UploadedImage],
        image_type: &str,
        sender: SenderContext,
    ) -> Result<CanonicalFieldMap> {
        if image_type.trim().is_empty() {
            return Err(Error::InvalidInput("Image type is required".to_string()));
        }
        self.recognize(encode(files), image_type, "", sender).await
    }

    /// Read the PSID off one label photo. The photo is kept only when a PSID
    /// was found.
    pub async fn read_psid(&self, file: &UploadedImage) -> Result<PsidReading> {
        let fields = self
            .recognize(
                encode(std::slice::from_ref(file)),
                DEFAULT_IMAGE_TYPE,
                "",
                SenderContext::Other,
            )
            .await?;

        let psid = match fields.get(CanonicalField::Psid) {
            Some(psid) => psid.to_string(),
            None => {
                return Ok(PsidReading {
                    psid: None,
                    image: None,
                })
            }
        };
        let image = self.images.save(&file.data, &extension_of(&file.filename)).await?;
        Ok(PsidReading {
            psid: Some(psid),
            image: Some(image),
        })
    }

    /// Images are written only when the scan creates a record
    async fn reconcile(
        &self,
        fields: &CanonicalFieldMap,
        images: &[(&[u8], &str)],
        inventory_id: &str,
    ) -> Result<ScanOutcome> {
        let key = NaturalKey::new(
            fields.get_or_empty(CanonicalField::SerialNumber),
            fields.get_or_empty(CanonicalField::Psid),
        );
        match self.inventory.find(&key) {
            Ok(existing) => {
                return Ok(ScanOutcome {
                    record: self.present(existing),
                    created: false,
                })
            }
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let names = self.images.save_all(images).await?;
        let reconciled = match self.inventory.reconcile(fields, names.clone(), inventory_id) {
            Ok(reconciled) => reconciled,
            Err(e) => {
                self.images.remove_all(&names).await;
                return Err(e);
            }
        };

        let created = reconciled.is_created();
        if created {
            info!("Scan created record {}", reconciled.record().id);
        } else {
            // a concurrent scan created the record first
            self.images.remove_all(&names).await;
        }
        Ok(ScanOutcome {
            record: self.present(reconciled.into_record()),
            created,
        })
    }

    /// Record with its image names replaced by public URLs
    pub fn present(&self, mut record: HardwareRecord) -> HardwareRecord {
        record.images = self.images.urls(&record.images);
        record
    }
}

fn non_empty_or_default(image_type: &str) -> &str {
    if image_type.trim().is_empty() {
        DEFAULT_IMAGE_TYPE
    } else {
        image_type
    }
}

fn encode(files: &[UploadedImage]) -> Vec<String> {
    files.iter().map(|f| BASE64_STANDARD.encode(&f.data)).collect()
}
