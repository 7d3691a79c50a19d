//! Earth Engine REST adapter.
//!
//! Computations are sent as serialized expression graphs to
//! `projects/{project}/value:compute`; exports go to
//! `projects/{project}/image:export` and return a long-running operation.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::{DatasetConfig, EarthEngineConfig, ExportConfig, PropertyFilter};
use crate::core::classify::ClassificationTable;
use crate::domain::model::{Acquisition, ExportHandle, Reading, ZoneOfInterest};
use crate::domain::ports::{ArtifactExporter, ImageSource};
use crate::utils::error::{FetcherError, Result};

/// Reducer pixel budget for the regional mean.
const REDUCE_MAX_PIXELS: f64 = 1e9;
/// Pixel budget for GeoTIFF exports, as a decimal string per the REST API.
const EXPORT_MAX_PIXELS: &str = "10000000000000";
const EXPORT_CRS: &str = "EPSG:4326";

#[derive(Debug, Clone)]
pub struct EarthEngineClient {
    http: Client,
    base_url: String,
    project: String,
    access_token: String,
}

impl EarthEngineClient {
    pub fn new(config: &EarthEngineConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| FetcherError::InitializationError {
                message: format!("cannot build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            project: config.project.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/projects/{}/{}", self.base_url, self.project, method)
    }

    async fn post(&self, method: &str, body: &Value) -> Result<Value> {
        let url = self.endpoint(method);
        tracing::debug!(%url, "earth engine request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| FetcherError::TransientSourceError {
                message: format!("request to {} failed: {}", method, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(status_error(status, method, &body_text));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetcherError::MalformedDataError {
                message: format!("invalid JSON from {}: {}", method, e),
            })
    }

    async fn compute(&self, node: Value) -> Result<Value> {
        let body = json!({ "expression": expression(node) });
        let mut response = self.post("value:compute", &body).await?;
        Ok(response
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}

/// 429, 408 and 5xx are worth retrying; anything else means the request itself is wrong.
fn status_error(status: StatusCode, method: &str, body: &str) -> FetcherError {
    let message = format!("{} returned {}: {}", method, status, body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        FetcherError::TransientSourceError { message }
    } else {
        FetcherError::PermanentSourceError { message }
    }
}

fn expression(node: Value) -> Value {
    json!({ "result": "0", "values": { "0": node } })
}

fn constant(value: impl serde::Serialize) -> Value {
    json!({ "constantValue": value })
}

fn invoke(function: &str, arguments: Value) -> Value {
    json!({
        "functionInvocationValue": {
            "functionName": function,
            "arguments": arguments,
        }
    })
}

fn polygon(zone: &ZoneOfInterest) -> Value {
    invoke(
        "GeometryConstructors.Polygon",
        json!({
            "coordinates": constant([zone.ring()]),
            "evenOdd": constant(true),
        }),
    )
}

fn filter(collection: Value, filter: Value) -> Value {
    invoke(
        "Collection.filter",
        json!({ "collection": collection, "filter": filter }),
    )
}

fn date(day: NaiveDate) -> Value {
    invoke("Date", json!({ "value": constant(day.format("%Y-%m-%d").to_string()) }))
}

fn property_filter(f: &PropertyFilter) -> Value {
    match f {
        PropertyFilter::Equals { property, value } => invoke(
            "Filter.equals",
            json!({ "leftField": constant(property), "rightValue": constant(value) }),
        ),
        PropertyFilter::ListContains { property, value } => invoke(
            "Filter.listContains",
            json!({ "leftField": constant(property), "rightValue": constant(value) }),
        ),
    }
}

/// Mean composite of the dataset band over one UTC day, restricted to the zone.
fn daily_image(dataset: &DatasetConfig, day: NaiveDate, zone: &ZoneOfInterest) -> Value {
    let next = day.succ_opt().unwrap_or(day);
    let mut collection = invoke(
        "ImageCollection.load",
        json!({ "id": constant(&dataset.collection) }),
    );
    collection = filter(
        collection,
        invoke(
            "Filter.intersects",
            json!({ "leftField": constant(".all"), "rightValue": polygon(zone) }),
        ),
    );
    collection = filter(
        collection,
        invoke(
            "Filter.dateRangeContains",
            json!({
                "leftValue": invoke("DateRange", json!({ "start": date(day), "end": date(next) })),
                "rightField": constant("system:time_start"),
            }),
        ),
    );
    for f in &dataset.filters {
        collection = filter(collection, property_filter(f));
    }

    // Selecting before reducing keeps an empty day a zero-band image instead of an error.
    collection = invoke(
        "ImageCollection.select",
        json!({ "input": collection, "selectors": constant([&dataset.band]) }),
    );
    invoke("reduce.mean", json!({ "collection": collection }))
}

/// Regional mean of the configured band, classified into a moisture class.
#[derive(Debug, Clone)]
pub struct EarthEngineSource {
    client: EarthEngineClient,
    dataset: DatasetConfig,
    classification: ClassificationTable,
}

impl EarthEngineSource {
    pub fn new(
        client: EarthEngineClient,
        dataset: DatasetConfig,
        classification: ClassificationTable,
    ) -> Self {
        Self {
            client,
            dataset,
            classification,
        }
    }
}

#[async_trait]
impl ImageSource for EarthEngineSource {
    async fn verify(&self, zone: &ZoneOfInterest) -> Result<()> {
        let area = self
            .client
            .compute(invoke(
                "Geometry.area",
                json!({ "geometry": polygon(zone), "maxError": constant(1) }),
            ))
            .await?;

        let area_m2 = area.as_f64().ok_or_else(|| FetcherError::PermanentSourceError {
            message: format!("zone area came back as {}", area),
        })?;
        if area_m2 <= 0.0 {
            return Err(FetcherError::PermanentSourceError {
                message: format!("zone {} has no area", zone.name()),
            });
        }

        tracing::info!(zone = zone.name(), area_km2 = area_m2 / 1e6, "zone verified");
        Ok(())
    }

    async fn query(&self, date: NaiveDate, zone: &ZoneOfInterest) -> Result<Acquisition> {
        let node = invoke(
            "Image.reduceRegion",
            json!({
                "image": daily_image(&self.dataset, date, zone),
                "reducer": invoke("Reducer.mean", json!({})),
                "geometry": polygon(zone),
                "scale": constant(self.dataset.scale),
                "maxPixels": constant(REDUCE_MAX_PIXELS),
            }),
        );

        let result = self.client.compute(node).await?;
        // An empty collection reduces to a dictionary without the band.
        match result.get(&self.dataset.band).and_then(Value::as_f64) {
            Some(value) => Ok(Acquisition::Reading(Reading {
                value,
                label: self.classification.classify(value).to_string(),
            })),
            None => {
                tracing::debug!(%date, band = %self.dataset.band, "no imagery for date");
                Ok(Acquisition::NoData)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
}

/// Starts GeoTIFF exports of the day's composite, clipped to the zone.
#[derive(Debug, Clone)]
pub struct EarthEngineExporter {
    client: EarthEngineClient,
    dataset: DatasetConfig,
    export: ExportConfig,
}

impl EarthEngineExporter {
    pub fn new(client: EarthEngineClient, dataset: DatasetConfig, export: ExportConfig) -> Self {
        Self {
            client,
            dataset,
            export,
        }
    }

    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}_{}", self.export.file_prefix, date.format("%Y-%m-%d"))
    }
}

#[async_trait]
impl ArtifactExporter for EarthEngineExporter {
    async fn export_async(&self, date: NaiveDate, zone: &ZoneOfInterest) -> Result<ExportHandle> {
        let file_name = self.file_name(date);
        // A mean composite has no projection of its own; pin it to the dataset scale.
        let reprojected = invoke(
            "Image.reproject",
            json!({
                "image": daily_image(&self.dataset, date, zone),
                "crs": invoke("Projection", json!({ "crs": constant(EXPORT_CRS) })),
                "scale": constant(self.dataset.scale),
            }),
        );
        let clipped = invoke(
            "Image.clip",
            json!({ "input": reprojected, "geometry": polygon(zone) }),
        );
        let body = json!({
            "expression": expression(clipped),
            "description": file_name,
            "fileExportOptions": {
                "fileFormat": "GEO_TIFF",
                "driveDestination": {
                    "folder": self.export.folder,
                    "filenamePrefix": file_name,
                },
            },
            "maxPixels": EXPORT_MAX_PIXELS,
            "requestId": format!("{}-{}", zone.name(), file_name),
        });

        let response = self
            .client
            .post("image:export", &body)
            .await
            .map_err(|e| FetcherError::ExportError {
                message: e.to_string(),
            })?;
        let operation: Operation =
            serde_json::from_value(response).map_err(|e| FetcherError::ExportError {
                message: format!("unexpected export response: {}", e),
            })?;

        Ok(ExportHandle {
            operation: operation.name,
        })
    }
}

/// Used when raster export is switched off.
#[derive(Debug, Clone, Default)]
pub struct DisabledExporter;

#[async_trait]
impl ArtifactExporter for DisabledExporter {
    async fn export_async(&self, date: NaiveDate, _zone: &ZoneOfInterest) -> Result<ExportHandle> {
        tracing::debug!(%date, "export disabled");
        Ok(ExportHandle {
            operation: "disabled".to_string(),
        })
    }
}

/// Either exporter, picked from configuration at start-up.
#[derive(Debug, Clone)]
pub enum Exporter {
    EarthEngine(EarthEngineExporter),
    Disabled(DisabledExporter),
}

#[async_trait]
impl ArtifactExporter for Exporter {
    async fn export_async(&self, date: NaiveDate, zone: &ZoneOfInterest) -> Result<ExportHandle> {
        match self {
            Exporter::EarthEngine(e) => e.export_async(date, zone).await,
            Exporter::Disabled(e) => e.export_async(date, zone).await,
        }
    }
}
