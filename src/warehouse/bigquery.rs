//! BigQuery REST (v2) implementation of [`Warehouse`].
//!
//! All calls are blocking. Loads use a multipart upload of newline-delimited JSON, and
//! [`BigQueryClient::await_job`] polls the job until it reports `DONE`.

use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ClientSettings, WarehouseLocation};
use crate::ingestion::infer::format_timestamp;
use crate::schema::TableSchema;
use crate::types::{DataSet, Value};

use super::{
    DatasetInfo, JobHandle, JobOutcome, Lookup, TableInfo, Warehouse, WarehouseError, WarehouseResult,
    WriteDisposition,
};

/// Public BigQuery API root.
pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com";

const MULTIPART_BOUNDARY: &str = "sheetload_part_boundary_5e2c9a41";

/// Blocking BigQuery client.
pub struct BigQueryClient {
    http: Client,
    endpoint: String,
    token: String,
    poll_interval: Duration,
    request_timeout: Duration,
}

impl std::fmt::Debug for BigQueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryClient")
            .field("endpoint", &self.endpoint)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl BigQueryClient {
    /// Create a client from settings.
    ///
    /// Without an explicit access token, one is requested from
    /// `gcloud auth application-default print-access-token`.
    pub fn new(settings: &ClientSettings) -> WarehouseResult<Self> {
        let token = match settings.access_token.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => token_from_gcloud()?,
        };
        let http = Client::builder().timeout(settings.request_timeout).build()?;

        Ok(Self {
            http,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            token,
            poll_interval: settings.poll_interval,
            request_timeout: settings.request_timeout,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/bigquery/v2/{path}", self.endpoint)
    }

    fn upload_url(&self, path: &str) -> String {
        format!("{}/upload/bigquery/v2/{path}", self.endpoint)
    }

    fn lookup<T: DeserializeOwned>(&self, url: &str) -> Lookup<T> {
        debug!(%url, "GET");
        let response = match self.http.get(url).bearer_auth(&self.token).send() {
            Ok(r) => r,
            Err(e) => return Lookup::Error(e.into()),
        };
        let status = response.status();
        match response.text() {
            Ok(body) => lookup_from_response(status, &body),
            Err(e) => Lookup::Error(e.into()),
        }
    }

    fn post_json<B: Serialize>(&self, url: &str, body: &B) -> WarehouseResult<Response> {
        debug!(%url, "POST");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()?;
        check_status(response)
    }

    fn get_job(&self, job: &JobHandle, budget: Duration) -> WarehouseResult<JobResource> {
        let url = self.api_url(&format!("projects/{}/jobs/{}", job.project, job.job_id));
        debug!(%url, ?budget, "GET");
        let mut req = self.http.get(&url).bearer_auth(&self.token).timeout(budget);
        if let Some(location) = &job.location {
            req = req.query(&[("location", location.as_str())]);
        }
        let response = check_status(req.send()?)?;
        Ok(response.json()?)
    }
}

impl Warehouse for BigQueryClient {
    fn get_dataset(&self, location: &WarehouseLocation) -> Lookup<DatasetInfo> {
        let url = self.api_url(&format!(
            "projects/{}/datasets/{}",
            location.project(),
            location.dataset()
        ));
        match self.lookup::<DatasetResource>(&url) {
            Lookup::Found(ds) => Lookup::Found(DatasetInfo {
                id: ds.id.unwrap_or_else(|| location.dataset_path()),
                location: ds.location,
            }),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Error(e) => Lookup::Error(e),
        }
    }

    fn create_dataset(&self, location: &WarehouseLocation, region: &str) -> WarehouseResult<()> {
        let url = self.api_url(&format!("projects/{}/datasets", location.project()));
        let body = NewDataset {
            dataset_reference: DatasetReference::of(location),
            location: region.to_string(),
        };
        self.post_json(&url, &body)?;
        Ok(())
    }

    fn get_table(&self, location: &WarehouseLocation) -> Lookup<TableInfo> {
        let url = self.api_url(&format!(
            "projects/{}/datasets/{}/tables/{}",
            location.project(),
            location.dataset(),
            location.table()
        ));
        match self.lookup::<TableResource>(&url) {
            Lookup::Found(t) => Lookup::Found(TableInfo {
                id: t.id.unwrap_or_else(|| location.table_path()),
                num_rows: t.num_rows.and_then(|n| n.parse().ok()),
            }),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Error(e) => Lookup::Error(e),
        }
    }

    fn create_table(&self, location: &WarehouseLocation, schema: &TableSchema) -> WarehouseResult<()> {
        let url = self.api_url(&format!(
            "projects/{}/datasets/{}/tables",
            location.project(),
            location.dataset()
        ));
        self.post_json(&url, &new_table(location, schema))?;
        Ok(())
    }

    fn submit_load(
        &self,
        location: &WarehouseLocation,
        data: &DataSet,
        disposition: WriteDisposition,
    ) -> WarehouseResult<JobHandle> {
        let url = self.upload_url(&format!("projects/{}/jobs", location.project()));
        let metadata = serde_json::to_vec(&load_job_request(location, disposition))?;
        let payload = encode_rows(data)?;
        let body = multipart_related(&metadata, &payload);

        debug!(%url, rows = data.row_count(), bytes = body.len(), "POST load job");
        let response = self
            .http
            .post(&url)
            .query(&[("uploadType", "multipart")])
            .bearer_auth(&self.token)
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(body)
            .send()?;
        let job: JobResource = check_status(response)?.json()?;

        // A job can be rejected synchronously; surface that before polling.
        job_outcome(&job)?;
        Ok(JobHandle {
            project: job
                .job_reference
                .project_id
                .unwrap_or_else(|| location.project().to_string()),
            job_id: job.job_reference.job_id,
            location: job.job_reference.location,
        })
    }

    fn await_job(&self, job: &JobHandle, timeout: Option<Duration>) -> WarehouseResult<JobOutcome> {
        let started = Instant::now();
        let timed_out = |waited: Duration| WarehouseError::JobTimedOut {
            job_id: job.job_id.clone(),
            waited,
        };

        loop {
            let budget = request_budget(started.elapsed(), timeout, self.request_timeout);
            let resource = match self.get_job(job, budget) {
                Ok(resource) => resource,
                Err(WarehouseError::Transport(e))
                    if e.is_timeout() && deadline_passed(started.elapsed(), timeout) =>
                {
                    return Err(timed_out(started.elapsed()));
                }
                Err(e) => return Err(e),
            };
            if let Some(outcome) = job_outcome(&resource)? {
                return Ok(outcome);
            }

            let elapsed = started.elapsed();
            match next_poll(elapsed, timeout, self.poll_interval) {
                PollStep::Expired => return Err(timed_out(elapsed)),
                PollStep::Sleep(wait) => {
                    debug!(job_id = %job.job_id, ?elapsed, "job still running");
                    thread::sleep(wait);
                }
            }
        }
    }
}

/// What the poll loop does after seeing a job still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollStep {
    Sleep(Duration),
    Expired,
}

fn deadline_passed(elapsed: Duration, timeout: Option<Duration>) -> bool {
    timeout.is_some_and(|limit| elapsed >= limit)
}

/// Never sleeps past the deadline; without one, polls forever.
fn next_poll(elapsed: Duration, timeout: Option<Duration>, interval: Duration) -> PollStep {
    match timeout {
        None => PollStep::Sleep(interval),
        Some(limit) if elapsed >= limit => PollStep::Expired,
        Some(limit) => PollStep::Sleep(interval.min(limit - elapsed)),
    }
}

/// HTTP timeout for one status poll, capped at the time left before the deadline.
fn request_budget(elapsed: Duration, timeout: Option<Duration>, request_timeout: Duration) -> Duration {
    match timeout {
        None => request_timeout,
        Some(limit) => request_timeout.min(limit.saturating_sub(elapsed)),
    }
}

fn token_from_gcloud() -> WarehouseResult<String> {
    let output = Command::new("gcloud")
        .args(["auth", "application-default", "print-access-token"])
        .output()
        .map_err(|e| WarehouseError::Credentials(format!("no access token given and gcloud could not be run: {e}")))?;

    if !output.status.success() {
        return Err(WarehouseError::Credentials(format!(
            "gcloud exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(WarehouseError::Credentials(
            "gcloud returned an empty access token".to_string(),
        ));
    }
    Ok(token)
}

fn check_status(response: Response) -> WarehouseResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(api_error(status.as_u16(), &body))
}

/// Classify the answer to an existence check. Only `404` means "does not exist".
fn lookup_from_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> Lookup<T> {
    if status == StatusCode::NOT_FOUND {
        return Lookup::NotFound;
    }
    if !status.is_success() {
        return Lookup::Error(api_error(status.as_u16(), body));
    }
    match serde_json::from_str(body) {
        Ok(v) => Lookup::Found(v),
        Err(e) => Lookup::Error(e.into()),
    }
}

fn api_error(status: u16, body: &str) -> WarehouseError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => WarehouseError::Api {
            status,
            reason: envelope
                .error
                .errors
                .into_iter()
                .find_map(|e| e.reason)
                .or(envelope.error.status),
            message: envelope.error.message.unwrap_or_default(),
        },
        Err(_) => WarehouseError::api(status, body.trim()),
    }
}

/// `Some` once the job is done, an error if it finished with one.
fn job_outcome(job: &JobResource) -> WarehouseResult<Option<JobOutcome>> {
    let Some(status) = &job.status else {
        return Ok(None);
    };
    if let Some(err) = &status.error_result {
        return Err(WarehouseError::JobFailed {
            job_id: job.job_reference.job_id.clone(),
            reason: err.reason.clone(),
            message: err.message.clone().unwrap_or_default(),
        });
    }
    if status.state != "DONE" {
        return Ok(None);
    }
    let output_rows = job
        .statistics
        .as_ref()
        .and_then(|s| s.load.as_ref())
        .and_then(|l| l.output_rows.as_deref())
        .and_then(|n| n.parse().ok());
    Ok(Some(JobOutcome { output_rows }))
}

fn new_table(location: &WarehouseLocation, schema: &TableSchema) -> NewTable {
    NewTable {
        table_reference: TableReference::of(location),
        schema: SchemaResource {
            fields: schema
                .columns
                .iter()
                .map(|c| FieldResource {
                    name: c.name.clone(),
                    field_type: c.field_type.as_str(),
                    mode: "NULLABLE",
                })
                .collect(),
        },
    }
}

fn load_job_request(location: &WarehouseLocation, disposition: WriteDisposition) -> LoadJobRequest {
    LoadJobRequest {
        configuration: JobConfiguration {
            load: LoadConfiguration {
                destination_table: TableReference::of(location),
                source_format: "NEWLINE_DELIMITED_JSON",
                write_disposition: disposition.as_api_str(),
                create_disposition: "CREATE_NEVER",
            },
        },
    }
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Int64(i) => serde_json::Value::from(*i),
        Value::Float64(f) => match serde_json::Number::from_f64(*f) {
            Some(n) => serde_json::Value::Number(n),
            None if f.is_nan() => serde_json::Value::from("NaN"),
            None if *f > 0.0 => serde_json::Value::from("Infinity"),
            None => serde_json::Value::from("-Infinity"),
        },
        // Boolean columns are created as STRING.
        Value::Bool(b) => serde_json::Value::from(b.to_string()),
        Value::Timestamp(ts) => serde_json::Value::from(format_timestamp(ts)),
        Value::Utf8(s) => serde_json::Value::from(s.as_str()),
    }
}

/// Encode every row of `data` as one JSON object per line.
pub fn encode_rows(data: &DataSet) -> WarehouseResult<Vec<u8>> {
    let mut out = Vec::new();
    for row in &data.rows {
        let obj: serde_json::Map<String, serde_json::Value> = data
            .schema
            .field_names()
            .zip(row)
            .map(|(name, value)| (name.to_string(), json_value(value)))
            .collect();
        serde_json::to_writer(&mut out, &obj)?;
        out.push(b'\n');
    }
    Ok(out)
}

fn multipart_related(metadata: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + payload.len() + 256);
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DatasetReference {
    project_id: String,
    dataset_id: String,
}

impl DatasetReference {
    fn of(location: &WarehouseLocation) -> Self {
        Self {
            project_id: location.project().to_string(),
            dataset_id: location.dataset().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TableReference {
    project_id: String,
    dataset_id: String,
    table_id: String,
}

impl TableReference {
    fn of(location: &WarehouseLocation) -> Self {
        Self {
            project_id: location.project().to_string(),
            dataset_id: location.dataset().to_string(),
            table_id: location.table().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewDataset {
    dataset_reference: DatasetReference,
    location: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewTable {
    table_reference: TableReference,
    schema: SchemaResource,
}

#[derive(Debug, Serialize)]
struct SchemaResource {
    fields: Vec<FieldResource>,
}

#[derive(Debug, Serialize)]
struct FieldResource {
    name: String,
    #[serde(rename = "type")]
    field_type: &'static str,
    mode: &'static str,
}

#[derive(Debug, Serialize)]
struct LoadJobRequest {
    configuration: JobConfiguration,
}

#[derive(Debug, Serialize)]
struct JobConfiguration {
    load: LoadConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadConfiguration {
    destination_table: TableReference,
    source_format: &'static str,
    write_disposition: &'static str,
    create_disposition: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetResource {
    id: Option<String>,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableResource {
    id: Option<String>,
    num_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    job_reference: JobReference,
    status: Option<JobStatus>,
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: Option<String>,
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct JobStatistics {
    load: Option<LoadStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    output_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}
