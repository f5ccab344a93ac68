//! # HTTPリソースストアクライアント
//!
//! オーケストレータのリソースストアREST APIを呼び出す
//! [`RecordClient`] 実装。
//!
//! ## エンドポイント
//! - `GET   {base}/v1/namespaces/{ns}/records/{name}`
//!   → `{"metadata":{"annotations":{...}}}`
//! - `PATCH {base}/v1/namespaces/{ns}/records/{name}`
//!   （`Content-Type: application/merge-patch+json`）

use std::collections::HashMap;

use serde::Deserialize;

use super::RecordClient;
use crate::StoreError;

/// マージパッチのContent-Type
const MERGE_PATCH_CONTENT_TYPE: &str = "application/merge-patch+json";

/// リソースストアのREST APIクライアント。
pub struct HttpRecordClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct RecordResponse {
    #[serde(default)]
    metadata: RecordMetadata,
}

#[derive(Deserialize, Default)]
struct RecordMetadata {
    #[serde(default)]
    annotations: HashMap<String, String>,
}

impl HttpRecordClient {
    /// ベースURLからクライアントを構築する。
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(StoreError::Backend(format!(
                "リソースストアURLが不正です: {base_url}"
            )));
        }
        let http = reqwest::Client::builder().build().map_err(|e| {
            StoreError::Backend(format!("HTTPクライアントの構築に失敗しました: {e}"))
        })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn record_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/v1/namespaces/{namespace}/records/{name}", self.base_url)
    }

    /// トランスポートエラーをエラー型へ写像する。
    /// デッドライン超過はキャンセル扱い。
    fn transport_error(op: &str, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Canceled
        } else {
            StoreError::Backend(format!("{op}: {e}"))
        }
    }

    async fn check_status(
        op: &str,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Backend(format!("{op}: HTTP {status}: {body}")))
    }
}

#[async_trait::async_trait]
impl RecordClient for HttpRecordClient {
    async fn get_annotations(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<HashMap<String, String>, StoreError> {
        let resp = self
            .http
            .get(self.record_url(namespace, name))
            .send()
            .await
            .map_err(|e| Self::transport_error("get", e))?;
        let resp = Self::check_status("get", resp).await?;
        let record: RecordResponse = resp.json().await.map_err(|e| {
            StoreError::Backend(format!("レコードレスポンスのパースに失敗しました: {e}"))
        })?;
        Ok(record.metadata.annotations)
    }

    async fn patch_annotations(
        &self,
        namespace: &str,
        name: &str,
        merge_patch: &[u8],
    ) -> Result<(), StoreError> {
        let resp = self
            .http
            .patch(self.record_url(namespace, name))
            .header(reqwest::header::CONTENT_TYPE, MERGE_PATCH_CONTENT_TYPE)
            .body(merge_patch.to_vec())
            .send()
            .await
            .map_err(|e| Self::transport_error("patch", e))?;
        Self::check_status("patch", resp).await.map(|_| ())
    }
}
