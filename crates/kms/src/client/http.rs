//! # HTTP KMSクライアント
//!
//! KMSバックエンドのREST APIを呼び出す [`KmsClient`] 実装。
//!
//! ## 鍵ロケータ
//! ```text
//! pipesignkms://<host>[:port]/<key-name>        （TLS）
//! pipesignkms+http://<host>[:port]/<key-name>   （平文、ローカル開発用）
//! ```
//!
//! ## エンドポイント
//! - `POST {base}/v1/keys/{name}:sign`    `{"digest": b64}` → `{"signature": b64}`
//! - `POST {base}/v1/keys/{name}:verify`  `{"digest": b64, "signature": b64}` → 200
//! - `GET  {base}/v1/keys/{name}/publicKey` → `{"public_key": b64}`
//! - `POST {base}/v1/keys/{name}`         → `{"public_key": b64}`

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::KmsClient;
use crate::KmsError;

/// 標準Base64（パディングあり）エンジン
fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// KMSバックエンドのREST APIクライアント。
pub struct HttpKmsClient {
    http: reqwest::Client,
    base_url: String,
    key_name: String,
}

#[derive(Serialize)]
struct SignRequest<'a> {
    digest: &'a str,
}

#[derive(Deserialize)]
struct SignResponse {
    signature: String,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    digest: &'a str,
    signature: &'a str,
}

#[derive(Deserialize)]
struct PublicKeyResponse {
    public_key: String,
}

impl HttpKmsClient {
    /// 鍵ロケータ文字列からクライアントを構築する。
    ///
    /// ロケータが解決できない場合は構築自体が失敗する
    /// （署名時まで失敗を遅延させない）。
    pub fn from_uri(uri: &str) -> Result<Self, KmsError> {
        let (scheme, rest) = if let Some(rest) = uri.strip_prefix("pipesignkms+http://") {
            ("http", rest)
        } else if let Some(rest) = uri.strip_prefix("pipesignkms://") {
            ("https", rest)
        } else {
            return Err(KmsError::Backend(format!(
                "鍵ロケータのスキームが不正です: {uri}"
            )));
        };

        let (host, key_name) = rest
            .split_once('/')
            .ok_or_else(|| KmsError::Backend(format!("鍵ロケータに鍵名がありません: {uri}")))?;
        if host.is_empty() || key_name.is_empty() || key_name.contains('/') {
            return Err(KmsError::Backend(format!("鍵ロケータが不正です: {uri}")));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| KmsError::Backend(format!("HTTPクライアントの構築に失敗しました: {e}")))?;

        Ok(Self {
            http,
            base_url: format!("{scheme}://{host}"),
            key_name: key_name.to_string(),
        })
    }

    fn key_url(&self, suffix: &str) -> String {
        format!("{}/v1/keys/{}{}", self.base_url, self.key_name, suffix)
    }

    /// トランスポートエラーをエラー型へ写像する。
    /// デッドライン超過はキャンセル扱い。
    fn transport_error(op: &str, e: reqwest::Error) -> KmsError {
        if e.is_timeout() {
            KmsError::Canceled
        } else {
            KmsError::Backend(format!("{op}: {e}"))
        }
    }

    async fn check_status(op: &str, resp: reqwest::Response) -> Result<reqwest::Response, KmsError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(KmsError::Backend(format!("{op}: HTTP {status}: {body}")))
    }
}

#[async_trait::async_trait]
impl KmsClient for HttpKmsClient {
    async fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, KmsError> {
        let digest_b64 = b64().encode(digest);
        let resp = self
            .http
            .post(self.key_url(":sign"))
            .json(&SignRequest {
                digest: &digest_b64,
            })
            .send()
            .await
            .map_err(|e| Self::transport_error("sign", e))?;
        let resp = Self::check_status("sign", resp).await?;
        let body: SignResponse = resp
            .json()
            .await
            .map_err(|e| KmsError::Backend(format!("signレスポンスのパースに失敗しました: {e}")))?;
        b64()
            .decode(&body.signature)
            .map_err(|e| KmsError::Backend(format!("signレスポンスの署名が不正なBase64です: {e}")))
    }

    async fn verify(&self, raw_sig: &[u8], digest: &[u8]) -> Result<(), KmsError> {
        let digest_b64 = b64().encode(digest);
        let sig_b64 = b64().encode(raw_sig);
        let resp = self
            .http
            .post(self.key_url(":verify"))
            .json(&VerifyRequest {
                digest: &digest_b64,
                signature: &sig_b64,
            })
            .send()
            .await
            .map_err(|e| Self::transport_error("verify", e))?;
        Self::check_status("verify", resp).await.map(|_| ())
    }

    async fn public_key(&self) -> Result<Vec<u8>, KmsError> {
        let resp = self
            .http
            .get(self.key_url("/publicKey"))
            .send()
            .await
            .map_err(|e| Self::transport_error("publicKey", e))?;
        let resp = Self::check_status("publicKey", resp).await?;
        let body: PublicKeyResponse = resp.json().await.map_err(|e| {
            KmsError::Backend(format!("publicKeyレスポンスのパースに失敗しました: {e}"))
        })?;
        b64()
            .decode(&body.public_key)
            .map_err(|e| KmsError::Backend(format!("公開鍵が不正なBase64です: {e}")))
    }

    async fn create_key(&self) -> Result<Vec<u8>, KmsError> {
        let resp = self
            .http
            .post(self.key_url(""))
            .send()
            .await
            .map_err(|e| Self::transport_error("createKey", e))?;
        let resp = Self::check_status("createKey", resp).await?;
        let body: PublicKeyResponse = resp.json().await.map_err(|e| {
            KmsError::Backend(format!("createKeyレスポンスのパースに失敗しました: {e}"))
        })?;
        b64()
            .decode(&body.public_key)
            .map_err(|e| KmsError::Backend(format!("公開鍵が不正なBase64です: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 鍵ロケータのパースを確認
    #[test]
    fn test_from_uri() {
        let client = HttpKmsClient::from_uri("pipesignkms://kms.example.com/release-key").unwrap();
        assert_eq!(client.base_url, "https://kms.example.com");
        assert_eq!(client.key_name, "release-key");

        let dev = HttpKmsClient::from_uri("pipesignkms+http://localhost:8200/dev-key").unwrap();
        assert_eq!(dev.base_url, "http://localhost:8200");
        assert_eq!(dev.key_url(":sign"), "http://localhost:8200/v1/keys/dev-key:sign");
    }

    /// 不正なロケータで構築が失敗することを確認
    #[test]
    fn test_from_uri_rejects_malformed() {
        assert!(HttpKmsClient::from_uri("azurekms://vault/key").is_err());
        assert!(HttpKmsClient::from_uri("pipesignkms://host-only").is_err());
        assert!(HttpKmsClient::from_uri("pipesignkms:///key").is_err());
        assert!(HttpKmsClient::from_uri("pipesignkms://host/a/b").is_err());
    }
}
