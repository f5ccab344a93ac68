//! # CLI設定
//!
//! 環境変数からの接続設定の読み込み。
//! `GatewayState` 系の設定と同じく、未設定時はローカル開発向けの
//! 既定値へフォールバックする。

/// CLIの接続設定。
pub struct CliConfig {
    /// KMS鍵ロケータ（`PIPESIGN_KMS_URI`）
    pub kms_uri: String,
    /// リソースストアのベースURL（`PIPESIGN_RECORD_URL`）
    pub record_url: String,
}

impl CliConfig {
    /// 環境変数から構築する。
    pub fn from_env() -> Self {
        let kms_uri = std::env::var("PIPESIGN_KMS_URI").unwrap_or_else(|_| {
            tracing::warn!(
                "PIPESIGN_KMS_URIが未設定です。ローカル開発用の既定値を使用します"
            );
            "pipesignkms+http://localhost:8200/dev-key".to_string()
        });
        let record_url = std::env::var("PIPESIGN_RECORD_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        Self {
            kms_uri,
            record_url,
        }
    }
}
