//! # KMSバックエンドクライアント
//!
//! リモート鍵管理バックエンドの抽象インターフェース。
//! 署名・検証はすべてバックエンド側で行われ、クライアントは
//! ダイジェストと `r‖s` 連結署名のみをやり取りする。
//!
//! - [`mock::MockKmsClient`]: メモリ内P-256鍵によるローカル開発・テスト用実装
//! - `http::HttpKmsClient`: reqwestによるネットワーク実装（`vendor-http`）

#[cfg(feature = "vendor-http")]
pub mod http;
pub mod mock;

#[cfg(feature = "vendor-http")]
pub use http::HttpKmsClient;
pub use mock::MockKmsClient;

use crate::KmsError;

/// リモート鍵管理バックエンドの抽象インターフェース。
///
/// 実装は同一インスタンスへの並行呼び出しに対して安全でなければ
/// ならない。キャンセルはFutureのドロップで行い、トランスポートが
/// デッドライン超過を報告した場合は [`KmsError::Canceled`] を返す。
#[async_trait::async_trait]
pub trait KmsClient: Send + Sync {
    /// ダイジェストに署名し、`r‖s` 連結署名を返す。
    async fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, KmsError>;

    /// `r‖s` 連結署名をダイジェストに対して検証する。
    ///
    /// 検証に成功した場合のみ `Ok(())` を返す。ローカルでの
    /// 代替検証は行わない（検証権限はバックエンドにある）。
    async fn verify(&self, raw_sig: &[u8], digest: &[u8]) -> Result<(), KmsError>;

    /// 公開鍵をエクスポートする（SEC1非圧縮形式）。
    ///
    /// 鍵はローテーションされうるため、呼び出しごとに取得し直す。
    async fn public_key(&self) -> Result<Vec<u8>, KmsError>;

    /// 同じロケータ配下に新しい鍵を作成し、その公開鍵を返す。
    async fn create_key(&self) -> Result<Vec<u8>, KmsError>;
}
