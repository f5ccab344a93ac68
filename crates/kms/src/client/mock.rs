//! # ローカル開発用モックKMSクライアント
//!
//! リモートKMSが利用できない開発環境・テストで使用するメモリ内実装。
//! P-256鍵をメモリ内で生成し、バックエンドと同じ `r‖s` 連結形式で
//! 署名を返す。

use std::sync::RwLock;

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey};

use super::KmsClient;
use crate::KmsError;

/// メモリ内P-256鍵によるモックKMSクライアント。ローカル開発・テスト用。
pub struct MockKmsClient {
    /// P-256署名鍵（メモリ内生成）。`create_key` で置き換えられる
    key: RwLock<SigningKey>,
}

impl MockKmsClient {
    /// 新しい鍵を生成してクライアントを初期化する。
    pub fn new() -> Self {
        Self {
            key: RwLock::new(SigningKey::random(&mut rand::rngs::OsRng)),
        }
    }

    fn export_public_key(&self) -> Vec<u8> {
        let key = self.key.read().unwrap();
        key.verifying_key().to_encoded_point(false).as_bytes().to_vec()
    }
}

impl Default for MockKmsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KmsClient for MockKmsClient {
    /// 保持している鍵でダイジェストに署名し、固定幅 `r‖s` を返す。
    async fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, KmsError> {
        let key = self.key.read().unwrap();
        let sig: Signature = key
            .sign_prehash(digest)
            .map_err(|e| KmsError::Backend(format!("署名に失敗しました: {e}")))?;
        Ok(sig.to_bytes().to_vec())
    }

    async fn verify(&self, raw_sig: &[u8], digest: &[u8]) -> Result<(), KmsError> {
        let sig = Signature::from_slice(raw_sig)
            .map_err(|e| KmsError::MalformedSignature(format!("r‖s連結署名が不正です: {e}")))?;
        let key = self.key.read().unwrap();
        key.verifying_key()
            .verify_prehash(digest, &sig)
            .map_err(|_| KmsError::Backend("署名の検証に失敗しました".to_string()))
    }

    async fn public_key(&self) -> Result<Vec<u8>, KmsError> {
        Ok(self.export_public_key())
    }

    /// 保持している鍵を新しい鍵で置き換え、その公開鍵を返す。
    async fn create_key(&self) -> Result<Vec<u8>, KmsError> {
        let new_key = SigningKey::random(&mut rand::rngs::OsRng);
        {
            let mut guard = self.key.write().unwrap();
            *guard = new_key;
        }
        Ok(self.export_public_key())
    }
}
