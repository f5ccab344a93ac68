//! # Pipesign リモート鍵署名
//!
//! リモートKMSに保管された非対称鍵によるペイロードの署名・検証を提供する。
//!
//! 秘密鍵は常にKMS側に保持され、このクレートはダイジェスト計算と
//! 署名フォーマットの正規化のみをローカルで行う:
//!
//! | 境界 | 署名フォーマット |
//! |------|----------------|
//! | KMSバックエンド | 固定幅 `r‖s` 連結（ビッグエンディアン） |
//! | 公開API（署名・検証） | ASN.1 DER `SEQUENCE { INTEGER r, INTEGER s }` |
//!
//! 変換ロジックは [`sig`] モジュールに集約し、署名経路と検証経路で
//! フォーマットが乖離しないようにする。
//!
//! リトライは行わない。一時的なバックエンド障害は [`KmsError::Backend`]
//! としてそのまま呼び出し側へ伝播し、リトライ方針は呼び出し側が決める。

pub mod client;
pub mod sig;
pub mod signer;

pub use client::KmsClient;
pub use signer::{DigestSource, SignerVerifier, ALGORITHM_ES256};

use sha2::{Digest, Sha256, Sha384, Sha512};

/// リモート鍵署名のエラー型
#[derive(Debug, thiserror::Error)]
pub enum KmsError {
    /// KMSバックエンド呼び出しの失敗（接続不可、認証拒否、鍵未検出）
    #[error("KMSバックエンド呼び出しに失敗しました: {0}")]
    Backend(String),
    /// バックエンドが対応していないハッシュアルゴリズム、
    /// またはダイジェスト長とアルゴリズムの不一致
    #[error("対応していないハッシュアルゴリズムです: {0}")]
    UnsupportedHash(String),
    /// バックエンドが対応していない鍵アルゴリズム
    #[error("対応していない鍵アルゴリズムです: {0}")]
    UnsupportedAlgorithm(String),
    /// DER署名の厳密パース失敗（タグ不正、末尾の余剰バイト、非正準整数）
    #[error("署名のパースに失敗しました: {0}")]
    MalformedSignature(String),
    /// 呼び出し側のキャンセル・デッドライン超過を検出
    #[error("操作がキャンセルされました")]
    Canceled,
}

/// メッセージダイジェストに使用するハッシュアルゴリズム。
///
/// インスタンス構築時の既定はSHA-256。バックエンドの署名操作が
/// 対応するのはSHA-256のみ（`signer::SUPPORTED_HASH_ALGORITHMS`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// ダイジェストの出力長（バイト）
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// メッセージのダイジェストを計算する。
    pub fn digest(&self, message: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => Sha256::digest(message).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(message).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(message).to_vec(),
        }
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Sha256
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Sha256 => write!(f, "sha256"),
            HashAlgorithm::Sha384 => write!(f, "sha384"),
            HashAlgorithm::Sha512 => write!(f, "sha512"),
        }
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(format!("未知のハッシュアルゴリズムです: {other}")),
        }
    }
}
