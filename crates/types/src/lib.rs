//! # Pipesign 共有型定義
//!
//! 署名コンポーネント（`pipesign-kms`）とストレージバックエンド
//! （`pipesign-store`）の間で共有される値オブジェクトを提供する。
//!
//! ## エンコーディング規則
//! - Base64（標準・パディングあり）: アノテーションに格納するバイナリデータ
//!   （ペイロード、署名、証明書、証明書チェーン）

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ペイロード形式
// ---------------------------------------------------------------------------

/// 実行レコードに格納するペイロードの形式。
///
/// 閉じた集合であり、形式の追加は列挙子1つと
/// アノテーションキー表（`pipesign-store`）の1行で完結する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// 実行レコードそのもののJSON表現（ネイティブ形式）
    Native,
    /// in-toto形式のアテステーション
    Attestation,
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadFormat::Native => write!(f, "native"),
            PayloadFormat::Attestation => write!(f, "attestation"),
        }
    }
}

impl std::str::FromStr for PayloadFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(PayloadFormat::Native),
            "attestation" => Ok(PayloadFormat::Attestation),
            other => Err(format!("未知のペイロード形式です: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// ストレージオプション
// ---------------------------------------------------------------------------

/// 署名マテリアルを格納する際の呼び出し単位オプション。
///
/// `key` は同一レコード上の独立した署名スロットを区別する
/// 呼び出し側指定の識別子（例: パイプラインステップごとに1つ）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageOpts {
    /// スロットキー。アノテーションキーのパラメータになる
    pub key: String,
    /// 署名に使用した証明書（PEM）
    pub cert: String,
    /// 証明書チェーン（PEM）
    pub chain: String,
    /// ペイロードの形式。格納先アノテーションキーを決定する
    pub payload_format: PayloadFormat,
}

impl StorageOpts {
    /// 証明書情報なしでオプションを構築する。
    pub fn new(key: impl Into<String>, payload_format: PayloadFormat) -> Self {
        Self {
            key: key.into(),
            cert: String::new(),
            chain: String::new(),
            payload_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// PayloadFormatがsnake_caseでシリアライズされることを確認
    #[test]
    fn test_payload_format_serde() {
        assert_eq!(
            serde_json::to_string(&PayloadFormat::Native).unwrap(),
            "\"native\""
        );
        assert_eq!(
            serde_json::from_str::<PayloadFormat>("\"attestation\"").unwrap(),
            PayloadFormat::Attestation
        );
    }

    /// Display/FromStrが往復することを確認
    #[test]
    fn test_payload_format_roundtrip() {
        for format in [PayloadFormat::Native, PayloadFormat::Attestation] {
            let parsed: PayloadFormat = format.to_string().parse().unwrap();
            assert_eq!(parsed, format);
        }
        assert!("oci".parse::<PayloadFormat>().is_err());
    }
}
