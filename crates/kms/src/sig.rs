//! # ECDSA署名フォーマット変換
//!
//! KMSバックエンドのネイティブ形式（固定幅 `r‖s` 連結）と、
//! 検証エコシステムが期待するASN.1 DER形式
//! （`SEQUENCE { INTEGER r, INTEGER s }`）の相互変換。
//!
//! パースは厳密に行う。タグ不正・末尾の余剰バイト・非正準な整数
//! エンコーディングはすべて [`KmsError::MalformedSignature`] になる。
//! 検証経路で寛容なパースを行うと、同一署名の複数表現を許して
//! しまうため、失敗側に倒す。

use p256::ecdsa::Signature;

use crate::KmsError;

/// P-256の `r‖s` 連結署名の長さ（32バイトスカラー×2）
pub const RAW_SIGNATURE_LEN: usize = 64;

/// `r‖s` 連結署名をDER `SEQUENCE { INTEGER r, INTEGER s }` へ変換する。
///
/// `raw` は各スカラーがビッグエンディアン・固定幅で連結された
/// [`RAW_SIGNATURE_LEN`] バイトでなければならない。
pub fn der_from_raw(raw: &[u8]) -> Result<Vec<u8>, KmsError> {
    if raw.len() != RAW_SIGNATURE_LEN {
        return Err(KmsError::MalformedSignature(format!(
            "r‖s連結署名の長さが不正です: {}バイト（期待値: {}バイト）",
            raw.len(),
            RAW_SIGNATURE_LEN
        )));
    }
    let sig = Signature::from_slice(raw)
        .map_err(|e| KmsError::MalformedSignature(format!("r‖s連結署名が不正です: {e}")))?;
    Ok(sig.to_der().as_bytes().to_vec())
}

/// DER署名を固定幅の `r‖s` 連結へ変換する。
///
/// 各スカラーは32バイトへ左ゼロ詰めされる（DERで省略された
/// 上位ゼロバイトの復元）。
pub fn raw_from_der(der: &[u8]) -> Result<Vec<u8>, KmsError> {
    let sig = Signature::from_der(der)
        .map_err(|e| KmsError::MalformedSignature(format!("DER署名のパースに失敗しました: {e}")))?;
    Ok(sig.to_bytes().to_vec())
}
