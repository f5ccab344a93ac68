//! # Pipesign 実行レコードアノテーションストレージ
//!
//! 署名済みマテリアル（ペイロード、署名、証明書、証明書チェーン）を
//! 共有された実行レコードのアノテーションとしてBase64エンコードで
//! 永続化する。
//!
//! 書き込みは常に単一のマージパッチで行う。パッチに含まれるキーのみが
//! 設定され、含まれないキーには触れないため、別スロットキー・別
//! マテリアル種別を対象とする並行書き込みは互いを上書きしない。
//! 事前のGetを必要としないので、read-modify-writeの競合窓も存在しない。
//!
//! レコードの生成・削除はこのクレートの責務外であり、アノテーション
//! マッピングの読み書きのみを行う。

pub mod backend;
pub mod client;
pub mod patch;

pub use backend::{RecordBackend, STORAGE_BACKEND_RECORD};
pub use client::RecordClient;

/// 実行レコードストレージのエラー型
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// リソースストア呼び出しの失敗（レコード未検出、競合、権限拒否）
    #[error("リソースストア呼び出しに失敗しました: {0}")]
    Backend(String),
    /// アノテーションキー表にないペイロード形式
    #[error("このストレージは {0} 形式のペイロードに対応していません")]
    UnsupportedPayloadFormat(String),
    /// 格納済みの値が期待されたBase64として復号できない
    #[error("アノテーション {key} の値の復号に失敗しました: {reason}")]
    CorruptAnnotation {
        /// 問題のアノテーションキー
        key: String,
        /// 復号失敗の内容
        reason: String,
    },
    /// 呼び出し側のキャンセル・デッドライン超過を検出
    #[error("操作がキャンセルされました")]
    Canceled,
}

/// 標準Base64（パディングあり）エンジン
pub(crate) fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}
