//! # リソースストアクライアント
//!
//! 実行レコードを保持する外部リソースストアの抽象インターフェース。
//! レコードは (namespace, name) で識別され、このクレートが触れるのは
//! アノテーションマッピングのみ。
//!
//! - [`memory::MemoryRecordClient`]: メモリ内実装（ローカル開発・テスト用）
//! - `http::HttpRecordClient`: reqwestによるネットワーク実装（`vendor-http`）

#[cfg(feature = "vendor-http")]
pub mod http;
pub mod memory;

#[cfg(feature = "vendor-http")]
pub use http::HttpRecordClient;
pub use memory::MemoryRecordClient;

use std::collections::HashMap;

use crate::StoreError;

/// 実行レコードへのget/patch操作の抽象インターフェース。
///
/// `patch_annotations` はマージパッチを受信側でアトミックに適用する。
/// 実装は同一インスタンスへの並行呼び出しに対して安全でなければ
/// ならない。
#[async_trait::async_trait]
pub trait RecordClient: Send + Sync {
    /// レコードの現在のアノテーションマッピングを取得する。
    async fn get_annotations(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<HashMap<String, String>, StoreError>;

    /// `{"metadata":{"annotations":{...}}}` 形式のマージパッチを
    /// レコードへ適用する。
    async fn patch_annotations(
        &self,
        namespace: &str,
        name: &str,
        merge_patch: &[u8],
    ) -> Result<(), StoreError>;
}
