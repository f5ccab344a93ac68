//! # メモリ内リソースストアクライアント
//!
//! リソースストアが利用できない開発環境・テストで使用するメモリ内実装。
//! マージパッチの意味論（含まれるキーのみ設定、`null` で削除、
//! 含まれないキーは不変）を実際に適用する。

use std::collections::HashMap;
use std::sync::RwLock;

use super::RecordClient;
use crate::StoreError;

/// メモリ内の実行レコード集合を保持するクライアント。ローカル開発・テスト用。
pub struct MemoryRecordClient {
    /// (namespace, name) → アノテーションマッピング
    records: RwLock<HashMap<(String, String), HashMap<String, String>>>,
}

impl MemoryRecordClient {
    /// 空のストアを構築する。
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// アノテーションなしのレコードを登録する。
    pub fn with_record(namespace: &str, name: &str) -> Self {
        let client = Self::new();
        client.insert_record(namespace, name);
        client
    }

    /// レコードを登録する（既存なら何もしない）。
    pub fn insert_record(&self, namespace: &str, name: &str) {
        let mut records = self.records.write().unwrap();
        records
            .entry((namespace.to_string(), name.to_string()))
            .or_default();
    }

    /// アノテーションを直接設定する（テストのシード用）。
    pub fn insert_annotation(&self, namespace: &str, name: &str, key: &str, value: &str) {
        let mut records = self.records.write().unwrap();
        records
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.to_string());
    }
}

impl Default for MemoryRecordClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RecordClient for MemoryRecordClient {
    async fn get_annotations(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<HashMap<String, String>, StoreError> {
        let records = self.records.read().unwrap();
        records
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| {
                StoreError::Backend(format!("レコード {namespace}/{name} が見つかりません"))
            })
    }

    async fn patch_annotations(
        &self,
        namespace: &str,
        name: &str,
        merge_patch: &[u8],
    ) -> Result<(), StoreError> {
        let value: serde_json::Value = serde_json::from_slice(merge_patch)
            .map_err(|e| StoreError::Backend(format!("マージパッチが不正なJSONです: {e}")))?;
        let patched = value
            .get("metadata")
            .and_then(|m| m.get("annotations"))
            .and_then(|a| a.as_object())
            .ok_or_else(|| {
                StoreError::Backend("マージパッチにmetadata.annotationsがありません".to_string())
            })?;

        let mut records = self.records.write().unwrap();
        let annotations = records
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| {
                StoreError::Backend(format!("レコード {namespace}/{name} が見つかりません"))
            })?;

        for (key, value) in patched {
            match value {
                serde_json::Value::Null => {
                    annotations.remove(key);
                }
                serde_json::Value::String(s) => {
                    annotations.insert(key.clone(), s.clone());
                }
                other => {
                    return Err(StoreError::Backend(format!(
                        "アノテーション {key} の値が文字列ではありません: {other}"
                    )));
                }
            }
        }
        Ok(())
    }
}
