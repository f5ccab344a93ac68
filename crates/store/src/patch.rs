//! # アノテーションマージパッチ
//!
//! リソースストアへ送る `{"metadata":{"annotations":{...}}}` 形式の
//! マージパッチの組み立て。

use std::collections::BTreeMap;

use crate::StoreError;

/// アノテーションの集合をマージパッチのバイト列へ直列化する。
///
/// マージパッチの意味論: パッチに含まれるキーは設定・上書きされ、
/// 含まれないキーは受信側で変更されない。
pub fn annotations_patch(annotations: &BTreeMap<String, String>) -> Result<Vec<u8>, StoreError> {
    let body = serde_json::json!({
        "metadata": {
            "annotations": annotations,
        }
    });
    serde_json::to_vec(&body)
        .map_err(|e| StoreError::Backend(format!("マージパッチの直列化に失敗しました: {e}")))
}
