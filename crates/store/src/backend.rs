//! # 実行レコードストレージバックエンド
//!
//! 署名済みマテリアルを実行レコードのアノテーションとして格納する。
//! 値はBase64エンコードされたJSON等のバイト列。
//!
//! アノテーションキーはマテリアル種別ごとに固定の書式でスロットキーを
//! 埋め込む。この書式はレコードを読む外部コンシューマとの相互運用点で
//! あり、変更してはならない。

use std::collections::BTreeMap;

use base64::Engine;
use pipesign_types::{PayloadFormat, StorageOpts};

use crate::client::RecordClient;
use crate::{b64, patch, StoreError};

/// このバックエンドの識別子。複数ストレージ対応の呼び出し側が
/// ディスパッチ・報告に使用する
pub const STORAGE_BACKEND_RECORD: &str = "record";

/// ネイティブ形式ペイロードのアノテーションキー書式
pub const RUN_ANNOTATION_PREFIX: &str = "pipesign.dev/run-";
/// アテステーション形式ペイロードのアノテーションキー書式
pub const ATTESTATION_ANNOTATION_PREFIX: &str = "pipesign.dev/attestation-";
/// 署名のアノテーションキー書式
pub const SIGNATURE_ANNOTATION_PREFIX: &str = "pipesign.dev/signature-";
/// 証明書のアノテーションキー書式
pub const CERT_ANNOTATION_PREFIX: &str = "pipesign.dev/cert-";
/// 証明書チェーンのアノテーションキー書式
pub const CHAIN_ANNOTATION_PREFIX: &str = "pipesign.dev/chain-";

/// ペイロード形式→アノテーションキー書式の対応表。
///
/// 閉じた集合。形式の追加はこの表の1行と列挙子1つで完結し、
/// 呼び出し箇所に分岐を散らさない。
const PAYLOAD_KEY_FORMATS: &[(PayloadFormat, &str)] = &[
    (PayloadFormat::Native, RUN_ANNOTATION_PREFIX),
    (PayloadFormat::Attestation, ATTESTATION_ANNOTATION_PREFIX),
];

/// 署名マテリアルを1つの実行レコードのアノテーションとして
/// 永続化するストレージバックエンド。
///
/// 構築時に対象レコードの (namespace, name) に束縛される。
/// 保持する状態は不変であり、並行呼び出しに追加の同期は不要。
pub struct RecordBackend<C: RecordClient> {
    client: C,
    namespace: String,
    name: String,
}

impl<C: RecordClient> RecordBackend<C> {
    /// 対象レコードに束縛されたバックエンドを構築する。
    pub fn new(client: C, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// バックエンド識別子を返す。
    pub fn backend_type(&self) -> &'static str {
        STORAGE_BACKEND_RECORD
    }

    /// ペイロード・署名・証明書・証明書チェーンの4エントリを
    /// 単一のマージパッチでレコードへ格納する。
    ///
    /// パッチに含まれるキーのみが上書きされるため、並行する別スロット
    /// への書き込みとは干渉しない。同一スロットへの再格納は上書きとして
    /// 許容する（last-write-wins）。
    pub async fn store_payload(
        &self,
        raw_payload: &[u8],
        signature: &str,
        opts: &StorageOpts,
    ) -> Result<(), StoreError> {
        tracing::info!(
            namespace = %self.namespace,
            name = %self.name,
            slot = %opts.key,
            "実行レコードへペイロードを格納します"
        );

        // ペイロードキーの解決はI/Oより先。未対応形式はここで失敗する
        let payload_key = payload_annotation_key(opts)?;

        let mut annotations = BTreeMap::new();
        annotations.insert(
            format!("{SIGNATURE_ANNOTATION_PREFIX}{}", opts.key),
            b64().encode(signature.as_bytes()),
        );
        annotations.insert(
            format!("{CERT_ANNOTATION_PREFIX}{}", opts.key),
            b64().encode(opts.cert.as_bytes()),
        );
        annotations.insert(
            format!("{CHAIN_ANNOTATION_PREFIX}{}", opts.key),
            b64().encode(opts.chain.as_bytes()),
        );
        annotations.insert(payload_key, b64().encode(raw_payload));

        let patch_bytes = patch::annotations_patch(&annotations)?;
        self.client
            .patch_annotations(&self.namespace, &self.name, &patch_bytes)
            .await
    }

    /// レコードに格納された署名を取得する。
    /// 未格納のスロットは `Ok(None)`（未署名は正常な状態）。
    pub async fn retrieve_signature(&self, opts: &StorageOpts) -> Result<Option<Vec<u8>>, StoreError> {
        tracing::info!(
            namespace = %self.namespace,
            name = %self.name,
            slot = %opts.key,
            "実行レコードから署名を取得します"
        );
        self.retrieve_annotation(&format!("{SIGNATURE_ANNOTATION_PREFIX}{}", opts.key))
            .await
    }

    /// レコードに格納されたペイロードを取得する。
    /// 未格納のスロットは `Ok(None)`。
    pub async fn retrieve_payload(&self, opts: &StorageOpts) -> Result<Option<Vec<u8>>, StoreError> {
        tracing::info!(
            namespace = %self.namespace,
            name = %self.name,
            slot = %opts.key,
            "実行レコードからペイロードを取得します"
        );
        let payload_key = payload_annotation_key(opts)?;
        self.retrieve_annotation(&payload_key).await
    }

    /// アノテーションを取得してBase64復号する。
    ///
    /// 復号結果は格納時に渡されたままの不透明なバイト列であり、
    /// テキストとしての解釈は呼び出し側の責務。
    ///
    /// レコードは書き込み側と共有されるため毎回取得し直す
    /// （ローカルキャッシュは持たない）。
    async fn retrieve_annotation(&self, annotation_key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let annotations = self
            .client
            .get_annotations(&self.namespace, &self.name)
            .await?;

        let raw_value = match annotations.get(annotation_key) {
            Some(value) => value,
            None => return Ok(None),
        };

        let decoded = b64()
            .decode(raw_value)
            .map_err(|e| StoreError::CorruptAnnotation {
                key: annotation_key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(decoded))
    }
}

/// ペイロードの格納先アノテーションキーを対応表から解決する。
fn payload_annotation_key(opts: &StorageOpts) -> Result<String, StoreError> {
    PAYLOAD_KEY_FORMATS
        .iter()
        .find(|(format, _)| *format == opts.payload_format)
        .map(|(_, prefix)| format!("{prefix}{}", opts.key))
        .ok_or_else(|| StoreError::UnsupportedPayloadFormat(opts.payload_format.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryRecordClient;

    fn native_opts(key: &str) -> StorageOpts {
        StorageOpts {
            key: key.to_string(),
            cert: "CERT".to_string(),
            chain: "CHAIN".to_string(),
            payload_format: PayloadFormat::Native,
        }
    }

    fn backend() -> RecordBackend<MemoryRecordClient> {
        RecordBackend::new(MemoryRecordClient::with_record("ci", "build-1"), "ci", "build-1")
    }

    /// 相互運用のための正確なアノテーションキー文字列を確認
    #[test]
    fn test_annotation_key_formats() {
        let opts = native_opts("step1");
        assert_eq!(
            payload_annotation_key(&opts).unwrap(),
            "pipesign.dev/run-step1"
        );
        let attestation = StorageOpts::new("step1", PayloadFormat::Attestation);
        assert_eq!(
            payload_annotation_key(&attestation).unwrap(),
            "pipesign.dev/attestation-step1"
        );
        assert_eq!(
            format!("{SIGNATURE_ANNOTATION_PREFIX}step1"),
            "pipesign.dev/signature-step1"
        );
        assert_eq!(format!("{CERT_ANNOTATION_PREFIX}step1"), "pipesign.dev/cert-step1");
        assert_eq!(format!("{CHAIN_ANNOTATION_PREFIX}step1"), "pipesign.dev/chain-step1");
    }

    /// 4エントリのみが設定され、無関係な既存アノテーションが
    /// 変更されないことを確認
    #[tokio::test]
    async fn test_store_sets_exactly_four_annotations() {
        let b = backend();
        b.client
            .insert_annotation("ci", "build-1", "unrelated/key", "untouched");

        b.store_payload(b"payload", "sig", &native_opts("step1"))
            .await
            .unwrap();

        let annotations = b.client.get_annotations("ci", "build-1").await.unwrap();
        assert_eq!(annotations.len(), 5);
        assert_eq!(annotations.get("unrelated/key").unwrap(), "untouched");
        for key in [
            "pipesign.dev/run-step1",
            "pipesign.dev/signature-step1",
            "pipesign.dev/cert-step1",
            "pipesign.dev/chain-step1",
        ] {
            assert!(annotations.contains_key(key), "missing {key}");
        }
    }

    /// スロットAへの格納がスロットBのアノテーションを変更しないことを確認
    #[tokio::test]
    async fn test_slot_isolation() {
        let b = backend();
        b.store_payload(b"payload-b", "sig-b", &native_opts("B"))
            .await
            .unwrap();
        let before = b.client.get_annotations("ci", "build-1").await.unwrap();

        b.store_payload(b"payload-a", "sig-a", &native_opts("A"))
            .await
            .unwrap();

        let after = b.client.get_annotations("ci", "build-1").await.unwrap();
        for (key, value) in &before {
            assert_eq!(after.get(key), Some(value), "slot B annotation {key} changed");
        }
        assert_eq!(
            b.retrieve_payload(&native_opts("B")).await.unwrap().unwrap(),
            b"payload-b"
        );
    }

    /// 格納→取得の往復と、未格納スロットのNoneを確認
    #[tokio::test]
    async fn test_store_retrieve_roundtrip() {
        let b = backend();
        let opts = native_opts("step1");
        b.store_payload(b"p", "s", &opts).await.unwrap();

        assert_eq!(b.retrieve_payload(&opts).await.unwrap().unwrap(), b"p");
        assert_eq!(b.retrieve_signature(&opts).await.unwrap().unwrap(), b"s");

        let untouched = native_opts("step2");
        assert_eq!(b.retrieve_payload(&untouched).await.unwrap(), None);
        assert_eq!(b.retrieve_signature(&untouched).await.unwrap(), None);
    }

    /// アテステーション形式が専用のアノテーションキーに格納されることを確認
    #[tokio::test]
    async fn test_attestation_format_uses_distinct_key() {
        let b = backend();
        let opts = StorageOpts::new("step1", PayloadFormat::Attestation);
        b.store_payload(b"att", "sig", &opts).await.unwrap();

        let annotations = b.client.get_annotations("ci", "build-1").await.unwrap();
        assert!(annotations.contains_key("pipesign.dev/attestation-step1"));
        assert!(!annotations.contains_key("pipesign.dev/run-step1"));
        assert_eq!(b.retrieve_payload(&opts).await.unwrap().unwrap(), b"att");
    }

    /// UTF-8として不正なバイト列を含むペイロードがそのまま往復することを確認
    #[tokio::test]
    async fn test_binary_payload_roundtrip() {
        let b = backend();
        let opts = native_opts("step1");
        let payload = [0xff, 0xfe, 0x00, 0x80];
        b.store_payload(&payload, "sig", &opts).await.unwrap();

        assert_eq!(
            b.retrieve_payload(&opts).await.unwrap().unwrap(),
            payload.to_vec()
        );
    }

    /// Base64として不正な値がキー名付きのエラーになることを確認
    #[tokio::test]
    async fn test_corrupt_annotation() {
        let b = backend();
        b.client.insert_annotation(
            "ci",
            "build-1",
            "pipesign.dev/signature-step1",
            "%%% not base64 %%%",
        );

        let err = b
            .retrieve_signature(&native_opts("step1"))
            .await
            .unwrap_err();
        match err {
            StoreError::CorruptAnnotation { key, .. } => {
                assert_eq!(key, "pipesign.dev/signature-step1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// 同一スロットへの再格納が上書きになることを確認
    #[tokio::test]
    async fn test_overwrite_same_slot() {
        let b = backend();
        let opts = native_opts("step1");
        b.store_payload(b"first", "sig1", &opts).await.unwrap();
        b.store_payload(b"second", "sig2", &opts).await.unwrap();

        assert_eq!(b.retrieve_payload(&opts).await.unwrap().unwrap(), b"second");
        assert_eq!(b.retrieve_signature(&opts).await.unwrap().unwrap(), b"sig2");
    }

    /// 異なるスロットへの並行書き込みが両方成功し、
    /// それぞれ独立に取得できることを確認
    #[tokio::test]
    async fn test_concurrent_disjoint_writers() {
        let b = backend();
        let opts_a = native_opts("A");
        let opts_b = native_opts("B");
        let (ra, rb) = tokio::join!(
            b.store_payload(b"payload-a", "sig-a", &opts_a),
            b.store_payload(b"payload-b", "sig-b", &opts_b),
        );
        ra.unwrap();
        rb.unwrap();

        assert_eq!(
            b.retrieve_payload(&native_opts("A")).await.unwrap().unwrap(),
            b"payload-a"
        );
        assert_eq!(
            b.retrieve_payload(&native_opts("B")).await.unwrap().unwrap(),
            b"payload-b"
        );
    }

    /// バックエンド識別子を確認
    #[test]
    fn test_backend_type() {
        assert_eq!(backend().backend_type(), STORAGE_BACKEND_RECORD);
    }
}
