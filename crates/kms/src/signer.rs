//! # SignerVerifier
//!
//! リモートKMS鍵によるメッセージの署名・検証。
//!
//! 公開APIはDER形式（`SEQUENCE { INTEGER r, INTEGER s }`）の署名のみを
//! 受け渡しし、バックエンドのネイティブ形式（`r‖s` 連結）は
//! [`crate::sig`] で正規化して隠蔽する。
//!
//! 構築後の状態は不変であり、全メソッドは `&self` を取る。
//! 同一インスタンスへの並行呼び出しに追加の同期は不要。

use crate::client::KmsClient;
use crate::{sig, HashAlgorithm, KmsError};

/// ES256（ECDSA P-256 + SHA-256）の識別子
pub const ALGORITHM_ES256: &str = "ES256";

/// バックエンドが対応する署名アルゴリズム
const SUPPORTED_ALGORITHMS: &[&str] = &[ALGORITHM_ES256];

/// バックエンドの署名操作が対応するハッシュアルゴリズム
const SUPPORTED_HASH_ALGORITHMS: &[HashAlgorithm] = &[HashAlgorithm::Sha256];

/// 署名・検証対象の指定。
///
/// メッセージを渡せばアクティブなハッシュアルゴリズムでダイジェストを
/// 計算し、計算済みダイジェストを渡せばそのまま使用する。
/// いずれの場合も1回の呼び出しで計算されるダイジェストは1つ。
#[derive(Debug, Clone, Copy)]
pub enum DigestSource<'a> {
    /// 生メッセージ。アクティブなハッシュアルゴリズムでダイジェスト計算する
    Message(&'a [u8]),
    /// 計算済みダイジェスト。長さがアルゴリズムの出力長と一致しなければならない
    Digest(&'a [u8]),
}

/// リモートKMS鍵によるSigner/Verifier。
///
/// 鍵の実体はバックエンド側にあり、このオブジェクトは鍵ハンドルと
/// 既定ハッシュアルゴリズムのみを保持する。
pub struct SignerVerifier<C: KmsClient> {
    client: C,
    hash: HashAlgorithm,
}

impl<C: KmsClient> SignerVerifier<C> {
    /// バックエンドクライアントと既定ハッシュアルゴリズムから構築する。
    /// `hash` が `None` の場合はSHA-256。
    pub fn new(client: C, hash: Option<HashAlgorithm>) -> Self {
        Self {
            client,
            hash: hash.unwrap_or_default(),
        }
    }

    /// アクティブなハッシュアルゴリズムを解決し、ダイジェストを確定する。
    ///
    /// 計算済みダイジェストの長さがアルゴリズムの出力長と一致しない
    /// 場合は、どちらかを暗黙に採用せず [`KmsError::UnsupportedHash`]
    /// で失敗する。
    fn resolve_digest(
        &self,
        input: DigestSource<'_>,
        hash_override: Option<HashAlgorithm>,
    ) -> Result<Vec<u8>, KmsError> {
        let hash = hash_override.unwrap_or(self.hash);
        if !SUPPORTED_HASH_ALGORITHMS.contains(&hash) {
            return Err(KmsError::UnsupportedHash(format!(
                "バックエンドの署名操作は {hash} に対応していません"
            )));
        }
        match input {
            DigestSource::Message(message) => Ok(hash.digest(message)),
            DigestSource::Digest(digest) => {
                if digest.len() != hash.output_len() {
                    return Err(KmsError::UnsupportedHash(format!(
                        "ダイジェスト長 {} が {hash} の出力長 {} と一致しません",
                        digest.len(),
                        hash.output_len()
                    )));
                }
                Ok(digest.to_vec())
            }
        }
    }

    /// メッセージまたはダイジェストに署名し、DER署名を返す。
    pub async fn sign(
        &self,
        input: DigestSource<'_>,
        hash_override: Option<HashAlgorithm>,
    ) -> Result<Vec<u8>, KmsError> {
        let digest = self.resolve_digest(input, hash_override)?;
        let raw = self.client.sign(&digest).await?;
        sig::der_from_raw(&raw)
    }

    /// 既定ハッシュアルゴリズムでメッセージに署名する。
    pub async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, KmsError> {
        self.sign(DigestSource::Message(message), None).await
    }

    /// DER署名をメッセージまたはダイジェストに対して検証する。
    ///
    /// 署名は厳密にDERとしてパースし、固定幅 `r‖s` へ変換したうえで
    /// バックエンドの検証操作へ委譲する。検証の成否はバックエンドの
    /// 結果に従う。
    pub async fn verify(
        &self,
        der_sig: &[u8],
        input: DigestSource<'_>,
        hash_override: Option<HashAlgorithm>,
    ) -> Result<(), KmsError> {
        let digest = self.resolve_digest(input, hash_override)?;
        let raw = sig::raw_from_der(der_sig)?;
        self.client.verify(&raw, &digest).await
    }

    /// 既定ハッシュアルゴリズムでDER署名をメッセージに対して検証する。
    pub async fn verify_message(&self, der_sig: &[u8], message: &[u8]) -> Result<(), KmsError> {
        self.verify(der_sig, DigestSource::Message(message), None)
            .await
    }

    /// 公開鍵をバックエンドから取得する。
    ///
    /// 鍵はローテーションされうるため、結果はキャッシュしない。
    pub async fn public_key(&self) -> Result<Vec<u8>, KmsError> {
        self.client.public_key().await
    }

    /// 指定アルゴリズムで新しい鍵をバックエンドに作成し、公開鍵を返す。
    pub async fn create_key(&self, algorithm: &str) -> Result<Vec<u8>, KmsError> {
        if !SUPPORTED_ALGORITHMS.contains(&algorithm) {
            return Err(KmsError::UnsupportedAlgorithm(format!(
                "バックエンドは {algorithm} に対応していません（対応: {SUPPORTED_ALGORITHMS:?}）"
            )));
        }
        self.client.create_key().await
    }

    /// 対応する署名アルゴリズムの一覧。I/Oなし。
    pub fn supported_algorithms() -> &'static [&'static str] {
        SUPPORTED_ALGORITHMS
    }

    /// 既定の署名アルゴリズム。I/Oなし。
    pub fn default_algorithm() -> &'static str {
        ALGORITHM_ES256
    }
}

#[cfg(feature = "vendor-http")]
impl SignerVerifier<crate::client::HttpKmsClient> {
    /// 鍵ロケータ文字列からSignerVerifierを構築する。
    ///
    /// ロケータの解決は構築時に行い、解決できない場合はここで失敗する。
    pub fn load(key_uri: &str, hash: Option<HashAlgorithm>) -> Result<Self, KmsError> {
        let client = crate::client::HttpKmsClient::from_uri(key_uri)?;
        Ok(Self::new(client, hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockKmsClient;

    fn signer() -> SignerVerifier<MockKmsClient> {
        SignerVerifier::new(MockKmsClient::new(), None)
    }

    /// 署名→検証の往復を確認
    #[tokio::test]
    async fn test_sign_verify_roundtrip() {
        let sv = signer();
        let der_sig = sv.sign_message(b"payload").await.unwrap();
        // DERのSEQUENCEタグで始まる
        assert_eq!(der_sig[0], 0x30);
        sv.verify_message(&der_sig, b"payload").await.unwrap();
    }

    /// 改ざんされたメッセージの検証が失敗することを確認
    #[tokio::test]
    async fn test_verify_tampered_message() {
        let sv = signer();
        let der_sig = sv.sign_message(b"payload").await.unwrap();
        assert!(sv.verify_message(&der_sig, b"tampered").await.is_err());
    }

    /// 計算済みダイジェストでの署名・検証を確認
    #[tokio::test]
    async fn test_sign_with_precomputed_digest() {
        let sv = signer();
        let digest = HashAlgorithm::Sha256.digest(b"payload");
        let der_sig = sv.sign(DigestSource::Digest(&digest), None).await.unwrap();
        sv.verify(&der_sig, DigestSource::Digest(&digest), None)
            .await
            .unwrap();
        // メッセージ指定でも同じダイジェストに解決される
        sv.verify_message(&der_sig, b"payload").await.unwrap();
    }

    /// ダイジェスト長とアルゴリズムの不一致が拒否されることを確認
    #[tokio::test]
    async fn test_digest_length_mismatch() {
        let sv = signer();
        let short = [0u8; 20];
        assert!(matches!(
            sv.sign(DigestSource::Digest(&short), None).await,
            Err(KmsError::UnsupportedHash(_))
        ));
    }

    /// バックエンド非対応のハッシュアルゴリズムが拒否されることを確認
    #[tokio::test]
    async fn test_unsupported_hash_override() {
        let sv = signer();
        assert!(matches!(
            sv.sign(
                DigestSource::Message(b"payload"),
                Some(HashAlgorithm::Sha384)
            )
            .await,
            Err(KmsError::UnsupportedHash(_))
        ));
    }

    /// DER署名の末尾に余剰バイトを足すと検証が失敗することを確認
    #[tokio::test]
    async fn test_verify_rejects_trailing_bytes() {
        let sv = signer();
        let mut der_sig = sv.sign_message(b"payload").await.unwrap();
        der_sig.push(0x00);
        assert!(matches!(
            sv.verify_message(&der_sig, b"payload").await,
            Err(KmsError::MalformedSignature(_))
        ));
    }

    /// 非対応アルゴリズムの鍵作成が拒否されることを確認
    #[tokio::test]
    async fn test_create_key_unsupported_algorithm() {
        let sv = signer();
        assert!(matches!(
            sv.create_key("RS256").await,
            Err(KmsError::UnsupportedAlgorithm(_))
        ));
        sv.create_key(ALGORITHM_ES256).await.unwrap();
    }

    /// 公開鍵がキャッシュされないこと（ローテーション後に変わること）を確認
    #[tokio::test]
    async fn test_public_key_not_cached() {
        let sv = signer();
        let before = sv.public_key().await.unwrap();
        sv.create_key(ALGORITHM_ES256).await.unwrap();
        let after = sv.public_key().await.unwrap();
        assert_ne!(before, after);
    }

    /// 能力照会を確認
    #[test]
    fn test_capabilities() {
        assert_eq!(
            SignerVerifier::<MockKmsClient>::supported_algorithms(),
            &[ALGORITHM_ES256]
        );
        assert_eq!(
            SignerVerifier::<MockKmsClient>::default_algorithm(),
            ALGORITHM_ES256
        );
    }
}
