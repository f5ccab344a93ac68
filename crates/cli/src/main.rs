//! # Pipesign CLI
//!
//! パイプライン実行レコードへの署名付与・取得を行うコマンドライン
//! ツール。KMSとリソースストアへの接続は環境変数で設定する
//! （[`config::CliConfig`]）。

mod config;

use std::path::PathBuf;

use anyhow::Context;
use base64::Engine;
use clap::{Parser, Subcommand};

use pipesign_kms::client::HttpKmsClient;
use pipesign_kms::SignerVerifier;
use pipesign_store::client::HttpRecordClient;
use pipesign_store::RecordBackend;
use pipesign_types::{PayloadFormat, StorageOpts};

use config::CliConfig;

/// 標準Base64（パディングあり）エンジン
fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

#[derive(Parser)]
#[command(name = "pipesign", about = "実行レコードへの署名付与・取得")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// 取得対象のマテリアル種別
#[derive(Debug, Clone, Copy)]
enum Material {
    Payload,
    Signature,
}

impl std::str::FromStr for Material {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payload" => Ok(Material::Payload),
            "signature" => Ok(Material::Signature),
            other => Err(format!("未知のマテリアル種別です: {other}")),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// ペイロードファイルに署名し、DER署名をBase64で出力する
    Sign {
        /// 署名対象のペイロードファイル
        payload: PathBuf,
    },
    /// Base64のDER署名をペイロードに対して検証する
    Verify {
        /// 検証対象のペイロードファイル
        payload: PathBuf,
        /// Base64エンコードされたDER署名
        #[arg(long)]
        signature: String,
    },
    /// 公開鍵を取得してBase64で出力する
    Pubkey,
    /// KMSに新しい鍵を作成し、公開鍵をBase64で出力する
    CreateKey {
        /// 鍵アルゴリズム
        #[arg(long, default_value = pipesign_kms::ALGORITHM_ES256)]
        algorithm: String,
    },
    /// 対応する署名アルゴリズムを一覧する
    Algorithms,
    /// ペイロードに署名し、実行レコードへ格納する
    Attach {
        /// 署名対象のペイロードファイル
        payload: PathBuf,
        /// レコードのnamespace
        #[arg(long)]
        namespace: String,
        /// レコード名
        #[arg(long)]
        record: String,
        /// スロットキー（例: ステップ名）
        #[arg(long)]
        slot: String,
        /// ペイロード形式
        #[arg(long, default_value = "native")]
        format: PayloadFormat,
        /// 証明書（PEM）ファイル
        #[arg(long)]
        cert: Option<PathBuf>,
        /// 証明書チェーン（PEM）ファイル
        #[arg(long)]
        chain: Option<PathBuf>,
    },
    /// 実行レコードから署名マテリアルを取得する
    Fetch {
        /// レコードのnamespace
        #[arg(long)]
        namespace: String,
        /// レコード名
        #[arg(long)]
        record: String,
        /// スロットキー
        #[arg(long)]
        slot: String,
        /// 取得対象（payload / signature）
        #[arg(long, default_value = "payload")]
        material: Material,
        /// ペイロード形式
        #[arg(long, default_value = "native")]
        format: PayloadFormat,
    },
}

/// KMSクライアントとSignerVerifierを構築する。
fn signer(config: &CliConfig) -> anyhow::Result<SignerVerifier<HttpKmsClient>> {
    SignerVerifier::load(&config.kms_uri, None)
        .with_context(|| format!("KMSロケータの解決に失敗しました: {}", config.kms_uri))
}

/// 対象レコードに束縛されたストレージバックエンドを構築する。
fn record_backend(
    config: &CliConfig,
    namespace: &str,
    record: &str,
) -> anyhow::Result<RecordBackend<HttpRecordClient>> {
    let client = HttpRecordClient::new(&config.record_url)
        .with_context(|| format!("リソースストアへの接続設定が不正です: {}", config.record_url))?;
    Ok(RecordBackend::new(client, namespace, record))
}

fn read_optional(path: &Option<PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("ファイルの読み込みに失敗しました: {}", path.display())),
        None => Ok(String::new()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let config = CliConfig::from_env();

    match cli.command {
        Command::Sign { payload } => {
            let message = std::fs::read(&payload)?;
            let der_sig = signer(&config)?.sign_message(&message).await?;
            println!("{}", b64().encode(der_sig));
        }
        Command::Verify { payload, signature } => {
            let message = std::fs::read(&payload)?;
            let der_sig = b64()
                .decode(signature.trim())
                .context("署名が不正なBase64です")?;
            signer(&config)?.verify_message(&der_sig, &message).await?;
            println!("OK");
        }
        Command::Pubkey => {
            let public_key = signer(&config)?.public_key().await?;
            println!("{}", b64().encode(public_key));
        }
        Command::CreateKey { algorithm } => {
            let public_key = signer(&config)?.create_key(&algorithm).await?;
            println!("{}", b64().encode(public_key));
        }
        Command::Algorithms => {
            for algorithm in SignerVerifier::<HttpKmsClient>::supported_algorithms() {
                println!("{algorithm}");
            }
        }
        Command::Attach {
            payload,
            namespace,
            record,
            slot,
            format,
            cert,
            chain,
        } => {
            let message = std::fs::read(&payload)?;
            let der_sig = signer(&config)?.sign_message(&message).await?;

            let opts = StorageOpts {
                key: slot,
                cert: read_optional(&cert)?,
                chain: read_optional(&chain)?,
                payload_format: format,
            };
            let backend = record_backend(&config, &namespace, &record)?;
            backend
                .store_payload(&message, &b64().encode(&der_sig), &opts)
                .await?;
            tracing::info!(
                namespace = %namespace,
                record = %record,
                slot = %opts.key,
                backend = backend.backend_type(),
                "署名マテリアルを格納しました"
            );
        }
        Command::Fetch {
            namespace,
            record,
            slot,
            material,
            format,
        } => {
            let opts = StorageOpts::new(slot, format);
            let backend = record_backend(&config, &namespace, &record)?;
            let value = match material {
                Material::Payload => backend.retrieve_payload(&opts).await?,
                Material::Signature => backend.retrieve_signature(&opts).await?,
            };
            match value {
                // 取得結果は不透明なバイト列。テキストならそのまま、
                // バイナリならBase64で出力する
                Some(value) => match String::from_utf8(value) {
                    Ok(text) => println!("{text}"),
                    Err(e) => println!("{}", b64().encode(e.into_bytes())),
                },
                None => tracing::info!("スロットにマテリアルは格納されていません"),
            }
        }
    }
    Ok(())
}
