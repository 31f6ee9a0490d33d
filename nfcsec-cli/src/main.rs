use clap::Parser;
use nfcsec_lib::constants::{IV_SIZE, VERIFY_CHANNEL};
use nfcsec_lib::{Envelope, SecretKey};
use std::error::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Reader simulator: encrypt a tag UID into the envelope a reader would send
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Tag UID as hex, e.g. 9DBBDC21
    uid: String,
    /// Shared 128-bit key, 32 hex characters
    #[arg(short, long)]
    key: String,
    /// Fixed IV (16 hex characters) instead of a random one
    #[arg(long)]
    iv: Option<String>,
    /// Send the envelope to a gateway at this address
    #[arg(long)]
    connect: Option<String>,
    /// Channel to publish on when connecting
    #[arg(long, default_value = VERIFY_CHANNEL)]
    channel: String,
    /// Device id presented when connecting
    #[arg(long, default_value = "AA:BB:CC:DD:EE:FF")]
    device_id: String,
    /// Device secret presented when connecting
    #[arg(long, default_value = "")]
    secret: String,
}

fn parse_iv(iv: Option<&str>) -> Result<[u8; IV_SIZE], Box<dyn Error>> {
    match iv {
        Some(encoded) => {
            let bytes = hex::decode(encoded)?;
            let len = bytes.len();
            bytes
                .try_into()
                .map_err(|_| format!("IV must be {} bytes, got {}", IV_SIZE, len).into())
        }
        None => Ok(rand::random()),
    }
}

async fn send(cli: &Cli, line: &str) -> Result<(), Box<dyn Error>> {
    let addr = cli.connect.as_deref().ok_or("no gateway address")?;
    let (reader, mut writer) = TcpStream::connect(addr).await?.into_split();
    let mut lines = BufReader::new(reader).lines();

    writer
        .write_all(format!("AUTH {} {}\n", cli.device_id, cli.secret).as_bytes())
        .await?;
    let reply = lines.next_line().await?.unwrap_or_default();
    println!("Handshake: {}", reply);
    if reply != "OK" {
        return Err("gateway refused the device credentials".into());
    }

    writer.write_all(format!("{} {}\n", cli.channel, line).as_bytes()).await?;
    match lines.next_line().await? {
        Some(response) => println!("Response: {}", response),
        None => println!("Gateway closed the connection without responding"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let key = SecretKey::from_hex(&cli.key)?;
    let uid = hex::decode(cli.uid.trim())?;
    let iv = parse_iv(cli.iv.as_deref())?;
    debug!(uid_len = uid.len(), iv = %hex::encode(iv), "Sealing UID");

    let envelope = Envelope::seal(&uid, iv, &key)?;
    let line = envelope.to_hex();
    println!("{}", line);

    if cli.connect.is_some() {
        send(&cli, &line).await?;
    }

    Ok(())
}
