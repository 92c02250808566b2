//! Command-line tool for GlobalPlatform SCP02 computations
//!
//! This binary works offline on hex inputs: key check values, session key
//! derivation, channel establishment from a recorded INITIALIZE UPDATE
//! response, command wrapping, and BER-TLV dumps.

use clap::{Args, Parser, Subcommand, ValueEnum};
use hex::FromHex;
use nexum_apdu_core::Command;
use nexum_apdu_globalplatform::{
    KeyType, ProtectionOrder, Scp02Session, SecurityLevel, StaticKeys, Tlv,
    crypto::{Scp02Key, key_check_value},
    tlv::{self, Value},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the key check value of a key
    Kcv {
        /// Key (hex)
        #[arg(short, long)]
        key: String,

        /// Key algorithm
        #[arg(short = 't', long, value_enum, default_value = "des")]
        key_type: KeyTypeArg,
    },

    /// Derive SCP02 session keys from static keys
    Derive {
        #[command(flatten)]
        keys: KeyArgs,

        /// Sequence counter (2 bytes hex)
        #[arg(short, long)]
        sequence_counter: String,
    },

    /// Establish a session from a recorded INITIALIZE UPDATE exchange
    Establish {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Establish a session and wrap commands in sending order
    Secure {
        #[command(flatten)]
        session: SessionArgs,

        /// Command APDUs to wrap after EXTERNAL AUTHENTICATE (hex)
        #[arg(short, long = "command", required = true)]
        commands: Vec<String>,
    },

    /// Decode BER-TLV data
    Tlv {
        /// Encoded data (hex)
        data: String,
    },
}

#[derive(Args)]
struct KeyArgs {
    /// Use one key (hex) for ENC, MAC and DEK
    #[arg(short, long, conflicts_with_all = ["enc", "mac", "dek"])]
    key: Option<String>,

    /// ENC key (hex)
    #[arg(long, requires_all = ["mac", "dek"])]
    enc: Option<String>,

    /// MAC key (hex)
    #[arg(long)]
    mac: Option<String>,

    /// DEK key (hex)
    #[arg(long)]
    dek: Option<String>,
}

#[derive(Args)]
struct SessionArgs {
    #[command(flatten)]
    keys: KeyArgs,

    /// Host challenge sent with INITIALIZE UPDATE (8 bytes hex)
    #[arg(long)]
    host_challenge: String,

    /// INITIALIZE UPDATE response, with or without status word (hex)
    #[arg(short, long)]
    response: String,

    /// Security level requested in EXTERNAL AUTHENTICATE
    #[arg(short, long, value_enum, default_value = "c-mac")]
    level: LevelArg,

    /// Order of MAC and encryption when both apply
    #[arg(long, value_enum, default_value = "mac-then-encrypt")]
    order: OrderArg,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum KeyTypeArg {
    /// DES family key (8, 16 or 24 bytes)
    Des,
    /// AES key (16, 24 or 32 bytes)
    Aes,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LevelArg {
    /// Authentication only
    Authenticated,
    /// Command MAC
    CMac,
    /// Command MAC and encryption
    CDecryption,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OrderArg {
    /// MAC over plain data
    MacThenEncrypt,
    /// MAC over encrypted data
    EncryptThenMac,
}

impl From<KeyTypeArg> for KeyType {
    fn from(arg: KeyTypeArg) -> Self {
        match arg {
            KeyTypeArg::Des => Self::Des,
            KeyTypeArg::Aes => Self::Aes,
        }
    }
}

impl From<LevelArg> for SecurityLevel {
    fn from(arg: LevelArg) -> Self {
        match arg {
            LevelArg::Authenticated => Self::Authenticated,
            LevelArg::CMac => Self::CMac,
            LevelArg::CDecryption => Self::CDecryption,
        }
    }
}

impl From<OrderArg> for ProtectionOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::MacThenEncrypt => Self::MacThenEncrypt,
            OrderArg::EncryptThenMac => Self::EncryptThenMac,
        }
    }
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    Ok(Vec::from_hex(input.replace(' ', ""))?)
}

fn parse_key(input: &str) -> CliResult<Scp02Key> {
    let bytes = parse_hex(input)?;
    Scp02Key::try_from(bytes.as_slice())
        .map_err(|_| "Key must be 16 bytes (32 hex characters)".into())
}

impl KeyArgs {
    fn static_keys(&self) -> CliResult<StaticKeys> {
        match (&self.key, &self.enc, &self.mac, &self.dek) {
            (Some(key), ..) => Ok(StaticKeys::from_single_key(parse_key(key)?)),
            (None, Some(enc), Some(mac), Some(dek)) => Ok(StaticKeys::new(
                parse_key(enc)?,
                parse_key(mac)?,
                parse_key(dek)?,
            )),
            _ => Err("Provide --key or all of --enc, --mac and --dek".into()),
        }
    }
}

impl SessionArgs {
    fn establish(&self) -> CliResult<Scp02Session> {
        let mut session = Scp02Session::builder()
            .security_level(self.level.into())
            .keys(self.keys.static_keys()?)
            .host_challenge(parse_hex(&self.host_challenge)?)
            .initialize_update_response(parse_hex(&self.response)?)
            .protection_order(self.order.into())
            .build()?;
        session.establish()?;
        Ok(session)
    }
}

fn print_tlv(nodes: &[Tlv], depth: usize) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        match node.value() {
            Value::Primitive(bytes) => {
                println!(
                    "{indent}{} ({}): {}",
                    node.tag(),
                    bytes.len(),
                    hex::encode_upper(bytes)
                );
            }
            Value::Constructed(children) => {
                println!("{indent}{} ({})", node.tag(), node.length());
                print_tlv(children, depth + 1);
            }
        }
    }
}

fn main() -> CliResult<()> {
    // Initialize the tracing logger with env_format and ansi
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Kcv { key, key_type } => {
            let kcv = key_check_value(key_type.into(), &parse_hex(&key)?)?;
            println!("{}", hex::encode_upper(kcv));
        }

        Commands::Derive {
            keys,
            sequence_counter,
        } => {
            let counter = <[u8; 2]>::try_from(parse_hex(&sequence_counter)?.as_slice())
                .map_err(|_| "Sequence counter must be 2 bytes")?;
            let session_keys = keys.static_keys()?.derive(&counter)?;

            println!("S-ENC: {}", hex::encode_upper(session_keys.enc()));
            println!("C-MAC: {}", hex::encode_upper(session_keys.c_mac()));
            println!("R-MAC: {}", hex::encode_upper(session_keys.r_mac()));
            println!("DEK:   {}", hex::encode_upper(session_keys.dek()));
        }

        Commands::Establish { session } => {
            let session = session.establish()?;
            if let Some(cryptogram) = session.host_cryptogram() {
                println!("Card cryptogram verified.");
                println!("Host cryptogram: {}", hex::encode_upper(cryptogram));
            }
        }

        Commands::Secure { session, commands } => {
            let mut session = session.establish()?;

            let external_authenticate = session.external_authenticate()?;
            println!("{}", session.secure(&external_authenticate)?);

            for raw in &commands {
                let command = Command::from_bytes(&parse_hex(raw)?)?;
                println!("{}", session.secure(&command)?);
            }
        }

        Commands::Tlv { data } => {
            let nodes = tlv::parse(&parse_hex(&data)?)?;
            if nodes.is_empty() {
                println!("No TLV data.");
            } else {
                print_tlv(&nodes, 0);
            }
        }
    }

    Ok(())
}
