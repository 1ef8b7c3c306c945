use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tally_crypto::signatures::{
    generate_keypair, recover_signer, sign_digest, signer_address, signing_key_from_bytes, to_compact,
    SigningKey,
};
use tally_crypto::typed_data::{delegation_struct_hash, permit_struct_hash};
use tally_crypto::{Digest32, SignatureAuthority};
use tally_types::{Address, Amount, Nonce};

#[derive(Parser)]
#[command(author, version, about = "Tally CLI: offline wallets and signed approvals")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, default_value = "wallet.json")]
    wallet_path: PathBuf,
}

/// Identifies the token instance a signature is bound to.
#[derive(Args, Debug, Clone)]
struct DomainArgs {
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "1")]
    domain_version: String,
    #[arg(long)]
    chain_id: u64,
    #[arg(long)]
    verifying_contract: Address,
}

impl DomainArgs {
    fn digest(&self, struct_hash: &Digest32) -> Digest32 {
        SignatureAuthority::new(&self.name, &self.domain_version, self.verifying_contract, self.chain_id)
            .build_digest(self.chain_id, struct_hash)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new wallet
    Init,
    /// Show current wallet info
    Show,
    /// Sign a permit granting `spender` an allowance
    SignPermit {
        #[command(flatten)]
        domain: DomainArgs,
        #[arg(long)]
        spender: Address,
        #[arg(long)]
        value: Amount,
        #[arg(long)]
        nonce: Nonce,
        #[arg(long)]
        deadline: u64,
        /// Emit the 64-byte compact signature form
        #[arg(long)]
        compact: bool,
    },
    /// Sign a vote delegation
    SignDelegation {
        #[command(flatten)]
        domain: DomainArgs,
        #[arg(long)]
        delegatee: Address,
        #[arg(long)]
        nonce: Nonce,
        #[arg(long)]
        expiry: u64,
        #[arg(long)]
        compact: bool,
    },
    /// Recover the signer of a digest
    Recover {
        #[arg(long)]
        digest: String,
        #[arg(long)]
        signature: String,
    },
}

#[derive(Serialize, Deserialize)]
struct Wallet {
    secret_key: String,
    address: Address,
}

impl Wallet {
    fn generate() -> Self {
        let key = generate_keypair();
        Self {
            secret_key: hex::encode(key.to_bytes()),
            address: signer_address(&key),
        }
    }

    fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn to_keypair(&self) -> Result<SigningKey> {
        let secret = hex::decode(&self.secret_key)?;
        let key = signing_key_from_bytes(&secret)?;
        if signer_address(&key) != self.address {
            return Err(anyhow!("wallet address does not match its secret key"));
        }
        Ok(key)
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct SignedPermit {
    owner: Address,
    spender: Address,
    value: Amount,
    nonce: Nonce,
    deadline: u64,
    digest: String,
    signature: String,
}

#[derive(Serialize, Deserialize, Debug)]
struct SignedDelegation {
    signer: Address,
    delegatee: Address,
    nonce: Nonce,
    expiry: u64,
    digest: String,
    signature: String,
}

fn encode_signature(key: &SigningKey, digest: &Digest32, compact: bool) -> Result<String> {
    let full = sign_digest(key, digest)?;
    Ok(if compact {
        hex::encode(to_compact(&full)?)
    } else {
        hex::encode(full)
    })
}

fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let digits = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(digits).with_context(|| format!("invalid hex: {}", input))
}

#[allow(clippy::too_many_arguments)]
fn sign_permit(
    key: &SigningKey,
    domain: &DomainArgs,
    spender: Address,
    value: Amount,
    nonce: Nonce,
    deadline: u64,
    compact: bool,
) -> Result<SignedPermit> {
    let owner = signer_address(key);
    let digest = domain.digest(&permit_struct_hash(&owner, &spender, value, nonce, deadline));
    Ok(SignedPermit {
        owner,
        spender,
        value,
        nonce,
        deadline,
        digest: hex::encode(digest),
        signature: encode_signature(key, &digest, compact)?,
    })
}

fn sign_delegation(
    key: &SigningKey,
    domain: &DomainArgs,
    delegatee: Address,
    nonce: Nonce,
    expiry: u64,
    compact: bool,
) -> Result<SignedDelegation> {
    let digest = domain.digest(&delegation_struct_hash(&delegatee, nonce, expiry));
    Ok(SignedDelegation {
        signer: signer_address(key),
        delegatee,
        nonce,
        expiry,
        digest: hex::encode(digest),
        signature: encode_signature(key, &digest, compact)?,
    })
}

fn recover(digest: &str, signature: &str) -> Result<Address> {
    let digest: Digest32 = decode_hex(digest)?
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("digest must be 32 bytes"))?;
    Ok(recover_signer(&digest, &decode_hex(signature)?)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let wallet = Wallet::generate();
            wallet.save(&cli.wallet_path)?;
            println!("Wallet initialized at {:?}", cli.wallet_path);
            println!("Address: {}", wallet.address);
        }
        Commands::Show => {
            let wallet = Wallet::load(&cli.wallet_path)?;
            println!("Wallet: {:?}", cli.wallet_path);
            println!("Address: {}", wallet.address);
        }
        Commands::SignPermit {
            domain,
            spender,
            value,
            nonce,
            deadline,
            compact,
        } => {
            let key = Wallet::load(&cli.wallet_path)?.to_keypair()?;
            let signed = sign_permit(&key, &domain, spender, value, nonce, deadline, compact)?;
            println!("{}", serde_json::to_string_pretty(&signed)?);
        }
        Commands::SignDelegation {
            domain,
            delegatee,
            nonce,
            expiry,
            compact,
        } => {
            let key = Wallet::load(&cli.wallet_path)?.to_keypair()?;
            let signed = sign_delegation(&key, &domain, delegatee, nonce, expiry, compact)?;
            println!("{}", serde_json::to_string_pretty(&signed)?);
        }
        Commands::Recover { digest, signature } => {
            println!("{}", recover(&digest, &signature)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> DomainArgs {
        DomainArgs {
            name: "Tally".to_string(),
            domain_version: "1".to_string(),
            chain_id: 5,
            verifying_contract: Address([0xcc; 20]),
        }
    }

    #[test]
    fn wallet_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let wallet = Wallet::generate();
        wallet.save(&path).unwrap();

        let loaded = Wallet::load(&path).unwrap();
        assert_eq!(loaded.address, wallet.address);
        assert_eq!(signer_address(&loaded.to_keypair().unwrap()), wallet.address);
    }

    #[test]
    fn tampered_wallet_is_rejected() {
        let mut wallet = Wallet::generate();
        wallet.address = Address([1; 20]);
        assert!(wallet.to_keypair().is_err());
    }

    #[test]
    fn signed_permit_recovers_to_owner() {
        let key = signing_key_from_bytes(&[4; 32]).unwrap();
        for compact in [false, true] {
            let signed = sign_permit(&key, &domain(), Address([2; 20]), 10, 0, 99, compact).unwrap();
            assert_eq!(signed.signature.len(), if compact { 128 } else { 130 });
            assert_eq!(recover(&signed.digest, &signed.signature).unwrap(), signed.owner);
        }
    }

    #[test]
    fn delegation_digest_depends_on_chain() {
        let key = signing_key_from_bytes(&[4; 32]).unwrap();
        let home = sign_delegation(&key, &domain(), Address([3; 20]), 0, 99, false).unwrap();
        let mut other = domain();
        other.chain_id = 6;
        let fork = sign_delegation(&key, &other, Address([3; 20]), 0, 99, false).unwrap();
        assert_ne!(home.digest, fork.digest);
        assert_eq!(recover(&fork.digest, &fork.signature).unwrap(), home.signer);
    }

    #[test]
    fn recover_rejects_bad_lengths() {
        assert!(recover("00", "00").is_err());
        assert!(recover(&hex::encode([1u8; 32]), "0x0102").is_err());
    }
}
