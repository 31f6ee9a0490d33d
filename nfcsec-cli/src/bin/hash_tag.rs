use argon2::Argon2;
use clap::Parser;
use nfcsec_lib::validator::hash_tag_id;
use std::error::Error;

/// Print salted Argon2id hashes of tag UIDs for the `hashed_tags` config list
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// One or more tag UIDs
    #[arg(required = true)]
    uids: Vec<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let argon2 = Argon2::default();

    for uid in &cli.uids {
        println!("{}", hash_tag_id(uid, &argon2)?);
    }

    Ok(())
}
