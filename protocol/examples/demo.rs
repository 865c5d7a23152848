//! Terminal walkthrough of one bill of lading through the ledger.
//!
//! Constructs a record, seals its properties, opens them again, signs it and
//! broadcasts it, printing the record state after every step.
//!
//! Run with:
//!   cargo run --example demo --release

use std::sync::Arc;
use std::time::Instant;

use bftx_protocol::broadcast::LocalBroadcaster;
use bftx_protocol::keystore::LedgerKeys;
use bftx_protocol::lifecycle::LifecycleResult;
use bftx_protocol::transaction::{IssueDetails, Properties};
use bftx_protocol::{Ledger, Transaction, TransactionLifecycle};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!("{BG_BLUE}{BOLD}{WHITE}                                                          {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    BFTX LEDGER  --  Bill of Lading Lifecycle             {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    AES-256-GCM  |  Ed25519  |  BLAKE3 app hash           {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}                                                          {RESET}");
    println!();
}

fn section(num: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]================================================{RESET}");
    println!("{BOLD}{WHITE}  {title}{RESET}");
}

fn success(text: &str) {
    println!("{GREEN}  [OK] {text}{RESET}");
}

fn info(label: &str, value: &str) {
    println!("{WHITE}  {BOLD}{label}:{RESET} {YELLOW}{value}{RESET}");
}

fn timing(label: &str, elapsed: std::time::Duration) {
    let ms = elapsed.as_secs_f64() * 1000.0;
    println!("{DIM}{MAGENTA}  [{label}: {ms:.2} ms]{RESET}");
}

fn short(hex: &str) -> String {
    if hex.len() <= 16 {
        return hex.to_string();
    }
    format!("{}...{}", &hex[..8], &hex[hex.len() - 8..])
}

fn record(tx: &Transaction) {
    info("Id", &short(&tx.id));
    info("Shipper", &tx.properties.shipper);
    info("Private", &short(&tx.private));
    info("Signature", &short(&tx.signature));
    info("Verified", &tx.verified.to_string());
    info("Transmitted", &tx.transmitted.to_string());
    info("BlockHeight", &tx.block_height.to_string());
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> LifecycleResult<()> {
    let demo_start = Instant::now();
    banner();

    let broadcaster = Arc::new(LocalBroadcaster::new());
    let ledger = Ledger::temporary(LedgerKeys::generate(), broadcaster.clone())?;
    info("Signer", &short(&ledger.signer()));

    section(1, "Construct");
    let draft = Transaction {
        properties: Properties {
            shipper: "Blue Anchor Lines".into(),
            consignee: "Harbor Foods Ltd".into(),
            vessel: "MV Meridian".into(),
            port_loading: "Rotterdam".into(),
            port_discharge: "Santos".into(),
            gross_weight: 18_400,
            num_bol: 3,
            issue_details: IssueDetails {
                place_of_issue: "Rotterdam".into(),
                date_of_issue: "2026-03-01".into(),
            },
            ..Default::default()
        },
        ..Default::default()
    };
    let t = Instant::now();
    let tx = ledger.construct_bftx(draft).await?;
    timing("construct", t.elapsed());
    record(&tx);
    success("Record stored under its content hash");

    section(2, "Encrypt");
    let t = Instant::now();
    let sealed = ledger.encrypt_bftx(&tx.id).await?;
    timing("seal", t.elapsed());
    record(&sealed);
    success("Properties replaced by ciphertext");

    section(3, "Decrypt");
    let t = Instant::now();
    let opened = ledger.decrypt_bftx(&tx.id).await?;
    timing("open", t.elapsed());
    record(&opened);
    success("Properties restored");

    section(4, "Sign");
    let t = Instant::now();
    let signed = ledger.sign_bftx(&tx.id).await?;
    timing("sign + verify", t.elapsed());
    record(&signed);
    success("Signature verifies against the ledger key");

    section(5, "Broadcast");
    let t = Instant::now();
    let sent = ledger.broadcast_bftx(&tx.id).await?;
    timing("broadcast", t.elapsed());
    record(&sent);
    info("Journal", &format!("{} message(s)", broadcaster.journal().len()));

    let summary = ledger.get_info().await?;
    info("Last block height", &summary.last_block_height.to_string());
    info("App hash", &short(&summary.last_block_app_hash));
    info("Total records", &ledger.get_total().await?);

    println!();
    println!(
        "  {BOLD}{GREEN}Total demo time: {:.2}s{RESET}",
        demo_start.elapsed().as_secs_f64()
    );
    println!();
    Ok(())
}
