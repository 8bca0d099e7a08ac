mod host;
mod store;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use cardshare::pcsc::PcscReader;
use cardshare::{
    ndef, Card, CardSource, CardType, Config, ExchangeController, Host, ShareModal, ShareOutcome,
};
use clap::{Parser, Subcommand};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};
use tracing_subscriber::EnvFilter;

use crate::host::ConsoleHost;
use crate::store::{FileStore, StaticAuth};

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error(transparent)]
    Share(#[from] cardshare::Error),

    #[error("The message is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("The message carries no text record: {0}")]
    Ndef(#[from] ndef::Error),

    #[error("The text record is not a card: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Error occurred on the terminal: {0}")]
    Io(#[from] std::io::Error),

    #[error("You have no cards to share")]
    NoCards,
}

type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Message to print on exit. Errors of the share flow were already shown by the host.
    fn message(&self) -> Option<String> {
        match self {
            Self::Share(_) => None,
            e => Some(e.to_string()),
        }
    }
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// JSON file standing in for the document store.
    #[arg(short, long, default_value = "wallet.json")]
    store: PathBuf,

    /// Id of the signed-in user.
    #[arg(short, long)]
    user: Option<String>,

    /// Seconds to wait for a tag.
    #[arg(short, long, default_value_t = 30)]
    timeout: u64,

    /// Language code written in the text record.
    #[arg(short, long, default_value = "en")]
    language: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists your cards.
    List {
        /// Only lists the cards of the type (Student, Work or Personal).
        #[arg(long = "type")]
        card_type: Option<CardType>,
    },

    /// Writes one of your cards to a tag.
    Share,

    /// Reads a card from a tag.
    Receive,

    /// Decodes a card from an NDEF message written in hex.
    Decode { message: String },
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            peer_timeout: Duration::from_secs(self.timeout),
            language: self.language.clone(),
            ..Config::default()
        }
    }

    fn source(&self, config: &Config) -> CardSource<StaticAuth, FileStore> {
        CardSource::new(
            StaticAuth(self.user.clone()),
            FileStore::new(&self.store),
            config,
        )
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(message) = e.message() {
                eprintln!("Error: {}", message);
            }

            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config();

    match &cli.command {
        Commands::List { card_type } => list(&cli, config, *card_type).await,
        Commands::Share => share(&cli, config).await,
        Commands::Receive => receive(config).await,
        Commands::Decode { message } => decode(message),
    }
}

async fn list(cli: &Cli, config: Config, card_type: Option<CardType>) -> Result<()> {
    let cards = cli
        .source(&config)
        .fetch()
        .await
        .inspect_err(|e| ConsoleHost.alert(e))?;

    for card in filter(cards, card_type) {
        println!("{}\t{}", card.id, card);
    }

    Ok(())
}

async fn share(cli: &Cli, config: Config) -> Result<()> {
    let source = cli.source(&config);
    let modal = ShareModal::new(ExchangeController::new(
        PcscReader::default(),
        ConsoleHost,
        config,
    ));

    let cards = modal.mount(&source).await?;
    if cards.is_empty() {
        return Err(Error::NoCards);
    }

    modal.set_visible(true).await?;
    let result = choose_and_share(&modal, &cards).await;
    modal.set_visible(false).await?;

    result
}

async fn choose_and_share(
    modal: &ShareModal<PcscReader, ConsoleHost>,
    cards: &[Card],
) -> Result<()> {
    eprintln!("Hold a tag near the reader...");
    if modal.controller().wait_for_peer().await?.is_none() {
        return Ok(());
    }

    let items = cards.iter().map(ToString::to_string).collect::<Vec<_>>();
    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Card to share")
        .items(&items)
        .default(0)
        .interact()?;

    let card = &cards[index];
    modal.choose(&card.id);

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Share {}?", card.full_name()))
        .default(true)
        .interact()?;
    if !confirmed {
        return Ok(());
    }

    if let ShareOutcome::Shared(card) = modal.confirm().await? {
        println!("{}", card.to_payload()?);
    }

    Ok(())
}

async fn receive(config: Config) -> Result<()> {
    let controller = ExchangeController::new(PcscReader::default(), ConsoleHost, config);

    controller.activate().await?;
    eprintln!("Hold a tag near the reader...");

    let received = match controller.wait_for_peer().await? {
        Some(_) => controller.receive().await,
        None => Ok(None),
    };
    controller.deactivate().await;

    if let Some(card) = received? {
        println!("{}", serde_json::to_string_pretty(&card)?);
    }

    Ok(())
}

fn filter(cards: Vec<Card>, card_type: Option<CardType>) -> Vec<Card> {
    cards
        .into_iter()
        .filter(|card| card_type.map_or(true, |t| t == card.card_type))
        .collect()
}

fn decode(message: &str) -> Result<()> {
    let bytes = hex::decode(message.replace([' ', ':'], ""))?;
    let text = ndef::decode_text_record(&bytes)?;
    let card = Card::from_payload(&text.text)?;

    println!("{}", serde_json::to_string_pretty(&card)?);

    Ok(())
}
