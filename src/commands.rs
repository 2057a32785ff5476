//! Voice command dispatch
//!
//! Maps a transcript onto the wallet command taxonomy by keyword, runs the
//! matching wallet action and produces the reply to speak.

use std::fmt;
use std::sync::Arc;

use crate::notify::{Notice, SharedNotifier};
use crate::wallet::WalletActions;

/// Recognized wallet commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletCommand {
    Balance,
    Stake,
    Send,
    Market,
    Alert,
    ConnectWallet,
    DisconnectWallet,
    Unknown,
}

/// Keywords per command, checked in order, case-insensitive
const KEYWORDS: &[(WalletCommand, &[&str])] = &[
    (WalletCommand::Alert, &["alert", "notify me"]),
    (WalletCommand::DisconnectWallet, &["disconnect"]),
    (WalletCommand::ConnectWallet, &["connect"]),
    (WalletCommand::Stake, &["stake", "staking"]),
    (WalletCommand::Send, &["send", "transfer"]),
    (WalletCommand::Balance, &["balance", "portfolio", "worth", "holdings"]),
    (WalletCommand::Market, &["price", "market", "trend"]),
];

/// Tokens the demo wallet knows about
const TOKENS: &[&str] = &["SOL", "USDC", "BONK"];

/// Demo SOL price quoted by market commands
const DEMO_SOL_PRICE: f64 = 142.35;

impl WalletCommand {
    /// Match a transcript against the keyword table
    #[must_use]
    pub fn parse(transcript: &str) -> Self {
        let lower = transcript.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map_or(Self::Unknown, |(command, _)| *command)
    }
}

impl fmt::Display for WalletCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Balance => "balance",
            Self::Stake => "stake",
            Self::Send => "send",
            Self::Market => "market",
            Self::Alert => "alert",
            Self::ConnectWallet => "connect",
            Self::DisconnectWallet => "disconnect",
            Self::Unknown => "unknown",
        })
    }
}

/// Result of dispatching one transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub command: WalletCommand,
    /// Reply text to show and optionally speak
    pub reply: String,
}

/// Routes transcripts to wallet actions
pub struct CommandDispatcher {
    wallet: Arc<dyn WalletActions>,
    notifier: SharedNotifier,
}

impl CommandDispatcher {
    #[must_use]
    pub fn new(wallet: Arc<dyn WalletActions>, notifier: SharedNotifier) -> Self {
        Self { wallet, notifier }
    }

    /// Interpret `transcript` and run the matching action
    pub fn dispatch(&self, transcript: &str) -> DispatchOutcome {
        let command = WalletCommand::parse(transcript);
        tracing::info!(%command, transcript, "dispatching voice command");

        let amount = extract_amount(transcript);
        let token = extract_token(transcript);

        let reply = match command {
            WalletCommand::Balance => self.balance(),
            WalletCommand::Stake => {
                let amount = amount.unwrap_or(1.0);
                self.signed("Stake", &format!("stake {amount} {token}"), || {
                    format!("Staking {amount} {token} for maximum yield.")
                })
            }
            WalletCommand::Send => {
                let amount = amount.unwrap_or(1.0);
                self.signed("Send", &format!("send {amount} {token}"), || {
                    format!("Sending {amount} {token}.")
                })
            }
            WalletCommand::Market => {
                let reply = format!("SOL is trading at ${DEMO_SOL_PRICE:.2}, up 3.2% today.");
                self.notifier.notify(Notice::info("Market", reply.clone()));
                reply
            }
            WalletCommand::Alert => {
                let reply = match amount {
                    Some(price) => format!("Alert set for {token} at ${price}."),
                    None => format!("Alert set for {token} price moves."),
                };
                self.notifier.notify(Notice::info("Price alert", reply.clone()));
                reply
            }
            WalletCommand::ConnectWallet => self.connect(),
            WalletCommand::DisconnectWallet => {
                self.wallet.disconnect();
                self.notifier
                    .notify(Notice::info("Wallet", "Wallet disconnected"));
                "Wallet disconnected.".to_string()
            }
            WalletCommand::Unknown => {
                let reply = format!("Sorry, I didn't recognize a wallet command in \"{transcript}\".");
                self.notifier
                    .notify(Notice::info("Command not recognized", transcript));
                reply
            }
        };

        DispatchOutcome { command, reply }
    }

    fn balance(&self) -> String {
        let listed: Vec<String> = self
            .wallet
            .balances()
            .iter()
            .map(|b| format!("{} {}", b.amount, b.symbol))
            .collect();
        let reply = format!("You have {}.", listed.join(", "));
        self.notifier.notify(Notice::info("Balance", reply.clone()));
        reply
    }

    fn connect(&self) -> String {
        match self.wallet.connect() {
            Ok(address) => {
                self.notifier
                    .notify(Notice::info("Wallet", format!("Connected {address}")));
                "Wallet connected.".to_string()
            }
            Err(e) => {
                self.notifier
                    .notify(Notice::error("Wallet", e.to_string()));
                "I couldn't connect your wallet.".to_string()
            }
        }
    }

    fn signed(&self, title: &str, summary: &str, reply: impl FnOnce() -> String) -> String {
        match self.wallet.request_signature(summary) {
            Ok(signature) => {
                let reply = reply();
                self.notifier
                    .notify(Notice::info(title, format!("{reply} ({signature})")));
                reply
            }
            Err(e) => {
                tracing::warn!(summary, error = %e, "wallet action refused");
                self.notifier.notify(Notice::warning(title, e.to_string()));
                format!("Connect your wallet first to {}.", title.to_lowercase())
            }
        }
    }
}

/// First number in the transcript, ignoring `$` and thousands separators
fn extract_amount(transcript: &str) -> Option<f64> {
    transcript.split_whitespace().find_map(|word| {
        let cleaned: String = word
            .chars()
            .filter(|c| !matches!(c, '$' | ','))
            .collect();
        cleaned
            .trim_end_matches(['.', '?', '!'])
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
    })
}

/// First known token symbol in the transcript, SOL by default
fn extract_token(transcript: &str) -> &'static str {
    let upper = transcript.to_uppercase();
    upper
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find_map(|word| TOKENS.iter().find(|t| **t == word).copied())
        .unwrap_or("SOL")
}
