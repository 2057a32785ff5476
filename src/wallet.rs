//! Wallet capability seam
//!
//! Wallet SDKs are opaque: they connect, disconnect and sign. Balances are
//! fixed demo values held in memory.

use std::sync::Mutex;

use crate::{Error, Result};

/// A token balance shown to the user
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBalance {
    pub symbol: &'static str,
    pub amount: f64,
}

/// Capabilities the command dispatcher needs from a wallet
pub trait WalletActions: Send + Sync {
    /// Connect and return the wallet address
    ///
    /// # Errors
    ///
    /// Returns [`Error::Wallet`] if the wallet refuses the connection
    fn connect(&self) -> Result<String>;

    fn disconnect(&self);

    /// Address of the connected wallet
    fn address(&self) -> Option<String>;

    fn balances(&self) -> Vec<TokenBalance>;

    /// Ask the wallet to sign an action described by `summary`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Wallet`] if no wallet is connected or signing fails
    fn request_signature(&self, summary: &str) -> Result<String>;
}

/// Demo wallet address
pub const DEMO_ADDRESS: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

/// In-memory wallet with hard-coded balances
#[derive(Debug, Default)]
pub struct DemoWallet {
    connected: Mutex<bool>,
    signatures: Mutex<u32>,
}

impl DemoWallet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wallet that starts connected
    #[must_use]
    pub fn connected() -> Self {
        Self {
            connected: Mutex::new(true),
            ..Self::default()
        }
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WalletActions for DemoWallet {
    fn connect(&self) -> Result<String> {
        *self.connected.lock().unwrap_or_else(|e| e.into_inner()) = true;
        tracing::info!(address = DEMO_ADDRESS, "wallet connected");
        Ok(DEMO_ADDRESS.to_string())
    }

    fn disconnect(&self) {
        *self.connected.lock().unwrap_or_else(|e| e.into_inner()) = false;
        tracing::info!("wallet disconnected");
    }

    fn address(&self) -> Option<String> {
        self.is_connected().then(|| DEMO_ADDRESS.to_string())
    }

    fn balances(&self) -> Vec<TokenBalance> {
        vec![
            TokenBalance {
                symbol: "SOL",
                amount: 12.5,
            },
            TokenBalance {
                symbol: "USDC",
                amount: 250.0,
            },
            TokenBalance {
                symbol: "BONK",
                amount: 1_000_000.0,
            },
        ]
    }

    fn request_signature(&self, summary: &str) -> Result<String> {
        if !self.is_connected() {
            return Err(Error::Wallet("no wallet connected".to_string()));
        }

        let mut count = self.signatures.lock().unwrap_or_else(|e| e.into_inner());
        *count += 1;
        tracing::info!(summary, signature = *count, "demo signature issued");
        Ok(format!("demo-signature-{count}"))
    }
}
