//! Wallet error taxonomy.
//!
//! Every adapter, the coin selector and the HTTP collaborator report failures through
//! [`WalletError`]. Upstream messages are carried verbatim.

/// Errors surfaced by adapters and the funding/PSBT core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// The brand's injected global is absent (wallet not installed).
    #[error("{0} not found")]
    ProviderNotFound(String),
    /// The user declined the connection request in the wallet UI.
    #[error("Connection to {0} was rejected")]
    ConnectionRejected(String),
    #[error("{0} not connected")]
    NotConnected(String),
    #[error("Insufficient funds for the transaction: required {required} sats, available {available} sats")]
    InsufficientFunds { required: u64, available: u64 },
    #[error("No inputs available for the transaction")]
    NoInputsAvailable,
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),
    /// Injected wallet call or HTTP request failed.
    #[error("{0}")]
    Upstream(String),
    /// Malformed hex, PSBT, address or response shape.
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// QR handshake with an airgapped signer failed, was canceled or timed out.
    #[error("{0}")]
    Airgap(String),
}

pub type WalletResult<T> = Result<T, WalletError>;

impl WalletError {
    pub fn upstream(message: impl Into<String>) -> Self { Self::Upstream(message.into()) }
    pub fn invalid(message: impl std::fmt::Display) -> Self { Self::InvalidData(message.to_string()) }

    /// Message of the underlying failure without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            WalletError::Upstream(m) | WalletError::Airgap(m) => m.clone(),
            other => other.to_string(),
        }
    }

    /// Maps a failed connect handshake: messages mentioning a rejection become
    /// [`WalletError::ConnectionRejected`], anything else passes through.
    pub fn on_connect(self, wallet: &str) -> Self {
        match self {
            WalletError::Upstream(m) if m.to_ascii_lowercase().contains("rejected") => {
                WalletError::ConnectionRejected(wallet.to_string())
            }
            other => other,
        }
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self { WalletError::Upstream(err.to_string()) }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self { WalletError::InvalidData(err.to_string()) }
}

impl From<hex::FromHexError> for WalletError {
    fn from(err: hex::FromHexError) -> Self { WalletError::InvalidData(format!("hex: {}", err)) }
}

impl From<bitcoin::psbt::Error> for WalletError {
    fn from(err: bitcoin::psbt::Error) -> Self { WalletError::InvalidData(format!("psbt: {}", err)) }
}

impl From<bitcoin::address::ParseError> for WalletError {
    fn from(err: bitcoin::address::ParseError) -> Self { WalletError::InvalidData(format!("address: {}", err)) }
}
