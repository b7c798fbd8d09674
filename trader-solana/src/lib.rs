pub mod birdeye;
pub mod error;
pub mod jupiter;
pub mod rpc;
pub mod traits;

pub use birdeye::{client::BirdeyeClient, types::Candle};
pub use error::{Result, TraderError};
pub use jupiter::{client::JupiterClient, types::Quote};
pub use rpc::{client::SolanaRpcClient, types::TokenBalance};
pub use traits::{ChainClient, MarketDataClient, SwapClient};

pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;
