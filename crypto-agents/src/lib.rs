pub mod agents;
pub mod api;
pub mod error;
pub mod manager;
pub mod middleware;
pub mod models;
pub mod monitoring;
pub mod routes;
pub mod sentiment;

// Re-export main components
pub use agents::{
    Action,
    Agent,
    CopyBotAgent,
    CopyBotDeps,
    ExecutionReport,
    Recommendation,
    SentimentAgent,
    SentimentDeps,
    Strategy,
    TradeOutcome,
    TradingParams,
};
pub use error::{ManagerError, ManagerResult};
pub use manager::InstanceManager;
pub use models::{InstanceConfig, InstanceMetrics, PortfolioPosition, TradingInstance};
pub use monitoring::{PerformanceMonitor, SystemMonitor};
