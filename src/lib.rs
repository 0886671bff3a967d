pub mod app;
pub mod config;
pub mod connectivity;
pub mod dns_cache;
pub mod error;
pub mod export;
pub mod ping;
pub mod ping_executor;
pub mod quality;
pub mod sampler;
pub mod session;
pub mod store;
pub mod view;

pub use app::PingPlotterApp;
pub use config::{AppConfig, ProbeBackend};
pub use connectivity::ConnectivityReport;
pub use error::{ConfigError, ExportError, SessionError};
pub use ping::{AdvancedStatistics, BasicStatistics, ExportRows, Sample};
pub use ping_executor::{IcmpPing, Probe, Prober, SystemPing};
pub use quality::Quality;
pub use session::{PingSession, SessionEvent};
pub use store::SampleStore;
pub use view::{ViewDecision, ViewRange, ViewState};
