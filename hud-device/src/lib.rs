//! Device-side frame router and receivers for the vehicle HUD data
//! pipeline.
//!
//! Deliberately not built on an async runtime: the receive path runs on
//! a plain `std::thread` against a blocking [`transport::DeviceTransport`],
//! and every buffer a [`receiver::Receiver`] touches is sized once at
//! construction rather than grown on demand.

pub mod config;
pub mod error;
pub mod imgf;
pub mod msgf;
pub mod receiver;
pub mod router;
pub mod transport;

pub use config::{ReceiverConfig, RouterConfig};
pub use error::{ReceiverBuildError, RouterError};
pub use imgf::{ImgOverwritePolicy, ImgToken, ImgfReceiver, PolicedImgfReceiver};
pub use msgf::MsgfReceiver;
pub use receiver::Receiver;
pub use router::StreamRouter;
pub use transport::DeviceTransport;
