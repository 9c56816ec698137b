pub mod address;
pub mod bridge;
pub mod errors;
pub mod models;
pub mod peer;
pub mod redirect;

pub use address::to_websocket_url;
pub use bridge::ConnectionBridge;
pub use errors::*;
pub use models::*;
pub use redirect::dial_following_redirects;
