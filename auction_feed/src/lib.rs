mod errors;
mod feed;
mod session;
pub mod types;
mod user_agent;
pub use self::errors::FeedError;
pub use self::feed::{load_descriptors, parse_descriptors};
pub use self::session::{cookie_domain, SessionContext};
pub use self::types::AuctionDescriptor;
pub use self::user_agent::get_user_agent;
