mod descriptor;
pub use self::descriptor::AuctionDescriptor;
