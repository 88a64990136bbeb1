mod client;

pub use client::DownstreamSession;
