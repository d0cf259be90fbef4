//! Stream connections

pub mod stream;

pub use stream::{StreamConnection, StreamOptions};

#[cfg(test)]
mod tests;
