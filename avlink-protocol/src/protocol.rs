//! Traits that let the connection layer drive either protocol
//!
//! The connection only needs to know how to serialise a request, which reply
//! kind (and zone) answers it, and how to parse a line. Everything else about
//! a protocol stays in its own module.

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::Result;

/// A command that can be written to a device
pub trait Request: Debug + Send + Sync {
    /// Reply classification shared with [`Reply::kind`]
    type Kind;

    /// Literal bytes to write, including the terminator
    fn wire(&self) -> String;

    /// Reply kind that answers this request, `None` when no reply is expected
    fn expected(&self) -> Option<Self::Kind>;

    /// 1-based zone the request addresses
    fn zone(&self) -> u8;
}

/// A parsed line received from a device
pub trait Reply: Debug + Clone + Send + Sync + 'static {
    type Kind;

    fn kind(&self) -> Self::Kind;

    fn zone(&self) -> u8;

    /// Error replies answer whatever request is pending
    fn is_error(&self) -> bool;

    /// The device refused the session credentials
    fn is_auth_failure(&self) -> bool {
        false
    }
}

/// A line protocol spoken over a persistent stream
pub trait Protocol: Send + Sync + 'static {
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;
    type Command: Request<Kind = Self::Kind>;
    type Response: Reply<Kind = Self::Kind>;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn parse(&self, line: &str) -> Result<Self::Response>;

    /// Placeholder result for a request sent without waiting
    fn no_response(&self, command: &Self::Command) -> Self::Response;

    /// Whether the device speaks first when a session opens
    fn expects_greeting(&self) -> bool {
        false
    }

    /// Handle the session greeting.
    ///
    /// Returns a prefix that must be written in front of the next command of
    /// the session, if any.
    fn greet(&self, _greeting: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// True when `reply` answers a request expecting `kind` on `zone`
pub fn correlates<R, K>(reply: &R, kind: K, zone: u8) -> bool
where
    R: Reply<Kind = K>,
    K: PartialEq,
{
    reply.is_error() || (reply.kind() == kind && reply.zone() == zone)
}
