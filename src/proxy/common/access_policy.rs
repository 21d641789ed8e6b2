// Origin admission policy

use std::collections::HashSet;

/// Whitelist entry that admits every origin
pub const WILDCARD_ORIGIN: &str = "*";

/// Whitelist/blacklist pair evaluated for every proxied request.
/// Immutable once the gateway is built; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    whitelist: HashSet<String>,
    blacklist: HashSet<String>,
}

impl OriginPolicy {
    pub fn new<W, B>(whitelist: W, blacklist: B) -> Self
    where
        W: IntoIterator<Item = String>,
        B: IntoIterator<Item = String>,
    {
        Self {
            whitelist: whitelist.into_iter().collect(),
            blacklist: blacklist.into_iter().collect(),
        }
    }

    /// Decide whether `origin` may proceed.
    ///
    /// A missing Origin header is evaluated as `""`, so whitelisting the empty
    /// string admits originless clients such as curl.
    pub fn is_allowed(&self, origin: &str) -> bool {
        if self.whitelist.contains(WILDCARD_ORIGIN) {
            return true;
        }
        if !self.whitelist.is_empty() && !self.whitelist.contains(origin) {
            return false;
        }
        if self.blacklist.contains(origin) {
            return false;
        }
        true
    }
}
