//! Hiding sites from outer messengers

use std::collections::BTreeSet;

use crate::runtime::Runtime;
use crate::runtime::error::Result;
use crate::runtime::message::Message;
use crate::runtime::messenger::Messenger;

#[derive(Debug, Clone)]
enum Filter {
    All,
    Hide(BTreeSet<String>),
    Expose(BTreeSet<String>),
}

/// Stops stack traversal at matching sites
///
/// Messengers installed outside a block never see the blocked sites, in
/// either phase.
pub struct BlockMessenger {
    filter: Filter,
}

impl BlockMessenger {
    /// Block every site
    pub fn all() -> Self {
        Self { filter: Filter::All }
    }

    /// Block only the named sites
    pub fn hide<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filter: Filter::Hide(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Block everything except the named sites
    pub fn expose<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filter: Filter::Expose(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether a site with this name is blocked
    pub fn blocks(&self, name: &str) -> bool {
        match &self.filter {
            Filter::All => true,
            Filter::Hide(names) => names.contains(name),
            Filter::Expose(names) => !names.contains(name),
        }
    }
}

impl Messenger for BlockMessenger {
    fn name(&self) -> &'static str {
        "block"
    }

    fn pre_hook(&self, _rt: &Runtime, msg: &mut Message) -> Result<()> {
        if self.blocks(&msg.name) {
            msg.stop = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters() {
        assert!(BlockMessenger::all().blocks("x"));
        let hide = BlockMessenger::hide(["x"]);
        assert!(hide.blocks("x") && !hide.blocks("y"));
        let expose = BlockMessenger::expose(["x"]);
        assert!(!expose.blocks("x") && expose.blocks("y"));
    }
}
