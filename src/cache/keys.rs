//! Cache key definitions for logical content resources.

use std::fmt;

use uuid::Uuid;

/// One logical read served by the content service.
///
/// Limits are part of the key so that reads with different caps never share
/// an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentKey {
    /// Trending-first selection of `count` items.
    Featured { count: usize },
    /// Most recent items, capped at `limit`.
    All { limit: usize },
    /// Most recent items of one category, capped at `limit`.
    Category { id: String, limit: usize },
    /// A single item by identity.
    Item(Uuid),
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKey::Featured { count } => write!(f, "featured:{count}"),
            ContentKey::All { limit } => write!(f, "all:{limit}"),
            ContentKey::Category { id, limit } => write!(f, "category:{id}:{limit}"),
            ContentKey::Item(id) => write!(f, "item:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_stable() {
        assert_eq!(ContentKey::Featured { count: 3 }.to_string(), "featured:3");
        assert_eq!(
            ContentKey::Category {
                id: "guides".to_string(),
                limit: 12
            }
            .to_string(),
            "category:guides:12"
        );
        assert_eq!(
            ContentKey::Item(Uuid::nil()).to_string(),
            "item:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn limits_distinguish_keys() {
        assert_ne!(
            ContentKey::All { limit: 20 },
            ContentKey::All { limit: 10 }
        );
    }
}
