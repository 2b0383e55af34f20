//! Owner identity resolution
//!
//! Every conversation belongs to an owner. Authentication is out of scope, so
//! the server runs with one configured identity behind this seam.

use crate::chat::models::Owner;

/// Resolves the identity on whose behalf a request runs
pub trait OwnerResolver: Send + Sync {
    /// The owner for the current request
    fn resolve(&self) -> Owner;
}

/// Always resolves to the same configured owner
#[derive(Debug, Clone)]
pub struct FixedOwnerResolver {
    owner: Owner,
}

impl FixedOwnerResolver {
    /// Create a resolver for the given identity
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            owner: Owner {
                id: id.into(),
                email: email.into(),
            },
        }
    }
}

impl OwnerResolver for FixedOwnerResolver {
    fn resolve(&self) -> Owner {
        self.owner.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_resolver_returns_configured_owner() {
        let resolver = FixedOwnerResolver::new("owner-1", "me@example.com");
        let owner = resolver.resolve();
        assert_eq!(owner.id, "owner-1");
        assert_eq!(owner.email, "me@example.com");
        assert_eq!(resolver.resolve(), owner);
    }
}
