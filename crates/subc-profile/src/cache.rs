//! # Profile Cache
//!
//! Consumers look up the same providers repeatedly. `ProfileCache` keeps
//! loaded, verified profiles keyed by provider address together with the
//! content id they came from, so a profile is fetched again only when the
//! provider publishes a new document.
//!
//! The cache is an explicit value owned by the caller. There is no global
//! instance.

use std::collections::HashMap;

use subc_core::{Address, ContentId};
use subc_crypto::BlobStore;

use crate::error::ProfileError;
use crate::profile::ProviderProfile;

#[derive(Debug, Clone)]
struct CachedProfile {
    cid: ContentId,
    profile: ProviderProfile,
}

/// Loaded provider profiles keyed by provider address.
#[derive(Debug, Default, Clone)]
pub struct ProfileCache {
    entries: HashMap<Address, CachedProfile>,
}

impl ProfileCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached profile for `provider`, if any.
    pub fn get(&self, provider: &Address) -> Option<&ProviderProfile> {
        self.entries.get(provider).map(|entry| &entry.profile)
    }

    /// The content id the cached profile for `provider` was loaded from.
    pub fn cid(&self, provider: &Address) -> Option<&ContentId> {
        self.entries.get(provider).map(|entry| &entry.cid)
    }

    /// The profile `provider` published as `cid`, loading and verifying it
    /// unless that exact document is already cached.
    ///
    /// A document signed by someone other than `provider` is rejected and
    /// not cached.
    pub fn get_or_load(
        &mut self,
        store: &dyn BlobStore,
        provider: Address,
        cid: &ContentId,
    ) -> Result<&ProviderProfile, ProfileError> {
        let cached = self
            .entries
            .get(&provider)
            .is_some_and(|entry| entry.cid == *cid);
        if !cached {
            let profile = ProviderProfile::load(store, cid)?;
            if profile.address() != provider {
                return Err(ProfileError::SignatureMismatch {
                    expected: provider,
                    reason: format!("document {cid} belongs to {}", profile.address()),
                });
            }
            self.insert(cid.clone(), profile);
        } else {
            tracing::trace!(provider = %provider, cid = %cid, "profile cache hit");
        }
        self.get(&provider)
            .ok_or_else(|| ProfileError::Document(format!("profile {cid} missing from cache")))
    }

    /// Cache a profile under its own address, replacing any older entry.
    pub fn insert(&mut self, cid: ContentId, profile: ProviderProfile) {
        self.entries
            .insert(profile.address(), CachedProfile { cid, profile });
    }

    /// Drop the cached profile for `provider`.
    pub fn invalidate(&mut self, provider: &Address) -> Option<ProviderProfile> {
        self.entries.remove(provider).map(|entry| entry.profile)
    }

    /// Number of cached providers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
