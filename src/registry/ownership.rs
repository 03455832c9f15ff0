//! Ownership registry for unique resources

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::bounded::{BoundedInsert, BoundedSet};
use crate::core::error::{Capacity, EconomyError, Result, Subject};
use crate::core::types::{ParticipantId, Rarity, ResourceId};

/// A unique resource instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub rarity: Rarity,
    /// Free-text name, display only
    pub label: Option<String>,
    pub owner: ParticipantId,
}

/// Authoritative answer to "who holds what"
pub trait OwnershipRegistry {
    fn resource(&self, id: ResourceId) -> Option<&Resource>;

    /// Resources currently held by `owner`
    fn resources_of(&self, owner: ParticipantId) -> &[ResourceId];

    /// The designated apex resource, if one has been minted
    fn apex(&self) -> Option<ResourceId>;

    fn owner_of(&self, id: ResourceId) -> Option<ParticipantId> {
        self.resource(id).map(|r| r.owner)
    }

    fn balance_of(&self, owner: ParticipantId) -> usize {
        self.resources_of(owner).len()
    }

    fn holds_apex(&self, owner: ParticipantId) -> bool {
        self.apex().and_then(|id| self.owner_of(id)) == Some(owner)
    }
}

/// In-memory registry with capacity-bounded holdings
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    resources: AHashMap<ResourceId, Resource>,
    holdings: AHashMap<ParticipantId, BoundedSet<ResourceId>>,
    max_holdings: usize,
    next_id: u32,
    apex: Option<ResourceId>,
}

impl ResourceRegistry {
    pub fn new(max_holdings: usize) -> Self {
        Self {
            resources: AHashMap::new(),
            holdings: AHashMap::new(),
            max_holdings,
            next_id: 1,
            apex: None,
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn check_room(&self, owner: ParticipantId) -> Result<()> {
        if self.balance_of(owner) >= self.max_holdings {
            return Err(EconomyError::CapacityExceeded(Capacity::Holdings {
                owner,
                capacity: self.max_holdings,
            }));
        }
        Ok(())
    }

    /// Validate a mint without performing it
    pub fn check_mint(&self, owner: ParticipantId, rarity: Rarity) -> Result<()> {
        if rarity == Rarity::Apex {
            if let Some(existing) = self.apex {
                return Err(EconomyError::AlreadyExists(format!("apex resource {}", existing)));
            }
        }
        self.check_room(owner)
    }

    /// Create a new resource held by `owner`
    pub fn mint(&mut self, owner: ParticipantId, rarity: Rarity, label: Option<String>) -> Result<ResourceId> {
        self.check_mint(owner, rarity)?;

        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.hold(owner, id);
        self.resources.insert(id, Resource { id, rarity, label, owner });
        if rarity == Rarity::Apex {
            self.apex = Some(id);
        }
        Ok(id)
    }

    /// Validate a transfer without performing it. Returns the current holder.
    pub fn check_transfer(&self, id: ResourceId, to: ParticipantId) -> Result<ParticipantId> {
        let from = self.owner_of(id).ok_or(EconomyError::NotFound(Subject::Resource(id)))?;
        if from == to {
            return Err(EconomyError::AlreadyExists(format!("{} already holds {}", to, id)));
        }
        self.check_room(to)?;
        Ok(from)
    }

    /// Move a resource to a new holder. Returns the previous holder.
    pub fn transfer(&mut self, id: ResourceId, to: ParticipantId) -> Result<ParticipantId> {
        let from = self.check_transfer(id, to)?;

        if let Some(held) = self.holdings.get_mut(&from) {
            held.remove(&id);
        }
        self.hold(to, id);
        if let Some(resource) = self.resources.get_mut(&id) {
            resource.owner = to;
        }
        Ok(from)
    }

    /// Destroy a resource
    pub fn burn(&mut self, id: ResourceId) -> Result<Resource> {
        let resource = self.resources.remove(&id).ok_or(EconomyError::NotFound(Subject::Resource(id)))?;
        if let Some(held) = self.holdings.get_mut(&resource.owner) {
            held.remove(&id);
        }
        if self.apex == Some(id) {
            self.apex = None;
        }
        Ok(resource)
    }

    fn hold(&mut self, owner: ParticipantId, id: ResourceId) {
        let capacity = self.max_holdings;
        let held = self.holdings.entry(owner).or_insert_with(|| BoundedSet::new(capacity));
        // Room was checked by the caller; a duplicate cannot occur for a fresh id
        if let Err(BoundedInsert::Full) = held.insert(id) {
            tracing::warn!("holdings of {} overflowed while inserting {}", owner, id);
        }
    }
}

impl OwnershipRegistry for ResourceRegistry {
    fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(&id)
    }

    fn resources_of(&self, owner: ParticipantId) -> &[ResourceId] {
        self.holdings.get(&owner).map(|h| h.as_slice()).unwrap_or(&[])
    }

    fn apex(&self) -> Option<ResourceId> {
        self.apex
    }
}
