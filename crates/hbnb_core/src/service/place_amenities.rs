//! Place ↔ amenity link use cases.
//!
//! # Invariants
//! - Links are stored on the place, in link order, without duplicates.
//! - Both ends must resolve before a link is read or changed.

use super::{logged, ApiError, ApiResult, HbnbService, STATUS_CREATED, STATUS_OK};
use crate::model::entity::Entity;
use crate::model::kind::EntityKind;
use crate::storage::Storage;
use log::info;

/// Result of linking an amenity to a place.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    /// The link did not exist and was created.
    Created(Entity),
    /// The link already existed; nothing changed.
    Existing(Entity),
}

impl LinkOutcome {
    pub fn amenity(&self) -> &Entity {
        match self {
            Self::Created(amenity) | Self::Existing(amenity) => amenity,
        }
    }

    pub fn into_amenity(self) -> Entity {
        match self {
            Self::Created(amenity) | Self::Existing(amenity) => amenity,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Created(_) => STATUS_CREATED,
            Self::Existing(_) => STATUS_OK,
        }
    }
}

impl<S: Storage> HbnbService<S> {
    /// Amenities linked to a place, in link order.
    pub fn list_place_amenities(&self, place_id: &str) -> ApiResult<Vec<Entity>> {
        let place = self.get(EntityKind::Place, place_id)?;
        Ok(self.storage.amenities_of_place(&place)?)
    }

    pub fn link_place_amenity(&mut self, place_id: &str, amenity_id: &str) -> ApiResult<LinkOutcome> {
        let result = self.link_inner(place_id, amenity_id);
        logged("link_place_amenity", result)
    }

    /// Removes a link; `NotFound` when either end is absent or unlinked.
    pub fn unlink_place_amenity(&mut self, place_id: &str, amenity_id: &str) -> ApiResult<()> {
        let result = self.unlink_inner(place_id, amenity_id);
        logged("unlink_place_amenity", result)
    }

    fn link_inner(&mut self, place_id: &str, amenity_id: &str) -> ApiResult<LinkOutcome> {
        let mut place = self.get(EntityKind::Place, place_id)?;
        let amenity = self.get(EntityKind::Amenity, amenity_id)?;

        let linked = place
            .as_place_mut()
            .ok_or(ApiError::NotFound)?
            .link_amenity(amenity.id());
        if !linked {
            return Ok(LinkOutcome::Existing(amenity));
        }

        place.touch();
        self.storage.new(place)?;
        self.storage.save()?;
        info!(
            "event=place_amenity_link module=service status=ok place_id={} amenity_id={}",
            place_id,
            amenity.id()
        );
        Ok(LinkOutcome::Created(amenity))
    }

    fn unlink_inner(&mut self, place_id: &str, amenity_id: &str) -> ApiResult<()> {
        let mut place = self.get(EntityKind::Place, place_id)?;
        let amenity = self.get(EntityKind::Amenity, amenity_id)?;

        let unlinked = place
            .as_place_mut()
            .ok_or(ApiError::NotFound)?
            .unlink_amenity(amenity.id());
        if !unlinked {
            return Err(ApiError::NotFound);
        }

        place.touch();
        self.storage.new(place)?;
        self.storage.save()?;
        info!(
            "event=place_amenity_unlink module=service status=ok place_id={} amenity_id={}",
            place_id,
            amenity.id()
        );
        Ok(())
    }
}
