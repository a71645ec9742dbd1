// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod amenity;
pub mod assignment;
pub mod bbox;
pub mod building;
pub mod category;
pub mod geometry;

pub use amenity::{Amenity, AmenityResponse, AmenityUpdate, ClosestAmenity, NewAmenity};
pub use assignment::AssignmentReport;
pub use bbox::BoundingBox;
pub use building::{Building, BuildingResponse, BuildingUpdate, NewBuilding};
pub use category::{AmenityCategory, BuildingCategory};
pub use geometry::{GeometryError, StorageGeometry};
