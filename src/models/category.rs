// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalized amenity categories and the raw OSM code lookup table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Normalized amenity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum AmenityCategory {
    #[serde(rename = "Emergency and Public Services")]
    EmergencyAndPublicServices,
    #[serde(rename = "Commercial and Financial")]
    CommercialAndFinancial,
    #[serde(rename = "Food and Drink")]
    FoodAndDrink,
    #[serde(rename = "Community and Culture")]
    CommunityAndCulture,
    #[serde(rename = "Other Amenities")]
    OtherAmenities,
}

use self::AmenityCategory as C;

/// Raw OSM `amenity` code → normalized category.
const CATEGORY_TABLE: &[(&str, AmenityCategory)] = &[
    ("animal_shelter", C::EmergencyAndPublicServices),
    ("bank", C::CommercialAndFinancial),
    ("bar", C::FoodAndDrink),
    ("cafe", C::FoodAndDrink),
    ("car_wash", C::CommercialAndFinancial),
    ("casino", C::CommercialAndFinancial),
    ("childcare", C::CommunityAndCulture),
    ("clinic", C::OtherAmenities),
    ("coast_radar_station", C::EmergencyAndPublicServices),
    ("community_centre", C::CommunityAndCulture),
    ("concert_hall", C::CommunityAndCulture),
    ("conference_centre", C::CommunityAndCulture),
    ("courthouse", C::CommunityAndCulture),
    ("events_venue", C::CommunityAndCulture),
    ("fast_food", C::FoodAndDrink),
    ("feeding_place", C::OtherAmenities),
    ("fire_station", C::EmergencyAndPublicServices),
    ("food_court", C::FoodAndDrink),
    ("fuel", C::FoodAndDrink),
    ("hospital", C::EmergencyAndPublicServices),
    ("library", C::CommunityAndCulture),
    ("monastery", C::CommunityAndCulture),
    ("parking", C::OtherAmenities),
    ("pharmacy", C::OtherAmenities),
    ("place_of_worship", C::CommunityAndCulture),
    ("planetarium", C::CommunityAndCulture),
    ("police", C::EmergencyAndPublicServices),
    ("post_office", C::EmergencyAndPublicServices),
    ("prison", C::EmergencyAndPublicServices),
    ("pub", C::FoodAndDrink),
    ("public_building", C::EmergencyAndPublicServices),
    ("recycling", C::OtherAmenities),
    ("restaurant", C::FoodAndDrink),
    ("retirement_home", C::OtherAmenities),
    ("school", C::CommunityAndCulture),
    ("shelter", C::OtherAmenities),
    ("social_facility", C::CommunityAndCulture),
    ("stock_exchange", C::CommercialAndFinancial),
    ("studio", C::OtherAmenities),
    ("theatre", C::CommunityAndCulture),
    ("toilets", C::OtherAmenities),
    ("townhall", C::EmergencyAndPublicServices),
    ("university", C::CommunityAndCulture),
];

impl AmenityCategory {
    pub const ALL: [AmenityCategory; 5] = [
        AmenityCategory::EmergencyAndPublicServices,
        AmenityCategory::CommercialAndFinancial,
        AmenityCategory::FoodAndDrink,
        AmenityCategory::CommunityAndCulture,
        AmenityCategory::OtherAmenities,
    ];

    /// Look up a raw category code. `None` when the code is unmapped.
    pub fn lookup(raw: &str) -> Option<Self> {
        CATEGORY_TABLE
            .iter()
            .find(|(code, _)| *code == raw)
            .map(|(_, category)| *category)
    }

    /// Normalize a raw category code, defaulting to "Other Amenities".
    pub fn from_raw(raw: Option<&str>) -> Self {
        raw.and_then(Self::lookup)
            .unwrap_or(AmenityCategory::OtherAmenities)
    }

    /// Display label, also the stored column value.
    pub fn label(&self) -> &'static str {
        match self {
            AmenityCategory::EmergencyAndPublicServices => "Emergency and Public Services",
            AmenityCategory::CommercialAndFinancial => "Commercial and Financial",
            AmenityCategory::FoodAndDrink => "Food and Drink",
            AmenityCategory::CommunityAndCulture => "Community and Culture",
            AmenityCategory::OtherAmenities => "Other Amenities",
        }
    }

    fn slug(&self) -> &'static str {
        match self {
            AmenityCategory::EmergencyAndPublicServices => "emergency_and_public_services",
            AmenityCategory::CommercialAndFinancial => "commercial_and_financial",
            AmenityCategory::FoodAndDrink => "food_and_drink",
            AmenityCategory::CommunityAndCulture => "community_and_culture",
            AmenityCategory::OtherAmenities => "other_amenities",
        }
    }
}

impl fmt::Display for AmenityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown amenity category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for AmenityCategory {
    type Err = UnknownCategory;

    /// Accepts the display label ("Food and Drink") or its slug ("food_and_drink").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s) || c.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Category implied by a building's own tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildingCategory {
    Amenity(AmenityCategory),
    Residential,
}

impl BuildingCategory {
    /// Buildings whose `amenity` tag is absent or unmapped are residential.
    pub fn from_raw(raw: Option<&str>) -> Self {
        raw.and_then(AmenityCategory::lookup)
            .map(BuildingCategory::Amenity)
            .unwrap_or(BuildingCategory::Residential)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BuildingCategory::Amenity(c) => c.label(),
            BuildingCategory::Residential => "Residential",
        }
    }
}
