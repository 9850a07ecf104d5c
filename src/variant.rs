//! Template selector – decides which physical card designs an employee gets
//! and the fixed page geometry of every printable side.
//!
//! Geometry is policy, never derived from content: the card template must
//! fit the page, not the other way round.

use serde::{Deserialize, Serialize};

use crate::employee::{EmployeeRecord, RoleClass};

/// CSS pixels per inch used when laying out a card surface.
pub const SURFACE_PX_PER_INCH: f32 = 96.0;

/// Short and long edge of a CR80-style card, in inches.
const CARD_SHORT_IN: f32 = 2.13;
const CARD_LONG_IN: f32 = 3.33;

/// Page orientation of one printable side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    /// Height > width (default).
    #[default]
    Portrait,
    /// Width > height.
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantId {
    Primary,
    Secondary,
}

impl VariantId {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantId::Primary => "primary",
            VariantId::Secondary => "secondary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Front => "front",
            Side::Back => "back",
        }
    }
}

/// Physical size of one printed page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_in: f32,
    pub height_in: f32,
    pub orientation: PageOrientation,
}

impl PageGeometry {
    pub const PORTRAIT_CARD: PageGeometry = PageGeometry {
        width_in: CARD_SHORT_IN,
        height_in: CARD_LONG_IN,
        orientation: PageOrientation::Portrait,
    };

    pub const LANDSCAPE_CARD: PageGeometry = PageGeometry {
        width_in: CARD_LONG_IN,
        height_in: CARD_SHORT_IN,
        orientation: PageOrientation::Landscape,
    };

    pub fn for_orientation(orientation: PageOrientation) -> Self {
        match orientation {
            PageOrientation::Portrait => Self::PORTRAIT_CARD,
            PageOrientation::Landscape => Self::LANDSCAPE_CARD,
        }
    }

    /// Width in PDF points (1 pt = 1/72 inch).
    pub fn width_pt(&self) -> f32 {
        self.width_in * 72.0
    }

    pub fn height_pt(&self) -> f32 {
        self.height_in * 72.0
    }

    pub fn width_mm(&self) -> f32 {
        self.width_in * 25.4
    }

    pub fn height_mm(&self) -> f32 {
        self.height_in * 25.4
    }

    /// Layout surface size in CSS pixels. Not rounded, so the surface keeps
    /// the exact aspect ratio of the printed page.
    pub fn surface_size(&self) -> (f32, f32) {
        (
            self.width_in * SURFACE_PX_PER_INCH,
            self.height_in * SURFACE_PX_PER_INCH,
        )
    }

    /// Bitmap size of a capture at `scale` device pixels per CSS pixel.
    /// Rounding happens once, on the final pixel count.
    pub fn device_px(&self, scale: f32) -> (u32, u32) {
        let (w, h) = self.surface_size();
        (
            (w * scale).round().max(0.0) as u32,
            (h * scale).round().max(0.0) as u32,
        )
    }
}

/// One printable side of one card design.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemplateVariant {
    pub id: VariantId,
    pub side: Side,
    pub geometry: PageGeometry,
}

impl TemplateVariant {
    pub fn orientation(&self) -> PageOrientation {
        self.geometry.orientation
    }

    /// Short label such as `primary-front`, used in logs and page titles.
    pub fn label(&self) -> String {
        format!("{}-{}", self.id.as_str(), self.side.as_str())
    }
}

/// Card designs per role class, in print order.
const PORTRAIT_ONLY: &[(VariantId, PageOrientation)] =
    &[(VariantId::Primary, PageOrientation::Portrait)];
const LANDSCAPE_ONLY: &[(VariantId, PageOrientation)] =
    &[(VariantId::Primary, PageOrientation::Landscape)];
const PORTRAIT_THEN_LANDSCAPE: &[(VariantId, PageOrientation)] = &[
    (VariantId::Primary, PageOrientation::Portrait),
    (VariantId::Secondary, PageOrientation::Landscape),
];

fn designs_for(class: RoleClass) -> &'static [(VariantId, PageOrientation)] {
    match class {
        RoleClass::Standard => PORTRAIT_ONLY,
        RoleClass::Field => LANDSCAPE_ONLY,
        RoleClass::FieldDual => PORTRAIT_THEN_LANDSCAPE,
    }
}

/// Every page to print for `employee`, front before back, designs in the
/// fixed order of the rule table.
pub fn select_variants(employee: &EmployeeRecord) -> Vec<TemplateVariant> {
    let class = employee.role_class();
    let variants: Vec<TemplateVariant> = designs_for(class)
        .iter()
        .flat_map(|&(id, orientation)| {
            let geometry = PageGeometry::for_orientation(orientation);
            [Side::Front, Side::Back].map(|side| TemplateVariant { id, side, geometry })
        })
        .collect();
    log::debug!(
        "employee {}: {:?} -> {} page(s)",
        employee.id,
        class,
        variants.len()
    );
    variants
}
