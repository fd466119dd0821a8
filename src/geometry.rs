//! Radial menu geometry
//!
//! Turns a cursor offset from the menu center into a wedge index, and
//! computes the ring dimensions used for selection and click handling.
//! Wedge 0 is centered straight up; indices increase clockwise.

/// Fraction of the inner radius below which the center is a dead zone
pub const DEAD_ZONE_RATIO: f64 = 0.8;

/// Angle at which the first wedge is centered (degrees, screen coordinates)
pub const FIRST_WEDGE_ANGLE: f64 = -90.0;

/// Extra distance past the icons that still selects a wedge
const SELECTION_MARGIN: f64 = 30.0;

/// Extra distance past the icon ring that still counts as a click on the menu
const CLICK_MARGIN: f64 = 10.0;

/// Padding around the menu when sizing its surface
const SURFACE_PADDING: f64 = 40.0;

/// Resolve a cursor offset to a wedge index
///
/// `dx`/`dy` are measured from the menu center in screen coordinates (y grows
/// downward). Returns `None` inside the central dead zone
/// (`distance < inner_radius * 0.8`), beyond `outer_radius`, or when there are
/// no wedges. Both radius bounds are inclusive on the selectable side.
pub fn hit_test(dx: f64, dy: f64, count: usize, inner_radius: f64, outer_radius: f64) -> Option<usize> {
    if count == 0 {
        return None;
    }

    let distance = (dx * dx + dy * dy).sqrt();
    if distance < inner_radius * DEAD_ZONE_RATIO || distance > outer_radius {
        return None;
    }

    // Rotate so that "straight up" is 0 degrees, clockwise positive
    let angle = (dy.atan2(dx).to_degrees() - FIRST_WEDGE_ANGLE).rem_euclid(360.0);
    let wedge_width = 360.0 / count as f64;
    let half_width = wedge_width / 2.0;

    let index = ((angle + half_width) / wedge_width).floor() as usize % count;
    Some(index.min(count - 1))
}

/// Dimensions of the menu ring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuGeometry {
    /// Distance from the center to the icon centers
    pub menu_radius: f64,
    /// Icon edge length
    pub icon_size: f64,
    /// Radius of the central area
    pub inner_radius: f64,
}

impl Default for MenuGeometry {
    fn default() -> Self {
        Self {
            menu_radius: 180.0,
            icon_size: 48.0,
            inner_radius: 50.0,
        }
    }
}

impl MenuGeometry {
    /// Farthest distance at which pointer movement still selects a wedge
    pub fn selection_radius(&self) -> f64 {
        self.menu_radius + self.icon_size + SELECTION_MARGIN
    }

    /// Outer edge of the clickable ring
    pub fn ring_outer_radius(&self) -> f64 {
        self.menu_radius + self.icon_size / 2.0 + CLICK_MARGIN
    }

    /// Edge length of the square surface the menu is drawn on
    pub fn surface_size(&self) -> f64 {
        (self.menu_radius + self.icon_size) * 2.0 + SURFACE_PADDING
    }

    /// Wedge under the pointer, if any
    pub fn wedge_at(&self, dx: f64, dy: f64, count: usize) -> Option<usize> {
        hit_test(dx, dy, count, self.inner_radius, self.selection_radius())
    }

    /// Whether a click at this offset lands outside the ring (center or beyond)
    pub fn is_outside_ring(&self, dx: f64, dy: f64) -> bool {
        let distance = (dx * dx + dy * dy).sqrt();
        distance < self.inner_radius || distance > self.ring_outer_radius()
    }

    /// Whether an offset falls in the central area
    pub fn is_in_center(&self, dx: f64, dy: f64) -> bool {
        (dx * dx + dy * dy).sqrt() < self.inner_radius
    }

    /// Offset of an icon center from the menu center
    pub fn icon_offset(&self, index: usize, count: usize) -> (f64, f64) {
        let angle = wedge_center_angle(index, count).to_radians();
        (self.menu_radius * angle.cos(), self.menu_radius * angle.sin())
    }
}

/// Center angle of a wedge in screen coordinates (degrees, -90 = up)
pub fn wedge_center_angle(index: usize, count: usize) -> f64 {
    if count == 0 {
        return FIRST_WEDGE_ANGLE;
    }
    FIRST_WEDGE_ANGLE + index as f64 * (360.0 / count as f64)
}
