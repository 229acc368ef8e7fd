//! Interaction targets: points, pixel regions and capability-tagged locators
//!
//! Canvas-rendered UI has no DOM nodes to select, so anything inside the
//! render surface is declared as a pixel region. Chrome around the canvas
//! (menus, headers) can still be found structurally by selector or text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A point in CSS pixels relative to the viewport's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation towards `other`, `t` in `[0, 1]`
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Browser viewport size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= 0.0
            && point.y >= 0.0
            && point.x < self.width as f64
            && point.y < self.height as f64
    }
}

impl Default for Viewport {
    fn default() -> Self {
        // Portrait resolution the game client renders at
        Self::new(360, 640)
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Viewport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width: u32 = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
        let height: u32 = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
        if width == 0 || height == 0 {
            return Err(format!("viewport must be non-empty, got '{}'", s));
        }
        Ok(Self { width, height })
    }
}

/// Axis-aligned pixel rectangle with an optional tolerance margin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Slack, in pixels, allowed on every edge when checking containment
    #[serde(default)]
    pub tolerance: f64,
}

impl Region {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height, tolerance: 0.0 }
    }

    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// True when `inner` lies inside this region grown by `inner.tolerance`
    pub fn covers(&self, inner: &Region) -> bool {
        let slack = inner.tolerance.max(0.0);
        inner.x >= self.x - slack
            && inner.y >= self.y - slack
            && inner.x + inner.width <= self.x + self.width + slack
            && inner.y + inner.height <= self.y + self.height + slack
    }

    /// True when the region (minus tolerance) fits inside the viewport
    pub fn fits(&self, viewport: Viewport) -> bool {
        let bounds = Region::new(0.0, 0.0, viewport.width as f64, viewport.height as f64);
        self.width >= 0.0 && self.height >= 0.0 && bounds.covers(self)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{} {}x{}]", self.x, self.y, self.width, self.height)?;
        if self.tolerance > 0.0 {
            write!(f, "±{}", self.tolerance)?;
        }
        Ok(())
    }
}

/// A declarative reference to something on the page.
///
/// The resolution mode is fixed up front: selector and text locators use a
/// structural lookup, region locators are plain arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// CSS selector for DOM chrome (e.g. `.main-menu-btn`)
    Selector(String),
    /// Visible text content (e.g. `Demo`)
    Text(String),
    /// Pixel region inside the render surface
    Region(Region),
}

impl Locator {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self::Selector(selector.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn is_structural(&self) -> bool {
        !matches!(self, Locator::Region(_))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Selector(s) => write!(f, "selector '{}'", s),
            Locator::Text(t) => write!(f, "text '{}'", t),
            Locator::Region(r) => write!(f, "region {}", r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("360x640", Some(Viewport::new(360, 640)); "lowercase")]
    #[test_case("1280X720", Some(Viewport::new(1280, 720)); "uppercase separator")]
    #[test_case("0x640", None; "zero width")]
    #[test_case("360", None; "missing height")]
    #[test_case("wide x tall", None; "not numeric")]
    fn test_parse_viewport(input: &str, expected: Option<Viewport>) {
        assert_eq!(input.parse::<Viewport>().ok(), expected);
    }

    #[test]
    fn test_region_center() {
        let region = Region::new(20.0, 370.0, 50.0, 20.0);
        assert_eq!(region.center(), Point::new(45.0, 380.0));
    }

    #[test]
    fn test_region_fits_viewport_with_tolerance() {
        let viewport = Viewport::new(360, 640);
        let edge = Region::new(350.0, 600.0, 12.0, 10.0);
        assert!(!edge.fits(viewport));
        assert!(edge.with_tolerance(2.0).fits(viewport));
    }

    #[test]
    fn test_viewport_contains_is_half_open() {
        let viewport = Viewport::new(360, 640);
        assert!(viewport.contains(Point::new(0.0, 0.0)));
        assert!(viewport.contains(Point::new(359.5, 639.0)));
        assert!(!viewport.contains(Point::new(360.0, 10.0)));
        assert!(!viewport.contains(Point::new(-1.0, 10.0)));
    }

    #[test]
    fn test_locator_yaml_shape() {
        let locator: Locator = serde_yaml::from_str("selector: canvas").unwrap();
        assert_eq!(locator, Locator::selector("canvas"));
        assert!(locator.is_structural());

        let region: Locator =
            serde_yaml::from_str("region: { x: 160, y: 440, width: 40, height: 20, tolerance: 4 }")
                .unwrap();
        assert!(!region.is_structural());
        assert_eq!(region.to_string(), "region [160,440 40x20]±4");
    }
}
