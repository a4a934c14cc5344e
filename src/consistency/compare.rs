use crate::detection::LandmarkSet;
use crate::transform::Point2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkName {
    LeftEye,
    RightEye,
    Mouth,
}

impl LandmarkName {
    pub const ALL: [LandmarkName; 3] = [LandmarkName::LeftEye, LandmarkName::RightEye, LandmarkName::Mouth];

    pub fn name(&self) -> &'static str {
        match self {
            LandmarkName::LeftEye => "left_eye",
            LandmarkName::RightEye => "right_eye",
            LandmarkName::Mouth => "mouth",
        }
    }

    pub fn point(&self, set: &LandmarkSet) -> Point2 {
        match self {
            LandmarkName::LeftEye => set.left_eye_center,
            LandmarkName::RightEye => set.right_eye_center,
            LandmarkName::Mouth => set.mouth_center,
        }
    }
}

impl fmt::Display for LandmarkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Absolute per-axis distance between two points, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisDelta {
    pub dx: f64,
    pub dy: f64,
}

impl AxisDelta {
    pub fn between(a: &Point2, b: &Point2) -> Self {
        Self {
            dx: (a.x - b.x).abs(),
            dy: (a.y - b.y).abs(),
        }
    }

    /// Both axes at or under `tolerance`. NaN never passes.
    pub fn within(&self, tolerance: f64) -> bool {
        self.dx <= tolerance && self.dy <= tolerance
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkComparison {
    pub deltas: BTreeMap<LandmarkName, AxisDelta>,
    pub pass: BTreeMap<LandmarkName, bool>,
}

impl LandmarkComparison {
    pub fn all_pass(&self) -> bool {
        self.pass.values().all(|p| *p)
    }

    pub fn failing(&self) -> impl Iterator<Item = LandmarkName> + '_ {
        self.pass.iter().filter(|(_, p)| !**p).map(|(n, _)| *n)
    }
}

/// Compare the three canonical landmarks of two detections of the same image.
pub fn compare_landmarks(a: &LandmarkSet, b: &LandmarkSet, tolerance: f64) -> LandmarkComparison {
    let mut deltas = BTreeMap::new();
    let mut pass = BTreeMap::new();
    for name in LandmarkName::ALL {
        let delta = AxisDelta::between(&name.point(a), &name.point(b));
        pass.insert(name, delta.within(tolerance));
        deltas.insert(name, delta);
    }
    LandmarkComparison { deltas, pass }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Backend, FaceBounds};

    fn set(left: (f64, f64), right: (f64, f64), mouth: (f64, f64), backend: Backend) -> LandmarkSet {
        LandmarkSet::new(
            Point2::new(left.0, left.1),
            Point2::new(right.0, right.1),
            Point2::new(mouth.0, mouth.1),
            Vec::new(),
            backend,
            FaceBounds {
                x: 0.0,
                y: 0.0,
                width: 400.0,
                height: 400.0,
                confidence: 1.0,
            },
        )
    }

    #[test]
    fn left_eye_outside_tolerance_fails_alone() {
        let a = set((300.0, 250.0), (500.0, 250.0), (400.0, 450.0), Backend::Yunet);
        let b = set((310.79, 251.28), (502.0, 253.0), (404.0, 449.0), Backend::Lbf);
        let cmp = compare_landmarks(&a, &b, 5.0);

        let left = cmp.deltas[&LandmarkName::LeftEye];
        assert!((left.dx - 10.79).abs() < 1e-9);
        assert!((left.dy - 1.28).abs() < 1e-9);
        assert!(!cmp.pass[&LandmarkName::LeftEye]);
        assert!(cmp.pass[&LandmarkName::RightEye]);
        assert!(cmp.pass[&LandmarkName::Mouth]);
        assert!(!cmp.all_pass());
        assert_eq!(cmp.failing().collect::<Vec<_>>(), vec![LandmarkName::LeftEye]);
    }

    #[test]
    fn tolerance_is_inclusive() {
        let d = AxisDelta { dx: 5.0, dy: 0.0 };
        assert!(d.within(5.0));
        assert!(!AxisDelta { dx: f64::NAN, dy: 0.0 }.within(5.0));
    }

    #[test]
    fn names_serialize_as_map_keys() {
        let a = set((0.0, 0.0), (10.0, 0.0), (5.0, 10.0), Backend::Yunet);
        let json = serde_json::to_value(compare_landmarks(&a, &a, 5.0)).unwrap();
        assert_eq!(json["pass"]["left_eye"], true);
        assert_eq!(json["deltas"]["mouth"]["dx"], 0.0);
    }
}
