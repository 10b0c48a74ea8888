use crate::ellipsoid::Ellipsoid;
use crate::error::ProjError;
use crate::geodesic::{ang_normalize, Geodesic, GeodesicLine};

/// Geodesic computations on one ellipsoid.
///
/// Angles are in degrees and distances in metres. Points are given latitude first.
/// Azimuths are measured clockwise from north; back azimuths (`az21`) point from the second
/// point towards the first and are normalised to `[-180, 180)`.
///
/// # Examples
///
/// ```
/// # use approx::assert_relative_eq;
/// use geoproj::Geod;
///
/// let geod = Geod::from_ellps("WGS84").unwrap();
/// let (az12, az21, dist) = geod.inverse(42.3541165, -71.0298233, 43.6610117, -70.2549).unwrap();
/// assert_relative_eq!(az12, 23.2534602, epsilon = 1e-6);
/// assert_relative_eq!(az21, -156.2179297, epsilon = 1e-6);
/// assert_relative_eq!(dist, 158335.987, epsilon = 1e-3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Geod {
    ellipsoid: Ellipsoid,
    geodesic: Geodesic,
}

impl Geod {
    /// Geod on an ellipsoid with semi-major axis `a` (metres) and flattening `f`.
    pub fn new(a: f64, f: f64) -> Result<Self, ProjError> {
        let inverse_flattening = if f == 0.0 { 0.0 } else { 1.0 / f };
        let ellipsoid = Ellipsoid::from_inverse_flattening("custom", a, inverse_flattening)?;
        Ok(Geod::from_ellipsoid(ellipsoid))
    }

    pub fn from_ellipsoid(ellipsoid: Ellipsoid) -> Self {
        let geodesic = Geodesic::new(ellipsoid.semi_major(), ellipsoid.flattening());
        Geod {
            ellipsoid,
            geodesic,
        }
    }

    /// Geod on one of PROJ's named ellipsoids (`+ellps=`), e.g. `"WGS84"` or `"clrk66"`.
    pub fn from_ellps(name: &str) -> Result<Self, ProjError> {
        Ok(Geod::from_ellipsoid(Ellipsoid::named(name)?))
    }

    pub fn wgs84() -> Self {
        Geod::from_ellipsoid(Ellipsoid::wgs84())
    }

    /// Caps the Newton and bisection iterations of [`inverse`](Self::inverse).
    ///
    /// Exceeding the cap fails with [`ProjError::NumericDivergence`].
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.geodesic = self.geodesic.with_max_iterations(max_iterations);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.geodesic.max_iterations()
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    /// Solves the direct problem: the point reached from `(lat1, lon1)` after `dist` metres
    /// along azimuth `az12`, returned as `(lat2, lon2, az21)`.
    pub fn forward(
        &self,
        lat1: f64,
        lon1: f64,
        az12: f64,
        dist: f64,
    ) -> Result<(f64, f64, f64), ProjError> {
        check_point(lat1, lon1)?;
        if !(az12.is_finite() && dist.is_finite()) {
            return Err(ProjError::PointOutOfDomain(format!(
                "azimuth {az12}, distance {dist}"
            )));
        }
        if dist == 0.0 {
            return Ok((lat1, lon1, back_azimuth(az12)));
        }
        let (lat2, lon2, azi2) = self.geodesic.direct(lat1, lon1, az12, dist);
        Ok((lat2, lon2, back_azimuth(azi2)))
    }

    /// Solves the inverse problem between two points, returned as `(az12, az21, dist)`.
    ///
    /// Identical points give `(0, 0, 0)`, including two points on the same pole whatever
    /// their longitudes. Exactly antipodal points on a sphere are joined
    /// by the meridian heading north from the first point.
    pub fn inverse(
        &self,
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
    ) -> Result<(f64, f64, f64), ProjError> {
        check_point(lat1, lon1)?;
        check_point(lat2, lon2)?;
        if lat1 == lat2 && (lat1.abs() == 90.0 || (lon1 - lon2) % 360.0 == 0.0) {
            return Ok((0.0, 0.0, 0.0));
        }
        let (azi1, azi2, s12) = self.geodesic.inverse(lat1, lon1, lat2, lon2)?;
        Ok((azi1, back_azimuth(azi2), s12))
    }

    /// Element-wise [`forward`](Self::forward) over equal-length slices.
    pub fn forward_array(
        &self,
        lats: &[f64],
        lons: &[f64],
        azimuths: &[f64],
        distances: &[f64],
    ) -> Result<Vec<(f64, f64, f64)>, ProjError> {
        check_lengths(lats.len(), &[lons.len(), azimuths.len(), distances.len()])?;
        lats.iter()
            .zip(lons)
            .zip(azimuths.iter().zip(distances))
            .map(|((&lat, &lon), (&az, &dist))| self.forward(lat, lon, az, dist))
            .collect()
    }

    /// Element-wise [`inverse`](Self::inverse) over equal-length slices.
    pub fn inverse_array(
        &self,
        lats1: &[f64],
        lons1: &[f64],
        lats2: &[f64],
        lons2: &[f64],
    ) -> Result<Vec<(f64, f64, f64)>, ProjError> {
        check_lengths(lats1.len(), &[lons1.len(), lats2.len(), lons2.len()])?;
        lats1
            .iter()
            .zip(lons1)
            .zip(lats2.iter().zip(lons2))
            .map(|((&lat1, &lon1), (&lat2, &lon2))| self.inverse(lat1, lon1, lat2, lon2))
            .collect()
    }

    /// `count` points evenly spaced along the geodesic between two points, as `(lat, lon)`.
    ///
    /// With `include_endpoints` the sequence starts at the first point and ends at the
    /// second (so `count` must be at least 2); otherwise it holds `count` interior points.
    ///
    /// ```
    /// use geoproj::Geod;
    ///
    /// let geod = Geod::wgs84();
    /// let points: Vec<_> = geod.waypoints(0.0, 0.0, 0.0, 10.0, 3, false).unwrap().collect();
    /// assert_eq!(points.len(), 3);
    /// assert!((points[1].1 - 5.0).abs() < 1e-9);
    /// ```
    pub fn waypoints(
        &self,
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
        count: usize,
        include_endpoints: bool,
    ) -> Result<Waypoints, ProjError> {
        if include_endpoints && count < 2 {
            return Err(ProjError::InvalidArgument(format!(
                "{count} waypoints cannot include both endpoints"
            )));
        }
        let (az12, _, dist) = self.inverse(lat1, lon1, lat2, lon2)?;
        let segments = if include_endpoints { count - 1 } else { count + 1 };
        Ok(Waypoints {
            line: self.geodesic.line(lat1, lon1, az12),
            start: (lat1, lon1),
            end: (lat2, lon2),
            spacing: dist / segments as f64,
            count,
            include_endpoints,
            next: 0,
        })
    }

    /// [`waypoints`](Self::waypoints) for each pair of equal-length endpoint slices.
    #[allow(clippy::too_many_arguments)]
    pub fn waypoints_array(
        &self,
        lats1: &[f64],
        lons1: &[f64],
        lats2: &[f64],
        lons2: &[f64],
        count: usize,
        include_endpoints: bool,
    ) -> Result<Vec<Vec<(f64, f64)>>, ProjError> {
        check_lengths(lats1.len(), &[lons1.len(), lats2.len(), lons2.len()])?;
        lats1
            .iter()
            .zip(lons1)
            .zip(lats2.iter().zip(lons2))
            .map(|((&lat1, &lon1), (&lat2, &lon2))| {
                self.waypoints(lat1, lon1, lat2, lon2, count, include_endpoints)
                    .map(Iterator::collect)
            })
            .collect()
    }

    /// Geodesic length of each segment of a polyline.
    pub fn line_lengths(&self, lats: &[f64], lons: &[f64]) -> Result<Vec<f64>, ProjError> {
        check_lengths(lats.len(), &[lons.len()])?;
        lats.windows(2)
            .zip(lons.windows(2))
            .map(|(lat, lon)| Ok(self.inverse(lat[0], lon[0], lat[1], lon[1])?.2))
            .collect()
    }

    /// Total geodesic length of a polyline.
    pub fn line_length(&self, lats: &[f64], lons: &[f64]) -> Result<f64, ProjError> {
        Ok(self.line_lengths(lats, lons)?.iter().sum())
    }
}

/// Evenly spaced points along a geodesic, produced by [`Geod::waypoints`].
///
/// The sequence is a pure function of its inputs: clone it to iterate again, or use
/// [`get`](Self::get) for random access.
#[derive(Debug, Clone)]
pub struct Waypoints {
    line: GeodesicLine,
    start: (f64, f64),
    end: (f64, f64),
    spacing: f64,
    count: usize,
    include_endpoints: bool,
    next: usize,
}

impl Waypoints {
    /// The `index`-th point of the full sequence, regardless of iteration progress.
    pub fn get(&self, index: usize) -> Option<(f64, f64)> {
        if index >= self.count {
            return None;
        }
        if self.include_endpoints {
            if index == 0 {
                return Some(self.start);
            }
            if index == self.count - 1 {
                return Some(self.end);
            }
            Some(self.position(index))
        } else {
            Some(self.position(index + 1))
        }
    }

    /// Distance between consecutive points, in metres.
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    fn position(&self, step: usize) -> (f64, f64) {
        let (lat, lon, _) = self.line.position(step as f64 * self.spacing);
        (lat, lon)
    }
}

impl Iterator for Waypoints {
    type Item = (f64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let point = self.get(self.next)?;
        self.next += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Waypoints {}

fn back_azimuth(azimuth: f64) -> f64 {
    let back = ang_normalize(azimuth + 180.0);
    if back == 180.0 { -180.0 } else { back }
}

fn check_point(lat: f64, lon: f64) -> Result<(), ProjError> {
    if lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 {
        Ok(())
    } else {
        Err(ProjError::PointOutOfDomain(format!(
            "latitude {lat}, longitude {lon}"
        )))
    }
}

fn check_lengths(expected: usize, others: &[usize]) -> Result<(), ProjError> {
    match others.iter().find(|&&len| len != expected) {
        Some(&found) => Err(ProjError::ShapeMismatch { expected, found }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    const BOSTON: (f64, f64) = (42.3541165, -71.0298233);
    const PORTLAND: (f64, f64) = (43.6610117, -70.2549);

    #[test]
    fn test_boston_portland() {
        let geod = Geod::wgs84();
        let (az12, az21, dist) = geod
            .inverse(BOSTON.0, BOSTON.1, PORTLAND.0, PORTLAND.1)
            .unwrap();
        assert_relative_eq!(az12, 23.25346023108912, epsilon = 1e-9);
        assert_relative_eq!(az21, -156.21792974949469, epsilon = 1e-9);
        assert_relative_eq!(dist, 158335.98697573933, epsilon = 1e-6);
    }

    #[test]
    fn test_inverse_then_forward() {
        let geod = Geod::wgs84();
        let pairs = [
            ((10.0, 20.0), (-30.0, 140.0)),
            ((89.5, 0.0), (-89.5, 179.0)),
            ((0.0, 0.0), (0.5, 179.5)),
            ((-41.32, 174.81), (40.96, -5.50)),
        ];
        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let (az12, _, dist) = geod.inverse(lat1, lon1, lat2, lon2).unwrap();
            let (lat, lon, _) = geod.forward(lat1, lon1, az12, dist).unwrap();
            assert_relative_eq!(lat, lat2, epsilon = 1e-8);
            assert_relative_eq!(lon, lon2, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_symmetry() {
        let geod = Geod::from_ellps("intl").unwrap();
        let (az12, az21, d1) = geod.inverse(BOSTON.0, BOSTON.1, -33.9, 18.4).unwrap();
        let (az12_back, az21_back, d2) = geod.inverse(-33.9, 18.4, BOSTON.0, BOSTON.1).unwrap();
        assert_relative_eq!(d1, d2, epsilon = 1e-6);
        assert_relative_eq!(az12, az21_back, epsilon = 1e-9);
        assert_relative_eq!(az21, az12_back, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_distance() {
        let geod = Geod::wgs84();
        assert_eq!(geod.forward(12.5, 100.0, 30.0, 0.0).unwrap(), (12.5, 100.0, -150.0));
        assert_eq!(geod.forward(12.5, 100.0, 0.0, 0.0).unwrap(), (12.5, 100.0, -180.0));
        assert_eq!(geod.forward(12.5, 100.0, -90.0, 0.0).unwrap(), (12.5, 100.0, 90.0));
    }

    #[test]
    fn test_identical_points() {
        let geod = Geod::wgs84();
        assert_eq!(geod.inverse(12.5, 100.0, 12.5, 100.0).unwrap(), (0.0, 0.0, 0.0));
        assert_eq!(geod.inverse(12.5, 180.0, 12.5, -180.0).unwrap(), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_same_pole_is_one_point() {
        let geod = Geod::wgs84();
        assert_eq!(geod.inverse(90.0, 0.0, 90.0, 50.0).unwrap(), (0.0, 0.0, 0.0));
        assert_eq!(geod.inverse(-90.0, 10.0, -90.0, -120.0).unwrap(), (0.0, 0.0, 0.0));
        let (_, _, dist) = geod.inverse(90.0, 0.0, -90.0, 0.0).unwrap();
        assert!(dist > 20_000_000.0);
    }

    #[test]
    fn test_sphere_antipodes() {
        let geod = Geod::new(6371000.0, 0.0).unwrap();
        let (az12, az21, dist) = geod.inverse(0.0, 0.0, 0.0, 180.0).unwrap();
        assert_eq!(az12, 0.0);
        assert_eq!(az21, 0.0);
        assert_relative_eq!(dist, std::f64::consts::PI * 6371000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_waypoints_with_endpoints() {
        let geod = Geod::wgs84();
        let waypoints = geod
            .waypoints(BOSTON.0, BOSTON.1, PORTLAND.0, PORTLAND.1, 5, true)
            .unwrap();
        assert_eq!(waypoints.len(), 5);
        let points: Vec<_> = waypoints.clone().collect();
        assert_eq!(points[0], BOSTON);
        assert_eq!(points[4], PORTLAND);
        for pair in points.windows(2) {
            let (_, _, dist) = geod
                .inverse(pair[0].0, pair[0].1, pair[1].0, pair[1].1)
                .unwrap();
            assert_relative_eq!(dist, waypoints.spacing(), epsilon = 1e-6);
        }
        // restartable
        assert_eq!(waypoints.collect::<Vec<_>>(), points);
    }

    #[test]
    fn test_waypoints_interior() {
        let geod = Geod::wgs84();
        let points: Vec<_> = geod
            .waypoints(BOSTON.0, BOSTON.1, PORTLAND.0, PORTLAND.1, 3, false)
            .unwrap()
            .collect();
        assert_eq!(points.len(), 3);
        let (_, _, total) = geod
            .inverse(BOSTON.0, BOSTON.1, PORTLAND.0, PORTLAND.1)
            .unwrap();
        let (_, _, first) = geod
            .inverse(BOSTON.0, BOSTON.1, points[0].0, points[0].1)
            .unwrap();
        assert_relative_eq!(first, total / 4.0, epsilon = 1e-6);
        assert!(geod.waypoints(0.0, 0.0, 1.0, 1.0, 0, false).unwrap().next().is_none());
    }

    #[test]
    fn test_waypoints_count_with_endpoints() {
        let geod = Geod::wgs84();
        let err = geod.waypoints(0.0, 0.0, 1.0, 1.0, 1, true).unwrap_err();
        assert!(matches!(err, ProjError::InvalidArgument(_)));
    }

    #[test]
    fn test_arrays() {
        let geod = Geod::wgs84();
        let results = geod
            .inverse_array(&[BOSTON.0, 0.0], &[BOSTON.1, 0.0], &[PORTLAND.0, 0.0], &[PORTLAND.1, 1.0])
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0],
            geod.inverse(BOSTON.0, BOSTON.1, PORTLAND.0, PORTLAND.1).unwrap()
        );
        let err = geod
            .forward_array(&[0.0, 1.0], &[0.0, 1.0], &[45.0], &[1000.0, 1000.0])
            .unwrap_err();
        assert_eq!(err, ProjError::ShapeMismatch { expected: 2, found: 1 });
        let paths = geod
            .waypoints_array(&[0.0], &[0.0], &[0.0], &[10.0], 2, true)
            .unwrap();
        assert_eq!(paths, vec![vec![(0.0, 0.0), (0.0, 10.0)]]);
    }

    #[test]
    fn test_line_length() {
        let geod = Geod::wgs84();
        let lats = [BOSTON.0, PORTLAND.0, BOSTON.0];
        let lons = [BOSTON.1, PORTLAND.1, BOSTON.1];
        let lengths = geod.line_lengths(&lats, &lons).unwrap();
        assert_eq!(lengths.len(), 2);
        assert_relative_eq!(geod.line_length(&lats, &lons).unwrap(), 2.0 * lengths[0], epsilon = 1e-6);
        assert_eq!(geod.line_length(&[1.0], &[1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_out_of_domain() {
        let geod = Geod::wgs84();
        let err = geod.inverse(91.0, 0.0, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, ProjError::PointOutOfDomain(_)));
        assert!(geod.forward(0.0, f64::NAN, 0.0, 10.0).is_err());
        assert!(Geod::new(-1.0, 0.0).is_err());
    }

    #[test]
    fn test_divergence_is_reported() {
        let geod = Geod::wgs84().with_max_iterations(1);
        let err = geod.inverse(0.0, 0.0, 0.5, 179.5).unwrap_err();
        assert_eq!(err, ProjError::NumericDivergence { iterations: 1 });
    }
}
