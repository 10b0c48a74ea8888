use crate::crs::Crs;
use crate::error::ProjError;
use crate::transform::{AxisOrder, Coord, CoordinateType, ErrorPolicy, Transformer};
use geo_types::{LineString, Point, Polygon};

///```rust
/// # use approx::assert_relative_eq;
/// use geoproj::{AxisOrder, Crs, ErrorPolicy, Transformer};
///
/// let from = Crs::from_epsg(2230).unwrap();
/// let to = Crs::from_epsg(26946).unwrap();
/// let nad_ft_to_m = Transformer::from_crs(&from, &to, AxisOrder::Traditional).unwrap();
/// let result = nad_ft_to_m
///     .transform_coords(
///         &[geo_types::coord! { x: 4760096.421921f64, y: 3744293.729449f64 }],
///         ErrorPolicy::Strict,
///     )
///     .unwrap();
/// assert_relative_eq!(result[0].x, 1450880.29f64, epsilon = 1.0e-2);
/// assert_relative_eq!(result[0].y, 1141263.01f64, epsilon = 1.0e-2);
/// ```
impl<T: CoordinateType> Coord<T> for geo_types::Coord<T> {
    fn x(&self) -> T {
        self.x
    }
    fn y(&self) -> T {
        self.y
    }
    fn from_xyz(x: T, y: T, _z: Option<T>) -> Self {
        Self { x, y }
    }
}

impl<T: CoordinateType> Coord<T> for Point<T> {
    fn x(&self) -> T {
        Point::x(*self)
    }
    fn y(&self) -> T {
        Point::y(*self)
    }
    fn from_xyz(x: T, y: T, _z: Option<T>) -> Self {
        Self::new(x, y)
    }
}

/// Transform a geometry with a [`Transformer`].
///
/// Every coordinate goes through the transformer in strict mode: the first coordinate that
/// fails leaves the geometry untouched and returns the error.
pub trait Transform<T> {
    type Output;

    /// Transform a geometry by mutating it in place.
    ///
    /// ```
    /// # use approx::assert_relative_eq;
    /// use geo_types::point;
    /// use geoproj::{AxisOrder, Crs, Transform, Transformer};
    ///
    /// let wgs84 = Crs::from_epsg(4326).unwrap();
    /// let mercator = Crs::from_epsg(3857).unwrap();
    /// let transformer = Transformer::from_crs(&wgs84, &mercator, AxisOrder::Traditional).unwrap();
    ///
    /// let mut point = point!(x: 10.0f64, y: 50.0f64);
    /// point.transform(&transformer).unwrap();
    /// assert_relative_eq!(point, point!(x: 1113194.9079327357, y: 6446275.841017158), epsilon = 1e-6);
    /// ```
    fn transform(&mut self, transformer: &Transformer) -> Result<(), ProjError>;

    /// Immutable flavor of [`Transform::transform`], which allocates a new geometry.
    fn transformed(&self, transformer: &Transformer) -> Result<Self::Output, ProjError>;

    /// Transform a geometry from one CRS to another, longitude (or easting) first.
    ///
    /// ```
    /// # use approx::assert_relative_eq;
    /// use geo_types::{point, Point};
    /// use geoproj::{Crs, Transform};
    ///
    /// let wgs84 = Crs::from_epsg(4326).unwrap();
    /// let mercator = Crs::from_epsg(3857).unwrap();
    /// let mut point: Point<f32> = point!(x: -36.508f32, y: -54.2815f32);
    /// point.transform_crs_to_crs(&wgs84, &mercator).unwrap();
    ///
    /// assert_relative_eq!(point, point!(x: -4064052.0f32, y: -7223650.5f32));
    /// ```
    fn transform_crs_to_crs(&mut self, source: &Crs, target: &Crs) -> Result<(), ProjError> {
        let transformer = Transformer::from_crs(source, target, AxisOrder::Traditional)?;
        self.transform(&transformer)
    }

    /// Immutable flavor of [`Transform::transform_crs_to_crs`], which allocates a new geometry.
    fn transformed_crs_to_crs(&self, source: &Crs, target: &Crs) -> Result<Self::Output, ProjError> {
        let transformer = Transformer::from_crs(source, target, AxisOrder::Traditional)?;
        self.transformed(&transformer)
    }
}

impl<T: CoordinateType> Transform<T> for geo_types::Coord<T> {
    type Output = Self;

    fn transform(&mut self, transformer: &Transformer) -> Result<(), ProjError> {
        *self = self.transformed(transformer)?;
        Ok(())
    }

    fn transformed(&self, transformer: &Transformer) -> Result<Self::Output, ProjError> {
        let mut coords = transformer.transform_coords(&[*self], ErrorPolicy::Strict)?;
        coords
            .pop()
            .ok_or_else(|| ProjError::InvalidArgument("empty transform result".to_string()))
    }
}

impl<T: CoordinateType> Transform<T> for Point<T> {
    type Output = Self;

    fn transform(&mut self, transformer: &Transformer) -> Result<(), ProjError> {
        self.0.transform(transformer)
    }

    fn transformed(&self, transformer: &Transformer) -> Result<Self::Output, ProjError> {
        Ok(Point(self.0.transformed(transformer)?))
    }
}

impl<T: CoordinateType> Transform<T> for LineString<T> {
    type Output = Self;

    fn transform(&mut self, transformer: &Transformer) -> Result<(), ProjError> {
        *self = self.transformed(transformer)?;
        Ok(())
    }

    fn transformed(&self, transformer: &Transformer) -> Result<Self::Output, ProjError> {
        Ok(LineString(
            transformer.transform_coords(&self.0, ErrorPolicy::Strict)?,
        ))
    }
}

impl<T: CoordinateType> Transform<T> for Polygon<T> {
    type Output = Self;

    fn transform(&mut self, transformer: &Transformer) -> Result<(), ProjError> {
        *self = self.transformed(transformer)?;
        Ok(())
    }

    fn transformed(&self, transformer: &Transformer) -> Result<Self::Output, ProjError> {
        let exterior = self.exterior().transformed(transformer)?;
        let interiors = self
            .interiors()
            .iter()
            .map(|ring| ring.transformed(transformer))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Polygon::new(exterior, interiors))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use geo_types::{coord, line_string, point, polygon};

    fn utm33() -> Transformer {
        Transformer::from_crs(
            &Crs::from_epsg(4326).unwrap(),
            &Crs::from_epsg(32633).unwrap(),
            AxisOrder::Traditional,
        )
        .unwrap()
    }

    #[test]
    fn test_point() {
        let mut point = point!(x: 15.0f64, y: 0.0f64);
        point.transform(&utm33()).unwrap();
        assert_relative_eq!(point, point!(x: 500000.0, y: 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_coord_f32() {
        let coord = coord! { x: 15.0f32, y: 0.0f32 };
        let out = coord.transformed(&utm33()).unwrap();
        assert_relative_eq!(out, coord! { x: 500000.0f32, y: 0.0f32 }, epsilon = 1e-1);
        assert_eq!(coord, coord! { x: 15.0f32, y: 0.0f32 });
    }

    #[test]
    fn test_line_string() {
        let line = line_string![(x: 15.0, y: 0.0), (x: 15.0, y: 10.0)];
        let out = line.transformed(&utm33()).unwrap();
        assert_eq!(out.0.len(), 2);
        assert_relative_eq!(out.0[0].x, 500000.0, epsilon = 1e-6);
        assert_relative_eq!(out.0[1].x, 500000.0, epsilon = 1e-6);
        assert!(out.0[1].y > 1_100_000.0);
    }

    #[test]
    fn test_polygon_failure_leaves_geometry_untouched() {
        let mut polygon = polygon![
            (x: 10.0, y: 10.0),
            (x: 20.0, y: 10.0),
            (x: 20.0, y: 90.0),
            (x: 10.0, y: 10.0)
        ];
        let original = polygon.clone();
        let err = polygon
            .transform_crs_to_crs(&Crs::from_epsg(4326).unwrap(), &Crs::from_epsg(3857).unwrap())
            .unwrap_err();
        assert!(matches!(err, ProjError::PointOutOfDomain(_)));
        assert_eq!(polygon, original);
    }

    #[test]
    fn test_polygon_with_hole() {
        let polygon = polygon!(
            exterior: [(x: 14.0, y: 0.0), (x: 16.0, y: 0.0), (x: 16.0, y: 2.0), (x: 14.0, y: 0.0)],
            interiors: [[(x: 14.9, y: 0.5), (x: 15.1, y: 0.5), (x: 15.0, y: 0.7), (x: 14.9, y: 0.5)]],
        );
        let out = polygon.transformed(&utm33()).unwrap();
        assert_eq!(out.interiors().len(), 1);
        assert_eq!(out.exterior().0.len(), 4);
        assert!(out.interiors()[0].0.iter().all(|c: &::geo_types::Coord<f64>| (c.x - 500000.0).abs() < 20000.0));
    }
}
