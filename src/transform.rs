use crate::crs::Crs;
use crate::error::ProjError;
use crate::pj::{Direction, Operation, Pj};
use num_traits::Float;
use std::borrow::Borrow;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Ordinate types accepted by the generic transform methods.
pub trait CoordinateType: Float + Copy + PartialOrd + Debug {}
impl<T: Float + Copy + PartialOrd + Debug> CoordinateType for T {}

/// A 2D or 3D coordinate.
///
/// The ordinates are read in the order the [`Transformer`]'s [`AxisOrder`] dictates.
pub trait Coord<T>
where
    T: CoordinateType,
{
    fn x(&self) -> T;
    fn y(&self) -> T;
    /// The third ordinate, for coordinates that carry one.
    fn z(&self) -> Option<T> {
        None
    }
    fn from_xyz(x: T, y: T, z: Option<T>) -> Self;
}

impl<T: CoordinateType> Coord<T> for (T, T) {
    fn x(&self) -> T {
        self.0
    }
    fn y(&self) -> T {
        self.1
    }
    fn from_xyz(x: T, y: T, _z: Option<T>) -> Self {
        (x, y)
    }
}

impl<T: CoordinateType> Coord<T> for (T, T, T) {
    fn x(&self) -> T {
        self.0
    }
    fn y(&self) -> T {
        self.1
    }
    fn z(&self) -> Option<T> {
        Some(self.2)
    }
    fn from_xyz(x: T, y: T, z: Option<T>) -> Self {
        (x, y, z.unwrap_or_else(T::zero))
    }
}

impl<T: CoordinateType> Coord<T> for [T; 2] {
    fn x(&self) -> T {
        self[0]
    }
    fn y(&self) -> T {
        self[1]
    }
    fn from_xyz(x: T, y: T, _z: Option<T>) -> Self {
        [x, y]
    }
}

impl<T: CoordinateType> Coord<T> for [T; 3] {
    fn x(&self) -> T {
        self[0]
    }
    fn y(&self) -> T {
        self[1]
    }
    fn z(&self) -> Option<T> {
        Some(self[2])
    }
    fn from_xyz(x: T, y: T, z: Option<T>) -> Self {
        [x, y, z.unwrap_or_else(T::zero)]
    }
}

/// Which axis order coordinates are given and returned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// The order declared by each CRS, e.g. latitude first for `EPSG:4326`.
    Authority,
    /// Longitude (or easting) first on both ends, whatever the CRSs declare.
    Traditional,
}

/// What happens to a point that cannot be transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// The first failing point fails the whole call.
    #[default]
    Strict,
    /// Failing points are replaced by [`f64::INFINITY`] in every ordinate.
    Lenient,
}

/// Options of the [`transform`] and [`itransform`] functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOptions {
    pub axis_order: AxisOrder,
    pub error_policy: ErrorPolicy,
    /// Geographic ordinates are given and returned in radians instead of degrees.
    pub radians: bool,
    /// CRSs PROJ considers equivalent are transformed by the identity.
    pub skip_equivalent: bool,
}

impl TransformOptions {
    pub fn new(axis_order: AxisOrder) -> Self {
        TransformOptions {
            axis_order,
            error_policy: ErrorPolicy::Strict,
            radians: false,
            skip_equivalent: false,
        }
    }

    pub fn error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    pub fn radians(mut self, radians: bool) -> Self {
        self.radians = radians;
        self
    }

    pub fn skip_equivalent(mut self, skip_equivalent: bool) -> Self {
        self.skip_equivalent = skip_equivalent;
        self
    }
}

/// An ordered set of 2D or 3D points.
#[derive(Debug, Clone, PartialEq)]
pub struct PointBatch {
    points: Vec<[f64; 3]>,
    dimension: usize,
}

impl PointBatch {
    pub fn from_xy(xs: &[f64], ys: &[f64]) -> Result<Self, ProjError> {
        check_len(xs.len(), ys.len())?;
        Ok(PointBatch {
            points: xs.iter().zip(ys).map(|(&x, &y)| [x, y, 0.0]).collect(),
            dimension: 2,
        })
    }

    pub fn from_xyz(xs: &[f64], ys: &[f64], zs: &[f64]) -> Result<Self, ProjError> {
        check_len(xs.len(), ys.len())?;
        check_len(xs.len(), zs.len())?;
        Ok(PointBatch {
            points: xs
                .iter()
                .zip(ys)
                .zip(zs)
                .map(|((&x, &y), &z)| [x, y, z])
                .collect(),
            dimension: 3,
        })
    }

    /// A batch of 2D points.
    pub fn from_points_2d(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        PointBatch {
            points: points.into_iter().map(|(x, y)| [x, y, 0.0]).collect(),
            dimension: 2,
        }
    }

    pub fn from_points_3d(points: impl IntoIterator<Item = (f64, f64, f64)>) -> Self {
        PointBatch {
            points: points.into_iter().map(|(x, y, z)| [x, y, z]).collect(),
            dimension: 3,
        }
    }

    /// `2` or `3`; the third ordinate of a 2D batch is always zero.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p[0]).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p[1]).collect()
    }

    /// The third ordinates of a 3D batch.
    pub fn zs(&self) -> Option<Vec<f64>> {
        (self.dimension == 3).then(|| self.points.iter().map(|p| p[2]).collect())
    }
}

fn check_len(expected: usize, found: usize) -> Result<(), ProjError> {
    if expected == found {
        Ok(())
    } else {
        Err(ProjError::ShapeMismatch { expected, found })
    }
}

/// A resolved transformation from one CRS to another.
///
/// Setting up the operation is the expensive part; a `Transformer` can be reused for any
/// number of points and shared between threads.
///
/// # Examples
///
/// ```
/// # use approx::assert_relative_eq;
/// use geoproj::{AxisOrder, Crs, Transformer};
///
/// let wgs84 = Crs::from_epsg(4326).unwrap();
/// let web_mercator = Crs::from_epsg(3857).unwrap();
/// let transformer = Transformer::from_crs(&wgs84, &web_mercator, AxisOrder::Traditional).unwrap();
/// let (x, y, _) = transformer.transform_point(10.0, 50.0, None).unwrap();
/// assert_relative_eq!(x, 1113194.9079327357, epsilon = 1e-6);
/// assert_relative_eq!(y, 6446275.841017158, epsilon = 1e-6);
/// ```
pub struct Transformer {
    source: Crs,
    target: Crs,
    axis_order: AxisOrder,
    radians: bool,
    /// `None` for the identity.
    operation: Option<Mutex<Operation>>,
    description: Option<String>,
}

impl Transformer {
    pub fn from_crs(source: &Crs, target: &Crs, axis_order: AxisOrder) -> Result<Self, ProjError> {
        Transformer::with_options(source, target, &TransformOptions::new(axis_order))
    }

    /// Builds the transformer described by `options`; the error policy is left to each call.
    pub fn with_options(
        source: &Crs,
        target: &Crs,
        options: &TransformOptions,
    ) -> Result<Self, ProjError> {
        let is_noop = source == target
            || (options.skip_equivalent && source.is_equivalent_to(target)?);
        let (operation, description) = if is_noop {
            log::debug!("{source} to {target} is the identity");
            (None, None)
        } else {
            let axis_order = options.axis_order;
            let operation = Operation::build(source.data_dir(), |ctx| {
                let source_pj = source.to_pj(ctx)?;
                let target_pj = target.to_pj(ctx)?;
                let operation = Pj::crs_to_crs(&source_pj, &target_pj)?;
                match axis_order {
                    AxisOrder::Authority => Ok(operation),
                    AxisOrder::Traditional => operation.normalize_for_visualization(),
                }
            })?;
            let description = operation.definition();
            (Some(Mutex::new(operation)), description)
        };
        Ok(Transformer {
            source: source.clone(),
            target: target.clone(),
            axis_order: options.axis_order,
            radians: options.radians,
            operation,
            description,
        })
    }

    /// Geographic ordinates are read and written in radians.
    pub fn with_radians(mut self, radians: bool) -> Self {
        self.radians = radians;
        self
    }

    pub fn source(&self) -> &Crs {
        &self.source
    }

    pub fn target(&self) -> &Crs {
        &self.target
    }

    pub fn axis_order(&self) -> AxisOrder {
        self.axis_order
    }

    pub fn is_noop(&self) -> bool {
        self.operation.is_none()
    }

    /// PROJ's definition of the selected operation; `None` for the identity or when the
    /// choice between candidate operations is deferred to each point.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Transforms one point; the third ordinate is returned when it was given.
    pub fn transform_point(
        &self,
        x: f64,
        y: f64,
        z: Option<f64>,
    ) -> Result<(f64, f64, Option<f64>), ProjError> {
        let mut operation = self.lock();
        let [x2, y2, z2] = self.convert(operation.as_deref_mut(), [x, y, z.unwrap_or(0.0)])?;
        Ok((x2, y2, z.map(|_| z2)))
    }

    /// Transforms every point of `batch` eagerly.
    pub fn transform(&self, batch: &PointBatch, policy: ErrorPolicy) -> Result<PointBatch, ProjError> {
        let mut operation = self.lock();
        let points = batch
            .points
            .iter()
            .map(|&point| settle(self.convert(operation.as_deref_mut(), point), policy, point))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PointBatch {
            points,
            dimension: batch.dimension,
        })
    }

    /// Transforms a slice of coordinates of any [`Coord`] type eagerly.
    pub fn transform_coords<T, C>(&self, coords: &[C], policy: ErrorPolicy) -> Result<Vec<C>, ProjError>
    where
        T: CoordinateType,
        C: Coord<T>,
    {
        let mut operation = self.lock();
        coords
            .iter()
            .map(|coord| {
                let point = to_point(coord)?;
                let converted = settle(self.convert(operation.as_deref_mut(), point), policy, point)?;
                from_point(converted, coord.z().is_some())
            })
            .collect()
    }

    /// Transforms coordinates lazily, one per call to `next`.
    ///
    /// The returned iterator is single-pass and applies `policy` to each point.
    pub fn iterate<I, T, C>(&self, coords: I, policy: ErrorPolicy) -> TransformIter<&Self, I::IntoIter, T, C>
    where
        I: IntoIterator<Item = C>,
        T: CoordinateType,
        C: Coord<T>,
    {
        TransformIter::new(self, coords.into_iter(), policy)
    }

    fn lock(&self) -> Option<MutexGuard<'_, Operation>> {
        self.operation
            .as_ref()
            .map(|operation| operation.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn convert(
        &self,
        operation: Option<&mut Operation>,
        [x, y, z]: [f64; 3],
    ) -> Result<[f64; 3], ProjError> {
        let Some(operation) = operation else {
            return Ok([x, y, z]);
        };
        let (x, y) = if self.radians && self.source.is_geographic() {
            (x.to_degrees(), y.to_degrees())
        } else {
            (x, y)
        };
        let (x2, y2, z2) = operation.trans(Direction::Forward, x, y, z)?;
        if self.radians && self.target.is_geographic() {
            Ok([x2.to_radians(), y2.to_radians(), z2])
        } else {
            Ok([x2, y2, z2])
        }
    }
}

impl Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("axis_order", &self.axis_order)
            .field("description", &self.description)
            .finish()
    }
}

fn settle(
    result: Result<[f64; 3], ProjError>,
    policy: ErrorPolicy,
    point: [f64; 3],
) -> Result<[f64; 3], ProjError> {
    match result {
        Err(err) if policy == ErrorPolicy::Lenient && err.is_point_error() => {
            log::debug!("{point:?} could not be transformed: {err}");
            Ok([f64::INFINITY; 3])
        }
        other => other,
    }
}

fn to_point<T: CoordinateType, C: Coord<T>>(coord: &C) -> Result<[f64; 3], ProjError> {
    let ordinate = |value: T| {
        value.to_f64().ok_or_else(|| {
            ProjError::InvalidArgument(format!("ordinate {value:?} is not representable as f64"))
        })
    };
    let z = match coord.z() {
        Some(z) => ordinate(z)?,
        None => 0.0,
    };
    Ok([ordinate(coord.x())?, ordinate(coord.y())?, z])
}

fn from_point<T: CoordinateType, C: Coord<T>>(
    [x, y, z]: [f64; 3],
    has_z: bool,
) -> Result<C, ProjError> {
    let ordinate = |value: f64| {
        T::from(value).ok_or_else(|| {
            ProjError::InvalidArgument(format!("{value} is not representable as the coordinate type"))
        })
    };
    let z = if has_z { Some(ordinate(z)?) } else { None };
    Ok(C::from_xyz(ordinate(x)?, ordinate(y)?, z))
}

/// Lazy transformation of a coordinate sequence, returned by [`Transformer::iterate`] and
/// [`itransform`].
pub struct TransformIter<B, I, T, C> {
    transformer: B,
    coords: I,
    policy: ErrorPolicy,
    _coord: PhantomData<fn() -> (T, C)>,
}

impl<B, I, T, C> TransformIter<B, I, T, C>
where
    B: Borrow<Transformer>,
    I: Iterator<Item = C>,
    T: CoordinateType,
    C: Coord<T>,
{
    fn new(transformer: B, coords: I, policy: ErrorPolicy) -> Self {
        TransformIter {
            transformer,
            coords,
            policy,
            _coord: PhantomData,
        }
    }
}

impl<B, I, T, C> Iterator for TransformIter<B, I, T, C>
where
    B: Borrow<Transformer>,
    I: Iterator<Item = C>,
    T: CoordinateType,
    C: Coord<T>,
{
    type Item = Result<C, ProjError>;

    fn next(&mut self) -> Option<Self::Item> {
        let coord = self.coords.next()?;
        let transformer = self.transformer.borrow();
        let result = to_point(&coord).and_then(|point| {
            let mut operation = transformer.lock();
            let converted = transformer.convert(operation.as_deref_mut(), point);
            settle(converted, self.policy, point)
        });
        Some(result.and_then(|point| from_point(point, coord.z().is_some())))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.coords.size_hint()
    }
}

/// Transforms `batch` from `source` to `target`.
///
/// ```
/// use geoproj::{transform, AxisOrder, Crs, ErrorPolicy, PointBatch, TransformOptions};
///
/// let wgs84 = Crs::from_epsg(4326).unwrap();
/// let web_mercator = Crs::from_epsg(3857).unwrap();
/// let batch = PointBatch::from_xy(&[0.0, 0.0], &[0.0, 90.0]).unwrap();
/// let options = TransformOptions::new(AxisOrder::Traditional).error_policy(ErrorPolicy::Lenient);
/// let out = transform(&wgs84, &web_mercator, &batch, &options).unwrap();
/// assert_eq!(out.xs()[0], 0.0);
/// assert!(out.ys()[1].is_infinite());
/// ```
pub fn transform(
    source: &Crs,
    target: &Crs,
    batch: &PointBatch,
    options: &TransformOptions,
) -> Result<PointBatch, ProjError> {
    Transformer::with_options(source, target, options)?.transform(batch, options.error_policy)
}

/// Lazily transforms `coords` from `source` to `target`.
pub fn itransform<I, T, C>(
    source: &Crs,
    target: &Crs,
    coords: I,
    options: &TransformOptions,
) -> Result<TransformIter<Transformer, I::IntoIter, T, C>, ProjError>
where
    I: IntoIterator<Item = C>,
    T: CoordinateType,
    C: Coord<T>,
{
    let transformer = Transformer::with_options(source, target, options)?;
    Ok(TransformIter::new(
        transformer,
        coords.into_iter(),
        options.error_policy,
    ))
}
